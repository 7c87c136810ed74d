use serde::{Deserialize, Serialize};

/// The generated quiz artifact, parsed from the generator's JSON completion.
///
/// Question ordering and ids are accepted as produced; the count is the
/// generator's contract and only checked for being non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizResult {
    pub title: String,
    pub questions: Vec<Question>,
}

/// A single multiple-choice quiz item.
///
/// `options` carries four choices and `answer` matches one of them per the
/// generation instructions; neither is re-validated locally. Field names are
/// camelCase on the wire to match the instructed output shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i32,
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    pub explanation: String,
    /// Empty string when the question needs no code.
    #[serde(default)]
    pub code_snippet: String,
}
