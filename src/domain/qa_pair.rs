// ============================================================
// Layer 3 — QaExample Domain Type
// ============================================================
// One raw reading-comprehension example before tokenisation:
// a question, its context paragraph, and the answer located by
// character offset inside the context.
//
// Example:
//   context:      "The bridge opened in 1937 after four years of work."
//   question:     "When did the bridge open?"
//   answer_text:  "1937"
//   answer_start: 21   (character index of '1')
//
// The data layer later maps the character span onto word
// positions to produce the (start_index, end_index) labels.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaExample {
    /// Dataset identifier, kept for traceability in logs
    pub id: String,

    pub question: String,

    pub context: String,

    pub answer_text: String,

    /// Character offset of the first answer character in `context`
    pub answer_start: usize,
}

impl QaExample {
    pub fn new(
        id:           impl Into<String>,
        question:     impl Into<String>,
        context:      impl Into<String>,
        answer_text:  impl Into<String>,
        answer_start: usize,
    ) -> Self {
        Self {
            id:          id.into(),
            question:    question.into(),
            context:     context.into(),
            answer_text: answer_text.into(),
            answer_start,
        }
    }

    /// Exclusive character offset one past the answer
    pub fn answer_end(&self) -> usize {
        self.answer_start + self.answer_text.chars().count()
    }

    /// True when the recorded offset really points at the answer text
    pub fn offsets_agree(&self) -> bool {
        let found: String = self
            .context
            .chars()
            .skip(self.answer_start)
            .take(self.answer_text.chars().count())
            .collect();
        found == self.answer_text
    }
}
