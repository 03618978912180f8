// ============================================================
// Layer 4 — SQuAD v1.1 Source
// ============================================================
// Reads the SQuAD v1.1 JSON layout:
//
//   { "data": [ { "paragraphs": [ { "context": "...",
//       "qas": [ { "id": "...", "question": "...",
//                  "answers": [ { "text": "...", "answer_start": 21 } ] } ] } ] } ] }
//
// and turns every question into a DcnSample:
//
//   QaExample (char offsets)
//       │  tokenize context + question
//       ▼
//   PreparedExample (word tokens, word-level span)
//       │  GloVe lookup, restricted to the corpus vocabulary
//       ▼
//   DcnSample (document/question vectors, start/end indices)
//
// Examples whose answer cannot be located, or whose answer lies
// beyond max_document_length, are skipped and counted.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use crate::data::dataset::DcnSample;
use crate::data::glove::GloveTable;
use crate::data::tokenize::{char_span_to_words, tokenize, WordToken};
use crate::domain::qa_pair::QaExample;
use crate::domain::traits::QaSource;
use crate::error::DcnError;

// ─── JSON layout ──────────────────────────────────────────────────────────────
#[derive(Debug, Deserialize)]
struct SquadFile {
    data: Vec<SquadArticle>,
}

#[derive(Debug, Deserialize)]
struct SquadArticle {
    paragraphs: Vec<SquadParagraph>,
}

#[derive(Debug, Deserialize)]
struct SquadParagraph {
    context: String,
    qas:     Vec<SquadQuestion>,
}

#[derive(Debug, Deserialize)]
struct SquadQuestion {
    id:       String,
    question: String,
    #[serde(default)]
    answers:  Vec<SquadAnswer>,
}

#[derive(Debug, Deserialize)]
struct SquadAnswer {
    text:         String,
    answer_start: usize,
}

/// Parse SQuAD JSON into one QaExample per question (first answer only).
pub fn parse_squad<R: Read>(reader: R) -> Result<Vec<QaExample>> {
    let file: SquadFile = serde_json::from_reader(reader).context("Invalid SQuAD JSON")?;

    let mut examples = Vec::new();
    for paragraph in file.data.iter().flat_map(|a| &a.paragraphs) {
        for qa in &paragraph.qas {
            match qa.answers.first() {
                Some(answer) => examples.push(QaExample::new(
                    qa.id.clone(),
                    qa.question.clone(),
                    paragraph.context.clone(),
                    answer.text.clone(),
                    answer.answer_start,
                )),
                None => tracing::debug!("Question {} has no answer, skipping", qa.id),
            }
        }
    }
    Ok(examples)
}

pub fn read_squad(path: impl AsRef<Path>) -> Result<Vec<QaExample>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Cannot open SQuAD file '{}'", path.display()))?;
    parse_squad(BufReader::new(file))
        .with_context(|| format!("Cannot parse '{}'", path.display()))
}

// ─── Preparation ──────────────────────────────────────────────────────────────
/// A tokenised example with its word-level answer span.
#[derive(Debug, Clone)]
pub struct PreparedExample {
    pub id:              String,
    pub context_tokens:  Vec<WordToken>,
    pub question_tokens: Vec<WordToken>,
    pub start:           usize,
    pub end:             usize,
}

/// Tokenise and locate the answer.
/// Returns Ok(None) for examples that cannot be used.
pub fn prepare_example(
    example:             &QaExample,
    max_document_length: usize,
    max_question_length: usize,
) -> Result<Option<PreparedExample>> {
    if !example.offsets_agree() {
        tracing::debug!("Example {}: answer_start does not point at the answer", example.id);
        return Ok(None);
    }

    let mut context_tokens  = tokenize(&example.context)?;
    let mut question_tokens = tokenize(&example.question)?;
    if context_tokens.is_empty() || question_tokens.is_empty() {
        return Ok(None);
    }

    let Some((start, end)) =
        char_span_to_words(&context_tokens, example.answer_start, example.answer_end())
    else {
        return Ok(None);
    };
    if end >= max_document_length {
        return Ok(None);
    }

    context_tokens.truncate(max_document_length);
    question_tokens.truncate(max_question_length);

    Ok(Some(PreparedExample {
        id: example.id.clone(),
        context_tokens,
        question_tokens,
        start,
        end,
    }))
}

/// Lowercase set of every word in the prepared corpus
pub fn vocabulary(prepared: &[PreparedExample]) -> HashSet<String> {
    prepared
        .iter()
        .flat_map(|p| p.context_tokens.iter().chain(&p.question_tokens))
        .map(|t| t.text.to_lowercase())
        .collect()
}

pub fn embed_example(prepared: &PreparedExample, glove: &GloveTable) -> DcnSample {
    DcnSample {
        document:       glove.embed(&prepared.context_tokens),
        question:       glove.embed(&prepared.question_tokens),
        embedding_dim:  glove.dim(),
        start_position: prepared.start,
        end_position:   prepared.end,
    }
}

// ─── SquadSource ──────────────────────────────────────────────────────────────
pub struct SquadSource {
    pub path:                PathBuf,
    pub glove_path:          PathBuf,
    pub embedding_dim:       usize,
    pub max_document_length: usize,
    pub max_question_length: usize,
}

impl SquadSource {
    pub fn prepare_all(&self, examples: &[QaExample]) -> Result<Vec<PreparedExample>> {
        let mut prepared = Vec::with_capacity(examples.len());
        let mut skipped  = 0usize;
        for example in examples {
            match prepare_example(example, self.max_document_length, self.max_question_length)? {
                Some(p) => prepared.push(p),
                None    => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(
                "Skipped {} of {} SQuAD examples (answer not locatable or past max_document_length={})",
                skipped,
                examples.len(),
                self.max_document_length
            );
        }
        Ok(prepared)
    }
}

impl QaSource for SquadSource {
    fn name(&self) -> &str {
        "SQuAD"
    }

    fn get_data(&self) -> Result<Vec<DcnSample>> {
        let examples = read_squad(&self.path)?;
        tracing::info!("Read {} SQuAD questions from '{}'", examples.len(), self.path.display());

        let prepared = self.prepare_all(&examples)?;
        let vocab    = vocabulary(&prepared);
        let glove    = GloveTable::from_path(&self.glove_path, Some(&vocab))?;

        if glove.dim() != self.embedding_dim {
            return Err(DcnError::Config(format!(
                "GloVe vectors have dimension {} but embedding_dim is {}",
                glove.dim(),
                self.embedding_dim
            ))
            .into());
        }
        tracing::info!(
            "GloVe covers {} of {} vocabulary words",
            glove.len(),
            vocab.len()
        );

        Ok(prepared.iter().map(|p| embed_example(p, &glove)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SQUAD: &str = r#"{
        "version": "1.1",
        "data": [{
            "title": "Bridges",
            "paragraphs": [{
                "context": "The bridge opened in 1937 after four years.",
                "qas": [
                    { "id": "a1", "question": "When did the bridge open?",
                      "answers": [ { "text": "1937", "answer_start": 21 } ] },
                    { "id": "a2", "question": "How long did it take?",
                      "answers": [ { "text": "four years", "answer_start": 32 } ] },
                    { "id": "a3", "question": "Who paid?", "answers": [] }
                ]
            }]
        }]
    }"#;

    #[test]
    fn test_parse_keeps_answered_questions() {
        let examples = parse_squad(Cursor::new(SQUAD)).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].id, "a1");
        assert!(examples.iter().all(|e| e.offsets_agree()));
    }

    #[test]
    fn test_prepare_maps_answer_to_words() {
        let examples = parse_squad(Cursor::new(SQUAD)).unwrap();
        let p = prepare_example(&examples[1], 600, 60).unwrap().unwrap();
        // The bridge opened in 1937 after four years .
        //  0    1      2     3   4    5    6     7    8
        assert_eq!((p.start, p.end), (6, 7));
        assert_eq!(p.context_tokens.len(), 9);
    }

    #[test]
    fn test_answer_past_max_length_is_skipped() {
        let examples = parse_squad(Cursor::new(SQUAD)).unwrap();
        assert!(prepare_example(&examples[1], 5, 60).unwrap().is_none());
        let p = prepare_example(&examples[0], 5, 2).unwrap().unwrap();
        assert_eq!(p.context_tokens.len(), 5);
        assert_eq!(p.question_tokens.len(), 2);
    }

    #[test]
    fn test_misaligned_offset_is_skipped() {
        let bad = QaExample::new("x", "When?", "Opened in 1937.", "1937", 2);
        assert!(prepare_example(&bad, 600, 60).unwrap().is_none());
    }

    #[test]
    fn test_embed_uses_table_dimension() {
        let examples = parse_squad(Cursor::new(SQUAD)).unwrap();
        let p = prepare_example(&examples[0], 600, 60).unwrap().unwrap();
        let glove = GloveTable::from_reader(Cursor::new("1937 1 2\nbridge 3 4\n"), None).unwrap();

        let sample = embed_example(&p, &glove);
        assert_eq!(sample.embedding_dim, 2);
        assert_eq!(sample.document_len(), 9);
        assert_eq!(&sample.document[8..10], &[1.0, 2.0]);
        assert!(sample.validate(0).is_ok());
        assert!(vocabulary(&[p]).contains("the"));
    }
}
