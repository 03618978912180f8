// ============================================================
// Layer 4 — GloVe Word Vectors
// ============================================================
// Reads pre-trained word vectors in the GloVe text format:
//
//   the 0.418 0.24968 -0.41242 ...
//   ,   0.013441 0.23682 -0.16899 ...
//
// Full GloVe files are several GB, so loading can be restricted
// to a vocabulary collected from the corpus first.
// Lookups are lowercase; unknown words embed as zero vectors.

use anyhow::{Context, Result};
use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::data::tokenize::WordToken;

pub struct GloveTable {
    dim:     usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl GloveTable {
    /// Load vectors from a GloVe text file.
    /// `vocab` (lowercase words) limits which rows are kept.
    pub fn from_path(path: impl AsRef<Path>, vocab: Option<&HashSet<String>>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open GloVe file '{}'", path.display()))?;
        let table = Self::from_reader(BufReader::new(file), vocab)?;
        tracing::info!(
            "Loaded {} word vectors (dim={}) from '{}'",
            table.len(),
            table.dim,
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: BufRead>(reader: R, vocab: Option<&HashSet<String>>) -> Result<Self> {
        let mut dim     = 0usize;
        let mut vectors = HashMap::new();
        let mut skipped = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Cannot read GloVe line {}", line_no + 1))?;
            let mut fields = line.split(' ');
            let word = match fields.next() {
                Some(w) if !w.is_empty() => w.to_lowercase(),
                _ => continue,
            };

            let values: Result<Vec<f32>, _> = fields.map(str::parse::<f32>).collect();
            let values = match values {
                Ok(v) if !v.is_empty() => v,
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            if dim == 0 {
                dim = values.len();
            } else if values.len() != dim {
                skipped += 1;
                continue;
            }

            if vocab.map_or(true, |v| v.contains(&word)) {
                // First occurrence wins (cased duplicates collapse)
                vectors.entry(word).or_insert(values);
            }
        }

        if dim == 0 {
            anyhow::bail!("GloVe input contains no usable vectors");
        }
        if skipped > 0 {
            tracing::warn!("Skipped {} malformed GloVe lines", skipped);
        }
        Ok(Self { dim, vectors })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(&word.to_lowercase()).map(Vec::as_slice)
    }

    /// Row-major [tokens.len(), dim] buffer, zeros for unknown words
    pub fn embed(&self, tokens: &[WordToken]) -> Vec<f32> {
        let mut out = Vec::with_capacity(tokens.len() * self.dim);
        for token in tokens {
            match self.get(&token.text) {
                Some(v) => out.extend_from_slice(v),
                None    => out.resize(out.len() + self.dim, 0.0),
            }
        }
        out
    }

    /// Fraction of tokens that have a vector
    pub fn coverage(&self, tokens: &[WordToken]) -> f64 {
        if tokens.is_empty() {
            return 0.0;
        }
        let known = tokens.iter().filter(|t| self.get(&t.text).is_some()).count();
        known as f64 / tokens.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "the 0.1 0.2 0.3\nbridge 1.0 -1.0 0.5\nbroken 1 2\n1937 0.0 0.0 9.0\n";

    fn word(text: &str) -> WordToken {
        WordToken { text: text.into(), start: 0, end: text.len() }
    }

    #[test]
    fn test_reads_vectors_and_skips_bad_rows() {
        let table = GloveTable::from_reader(Cursor::new(SAMPLE), None).unwrap();
        assert_eq!(table.dim(), 3);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("Bridge"), Some(&[1.0, -1.0, 0.5][..]));
        assert!(table.get("broken").is_none());
    }

    #[test]
    fn test_vocab_filter() {
        let vocab: HashSet<String> = ["the".to_string()].into_iter().collect();
        let table = GloveTable::from_reader(Cursor::new(SAMPLE), Some(&vocab)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.dim(), 3);
    }

    #[test]
    fn test_unknown_words_embed_as_zero() {
        let table = GloveTable::from_reader(Cursor::new(SAMPLE), None).unwrap();
        let out = table.embed(&[word("the"), word("zebra")]);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.0, 0.0, 0.0]);
        assert!((table.coverage(&[word("the"), word("zebra")]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(GloveTable::from_reader(Cursor::new(""), None).is_err());
    }
}
