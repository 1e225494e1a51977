//! Classifier sets and label decoding
//!
//! Callers supply the label vocabulary per request as a string-encoded list
//! (for example `['battery', 'glass']`), positionally aligned with the
//! artifact's output scores. The wire form is parsed by a strict grammar that
//! accepts only a flat list of quoted strings, not a generic literal
//! evaluator; anything else is an input validation failure.

use crate::error::{Result, SortiumError};
use serde::Serialize;

/// Ordered, request-scoped label vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierSet {
    labels: Vec<String>,
}

impl ClassifierSet {
    /// Build a set from already-parsed labels
    ///
    /// # Errors
    /// - `InvalidInput` if the list is empty or contains an empty label
    pub fn from_labels(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(SortiumError::invalid_input("classifier list is empty"));
        }
        if labels.iter().any(String::is_empty) {
            return Err(SortiumError::invalid_input(
                "classifier list contains an empty label",
            ));
        }
        Ok(Self { labels })
    }

    /// Parse the multipart wire form: repeated field items, the first of which
    /// carries the string-encoded label list
    ///
    /// # Errors
    /// - `InvalidInput` if no items were supplied or the first item is malformed
    pub fn parse_wire(items: &[String]) -> Result<Self> {
        let first = items
            .first()
            .ok_or_else(|| SortiumError::invalid_input("missing classifiers field"))?;
        Self::parse_list(first)
    }

    /// Parse a string-encoded list of quoted labels, e.g. `['battery', 'glass']`
    ///
    /// # Errors
    /// - `InvalidInput` for anything other than a flat list of quoted strings
    pub fn parse_list(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| {
                SortiumError::invalid_input(format!(
                    "classifier list must be bracketed, got: {trimmed}"
                ))
            })?;

        let mut labels = Vec::new();
        let mut chars = inner.chars().peekable();
        loop {
            // Skip whitespace between items.
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            let Some(&quote) = chars.peek() else { break };
            if quote != '\'' && quote != '"' {
                return Err(SortiumError::invalid_input(format!(
                    "classifier list items must be quoted strings, got: {input}"
                )));
            }
            chars.next();

            let mut label = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == quote {
                    closed = true;
                    break;
                }
                label.push(c);
            }
            if !closed {
                return Err(SortiumError::invalid_input(format!(
                    "unterminated string in classifier list: {input}"
                )));
            }
            labels.push(label);

            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            match chars.next() {
                Some(',') => {},
                None => break,
                Some(c) => {
                    return Err(SortiumError::invalid_input(format!(
                        "unexpected character '{c}' in classifier list: {input}"
                    )))
                },
            }
        }

        Self::from_labels(labels)
    }

    /// Number of labels in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set is empty (cannot happen for a constructed set)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in caller order
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// A single best-label prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Winning label from the caller's classifier set
    pub label: String,
    /// Raw score at the winning index, in `[0, 1]` for softmax outputs
    pub confidence: f32,
}

impl Prediction {
    /// Confidence rendered as a two-decimal percentage, e.g. `"97.31"`
    #[must_use]
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}", self.confidence * 100.0)
    }
}

/// Maps raw score vectors onto caller-supplied labels
pub struct LabelDecoder;

impl LabelDecoder {
    /// Decode the best label from a score vector
    ///
    /// Ties are broken by the lowest index: the first occurrence of the
    /// maximum wins, so decoding is deterministic for any input.
    ///
    /// # Errors
    /// - `ClassifierMismatch` if the set length differs from the score count;
    ///   a silently wrong label would be worse than any failure here
    /// - `Inference` if the score vector is empty
    pub fn decode(scores: &[f32], classifiers: &ClassifierSet) -> Result<Prediction> {
        if classifiers.len() != scores.len() {
            return Err(SortiumError::ClassifierMismatch {
                expected: scores.len(),
                got: classifiers.len(),
            });
        }

        let mut best_index = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (index, &score) in scores.iter().enumerate() {
            if score > best_score {
                best_index = index;
                best_score = score;
            }
        }

        let label = classifiers
            .labels()
            .get(best_index)
            .ok_or_else(|| SortiumError::inference("empty score vector"))?
            .clone();
        Ok(Prediction {
            label,
            confidence: best_score,
        })
    }
}
