//! Lexical postings built once per snapshot

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "did", "do", "does", "for", "from",
    "had", "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "me", "my", "no", "not", "of", "on", "or", "our", "she", "so", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "to", "was", "we", "were", "what",
    "when", "where", "which", "who", "whom", "why", "will", "with", "you", "your",
];

/// Lowercased alphanumeric terms with English stopwords removed
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Occurrence of a term in one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Document (chunk) index in the snapshot
    pub doc: u32,
    /// Term frequency within that document
    pub tf: u32,
}

/// Inverted index: term -> postings, plus the length statistics BM25 needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Postings {
    terms: BTreeMap<String, Vec<Posting>>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f32,
}

impl Postings {
    pub fn build<'a>(texts: impl Iterator<Item = &'a str>) -> Self {
        let mut terms: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut doc_lengths = Vec::new();

        for (doc, text) in texts.enumerate() {
            let tokens = tokenize(text);
            doc_lengths.push(tokens.len() as u32);

            let mut counts: BTreeMap<String, u32> = BTreeMap::new();
            for token in tokens {
                *counts.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in counts {
                terms.entry(term).or_default().push(Posting {
                    doc: doc as u32,
                    tf,
                });
            }
        }

        let total: u64 = doc_lengths.iter().map(|&l| l as u64).sum();
        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            total as f32 / doc_lengths.len() as f32
        };

        Self {
            terms,
            doc_lengths,
            avg_doc_length,
        }
    }

    pub fn postings(&self, term: &str) -> &[Posting] {
        self.terms.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn doc_length(&self, doc: u32) -> u32 {
        self.doc_lengths.get(doc as usize).copied().unwrap_or(0)
    }

    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_length
    }
}
