//! BM25 ranking over a snapshot's postings

use super::{RetrievedCandidate, RetrieverSource};
use crate::corpus::{tokenize, CorpusSnapshot};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct LexicalRetriever {
    k1: f32,
    b: f32,
}

impl Default for LexicalRetriever {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl LexicalRetriever {
    pub fn new(k1: f32, b: f32) -> Self {
        Self { k1, b }
    }

    /// Top `k` chunks by BM25 score; empty for a query with no indexable terms
    ///
    /// Chunks sharing no term with the query are never returned. Equal
    /// scores are ordered by chunk position in the snapshot.
    pub fn retrieve(
        &self,
        snapshot: &CorpusSnapshot,
        query: &str,
        k: usize,
    ) -> Vec<RetrievedCandidate> {
        // Repeated query terms count once
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let postings = snapshot.postings();
        let n = postings.doc_count() as f32;
        let avg_len = postings.avg_doc_length().max(f32::EPSILON);

        let mut scores: HashMap<u32, f32> = HashMap::new();
        for term in &terms {
            let list = postings.postings(term);
            if list.is_empty() {
                continue;
            }
            let df = list.len() as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();

            for posting in list {
                let tf = posting.tf as f32;
                let len = postings.doc_length(posting.doc) as f32;
                let norm = self.k1 * (1.0 - self.b + self.b * len / avg_len);
                *scores.entry(posting.doc).or_insert(0.0) += idf * tf * (self.k1 + 1.0) / (tf + norm);
            }
        }

        let mut ranked: Vec<(u32, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k);

        debug!("Lexical retrieval: {} terms, {} hits", terms.len(), ranked.len());

        ranked
            .into_iter()
            .filter_map(|(doc, score)| {
                snapshot.chunk_at(doc as usize).map(|chunk| (chunk, score))
            })
            .enumerate()
            .map(|(idx, (chunk, score))| RetrievedCandidate {
                chunk_id: chunk.id.clone(),
                source: RetrieverSource::Lexical,
                rank: idx + 1,
                score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Chunk;

    fn snapshot(texts: &[&str]) -> CorpusSnapshot {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new("doc.txt", i, *t, vec![1.0]))
            .collect();
        CorpusSnapshot::build(chunks).unwrap()
    }

    #[test]
    fn test_ranks_matching_chunk_first() {
        let snap = snapshot(&[
            "Grass is green and grows quickly.",
            "The sky is blue.",
            "Rust has a strong type system.",
        ]);
        let results = LexicalRetriever::default().retrieve(&snap, "What color is the sky?", 5);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, snap.chunks()[1].id);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].source, RetrieverSource::Lexical);
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_term_frequency_and_rarity() {
        let snap = snapshot(&[
            "rust rust rust compiler",
            "rust compiler",
            "compiler design",
        ]);
        let results = LexicalRetriever::default().retrieve(&snap, "rust", 5);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, snap.chunks()[0].id);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_empty_and_stopword_queries() {
        let snap = snapshot(&["The sky is blue."]);
        let retriever = LexicalRetriever::default();
        assert!(retriever.retrieve(&snap, "", 5).is_empty());
        assert!(retriever.retrieve(&snap, "the is a", 5).is_empty());
    }

    #[test]
    fn test_deterministic_and_truncated() {
        let snap = snapshot(&["apple pie", "apple tart", "apple juice", "pear"]);
        let retriever = LexicalRetriever::default();
        let first = retriever.retrieve(&snap, "apple", 2);
        let second = retriever.retrieve(&snap, "apple", 2);

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        // Equal scores keep snapshot order
        assert_eq!(first[0].chunk_id, snap.chunks()[0].id);
        assert_eq!(first[1].chunk_id, snap.chunks()[1].id);
    }
}
