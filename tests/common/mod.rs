//! In-test stand-ins for the external services
#![allow(dead_code)]

use archivist::chat::{ANSWER_POLICY, CONDENSE_POLICY};
use archivist::config::Config;
use archivist::corpus::tokenize;
use archivist::embedding::{EmbeddingError, EmbeddingProvider};
use archivist::engine::{RagEngine, Services};
use archivist::evaluation::{FAITHFULNESS_POLICY, RELEVANCY_POLICY};
use archivist::llm::{GenerationRequest, GenerationService};
use archivist::service::ServiceError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const DIMENSION: usize = 64;

/// Bag-of-words embedding: each term hashed into one of 64 buckets
#[derive(Default)]
pub struct HashEmbedder {
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMENSION];
        for term in tokenize(text) {
            let hash = blake3::hash(term.as_bytes());
            let bucket = hash.as_bytes()[0] as usize % DIMENSION;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

/// Generation stub that answers by quoting the top passage
///
/// Judges faithfulness as YES when the answer quotes some passage verbatim.
#[derive(Default)]
pub struct QuotingGenerator {
    pub calls: AtomicUsize,
}

impl QuotingGenerator {
    fn reply(request: &GenerationRequest) -> String {
        if request.system_policy == CONDENSE_POLICY {
            return request.query.clone();
        }
        if request.system_policy == ANSWER_POLICY {
            return match request.passages().first() {
                Some(passage) => format!("According to the documents: {}", passage),
                None => "The provided context does not contain this information.".to_string(),
            };
        }
        if request.system_policy == FAITHFULNESS_POLICY {
            let quoted = request
                .passages()
                .iter()
                .any(|passage| request.query.contains(passage.as_str()));
            return if quoted {
                "YES. The answer quotes the context.".to_string()
            } else {
                "NO. The answer is not supported.".to_string()
            };
        }
        "YES. The answer addresses the question.".to_string()
    }
}

#[async_trait]
impl GenerationService for QuotingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::reply(request))
    }

    fn model_name(&self) -> &str {
        "quoting"
    }
}

/// Answers like [`QuotingGenerator`] but every relevancy judgment fails
#[derive(Default)]
pub struct RelevancyOfflineGenerator;

#[async_trait]
impl GenerationService for RelevancyOfflineGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        if request.system_policy == RELEVANCY_POLICY {
            return Err(ServiceError::Unavailable("relevancy judge offline".to_string()));
        }
        Ok(QuotingGenerator::reply(request))
    }

    fn model_name(&self) -> &str {
        "relevancy-offline"
    }
}

/// Blocks answer generation until released, to hold an exchange mid-flight
#[derive(Default)]
pub struct GatedGenerator {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl GenerationService for GatedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        if request.system_policy == ANSWER_POLICY {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(QuotingGenerator::reply(request))
    }

    fn model_name(&self) -> &str {
        "gated"
    }
}

/// Configuration rooted in `data_dir` with rerank off
pub fn test_config(data_dir: &Path) -> Config {
    let mut config = Config::with_data_dir(data_dir);
    config.rerank.enabled = false;
    config.llm.max_retries = 0;
    config
}

pub fn engine_with(
    config: Config,
    embedder: Arc<HashEmbedder>,
    generator: Arc<dyn GenerationService>,
) -> RagEngine {
    RagEngine::new(config, Services::new(embedder, generator, None)).unwrap()
}

pub fn write_doc(dir: &Path, name: &str, text: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), text).unwrap();
}

/// A one-page PDF showing `text` in Helvetica, with a valid xref table
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (idx, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", idx + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        tail.push_str(&format!("{:010} 00000 n \n", offset));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    pdf.extend_from_slice(tail.as_bytes());
    pdf
}
