//! Post-hoc faithfulness and relevancy judgments
//!
//! Evaluation is advisory. A failing verdict never blocks the answer; it is
//! attached to the assistant turn as a quality signal. The two judgments are
//! independent: one failing service call leaves the other verdict intact.

use crate::corpus::Chunk;
use crate::llm::{GenerationRequest, GenerationService};
use crate::service::{call_with_retry, Degradation, RetryPolicy, ServiceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const FAITHFULNESS_POLICY: &str = "You judge whether an answer is supported by the context. \
Reply YES if every claim in the answer follows from the context, otherwise NO. \
Start your reply with YES or NO, then give a one-sentence reason.";

pub const RELEVANCY_POLICY: &str = "You judge whether an answer addresses a question. \
Reply YES if the answer responds to what was asked, otherwise NO. \
Start your reply with YES or NO, then give a one-sentence reason.";

/// Verdicts attached to an assistant turn
///
/// A verdict is `None` when its judgment could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub faithfulness: Option<bool>,
    pub relevancy: Option<bool>,
    /// Reasoning from the faithfulness judgment
    pub feedback: String,
}

impl Evaluation {
    /// Both verdicts present and passing
    pub fn passed(&self) -> bool {
        self.faithfulness == Some(true) && self.relevancy == Some(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Faithfulness,
    Relevancy,
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Judgment::Faithfulness => write!(f, "faithfulness"),
            Judgment::Relevancy => write!(f, "relevancy"),
        }
    }
}

/// What an evaluation produced
#[derive(Debug, Default)]
pub struct EvaluationReport {
    /// `None` only when every judgment failed
    pub evaluation: Option<Evaluation>,
    /// One `EvaluationFailed` per judgment that could not be obtained
    pub degradations: Vec<Degradation>,
}

/// Pass/fail from a reply that starts with YES or NO, with the remainder as feedback
///
/// A reply that starts with neither counts as a failing verdict.
pub fn parse_verdict(reply: &str) -> (bool, String) {
    let trimmed = reply.trim_start();
    let word: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    let passing = word == "YES";
    let rest = if word == "YES" || word == "NO" {
        trimmed[word.len()..].trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
    } else {
        trimmed
    };

    (passing, rest.trim().to_string())
}

pub struct ResponseEvaluator {
    judge: Arc<dyn GenerationService>,
    policy: RetryPolicy,
}

impl ResponseEvaluator {
    pub fn new(judge: Arc<dyn GenerationService>, policy: RetryPolicy) -> Self {
        Self { judge, policy }
    }

    /// Run the faithfulness and relevancy judgments concurrently
    pub async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        source_context: &[Chunk],
    ) -> EvaluationReport {
        let faithfulness = GenerationRequest::new(FAITHFULNESS_POLICY, format!("Answer:\n{}", answer))
            .with_context(source_context.iter().map(|c| c.text.clone()).collect());
        let relevancy = GenerationRequest::new(
            RELEVANCY_POLICY,
            format!("Question:\n{}\n\nAnswer:\n{}", question, answer),
        );

        let (faithfulness, relevancy) =
            tokio::join!(self.verdict(&faithfulness), self.verdict(&relevancy));

        let mut report = EvaluationReport::default();
        let faithfulness = report.record(Judgment::Faithfulness, faithfulness);
        let relevancy = report.record(Judgment::Relevancy, relevancy);

        if faithfulness.is_none() && relevancy.is_none() {
            return report;
        }

        debug!(
            "Evaluation: faithful={:?} relevant={:?}",
            faithfulness.as_ref().map(|v| v.0),
            relevancy.as_ref().map(|v| v.0)
        );

        report.evaluation = Some(Evaluation {
            faithfulness: faithfulness.as_ref().map(|(passing, _)| *passing),
            relevancy: relevancy.map(|(passing, _)| passing),
            feedback: faithfulness.map(|(_, feedback)| feedback).unwrap_or_default(),
        });
        report
    }

    async fn verdict(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let judge = &self.judge;
        call_with_retry(self.policy, "evaluate", || async move {
            judge.generate(request).await
        })
        .await
    }
}

impl EvaluationReport {
    fn record(
        &mut self,
        judgment: Judgment,
        reply: Result<String, ServiceError>,
    ) -> Option<(bool, String)> {
        match reply {
            Ok(reply) => Some(parse_verdict(&reply)),
            Err(e) => {
                warn!("{} judgment failed: {}", judgment, e);
                self.degradations
                    .push(Degradation::EvaluationFailed(format!("{}: {}", judgment, e)));
                None
            }
        }
    }
}
