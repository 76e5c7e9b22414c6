//! Interview Feedback Service
//!
//! Scores a finished mock-interview transcript. The scoring rubric lives in
//! the prompt template; this module only owns the call contract: build the
//! prompt, send it through the completion client, decode the structured
//! verdict.

use crate::llm_client::{CompletionClient, CompletionError, CompletionOptions};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// One line of an interview transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptEntry {
    /// Who spoke, e.g. "interviewer" or "candidate".
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub name: String,
    pub score: u8,
    pub comment: String,
}

/// Structured verdict on a mock interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub total_score: u8,
    pub category_scores: Vec<CategoryScore>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub final_assessment: String,
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("transcript is empty")]
    EmptyTranscript,
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("scoring is temporarily unavailable")]
    Unavailable,
    #[error("scoring output could not be decoded: {0}")]
    Malformed(String),
}

/// Defines the contract for any service that can grade an interview.
#[async_trait]
pub trait FeedbackService: Send + Sync {
    async fn generate_feedback(
        &self,
        transcript: &[TranscriptEntry],
    ) -> Result<Feedback, FeedbackError>;
}

/// Grades transcripts with the language model behind a [`CompletionClient`].
pub struct LlmFeedbackService {
    client: Arc<CompletionClient>,
    prompt_template: String,
}

impl LlmFeedbackService {
    /// `prompt_template` must contain a `{transcript}` placeholder.
    pub fn new(client: Arc<CompletionClient>, prompt_template: impl Into<String>) -> Self {
        Self {
            client,
            prompt_template: prompt_template.into(),
        }
    }
}

#[async_trait]
impl FeedbackService for LlmFeedbackService {
    async fn generate_feedback(
        &self,
        transcript: &[TranscriptEntry],
    ) -> Result<Feedback, FeedbackError> {
        if transcript.is_empty() {
            return Err(FeedbackError::EmptyTranscript);
        }
        let formatted: String = transcript
            .iter()
            .map(|line| format!("- {}: {}\n", line.role, line.content))
            .collect();
        let prompt = self.prompt_template.replace("{transcript}", &formatted);

        let options = CompletionOptions {
            max_tokens: 2048,
            temperature: 0.2,
        };
        let outcome = self.client.complete_prompt(&prompt, options).await?;
        if outcome.is_degraded() {
            return Err(FeedbackError::Unavailable);
        }

        let feedback = decode_feedback(&outcome.text)?;
        info!(
            served_by = outcome.served_by.as_str(),
            total_score = feedback.total_score,
            "Interview feedback generated"
        );
        Ok(feedback)
    }
}

/// Extracts the JSON verdict, tolerating a surrounding Markdown code fence.
fn decode_feedback(raw: &str) -> Result<Feedback, FeedbackError> {
    let trimmed = raw.trim();
    let body = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return Err(FeedbackError::Malformed("no JSON object in output".into())),
    };
    serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "Scoring output did not match the feedback shape");
        FeedbackError::Malformed(e.to_string())
    })
}

/// Deterministic grader for development and tests.
pub struct MockFeedbackService;

#[async_trait]
impl FeedbackService for MockFeedbackService {
    async fn generate_feedback(
        &self,
        transcript: &[TranscriptEntry],
    ) -> Result<Feedback, FeedbackError> {
        if transcript.is_empty() {
            return Err(FeedbackError::EmptyTranscript);
        }
        let categories = [
            "Communication Skills",
            "Technical Knowledge",
            "Problem-Solving",
            "Cultural & Role Fit",
            "Confidence & Clarity",
        ];
        Ok(Feedback {
            total_score: 70,
            category_scores: categories
                .iter()
                .map(|name| CategoryScore {
                    name: name.to_string(),
                    score: 70,
                    comment: "Solid, with room to go deeper.".to_string(),
                })
                .collect(),
            strengths: vec!["Clear structure".to_string()],
            areas_for_improvement: vec!["Give more concrete examples".to_string()],
            final_assessment: format!(
                "Reviewed {} transcript lines. A reasonable performance overall.",
                transcript.len()
            ),
        })
    }
}
