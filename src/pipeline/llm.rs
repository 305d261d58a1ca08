//! Chat-model interaction: page transcription and grounded answers.
//!
//! Every call goes through [`call_with_retry`], which bounds each attempt with
//! a timeout, retries transient failures and refuses empty output. Prompt
//! wording lives in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! Local model servers stall while loading weights and hosted APIs answer
//! 429/503 under load. Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`)
//! with 500 ms base and 3 retries waits 500 ms → 1 s → 2 s.

use crate::error::ModelCallError;
use crate::pipeline::encode::encode_page;
use crate::pipeline::render::RenderedPage;
use crate::prompts::TRANSCRIPTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Timeout and retry settings applied to each model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Upper bound on a single attempt.
    pub timeout: Duration,
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each one.
    pub retry_backoff_ms: u64,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

/// Output of a model call that can be checked for emptiness.
pub trait ModelOutput {
    fn is_blank(&self) -> bool;
}

impl ModelOutput for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl ModelOutput for Vec<f32> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

/// Run `call` under `policy` until it yields a non-blank output.
///
/// `call` returns the raw output or the provider's error message. Blank
/// outputs count as failed attempts; when every attempt fails the error of
/// the last one is returned.
pub async fn call_with_retry<T, F, Fut>(
    policy: &CallPolicy,
    label: &str,
    mut call: F,
) -> Result<T, ModelCallError>
where
    T: ModelOutput,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_err = ModelCallError::EmptyResponse;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, policy.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        last_err = match timeout(policy.timeout, call()).await {
            Ok(Ok(out)) if !out.is_blank() => return Ok(out),
            Ok(Ok(_)) => {
                warn!("{}: attempt {} returned an empty response", label, attempt + 1);
                ModelCallError::EmptyResponse
            }
            Ok(Err(detail)) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, detail);
                ModelCallError::Failed {
                    attempts: attempt + 1,
                    detail,
                }
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {:?}",
                    label,
                    attempt + 1,
                    policy.timeout
                );
                ModelCallError::Timeout {
                    secs: policy.timeout.as_secs(),
                }
            }
        };
    }

    Err(last_err)
}

/// Build `CompletionOptions` for a chat call.
pub fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// Page image → transcribed text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, page: &RenderedPage) -> Result<String, ModelCallError>;
}

/// (system instruction, user message) → answer text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, ModelCallError>;
}

/// Transcribes pages with a vision-capable chat model.
///
/// The request is a single user turn carrying the instruction text and the
/// page PNG; no system turn is sent.
pub struct VisionTranscriber {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
    policy: CallPolicy,
}

impl VisionTranscriber {
    pub fn new(provider: Arc<dyn LLMProvider>, policy: CallPolicy) -> Self {
        Self {
            provider,
            prompt: TRANSCRIPTION_PROMPT.to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            policy,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Transcriber for VisionTranscriber {
    async fn transcribe(&self, page: &RenderedPage) -> Result<String, ModelCallError> {
        let image = encode_page(&page.image)
            .map_err(|e| ModelCallError::ImageEncoding(e.to_string()))?;

        let messages = vec![ChatMessage::user_with_images(&self.prompt, vec![image])];
        let options = build_options(self.temperature, self.max_tokens);
        let label = format!("Page {}", page.page_index);

        let provider = &self.provider;
        let messages = &messages;
        let options = &options;
        let start = Instant::now();

        let text = call_with_retry(&self.policy, &label, || async move {
            provider
                .chat(messages, Some(options))
                .await
                .map(|response| {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens",
                        page.page_index, response.prompt_tokens, response.completion_tokens
                    );
                    response.content
                })
                .map_err(|e| e.to_string())
        })
        .await?;

        debug!(
            "Page {}: transcribed {} chars in {:?}",
            page.page_index,
            text.len(),
            start.elapsed()
        );
        Ok(text)
    }
}

/// Answers questions with a text chat model.
pub struct ChatGenerator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    policy: CallPolicy,
}

impl ChatGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, policy: CallPolicy) -> Self {
        Self {
            provider,
            temperature: 0.1,
            max_tokens: 4096,
            policy,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String, ModelCallError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = build_options(self.temperature, self.max_tokens);

        let provider = &self.provider;
        let messages = &messages;
        let options = &options;

        call_with_retry(&self.policy, "Answer", || async move {
            provider
                .chat(messages, Some(options))
                .await
                .map(|response| {
                    debug!(
                        "Answer: {} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    response.content
                })
                .map_err(|e| e.to_string())
        })
        .await
    }
}
