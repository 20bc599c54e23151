use crate::error::{ExtractionError, Result};
use crate::llm::types::*;
use std::future::Future;

/// Text completion backend used for model-assisted extraction.
///
/// Implementations own their timeout and retry policy. Any failure is
/// reported as an error and the pipeline carries on without model data.
pub trait CompletionModel: Send + Sync {
    fn complete(&self, request: &CompletionRequest)
        -> impl Future<Output = Result<String>> + Send;
}

/// Backend for purely deterministic runs. Every request fails with
/// [`ExtractionError::ModelUnavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModel;

impl CompletionModel for NoModel {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(ExtractionError::ModelUnavailable(
            "no completion model configured".to_string(),
        ))
    }
}

#[cfg(feature = "ollama")]
pub use ollama::OllamaClient;

#[cfg(feature = "ollama")]
mod ollama {
    use super::CompletionModel;
    use crate::error::{ExtractionError, Result};
    use crate::llm::types::*;
    use log::{debug, warn};
    use reqwest::Client;
    use std::time::Duration;

    const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
    const DEFAULT_TIMEOUT_SECS: u64 = 60;
    const MAX_ATTEMPTS: usize = 2;

    #[derive(Clone)]
    pub struct OllamaClient {
        client: Client,
        base_url: String,
        timeout: Duration,
    }

    impl OllamaClient {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                client: Client::new(),
                base_url: base_url.into(),
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            }
        }

        /// Reads `OLLAMA_HOST` and `OLLAMA_TIMEOUT_SECS`, falling back to a local
        /// server and a 60 second timeout.
        pub fn from_env() -> Result<Self> {
            let host =
                std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
            let mut client = Self::new(host);

            if let Ok(raw) = std::env::var("OLLAMA_TIMEOUT_SECS") {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ExtractionError::InvalidConfig(format!(
                        "OLLAMA_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        raw
                    ))
                })?;
                client = client.with_timeout(Duration::from_secs(secs));
            }

            Ok(client)
        }

        #[must_use]
        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        async fn generate(&self, request: &CompletionRequest) -> Result<String> {
            let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
            let payload = GenerateRequest {
                model: &request.model,
                prompt: &request.prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: request.sampling.temperature,
                    num_predict: request.sampling.max_tokens,
                },
            };

            let res = self.client.post(&url).json(&payload).send().await?;
            let status = res.status();

            if !status.is_success() {
                let err_text = res.text().await?;
                return Err(ExtractionError::ModelUnavailable(format!(
                    "Ollama API Error (status {}): {}",
                    status, err_text
                )));
            }

            let body: GenerateResponse = res.json().await?;
            if !body.done {
                debug!("Ollama returned a partial response");
            }
            Ok(body.response)
        }
    }

    impl CompletionModel for OllamaClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            let mut last_error = String::new();

            for attempt in 1..=MAX_ATTEMPTS {
                match tokio::time::timeout(self.timeout, self.generate(request)).await {
                    Ok(Ok(text)) => return Ok(text),
                    Ok(Err(e)) => last_error = e.to_string(),
                    Err(_) => {
                        last_error = format!("request timed out after {:?}", self.timeout)
                    }
                }
                warn!(
                    "Ollama attempt {}/{} failed: {}",
                    attempt, MAX_ATTEMPTS, last_error
                );
            }

            Err(ExtractionError::ModelUnavailable(last_error))
        }
    }
}
