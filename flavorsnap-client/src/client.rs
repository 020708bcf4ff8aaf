//! Resilient classification client
//!
//! Endpoints are tried strictly in order. Each endpoint gets its own retry
//! loop for transport failures; an application failure (error status,
//! unparseable body) moves straight on to the next endpoint. The first
//! endpoint whose payload normalizes to a non-empty prediction list wins.
//!
//! Every network call and retry sleep is raced against the caller's
//! [`CancellationToken`] and the policy's overall deadline.

use std::future::Future;
use std::time::Duration;

use flavorsnap_common::config::FlavorSnapConfig;
use flavorsnap_common::{normalize, Fields, Logger, PredictionResult, UploadFile, UploadValidator};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::attempt::RequestAttempt;
use crate::error::{AttemptError, ClassifyError};
use crate::retry::RetryPolicy;

const USER_AGENT: &str = concat!("flavorsnap-client/", env!("CARGO_PKG_VERSION"));

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// HTTP client with validation, per-endpoint retries and fallback
#[derive(Debug, Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    validator: UploadValidator,
    policy: RetryPolicy,
    logger: Logger,
}

impl ResilientClient {
    pub fn new(
        logger: Logger,
        validator: UploadValidator,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, ClassifyError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClassifyError::Client(e.to_string()))?;

        Ok(Self {
            http,
            validator,
            policy,
            logger,
        })
    }

    pub fn from_config(config: &FlavorSnapConfig, logger: Logger) -> Result<Self, ClassifyError> {
        Self::new(
            logger,
            UploadValidator::from_config(&config.upload),
            RetryPolicy::from_config(&config.client),
            Duration::from_millis(config.client.request_timeout_ms),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    /// Validate `file`, then send it to `endpoints` until one yields predictions
    pub async fn classify(
        &self,
        file: Option<&UploadFile>,
        endpoints: &[String],
        cancel: &CancellationToken,
    ) -> Result<PredictionResult, ClassifyError> {
        let file = self.validator.validate(file).map_err(|err| {
            let mut fields = Fields::new();
            fields.insert("reason".into(), json!(err.to_string()));
            self.logger.warning("Upload rejected before classification", fields);
            err
        })?;

        if endpoints.is_empty() {
            return Err(ClassifyError::NoEndpoints);
        }

        let guard = CancelGuard {
            token: cancel,
            deadline: self.policy.overall_timeout.map(|t| Instant::now() + t),
        };

        let mut last_error: Option<AttemptError> = None;

        for endpoint in endpoints {
            match self.try_endpoint(file, endpoint, &guard).await? {
                Ok(payload) => {
                    let result = normalize(&payload);
                    if !result.is_empty() {
                        let mut fields = Fields::new();
                        fields.insert("endpoint".into(), json!(endpoint));
                        fields.insert("predictions".into(), json!(result.len()));
                        self.logger.info("Classification succeeded", fields);
                        return Ok(result);
                    }

                    let mut fields = Fields::new();
                    fields.insert("endpoint".into(), json!(endpoint));
                    self.logger.warning("Endpoint returned no usable prediction", fields);
                }
                Err(err) => {
                    tracing::debug!(endpoint = %endpoint, error = %err, "Falling back to next endpoint");
                    last_error = Some(err);
                }
            }
        }

        let err = match last_error {
            Some(last_error) => ClassifyError::Exhausted { last_error },
            None => ClassifyError::NoPrediction,
        };
        self.logger.error(
            format!("Classification failed: {}", err),
            Fields::new(),
        );
        Err(err)
    }

    /// Retry loop for one endpoint; the inner result is the final outcome
    async fn try_endpoint(
        &self,
        file: &UploadFile,
        endpoint: &str,
        guard: &CancelGuard<'_>,
    ) -> Result<Result<Value, AttemptError>, ClassifyError> {
        let attempts = self.policy.attempts_per_endpoint();
        let mut index = 0;

        loop {
            let started = Instant::now();
            let outcome = guard.run(self.send_once(file, endpoint)).await?;
            let attempt = RequestAttempt {
                endpoint: endpoint.to_string(),
                index,
                elapsed: started.elapsed(),
                outcome,
            };
            attempt.log(&self.logger);

            if !attempt.should_retry(attempts) {
                return Ok(attempt.outcome);
            }

            guard.run(tokio::time::sleep(self.policy.retry_delay)).await?;
            index += 1;
        }
    }

    async fn send_once(&self, file: &UploadFile, endpoint: &str) -> Result<Value, AttemptError> {
        let part = Part::bytes(file.data.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| application(endpoint, None, format!("Invalid content type: {}", e)))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .http
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    application(endpoint, None, format!("Invalid request: {}", e))
                } else {
                    transport(endpoint, &e)
                }
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| transport(endpoint, &e))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
            return Err(application(endpoint, Some(status.as_u16()), message));
        }

        serde_json::from_slice(&body).map_err(|e| {
            application(
                endpoint,
                Some(status.as_u16()),
                format!("Invalid JSON response: {}", e),
            )
        })
    }
}

/// Races futures against the cancel token and the overall deadline
struct CancelGuard<'a> {
    token: &'a CancellationToken,
    deadline: Option<Instant>,
}

impl CancelGuard<'_> {
    async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ClassifyError> {
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ClassifyError::Cancelled),
            _ = expired => {
                tracing::debug!("Overall classification deadline reached");
                Err(ClassifyError::Cancelled)
            }
            output = fut => Ok(output),
        }
    }
}

/// `{"error": "..."}` body text, when present
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn transport(endpoint: &str, err: &reqwest::Error) -> AttemptError {
    let message = if err.is_timeout() {
        format!("Request timed out: {}", err)
    } else {
        format!("Network error: {}", err)
    };
    AttemptError::Transport {
        endpoint: endpoint.to_string(),
        message,
    }
}

fn application(endpoint: &str, status: Option<u16>, message: String) -> AttemptError {
    AttemptError::Application {
        endpoint: endpoint.to_string(),
        status,
        message,
    }
}
