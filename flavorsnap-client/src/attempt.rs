//! One outbound classification request

use std::time::Duration;

use flavorsnap_common::logging::logger::duration_ms;
use flavorsnap_common::{Fields, Logger};
use serde_json::{json, Value};

use crate::error::AttemptError;

/// A single request to one endpoint; logged, never persisted
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub endpoint: String,
    /// 0-based index within the endpoint's retry loop
    pub index: u32,
    pub elapsed: Duration,
    pub outcome: Result<Value, AttemptError>,
}

impl RequestAttempt {
    /// Transport failure with attempts left on this endpoint
    pub fn should_retry(&self, attempts_per_endpoint: u32) -> bool {
        match &self.outcome {
            Err(err) => err.is_transport() && self.index + 1 < attempts_per_endpoint,
            Ok(_) => false,
        }
    }

    /// DEBUG on success, WARNING on failure
    pub fn log(&self, logger: &Logger) {
        let mut fields = Fields::new();
        fields.insert("endpoint".into(), json!(self.endpoint));
        fields.insert("attempt".into(), json!(self.index));
        fields.insert("elapsed_ms".into(), json!(duration_ms(self.elapsed)));

        match &self.outcome {
            Ok(_) => {
                fields.insert("outcome".into(), json!("success"));
                logger.debug(
                    format!("Classification attempt {} to {} succeeded", self.index, self.endpoint),
                    fields,
                );
            }
            Err(err) => {
                fields.insert("outcome".into(), json!(err.kind()));
                fields.insert("error".into(), json!(err.to_string()));
                if let Some(status) = err.status() {
                    fields.insert("status_code".into(), json!(status));
                }
                logger.warning(
                    format!("Classification attempt {} to {} failed", self.index, self.endpoint),
                    fields,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flavorsnap_common::logging::MemorySink;
    use flavorsnap_common::LogLevel;
    use std::sync::Arc;

    fn transport(index: u32) -> RequestAttempt {
        RequestAttempt {
            endpoint: "http://127.0.0.1:9/predict".into(),
            index,
            elapsed: Duration::from_millis(3),
            outcome: Err(AttemptError::Transport {
                endpoint: "http://127.0.0.1:9/predict".into(),
                message: "connection refused".into(),
            }),
        }
    }

    #[test]
    fn test_retry_only_transport_with_budget() {
        assert!(transport(0).should_retry(2));
        assert!(!transport(1).should_retry(2));

        let application = RequestAttempt {
            outcome: Err(AttemptError::Application {
                endpoint: "x".into(),
                status: Some(500),
                message: "boom".into(),
            }),
            ..transport(0)
        };
        assert!(!application.should_retry(5));
    }

    #[test]
    fn test_log_levels() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new("flavorsnap-client", sink.clone());

        transport(1).log(&logger);
        RequestAttempt {
            outcome: Ok(json!({"label": "suya"})),
            ..transport(0)
        }
        .log(&logger);

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level(), LogLevel::Warning);
        assert_eq!(entries[0].field("outcome"), Some(&json!("transport")));
        assert_eq!(entries[0].field("attempt"), Some(&json!(1)));
        assert_eq!(entries[1].level(), LogLevel::Debug);
        assert_eq!(entries[1].field("outcome"), Some(&json!("success")));
    }
}
