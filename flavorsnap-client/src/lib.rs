//! flavorsnap-client library interface
//!
//! Sends an image to a prioritized list of classification endpoints with
//! per-endpoint retries and returns the first usable prediction list.

pub mod attempt;
pub mod client;
pub mod detect;
pub mod error;
pub mod retry;

pub use attempt::RequestAttempt;
pub use client::ResilientClient;
pub use error::{AttemptError, ClassifyError};
pub use retry::RetryPolicy;
