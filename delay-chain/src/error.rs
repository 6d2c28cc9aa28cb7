use crate::abi::AbiError;

/// Failure of a whole batch. Per-call failures are reported as
/// `ReadOutcome::Failed` inside a successful batch instead.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed rpc response: {0}")]
    Malformed(String),
}

/// The protocol configuration could not be assembled this cycle.
#[derive(Debug, thiserror::Error)]
pub enum ConfigUnavailable {
    #[error("configuration batch failed: {0}")]
    Batch(#[from] ChainError),
    #[error("{field} read failed: {reason}")]
    Read { field: &'static str, reason: String },
    #[error("{field} could not be decoded: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: AbiError,
    },
}
