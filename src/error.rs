/// Reasons a single upstream record could not be turned into a domain value.
///
/// Decode errors are never fatal: the offending record is skipped and the
/// rest of the batch is processed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Decode: position is missing deviceId")]
    MissingDeviceId,

    #[error("Decode: invalid position timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Decode: position is missing coordinates")]
    MissingCoordinates,

    #[error("Decode: device is missing id")]
    MissingId,

    #[error("Decode: malformed record: {0}")]
    Malformed(String),
}

/// Errors raised by position feed sources and the upstream API client.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// An HTTP request to the tracking platform failed.
    #[error("Feed: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The tracking platform returned a non-success response.
    #[error("Feed: API error: status={status}, body={body}")]
    Api { status: u16, body: String },

    #[error("Feed: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feed: Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The source is not connected or has been disposed.
    #[error("Feed: source disconnected")]
    Disconnected,

    #[error("Feed: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
