use derive_more::with_trait::{Display, Error};

/// Every failure a console operation can surface.
///
/// None of these are fatal: callers report them through the
/// notification center and fall back to their last good state.
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum ConsoleError {
    /// The backend answered 401. The client has already been sent to the
    /// login page; this is never retried.
    #[display("unauthorized")]
    Unauthorized,
    /// The request never produced an HTTP response, even after retries.
    #[display("network failure: {message}")]
    NetworkFailure { message: String },
    /// Local input check that failed before anything reached the network.
    #[display("validation failure: {message}")]
    ValidationFailure { message: String },
    /// HTTP error status with an optional `detail` from the response body.
    #[display("backend rejected request with status {status}")]
    BackendRejection { status: u16, detail: Option<String> },
    /// The response body was not the JSON shape we expected.
    #[display("malformed response: {message}")]
    Decode { message: String },
}

impl ConsoleError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Text for a notification: the backend's own detail when it sent one,
    /// the validation message for local failures, otherwise `generic`.
    pub fn user_message(&self, generic: &str) -> String {
        match self {
            Self::BackendRejection {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.clone(),
            Self::ValidationFailure { message } => message.clone(),
            _ => generic.to_string(),
        }
    }
}
