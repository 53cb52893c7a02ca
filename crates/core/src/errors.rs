use thiserror::Error;

/// Failures of the conversation context backing store. Never surfaced to callers:
/// the fallback store absorbs them.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ContextStoreError {
    #[error("context store unavailable: {0}")]
    Unavailable(String),
    #[error("context payload could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("inventory source timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("inventory source failed: {0}")]
    Source(String),
    #[error("inventory source returned no projects")]
    Empty,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("collaborator output rejected: {0}")]
    InvalidOutput(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("conversation_id is required")]
    MissingConversationId,
    #[error("conversation_id exceeds {max} characters")]
    ConversationIdTooLong { max: usize },
    #[error("query text is {actual} characters, limit is {max}")]
    QueryTooLong { max: usize, actual: usize },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl RequestError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::BadRequest { message: self.to_string(), correlation_id: correlation_id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{InterfaceError, RequestError};

    #[test]
    fn request_errors_map_to_bad_request_with_correlation_id() {
        let mapped = RequestError::MissingConversationId.into_interface("req-42");

        assert_eq!(
            mapped,
            InterfaceError::BadRequest {
                message: "conversation_id is required".to_owned(),
                correlation_id: "req-42".to_owned(),
            }
        );
        assert_eq!(mapped.correlation_id(), "req-42");
        assert_eq!(
            mapped.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn oversized_query_message_names_both_limits() {
        let message = RequestError::QueryTooLong { max: 2_000, actual: 2_417 }.to_string();
        assert!(message.contains("2417"));
        assert!(message.contains("2000"));
    }
}
