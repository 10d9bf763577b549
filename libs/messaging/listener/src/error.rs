use codec::ProtocolError;
use mqlink_config::ConfigError;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use types::constants::MQRC_NO_MSG_AVAILABLE;

/// Original fault carried by a wrapped handler failure
pub type HandlerCause = Arc<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Invalid service: {0}")]
    InvalidService(String),

    #[error("Invalid consumer configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport {operation} failed: {message}{suffix}", suffix = reason_suffix(reason_code))]
    Transport {
        operation: &'static str,
        message: String,
        reason_code: Option<i32>,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] ProtocolError),

    #[error("{message}: {cause}")]
    HandlerFailed {
        message: &'static str,
        #[source]
        cause: HandlerCause,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Consumer {consumer:?} did not stop within {timeout:?}")]
    ShutdownTimeout { consumer: String, timeout: Duration },
}

fn reason_suffix(reason_code: &Option<i32>) -> String {
    reason_code
        .map(|code| format!(" (reason {code})"))
        .unwrap_or_default()
}

impl ListenerError {
    /// Create a transport error
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        ListenerError::Transport {
            operation,
            message: message.into(),
            reason_code: None,
        }
    }

    /// Create a transport error carrying a middleware reason code
    pub fn reason(operation: &'static str, reason_code: i32, message: impl Into<String>) -> Self {
        ListenerError::Transport {
            operation,
            message: message.into(),
            reason_code: Some(reason_code),
        }
    }

    pub fn invalid_service(msg: impl Into<String>) -> Self {
        ListenerError::InvalidService(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ListenerError::InvalidState(msg.into())
    }

    /// Wrap a message handler fault
    pub fn handler_failed(cause: anyhow::Error) -> Self {
        Self::wrap("failed to process message", cause)
    }

    /// Wrap a fault raised by the error handler itself
    pub fn error_handler_failed(cause: anyhow::Error) -> Self {
        Self::wrap("error handler failed", cause)
    }

    fn wrap(message: &'static str, cause: anyhow::Error) -> Self {
        let boxed: Box<dyn StdError + Send + Sync + 'static> = cause.into();
        ListenerError::HandlerFailed {
            message,
            cause: Arc::from(boxed),
        }
    }

    /// The original fault behind a handler failure
    pub fn cause(&self) -> Option<&HandlerCause> {
        match self {
            ListenerError::HandlerFailed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Middleware reason code, if the transport reported one
    pub fn reason_code(&self) -> Option<i32> {
        match self {
            ListenerError::Transport { reason_code, .. } => *reason_code,
            _ => None,
        }
    }

    /// A get that found nothing to return; normal control flow, not a failure
    pub fn is_no_message_available(&self) -> bool {
        self.reason_code() == Some(MQRC_NO_MSG_AVAILABLE)
    }

    /// Raised synchronously at attach or construction time
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ListenerError::InvalidService(_) | ListenerError::Config(_)
        )
    }
}

pub type ListenerResult<T> = std::result::Result<T, ListenerError>;
