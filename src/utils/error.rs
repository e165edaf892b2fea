use crate::domain::model::EmailStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Validation failed: {}", .failures.join("; "))]
    ValidationError { failures: Vec<String> },

    #[error("Email delivery failed after {attempts} attempt(s): {reason}")]
    DeliveryError { attempts: u32, reason: String },

    #[error("Cannot access table '{table}': {message}")]
    StoreAccessError { table: String, message: String },

    #[error("Write to table '{table}' failed: {message}")]
    StoreWriteError { table: String, message: String },

    #[error("Record {record_id} is already {current}; it cannot be marked {next}")]
    StatusTransitionError {
        record_id: String,
        current: EmailStatus,
        next: EmailStatus,
    },
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// 可寫回資料表或顯示給使用者的錯誤訊息，去除換行並限制長度
    pub fn sanitized_message(&self, max_len: usize) -> String {
        truncate_message(&self.to_string(), max_len)
    }
}

pub fn truncate_message(message: &str, max_len: usize) -> String {
    let flattened = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_len {
        return flattened;
    }
    flattened.chars().take(max_len).collect()
}

pub type Result<T> = std::result::Result<T, PipelineError>;
