//! Unified error handling for the interval-detector library.
//!
//! Detection itself never fails on bad data: data-quality problems are turned
//! into an empty interval list by the engine. Errors reach the caller only for
//! invalid configuration, summarizer bounds violations and collaborator I/O.

use thiserror::Error;

/// Unified error type for interval-detector operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntervalError {
    /// Series is empty, entirely missing, or has no usable variation
    #[error("Data quality: {message}")]
    DataQuality { message: String },
    /// Configuration is invalid or inconsistent
    #[error("Configuration error: {message}")]
    Config { message: String },
    /// An interval index falls outside one of the aligned series
    #[error("Index {index} out of bounds for {series} series of length {len}")]
    OutOfBounds {
        series: &'static str,
        index: usize,
        len: usize,
    },
    /// HTTP/API error from an activity source
    #[error("HTTP error{}: {message}", format_status(.status_code))]
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// Activity file could not be decoded into telemetry
    #[error("Decode error: {message}")]
    Decode { message: String },
}

impl IntervalError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        IntervalError::Config {
            message: message.into(),
        }
    }

    pub(crate) fn data_quality(message: impl Into<String>) -> Self {
        IntervalError::DataQuality {
            message: message.into(),
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        IntervalError::Decode {
            message: message.into(),
        }
    }
}

fn format_status(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" ({})", code))
        .unwrap_or_default()
}

/// Result type alias for interval-detector operations.
pub type Result<T> = std::result::Result<T, IntervalError>;

/// Extension trait for converting Option to IntervalError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a data-quality error.
    fn ok_or_data_quality(self, message: &str) -> Result<T>;

    /// Convert Option to Result with a decode error.
    fn ok_or_decode(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_data_quality(self, message: &str) -> Result<T> {
        self.ok_or_else(|| IntervalError::data_quality(message))
    }

    fn ok_or_decode(self, message: &str) -> Result<T> {
        self.ok_or_else(|| IntervalError::decode(message))
    }
}
