use std::borrow::Cow;

/// Errors from reading run-time configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{variable}: expected a positive integer but found {value:?}")]
    NotANumber {
        variable: &'static str,
        value: Cow<'static, str>,
    },

    #[error("{variable}: must not be zero")]
    Zero { variable: &'static str },
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
