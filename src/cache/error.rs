use thiserror::Error;

/// Errors raised while building a cache configuration or resolving an entry location.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid cache levels `{levels}`: {reason}")]
    InvalidConfiguration { levels: String, reason: String },
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl CacheError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn invalid_levels(levels: &[String], reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            levels: levels.join(":"),
            reason: reason.into(),
        }
    }
}
