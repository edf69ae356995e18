use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid timeout for {name}: {message}")]
    InvalidTimeout { name: &'static str, message: String },

    #[error("Empty phrase table: {0}")]
    EmptyPhraseTable(&'static str),

    #[error("Empty selector list: {0}")]
    EmptySelectorList(&'static str),
}

