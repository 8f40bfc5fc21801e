use thiserror::Error;

/// A show script that could not be loaded. The whole cue list is discarded when this occurs.
#[derive(Debug, Error)]
pub enum ShowError {
    #[error("{message}, show file line {line}")]
    Parse { line: usize, message: String },

    #[error("Failed to read show file: {0}")]
    Io(#[from] std::io::Error),
}

impl ShowError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        ShowError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Line the error was found on, if it came from the parser.
    pub fn line(&self) -> Option<usize> {
        match self {
            ShowError::Parse { line, .. } => Some(*line),
            ShowError::Io(_) => None,
        }
    }
}

/// Reasons a cue trigger is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CueError {
    #[error("A cue is already executing")]
    Busy,

    #[error("No cue to execute")]
    NoCue,

    #[error("Console is not running")]
    NotRunning,
}

#[derive(Debug, Error)]
pub enum ArtNetError {
    #[error("Art-Net socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Art-Net encoding failed: {0}")]
    Encode(String),
}
