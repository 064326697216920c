use thiserror::Error;

/// All errors generated while decoding or scanning instrument series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorRepr {
    #[error("insufficient history, need {need} bars, have {have}")]
    InsufficientHistory { need: usize, have: usize },
    #[error("malformed bar, {}", .0)]
    MalformedBar(String),
    #[error("invalid params: {}", .0)]
    InvalidParams(String),
    #[error("load failed, {}", .0)]
    Load(String),
}

impl From<csv::Error> for ErrorRepr {
    fn from(err: csv::Error) -> Self {
        ErrorRepr::Load(err.to_string())
    }
}
