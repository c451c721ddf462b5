use http::StatusCode;
use typeknit::BoxError;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The server answered with a non-success status. `message` is the response body.
    #[error("{status}: {message}")]
    Rpc { status: StatusCode, message: String },
    #[error("transport: {0}")]
    Transport(BoxError),
    #[error("error encoding argument: {0}")]
    Encode(serde_json::Error),
    #[error("error decoding response: {0}")]
    Decode(serde_json::Error),
    #[error("stream reader was already started")]
    AlreadyStarted,
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
}

impl Error {
    /// The status of the response, if the request got one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Rpc { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<typeknit::BodyError> for Error {
    fn from(err: typeknit::BodyError) -> Self {
        Error::Transport(Box::new(err))
    }
}
