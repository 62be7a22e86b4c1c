/// Error kinds for grouping and sorting
///
/// None of these are fatal: event handlers and spawned sort tasks log them
/// and carry on. Only the message entry points report them back to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: i32 },

    #[error("browser API call failed: {0}")]
    Host(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("group {group_id} did not settle after {attempts} sort attempts")]
    ExhaustedRetry { group_id: i32, attempts: u32 },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedInput(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::MalformedInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
