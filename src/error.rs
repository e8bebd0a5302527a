use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::result;

use bufstream::IntoInnerError as BufError;

/// A convenience wrapper around `Result` for `groupwire::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur while talking to the groupware server.
#[derive(Debug)]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    Io(IoError),
    /// A BAD completion from the server, meaning it could not parse our command.
    Bad(String),
    /// A NO completion from the server, meaning the operation was refused.
    No(String),
    /// The connection was terminated unexpectedly.
    ConnectionLost,
    /// Error parsing a server response.
    Parse(ParseError),
    /// Error validating input data.
    Validate(ValidateError),
    /// The caller supplied no valid targets for the operation, so nothing was
    /// ever written to the wire.
    InvalidTarget,
    /// A cascaded sub-operation failed and the owning job runs under the
    /// strict failure policy.
    SubOperation(String),
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Error::Io(err)
    }
}

impl<T> From<BufError<T>> for Error {
    fn from(err: BufError<T>) -> Error {
        Error::Io(err.into())
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => fmt::Display::fmt(e, f),
            Error::Bad(text) => write!(f, "Bad response: {}", text),
            Error::No(text) => write!(f, "No response: {}", text),
            Error::ConnectionLost => f.write_str("Connection lost"),
            Error::Parse(e) => fmt::Display::fmt(e, f),
            Error::Validate(e) => fmt::Display::fmt(e, f),
            Error::InvalidTarget => f.write_str("Invalid target"),
            Error::SubOperation(text) => write!(f, "Sub-operation failed: {}", text),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Parse(e) => Some(e),
            Error::Validate(e) => Some(e),
            _ => None,
        }
    }
}

/// An error occurred while parsing a server response line.
#[derive(Debug)]
pub enum ParseError {
    /// The line did not match the tagged/untagged response grammar.
    Invalid(String),
    /// A tagged completion carried a status other than OK/NO/BAD.
    Status(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Invalid(line) => write!(f, "Unable to parse response line: {:?}", line),
            ParseError::Status(s) => write!(f, "Unknown response status: {:?}", s),
        }
    }
}

impl StdError for ParseError {}

/// Invalid character found in a command argument. Expand as needed.
#[derive(Debug)]
pub struct ValidateError(pub char);

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // print character in debug form because invalid ones are often whitespaces
        write!(f, "Invalid character in input: {:?}", self.0)
    }
}

impl StdError for ValidateError {}
