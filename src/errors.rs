use std::{num::ParseIntError, string::FromUtf8Error};

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    // Errors from external libraries
    Io(std::io::Error),
    ParseInt(ParseIntError),
    FromUtf8(FromUtf8Error),
    ParseTime(time::error::Parse),
    Poison(String),

    // Transport and protocol errors
    ConnectionFailed,
    Shutdown,
    Parse(usize, String, String),
    MalformedResponse(String),
    ServerVersion(i32, i32, String),
    Message(i32, String),
    Simple(String),

    // Diagnostic outcomes
    UnqualifiedInstrument(String),
    CompetingSession(String),
    DataUnavailable(String),
    NoChainForVenue(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(ref err) => err.fmt(f),
            Error::ParseInt(ref err) => err.fmt(f),
            Error::FromUtf8(ref err) => err.fmt(f),
            Error::ParseTime(ref err) => err.fmt(f),
            Error::Poison(ref err) => write!(f, "{}", err),

            Error::ConnectionFailed => write!(f, "connection to gateway failed"),
            Error::Shutdown => write!(f, "gateway is shutting down"),
            Error::Parse(i, value, message) => write!(f, "parse error: {i} - {value} - {message}"),
            Error::MalformedResponse(message) => write!(f, "malformed response: {message}"),
            Error::ServerVersion(wanted, have, message) => write!(f, "server version {wanted} required, got {have}: {message}"),
            Error::Message(code, message) => write!(f, "[{code}] {message}"),
            Error::Simple(ref err) => write!(f, "error occurred: {err}"),

            Error::UnqualifiedInstrument(detail) => write!(f, "instrument not recognized by gateway: {detail}"),
            Error::CompetingSession(detail) => write!(f, "competing session holds the market data connection: {detail}"),
            Error::DataUnavailable(detail) => write!(f, "no data after polling: {detail}"),
            Error::NoChainForVenue(venue) => write!(f, "no option chain listed on venue {venue}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ParseIntError> for Error {
    fn from(err: ParseIntError) -> Error {
        Error::ParseInt(err)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Error {
        Error::FromUtf8(err)
    }
}

impl From<time::error::Parse> for Error {
    fn from(err: time::error::Parse) -> Error {
        Error::ParseTime(err)
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Error {
        Error::Poison(format!("Mutex poison error: {}", err))
    }
}
