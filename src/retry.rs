//! Retry wrapper for transient acquisition failures.
//!
//! A quote acquisition can fail for reasons that clear up on their own (a feed
//! hiccup, a poll that ran out before data arrived) and for reasons that never
//! will (a symbol the venue rejects, another session holding the data lines).
//! The wrapper re-runs the operation after a fixed backoff for the former and
//! returns immediately for the latter.

use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::Error;

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// True for errors that retrying cannot fix.
///
/// An unqualified instrument means a bad symbol/venue pair, a competing
/// session means an external actor holds the data lines, and a failed or
/// shut down connection takes every later check with it.
pub fn is_fatal(error: &Error) -> bool {
    matches!(
        error,
        Error::ConnectionFailed | Error::Shutdown | Error::UnqualifiedInstrument(_) | Error::CompetingSession(_)
    )
}

/// Run `operation` up to `max_attempts` times, sleeping `backoff` before each
/// re-attempt. Fatal errors return immediately; when every attempt fails the
/// last transient error is returned.
pub fn retry<T, F>(max_attempts: u32, backoff: Duration, mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Result<T, Error>,
{
    let mut last_error = Error::DataUnavailable("no attempts were made".into());

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            info!("retrying, attempt {attempt} of {max_attempts}");
            thread::sleep(backoff);
        }

        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if is_fatal(&err) => return Err(err),
            Err(err) => {
                warn!("attempt {attempt} of {max_attempts} failed: {err}");
                last_error = err;
            }
        }
    }

    Err(last_error)
}
