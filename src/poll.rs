//! Bounded fixed-interval polling against a pumped quote feed.
//!
//! Quote fields arrive asynchronously, so waiting for them means alternating
//! two steps: pump the feed (let inbound ticks land in the snapshot) and check
//! whether the caller's readiness predicate holds yet. The pump always runs
//! before the check, so a tick that arrived during the wait is visible to the
//! check of the same iteration. Running out of attempts is an outcome, not an
//! error: the caller decides whether to retry, fall back or report.

use std::time::Duration;

use log::debug;

use crate::Error;

/// What a polling run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Whether the readiness predicate became true.
    pub ready: bool,
    /// Number of pump-and-check iterations that ran.
    pub attempts: u32,
}

/// Pump the feed and re-check `is_ready` until it holds or `max_attempts`
/// iterations have run, waiting `interval` per iteration.
///
/// `pump` must give the underlying connection a chance to apply inbound
/// messages for the given duration; an error from it aborts the poll.
pub fn poll_until<P, R>(mut pump: P, mut is_ready: R, max_attempts: u32, interval: Duration) -> Result<PollOutcome, Error>
where
    P: FnMut(Duration) -> Result<(), Error>,
    R: FnMut() -> bool,
{
    for attempt in 1..=max_attempts {
        pump(interval)?;

        if is_ready() {
            debug!("ready after {attempt} of {max_attempts} polls");
            return Ok(PollOutcome {
                ready: true,
                attempts: attempt,
            });
        }

        debug!("not ready, poll {attempt} of {max_attempts}");
    }

    Ok(PollOutcome {
        ready: false,
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::QuoteSnapshot;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_poll_until_stops_after_max_attempts() {
        let pumps = Cell::new(0);
        let checks = Cell::new(0);

        let outcome = poll_until(
            |_| {
                pumps.set(pumps.get() + 1);
                Ok(())
            },
            || {
                checks.set(checks.get() + 1);
                false
            },
            5,
            Duration::ZERO,
        )
        .expect("poll should not fail");

        assert_eq!(outcome.ready, false, "outcome.ready");
        assert_eq!(outcome.attempts, 5, "outcome.attempts");
        assert_eq!(pumps.get(), 5, "pump count");
        assert_eq!(checks.get(), 5, "check count");
    }

    #[test]
    fn test_poll_until_returns_on_first_ready_check() {
        // fields stay empty for 3 polls, then a bid lands on the 4th pump
        let snapshot = RefCell::new(QuoteSnapshot::default());
        let pumps = Cell::new(0);

        let outcome = poll_until(
            |_| {
                pumps.set(pumps.get() + 1);
                if pumps.get() == 4 {
                    snapshot.borrow_mut().bid = 1.05;
                }
                Ok(())
            },
            || snapshot.borrow().has_any_price(),
            15,
            Duration::ZERO,
        )
        .expect("poll should not fail");

        assert_eq!(outcome.ready, true, "outcome.ready");
        assert_eq!(outcome.attempts, 4, "outcome.attempts");
        assert_eq!(pumps.get(), 4, "remaining polls should not run");
    }

    #[test]
    fn test_poll_until_pumps_before_checking() {
        let events = RefCell::new(Vec::new());

        poll_until(
            |_| {
                events.borrow_mut().push("pump");
                Ok(())
            },
            || {
                events.borrow_mut().push("check");
                false
            },
            2,
            Duration::ZERO,
        )
        .expect("poll should not fail");

        assert_eq!(*events.borrow(), vec!["pump", "check", "pump", "check"]);
    }

    #[test]
    fn test_poll_until_propagates_pump_errors() {
        let result = poll_until(
            |_| Err(Error::Shutdown),
            || true,
            5,
            Duration::ZERO,
        );

        assert!(matches!(result, Err(Error::Shutdown)));
    }

    #[test]
    fn test_poll_until_with_zero_attempts() {
        let pumps = Cell::new(0);

        let outcome = poll_until(
            |_| {
                pumps.set(pumps.get() + 1);
                Ok(())
            },
            || true,
            0,
            Duration::ZERO,
        )
        .expect("poll should not fail");

        assert_eq!(outcome.ready, false, "outcome.ready");
        assert_eq!(outcome.attempts, 0, "outcome.attempts");
        assert_eq!(pumps.get(), 0, "pump should not run");
    }
}
