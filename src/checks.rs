//! The individual gateway checks and the run driver.
//!
//! Each check is a self-contained conversation with the gateway: qualify an
//! instrument, subscribe, poll for data, tear the subscription down. Failures
//! are caught at the check boundary and recorded, so one failing check never
//! stops the rest of the run. The driver returns the reports in run order and
//! the summary decides the process exit code.

use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::contracts::{self, Contract, OptionChain, SecurityType};
use crate::market_data::{is_present, MarketDataType, QuoteSnapshot};
use crate::poll::{poll_until, PollOutcome};
use crate::retry;
use crate::session::Session;
use crate::Error;

const STOCK_POLL_ATTEMPTS: u32 = 15;
const OPTION_POLL_ATTEMPTS: u32 = 20;
const INDEX_POLL_ATTEMPTS: u32 = 15;
const UNDERLYING_POLL_ATTEMPTS: u32 = 10;

/// Venue option orders are routed through, and therefore the venue whose
/// chain the doctor inspects.
const ROUTING_VENUE: &str = "SMART";

const INDEX_SYMBOL: &str = "VIX";
const INDEX_EXCHANGE: &str = "CBOE";

/// Generic tick 101 requests open interest, 106 implied volatility.
const OPTION_GENERIC_TICKS: [&str; 2] = ["101", "106"];

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Passed,
    Failed,
}

/// One entry in the run's results, in run order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub name: String,
    pub status: CheckStatus,
    /// What the check saw: quote values on success, the error on failure.
    pub detail: String,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }
}

/// Knobs for a run. The durations exist so tests can run without real waits;
/// the defaults mirror how the doctor behaves from the command line.
#[derive(Debug, Clone)]
pub struct DoctorSettings {
    /// Stock symbol the quote and option checks exercise.
    pub symbol: String,
    /// Feed variant to request before the quote checks.
    pub market_data_type: MarketDataType,
    /// Run the option chain and option quote checks.
    pub test_options: bool,
    /// Run the index quote check.
    pub test_index: bool,
    /// Wait per poll iteration.
    pub poll_interval: Duration,
    /// Wait after switching the market data type.
    pub settle: Duration,
    /// Pump time right after connecting, before the first check.
    pub stabilization: Duration,
    /// Attempts per retry-wrapped acquisition.
    pub max_attempts: u32,
    /// Pause between those attempts.
    pub backoff: Duration,
}

impl Default for DoctorSettings {
    fn default() -> Self {
        DoctorSettings {
            symbol: "SPY".into(),
            market_data_type: MarketDataType::Live,
            test_options: false,
            test_index: false,
            poll_interval: Duration::from_secs(1),
            settle: Duration::from_secs(1),
            stabilization: Duration::from_secs(3),
            max_attempts: retry::DEFAULT_MAX_ATTEMPTS,
            backoff: retry::DEFAULT_BACKOFF,
        }
    }
}

/// Run the selected checks in order and collect their reports.
pub fn run(session: &Session, settings: &DoctorSettings) -> Vec<CheckReport> {
    let mut reports = Vec::new();

    let connection = check_connection(session, settings);
    // a competing session fails the check but the socket still carries
    // requests; only a dead connection ends the run here
    let connection_lost = matches!(connection, Err(ref err) if !matches!(err, Error::CompetingSession(_)));
    record(&mut reports, "connection", connection);
    if connection_lost {
        return reports;
    }

    record(&mut reports, "account", check_account(session));

    if let Err(err) = configure_market_data_type(session, settings) {
        warn!("could not set market data type: {err}");
    }

    record(&mut reports, "stock quote", check_stock_quote(session, settings));

    if settings.test_options {
        record(&mut reports, "option chain", check_option_chain(session, settings));
        record(&mut reports, "option quote", check_option_quote(session, settings));
    }

    if settings.test_index {
        record(&mut reports, "index quote", check_index_quote(session, settings));
    }

    reports
}

/// Log the pass/fail line for every report plus targeted advice for the
/// failures. Returns true when every check passed.
pub fn print_summary(reports: &[CheckReport], settings: &DoctorSettings) -> bool {
    info!("---- summary ----");

    let mut all_passed = true;
    for report in reports {
        match report.status {
            CheckStatus::Passed => info!("  {}: passed", report.name),
            CheckStatus::Failed => {
                info!("  {}: FAILED - {}", report.name, report.detail);
                all_passed = false;
            }
        }
    }

    if all_passed {
        info!("all checks passed");
    } else {
        advise(reports, settings);
    }

    all_passed
}

fn record(reports: &mut Vec<CheckReport>, name: &str, outcome: Result<String, Error>) {
    let report = match outcome {
        Ok(detail) => {
            info!("{name}: passed ({detail})");
            CheckReport {
                name: name.into(),
                status: CheckStatus::Passed,
                detail,
            }
        }
        Err(err) => {
            error!("{name}: failed ({err})");
            CheckReport {
                name: name.into(),
                status: CheckStatus::Failed,
                detail: err.to_string(),
            }
        }
    };
    reports.push(report);
}

fn advise(reports: &[CheckReport], settings: &DoctorSettings) {
    warn!("some checks failed; things to verify:");
    warn!("  - the gateway is running, logged in, and API connections are enabled");
    warn!("  - the account carries the market data subscriptions the failed checks need");
    warn!("  - the exchange is open; outside regular hours most live ticks stay empty");

    if reports.iter().any(|report| !report.passed() && report.detail.contains("competing session")) {
        warn!("  - another session holds the market data lines; close other TWS, web or mobile logins and rerun");
    }

    let quote_failed = reports.iter().any(|report| !report.passed() && report.name.ends_with("quote"));
    if quote_failed && settings.market_data_type == MarketDataType::Live {
        warn!("  - live data may not be available on this account; rerun with --market-data-type 3 for delayed data");
    }
}

// === Checks ===

fn check_connection(session: &Session, settings: &DoctorSettings) -> Result<String, Error> {
    // let the post-connect burst of farm notices drain; a competing session
    // error arriving here fails the run before any quote work starts
    session.pump(settings.stabilization)?;

    let connected_at = session
        .connection_time()
        .map(|time| time.to_string())
        .unwrap_or_else(|| "unknown".into());

    Ok(format!("server version {}, connected at {connected_at}", session.server_version()))
}

fn check_account(session: &Session) -> Result<String, Error> {
    let accounts = session.managed_accounts();

    if accounts.is_empty() {
        return Err(Error::MalformedResponse("gateway reported no managed accounts".into()));
    }

    Ok(format!("managed accounts: {}", accounts.join(", ")))
}

fn configure_market_data_type(session: &Session, settings: &DoctorSettings) -> Result<(), Error> {
    session.set_market_data_type(settings.market_data_type)?;
    // the switch needs a moment before subscriptions honor it
    session.pump(settings.settle)
}

fn check_stock_quote(session: &Session, settings: &DoctorSettings) -> Result<String, Error> {
    let contract = Contract::stock(&settings.symbol);

    retry::retry(settings.max_attempts, settings.backoff, || {
        let details = session.qualify(&contract)?;
        acquire_quote(session, &details.contract, &[], STOCK_POLL_ATTEMPTS, settings, |snapshot| snapshot.has_any_price())
    })
}

fn check_option_chain(session: &Session, settings: &DoctorSettings) -> Result<String, Error> {
    let details = session.qualify(&Contract::stock(&settings.symbol))?;
    let chains = session.option_chains(&settings.symbol, SecurityType::Stock, details.contract.contract_id)?;

    for chain in &chains {
        info!(
            "chain on {}: trading class {}, {} expirations, {} strikes",
            chain.exchange,
            chain.trading_class,
            chain.expirations.len(),
            chain.strikes.len()
        );
    }

    let selected = contracts::select_chain(&chains, ROUTING_VENUE)?;

    Ok(format!(
        "{} chains; selected {}/{} with {} expirations and {} strikes",
        chains.len(),
        selected.exchange,
        selected.trading_class,
        selected.expirations.len(),
        selected.strikes.len()
    ))
}

fn check_option_quote(session: &Session, settings: &DoctorSettings) -> Result<String, Error> {
    let underlying = session.qualify(&Contract::stock(&settings.symbol))?;

    let underlying_price = underlying_price(session, &underlying.contract, settings)?;
    info!("underlying {} trades around {underlying_price}", settings.symbol);

    let chains = session.option_chains(&settings.symbol, SecurityType::Stock, underlying.contract.contract_id)?;
    let chain = contracts::select_chain(&chains, ROUTING_VENUE)?;

    let contract = atm_put(&settings.symbol, chain, underlying_price)?;
    info!("selected option {}", contract.label());

    retry::retry(settings.max_attempts, settings.backoff, || {
        let details = session.qualify(&contract)?;
        let detail = acquire_quote(session, &details.contract, &OPTION_GENERIC_TICKS, OPTION_POLL_ATTEMPTS, settings, |snapshot| {
            snapshot.has_any_price() && snapshot.has_complete_greeks()
        })?;
        Ok(detail)
    })
}

fn check_index_quote(session: &Session, settings: &DoctorSettings) -> Result<String, Error> {
    let contract = Contract::index(INDEX_SYMBOL, INDEX_EXCHANGE);

    let details = session.qualify(&contract)?;
    acquire_quote(session, &details.contract, &[], INDEX_POLL_ATTEMPTS, settings, |snapshot| snapshot.has_any_price())
}

// Subscribe, poll until `is_ready` holds, unsubscribe. The feed is cancelled
// on every exit path, including a pump error mid-poll.
fn acquire_quote(
    session: &Session,
    contract: &Contract,
    generic_ticks: &[&str],
    max_attempts: u32,
    settings: &DoctorSettings,
    is_ready: impl Fn(&QuoteSnapshot) -> bool,
) -> Result<String, Error> {
    let feed = session.subscribe(contract, generic_ticks)?;

    let outcome = poll_until(
        |interval| feed.pump(interval),
        || is_ready(&feed.snapshot()),
        max_attempts,
        settings.poll_interval,
    )?;

    let snapshot = feed.snapshot();
    feed.cancel();

    if !outcome.ready {
        return Err(Error::DataUnavailable(format!(
            "no usable {} data after {} polls",
            contract.label(),
            outcome.attempts
        )));
    }

    Ok(describe_quote(&contract.label(), &snapshot, outcome))
}

// Quote of the underlying used to pick an at-the-money strike: last trade,
// falling back to the previous close.
fn underlying_price(session: &Session, contract: &Contract, settings: &DoctorSettings) -> Result<f64, Error> {
    let feed = session.subscribe(contract, &[])?;

    let outcome = poll_until(
        |interval| feed.pump(interval),
        || is_present(feed.snapshot().reference_price()),
        UNDERLYING_POLL_ATTEMPTS,
        settings.poll_interval,
    )?;

    let price = feed.snapshot().reference_price();
    feed.cancel();

    if !outcome.ready {
        return Err(Error::DataUnavailable(format!("no {} price to pick a strike from", contract.symbol)));
    }

    Ok(price)
}

// Nearest expiration, strike closest to the underlying price, put side.
fn atm_put(symbol: &str, chain: &OptionChain, underlying_price: f64) -> Result<Contract, Error> {
    let mut expirations = chain.expirations.clone();
    expirations.sort();
    let expiration = expirations
        .first()
        .ok_or_else(|| Error::MalformedResponse(format!("chain on {} lists no expirations", chain.exchange)))?;

    let mut strike = f64::NAN;
    for &candidate in &chain.strikes {
        if strike.is_nan() || (candidate - underlying_price).abs() < (strike - underlying_price).abs() {
            strike = candidate;
        }
    }
    if strike.is_nan() {
        return Err(Error::MalformedResponse(format!("chain on {} lists no strikes", chain.exchange)));
    }

    Ok(Contract::option(symbol, expiration, strike, "P"))
}

fn describe_quote(label: &str, snapshot: &QuoteSnapshot, outcome: PollOutcome) -> String {
    let mut detail = format!(
        "{label}: bid {} ask {} last {} close {} after {} polls",
        snapshot.bid, snapshot.ask, snapshot.last, snapshot.close, outcome.attempts
    );

    if let Some(greeks) = &snapshot.greeks {
        detail.push_str(&format!(
            "; delta {} gamma {} theta {} vega {} iv {}",
            optional(greeks.delta),
            optional(greeks.gamma),
            optional(greeks.theta),
            optional(greeks.vega),
            optional(greeks.implied_volatility)
        ));
    }

    detail
}

fn optional(value: Option<f64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "missing".into(),
    }
}
