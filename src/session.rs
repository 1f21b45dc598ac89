//! Gateway session lifecycle and request plumbing.
//!
//! A [Session] owns the socket to the gateway and runs every conversation on
//! the caller's thread. Waiting is explicit: callers pump the session (or a
//! [TickFeed]) so inbound messages get applied between checks. Exactly one
//! request is outstanding at a time, which keeps routing trivial and teardown
//! deterministic.

use std::cell::{Cell, RefCell};
use std::io::ErrorKind;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use time::OffsetDateTime;

use crate::connection::Connection;
use crate::contracts::{self, Contract, ContractDetails, OptionChain, SecurityType};
use crate::market_data::{self, MarketDataType, QuoteSnapshot};
use crate::messages::{IncomingMessages, Notice, ResponseMessage};
use crate::server_versions;
use crate::transport::{Stream, TcpSocket};
use crate::Error;

// Request ids start well above the order ids the gateway hands out.
const BASE_REQUEST_ID: i32 = 9000;

// Consecutive idle reads tolerated while a request waits for its response.
// Each idle read already blocked for the socket read timeout.
const MAX_IDLE_READS: i32 = 30;

/// Another session with the same login holds the market data lines.
const COMPETING_SESSION_CODE: i32 = 10197;

/// No security definition found for the request.
const NO_SECURITY_DEFINITION_CODE: i32 = 200;

/// An established connection to the gateway.
///
/// Dropping the session closes the socket; [Session::disconnect] makes the
/// teardown explicit at the end of a run.
pub struct Session {
    connection: Connection<Box<dyn Stream>>,
    next_request_id: Cell<i32>,
}

impl Session {
    /// Dial the gateway and run the session establishment conversation.
    ///
    /// `timeout` bounds the TCP connect only; an unreachable gateway fails
    /// outright and is never retried.
    pub fn connect(url: &str, client_id: i32, timeout: Duration) -> Result<Session, Error> {
        info!("connecting to gateway at {url} as client {client_id}");

        let socket = TcpSocket::connect(url, timeout).map_err(|err| {
            error!("could not reach gateway at {url}: {err}");
            Error::ConnectionFailed
        })?;

        let connection = Connection::connect(Box::new(socket) as Box<dyn Stream>, client_id)?;

        let metadata = connection.connection_metadata();
        info!("connected, server version {}", metadata.server_version);

        Ok(Session {
            connection,
            next_request_id: Cell::new(BASE_REQUEST_ID),
        })
    }

    /// Server version reported during the handshake.
    pub fn server_version(&self) -> i32 {
        self.connection.server_version()
    }

    /// Time the gateway stamped on the connection, when it could be parsed.
    pub fn connection_time(&self) -> Option<OffsetDateTime> {
        self.connection.connection_metadata().connection_time
    }

    /// Accounts this login manages, as announced at session start.
    pub fn managed_accounts(&self) -> Vec<String> {
        self.connection
            .connection_metadata()
            .managed_accounts
            .split(',')
            .filter(|account| !account.is_empty())
            .map(String::from)
            .collect()
    }

    /// Close the connection to the gateway.
    pub fn disconnect(self) {
        info!("disconnecting from gateway");
    }

    /// Read and route inbound messages for `duration`.
    ///
    /// Messages no request is waiting for land here: benign connectivity
    /// notices are logged, a competing session error is returned so the run
    /// can surface it, everything else is dropped with a debug line. The
    /// deadline holds even while messages keep arriving; a busy feed cannot
    /// stretch the pump.
    pub fn pump(&self, duration: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + duration;

        loop {
            if let Some(mut message) = self.read_if_available()? {
                self.route_unsolicited(&mut message)?;
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        Ok(())
    }

    /// Switch the feed variant served to this session.
    ///
    /// The switch takes a moment to apply; callers should pump for a short
    /// settling period before trusting subsequent subscriptions.
    pub fn set_market_data_type(&self, market_data_type: MarketDataType) -> Result<(), Error> {
        self.check_server_version(server_versions::REQ_MARKET_DATA_TYPE, "It does not support market data type requests.")?;

        let message = market_data::encode_request_market_data_type(market_data_type)?;
        self.connection.write_message(&message)?;

        info!("requested {market_data_type} market data");
        Ok(())
    }

    /// Ask the gateway for the qualified form of an instrument.
    ///
    /// A venue that rejects the symbol answers with error 200, reported as
    /// [Error::UnqualifiedInstrument]; that is a bad symbol/venue pair, not a
    /// transient condition.
    pub fn qualify(&self, contract: &Contract) -> Result<ContractDetails, Error> {
        let request_id = self.next_request_id();
        let request = contracts::encode_request_contract_data(self.server_version(), request_id, contract)?;
        self.connection.write_message(&request)?;

        let mut details: Option<ContractDetails> = None;
        let mut idle_reads = 0;

        loop {
            let Some(mut message) = self.read_if_available()? else {
                idle_reads += 1;
                if idle_reads > MAX_IDLE_READS {
                    return Err(Error::Simple(format!("no answer to contract details request for {}", contract.label())));
                }
                continue;
            };
            idle_reads = 0;

            match message.message_type() {
                IncomingMessages::ContractData if message.request_id() == Some(request_id) => {
                    details = Some(contracts::decode_contract_details(self.server_version(), &mut message)?);
                }
                IncomingMessages::ContractDataEnd if message.request_id() == Some(request_id) => break,
                IncomingMessages::Error if message.request_id() == Some(request_id) => {
                    return Err(request_error(&Notice::from(&message), &contract.label()));
                }
                _ => self.route_unsolicited(&mut message)?,
            }
        }

        match details {
            Some(details) => {
                debug!("qualified {} as contract id {}", contract.label(), details.contract.contract_id);
                Ok(details)
            }
            None => Err(Error::UnqualifiedInstrument(contract.label())),
        }
    }

    /// Fetch every option chain descriptor listed for an underlying.
    ///
    /// The gateway answers with one descriptor per venue and trading class;
    /// picking one is the caller's job (see [contracts::select_chain]). An
    /// answer with no descriptors at all is malformed.
    pub fn option_chains(&self, symbol: &str, security_type: SecurityType, contract_id: i32) -> Result<Vec<OptionChain>, Error> {
        self.check_server_version(server_versions::SEC_DEF_OPT_PARAMS_REQ, "It does not support option chain requests.")?;

        let request_id = self.next_request_id();
        // venue filtering happens client side, so the exchange field stays empty
        let request = contracts::encode_request_option_chain(request_id, symbol, "", security_type, contract_id)?;
        self.connection.write_message(&request)?;

        let mut chains: Vec<OptionChain> = Vec::new();
        let mut idle_reads = 0;

        loop {
            let Some(mut message) = self.read_if_available()? else {
                idle_reads += 1;
                if idle_reads > MAX_IDLE_READS {
                    return Err(Error::Simple(format!("no answer to option chain request for {symbol}")));
                }
                continue;
            };
            idle_reads = 0;

            match message.message_type() {
                IncomingMessages::SecurityDefinitionOptionParameter if message.request_id() == Some(request_id) => {
                    chains.push(contracts::decode_option_chain(&mut message)?);
                }
                IncomingMessages::SecurityDefinitionOptionParameterEnd if message.request_id() == Some(request_id) => break,
                IncomingMessages::Error if message.request_id() == Some(request_id) => {
                    return Err(request_error(&Notice::from(&message), symbol));
                }
                _ => self.route_unsolicited(&mut message)?,
            }
        }

        if chains.is_empty() {
            return Err(Error::MalformedResponse(format!("gateway listed no option chains for {symbol}")));
        }

        Ok(chains)
    }

    /// Subscribe to streaming market data for an instrument.
    ///
    /// The returned [TickFeed] accumulates ticks into a [QuoteSnapshot] while
    /// pumped and cancels the subscription when dropped.
    pub fn subscribe<'a>(&'a self, contract: &Contract, generic_ticks: &[&str]) -> Result<TickFeed<'a>, Error> {
        let request_id = self.next_request_id();
        let request = market_data::encode_request_market_data(self.server_version(), request_id, contract, generic_ticks, false, false)?;
        self.connection.write_message(&request)?;

        debug!("subscribed to {} with request id {request_id}", contract.label());

        Ok(TickFeed {
            session: self,
            request_id,
            snapshot: RefCell::new(QuoteSnapshot::default()),
            cancelled: Cell::new(false),
        })
    }

    fn next_request_id(&self) -> i32 {
        let request_id = self.next_request_id.get();
        self.next_request_id.set(request_id + 1);
        request_id
    }

    fn check_server_version(&self, version: i32, message: &str) -> Result<(), Error> {
        if self.server_version() < version {
            return Err(Error::ServerVersion(version, self.server_version(), message.into()));
        }
        Ok(())
    }

    // One read against the socket: a message, or None when the read timed out
    // with nothing buffered.
    fn read_if_available(&self) -> Result<Option<ResponseMessage>, Error> {
        match self.connection.read_message() {
            Ok(message) if message.is_shutdown() => Err(Error::Shutdown),
            Ok(message) => Ok(Some(message)),
            Err(err) if is_idle(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn route_unsolicited(&self, message: &mut ResponseMessage) -> Result<(), Error> {
        match message.message_type() {
            IncomingMessages::Error => {
                let notice = Notice::from(message);
                if notice.code == COMPETING_SESSION_CODE {
                    return Err(Error::CompetingSession(notice.message));
                }
                log_notice(&notice);
                Ok(())
            }
            other => {
                debug!("session pump dropping {other:?}");
                Ok(())
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn stubbed(socket: Box<dyn Stream>, server_version: i32) -> Session {
        Session {
            connection: Connection::stubbed(socket, 28, server_version),
            next_request_id: Cell::new(BASE_REQUEST_ID),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_socket(socket: Box<dyn Stream>, client_id: i32) -> Result<Session, Error> {
        Ok(Session {
            connection: Connection::connect(socket, client_id)?,
            next_request_id: Cell::new(BASE_REQUEST_ID),
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server_version", &self.server_version())
            .field("next_request_id", &self.next_request_id.get())
            .finish()
    }
}

/// An active market data subscription.
///
/// Pumping the feed applies inbound ticks to the snapshot. The subscription is
/// torn down on every exit path: explicitly via [TickFeed::cancel] or by the
/// drop guard.
pub struct TickFeed<'a> {
    session: &'a Session,
    request_id: i32,
    snapshot: RefCell<QuoteSnapshot>,
    cancelled: Cell<bool>,
}

impl TickFeed<'_> {
    /// Request id identifying this subscription on the wire.
    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    /// Read and apply inbound messages for `duration`.
    ///
    /// Ticks for this subscription update the snapshot; a competing session
    /// error aborts the pump; data errors scoped to this subscription (not
    /// subscribed, no permissions) are logged and leave the snapshot unfilled
    /// so the poller can run its course. The deadline is checked between
    /// messages, keeping the poll cadence fixed on a busy feed.
    pub fn pump(&self, duration: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + duration;

        loop {
            if let Some(mut message) = self.session.read_if_available()? {
                self.route(&mut message)?;
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        Ok(())
    }

    /// Copy of the snapshot as filled in so far.
    pub fn snapshot(&self) -> QuoteSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Cancel the subscription. Idempotent; also invoked on drop.
    pub fn cancel(&self) {
        if self.cancelled.replace(true) {
            return;
        }

        if let Ok(message) = market_data::encode_cancel_market_data(self.request_id) {
            if let Err(err) = self.session.connection.write_message(&message) {
                warn!("could not cancel subscription {}: {err}", self.request_id);
            }
        }
    }

    fn route(&self, message: &mut ResponseMessage) -> Result<(), Error> {
        match message.message_type() {
            IncomingMessages::Error if message.request_id() == Some(self.request_id) => {
                let notice = Notice::from(message);
                if notice.code == COMPETING_SESSION_CODE {
                    return Err(Error::CompetingSession(notice.message));
                }
                if notice.is_informational() {
                    log_notice(&notice);
                } else {
                    warn!("subscription {} error: {notice}", self.request_id);
                }
                Ok(())
            }
            IncomingMessages::TickSnapshotEnd => Ok(()),
            _ if message.request_id() == Some(self.request_id) => {
                self.snapshot.borrow_mut().apply_message(self.session.server_version(), message)
            }
            _ => self.session.route_unsolicited(message),
        }
    }
}

impl Drop for TickFeed<'_> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn is_idle(error: &Error) -> bool {
    matches!(error, Error::Io(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut))
}

fn log_notice(notice: &Notice) {
    if notice.is_informational() {
        info!("gateway notice: {notice}");
    } else {
        warn!("gateway error: {notice}");
    }
}

// Classifies an error message answering a specific request.
fn request_error(notice: &Notice, subject: &str) -> Error {
    match notice.code {
        NO_SECURITY_DEFINITION_CODE => Error::UnqualifiedInstrument(format!("{subject}: {}", notice.message)),
        COMPETING_SESSION_CODE => Error::CompetingSession(notice.message.clone()),
        _ => Error::Message(notice.code, notice.message.clone()),
    }
}
