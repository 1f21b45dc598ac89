//! Market data subscriptions and the quote snapshot they fill in.
//!
//! The gateway streams market data as a sequence of small tick messages, each
//! carrying one field of the quote. [QuoteSnapshot] folds that stream back into
//! a single struct so callers can ask "do I have a usable quote yet" without
//! caring which tick arrived when. Prices the gateway does not have come across
//! as -1 and are stored as NaN.

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::contracts::Contract;
use crate::messages::{IncomingMessages, OutgoingMessages, RequestMessage, ResponseMessage};
use crate::{server_versions, Error, ToField};

/// Market data feed variant served by the gateway.
///
/// The gateway answers a switch request with an acknowledgement carrying the
/// type it actually activated, which may differ from the one asked for when
/// the account lacks subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketDataType {
    /// Live streaming quotes.
    Live = 1,
    /// Last known values recorded at the close.
    Frozen = 2,
    /// Quotes delayed by 15 to 20 minutes.
    Delayed = 3,
    /// Delayed values frozen at the close.
    DelayedFrozen = 4,
}

impl MarketDataType {
    pub fn from_code(code: i32) -> Option<MarketDataType> {
        match code {
            1 => Some(MarketDataType::Live),
            2 => Some(MarketDataType::Frozen),
            3 => Some(MarketDataType::Delayed),
            4 => Some(MarketDataType::DelayedFrozen),
            _ => None,
        }
    }
}

impl fmt::Display for MarketDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketDataType::Live => write!(f, "live"),
            MarketDataType::Frozen => write!(f, "frozen"),
            MarketDataType::Delayed => write!(f, "delayed"),
            MarketDataType::DelayedFrozen => write!(f, "delayed frozen"),
        }
    }
}

/// Tick types carried by streaming market data messages.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum TickType {
    /// Unknown or invalid tick type.
    #[default]
    Unknown = -1,
    /// Number of contracts or shares offered at the bid price.
    BidSize = 0,
    /// Highest price a buyer is willing to pay.
    Bid = 1,
    /// Lowest price a seller is willing to accept.
    Ask = 2,
    /// Number of contracts or shares offered at the ask price.
    AskSize = 3,
    /// Price of the last trade.
    Last = 4,
    /// Number of contracts or shares traded in the last trade.
    LastSize = 5,
    /// Highest price of the day.
    High = 6,
    /// Lowest price of the day.
    Low = 7,
    /// Total trading volume for the day.
    Volume = 8,
    /// Previous day's closing price.
    Close = 9,
    /// Bid-derived option computation.
    BidOption = 10,
    /// Ask-derived option computation.
    AskOption = 11,
    /// Last-trade-derived option computation.
    LastOption = 12,
    /// Model-based option computation.
    ModelOption = 13,
    /// Opening price of the day.
    Open = 14,
    /// Implied volatility for options.
    OptionImpliedVol = 24,
    /// Current open interest for call options.
    OptionCallOpenInterest = 27,
    /// Current open interest for put options.
    OptionPutOpenInterest = 28,
    /// Timestamp (epoch seconds) of the last tick.
    LastTimestamp = 45,
    /// Indicates if trading is halted (0 = not halted, 1 = halted).
    Halted = 49,
    /// Delayed bid price.
    DelayedBid = 66,
    /// Delayed ask price.
    DelayedAsk = 67,
    /// Delayed last traded price.
    DelayedLast = 68,
    /// Delayed bid size.
    DelayedBidSize = 69,
    /// Delayed ask size.
    DelayedAskSize = 70,
    /// Delayed last size.
    DelayedLastSize = 71,
    /// Delayed highest price of the day.
    DelayedHigh = 72,
    /// Delayed lowest price of the day.
    DelayedLow = 73,
    /// Delayed traded volume of the day.
    DelayedVolume = 74,
    /// Delayed close price of the day.
    DelayedClose = 75,
    /// Delayed opening price of the day.
    DelayedOpen = 76,
    /// Delayed bid-derived option computation.
    DelayedBidOption = 80,
    /// Delayed ask-derived option computation.
    DelayedAskOption = 81,
    /// Delayed last-trade-derived option computation.
    DelayedLastOption = 82,
    /// Delayed model-based option computation.
    DelayedModelOption = 83,
}

impl From<i32> for TickType {
    fn from(value: i32) -> TickType {
        match value {
            0 => TickType::BidSize,
            1 => TickType::Bid,
            2 => TickType::Ask,
            3 => TickType::AskSize,
            4 => TickType::Last,
            5 => TickType::LastSize,
            6 => TickType::High,
            7 => TickType::Low,
            8 => TickType::Volume,
            9 => TickType::Close,
            10 => TickType::BidOption,
            11 => TickType::AskOption,
            12 => TickType::LastOption,
            13 => TickType::ModelOption,
            14 => TickType::Open,
            24 => TickType::OptionImpliedVol,
            27 => TickType::OptionCallOpenInterest,
            28 => TickType::OptionPutOpenInterest,
            45 => TickType::LastTimestamp,
            49 => TickType::Halted,
            66 => TickType::DelayedBid,
            67 => TickType::DelayedAsk,
            68 => TickType::DelayedLast,
            69 => TickType::DelayedBidSize,
            70 => TickType::DelayedAskSize,
            71 => TickType::DelayedLastSize,
            72 => TickType::DelayedHigh,
            73 => TickType::DelayedLow,
            74 => TickType::DelayedVolume,
            75 => TickType::DelayedClose,
            76 => TickType::DelayedOpen,
            80 => TickType::DelayedBidOption,
            81 => TickType::DelayedAskOption,
            82 => TickType::DelayedLastOption,
            83 => TickType::DelayedModelOption,
            _ => TickType::Unknown,
        }
    }
}

/// Option model values computed by the gateway for one side of the market.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct OptionComputation {
    /// Specifies the type of option computation.
    pub field: TickType,
    /// 0 - return based, 1 - price based.
    pub tick_attribute: Option<i32>,
    /// The implied volatility calculated by the gateway's option modeler.
    pub implied_volatility: Option<f64>,
    /// The option delta value.
    pub delta: Option<f64>,
    /// The option price.
    pub option_price: Option<f64>,
    /// The present value of dividends expected on the option's underlying.
    pub present_value_dividend: Option<f64>,
    /// The option gamma value.
    pub gamma: Option<f64>,
    /// The option vega value.
    pub vega: Option<f64>,
    /// The option theta value.
    pub theta: Option<f64>,
    /// The price of the underlying.
    pub underlying_price: Option<f64>,
}

/// True when a polled value actually arrived: not the NaN placeholder and
/// strictly positive. Zero is treated as absent since no quotable price or
/// size is zero.
pub fn is_present(value: f64) -> bool {
    !value.is_nan() && value > 0.0
}

// The gateway reports -1 for prices it does not have.
fn normalize_price(price: f64) -> f64 {
    if price == -1.0 {
        f64::NAN
    } else {
        price
    }
}

/// Accumulated view of one instrument's market data stream.
///
/// All value fields start out as NaN and flip to real numbers as ticks arrive.
/// Use [is_present] or the readiness methods rather than comparing against NaN
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub last_size: f64,
    pub volume: f64,
    /// From generic tick 106.
    pub implied_volatility: f64,
    /// From generic tick 101.
    pub call_open_interest: f64,
    /// From generic tick 101.
    pub put_open_interest: f64,
    /// Non-zero when the venue has halted trading.
    pub halted: f64,
    /// Model greeks, present only for option subscriptions.
    pub greeks: Option<OptionComputation>,
    /// Feed variant the gateway acknowledged for this subscription.
    pub market_data_type: Option<MarketDataType>,
}

impl Default for QuoteSnapshot {
    fn default() -> Self {
        QuoteSnapshot {
            bid: f64::NAN,
            ask: f64::NAN,
            last: f64::NAN,
            close: f64::NAN,
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            bid_size: f64::NAN,
            ask_size: f64::NAN,
            last_size: f64::NAN,
            volume: f64::NAN,
            implied_volatility: f64::NAN,
            call_open_interest: f64::NAN,
            put_open_interest: f64::NAN,
            halted: f64::NAN,
            greeks: None,
            market_data_type: None,
        }
    }
}

impl QuoteSnapshot {
    /// Both sides of the book have arrived.
    pub fn has_bid_ask(&self) -> bool {
        is_present(self.bid) && is_present(self.ask)
    }

    /// A trade price has arrived.
    pub fn has_last(&self) -> bool {
        is_present(self.last)
    }

    /// At least one of bid, ask, last or close has arrived. The readiness
    /// bar for stocks and indices.
    pub fn has_any_price(&self) -> bool {
        is_present(self.bid) || is_present(self.ask) || is_present(self.last) || is_present(self.close)
    }

    /// Model greeks have arrived.
    pub fn has_greeks(&self) -> bool {
        self.greeks.is_some()
    }

    /// Model greeks have arrived with every sensitivity filled in. The
    /// readiness bar for options is a price plus this.
    pub fn has_complete_greeks(&self) -> bool {
        match &self.greeks {
            Some(greeks) => {
                greeks.implied_volatility.is_some()
                    && greeks.delta.is_some()
                    && greeks.gamma.is_some()
                    && greeks.vega.is_some()
                    && greeks.theta.is_some()
            }
            None => false,
        }
    }

    /// Best available price for the instrument: last trade, falling back to
    /// the previous close. NaN when neither has arrived.
    pub fn reference_price(&self) -> f64 {
        if is_present(self.last) {
            self.last
        } else {
            self.close
        }
    }

    /// Folds one streaming message into the snapshot. Messages that carry
    /// nothing the snapshot tracks are logged and dropped.
    pub(crate) fn apply_message(&mut self, server_version: i32, message: &mut ResponseMessage) -> Result<(), Error> {
        match message.message_type() {
            IncomingMessages::TickPrice => self.apply_price(message),
            IncomingMessages::TickSize => self.apply_size(message),
            IncomingMessages::TickGeneric => self.apply_generic(message),
            IncomingMessages::TickString => self.apply_string(message),
            IncomingMessages::TickOptionComputation => self.apply_option_computation(server_version, message),
            IncomingMessages::MarketDataType => self.apply_market_data_type(message),
            IncomingMessages::TickReqParams => self.apply_request_parameters(message),
            other => {
                debug!("quote snapshot ignores message: {other:?}");
                Ok(())
            }
        }
    }

    fn apply_price(&mut self, message: &mut ResponseMessage) -> Result<(), Error> {
        message.skip(); // message type
        let message_version = message.next_int()?;
        message.skip(); // message request id

        let tick_type = TickType::from(message.next_int()?);
        let price = normalize_price(message.next_double()?);

        match tick_type {
            TickType::Bid | TickType::DelayedBid => self.bid = price,
            TickType::Ask | TickType::DelayedAsk => self.ask = price,
            TickType::Last | TickType::DelayedLast => self.last = price,
            TickType::Close | TickType::DelayedClose => self.close = price,
            TickType::Open | TickType::DelayedOpen => self.open = price,
            TickType::High | TickType::DelayedHigh => self.high = price,
            TickType::Low | TickType::DelayedLow => self.low = price,
            other => debug!("price tick not tracked: {other:?} = {price}"),
        }

        // Price ticks carry the matching size since message version 2.
        if message_version >= 2 {
            let size = message.next_double()?;
            match tick_type {
                TickType::Bid | TickType::DelayedBid => self.bid_size = size,
                TickType::Ask | TickType::DelayedAsk => self.ask_size = size,
                TickType::Last | TickType::DelayedLast => self.last_size = size,
                _ => {}
            }
        }

        if message_version >= 3 {
            message.next_int()?; // attribute mask
        }

        Ok(())
    }

    fn apply_size(&mut self, message: &mut ResponseMessage) -> Result<(), Error> {
        message.skip(); // message type
        message.skip(); // message version
        message.skip(); // message request id

        let tick_type = TickType::from(message.next_int()?);
        let size = message.next_double()?;

        match tick_type {
            TickType::BidSize | TickType::DelayedBidSize => self.bid_size = size,
            TickType::AskSize | TickType::DelayedAskSize => self.ask_size = size,
            TickType::LastSize | TickType::DelayedLastSize => self.last_size = size,
            TickType::Volume | TickType::DelayedVolume => self.volume = size,
            TickType::OptionCallOpenInterest => self.call_open_interest = size,
            TickType::OptionPutOpenInterest => self.put_open_interest = size,
            other => debug!("size tick not tracked: {other:?} = {size}"),
        }

        Ok(())
    }

    fn apply_generic(&mut self, message: &mut ResponseMessage) -> Result<(), Error> {
        message.skip(); // message type
        message.skip(); // message version
        message.skip(); // message request id

        let tick_type = TickType::from(message.next_int()?);
        let value = message.next_double()?;

        match tick_type {
            TickType::OptionImpliedVol => self.implied_volatility = value,
            TickType::Halted => self.halted = value,
            other => debug!("generic tick not tracked: {other:?} = {value}"),
        }

        Ok(())
    }

    fn apply_string(&mut self, message: &mut ResponseMessage) -> Result<(), Error> {
        message.skip(); // message type
        message.skip(); // message version
        message.skip(); // message request id

        let tick_type = TickType::from(message.next_int()?);
        let value = message.next_string()?;
        debug!("string tick: {tick_type:?} = {value}");

        Ok(())
    }

    fn apply_option_computation(&mut self, server_version: i32, message: &mut ResponseMessage) -> Result<(), Error> {
        let computation = decode_option_computation(server_version, message)?;

        match computation.field {
            TickType::ModelOption | TickType::DelayedModelOption => self.greeks = Some(computation),
            other => debug!("option computation not tracked: {other:?}"),
        }

        Ok(())
    }

    fn apply_market_data_type(&mut self, message: &mut ResponseMessage) -> Result<(), Error> {
        message.skip(); // message type
        message.skip(); // message version
        message.skip(); // message request id

        let code = message.next_int()?;
        self.market_data_type = MarketDataType::from_code(code);
        if self.market_data_type.is_none() {
            warn!("gateway acknowledged unknown market data type: {code}");
        }

        Ok(())
    }

    fn apply_request_parameters(&mut self, message: &mut ResponseMessage) -> Result<(), Error> {
        message.skip(); // message type
        message.skip(); // message request id

        let min_tick = message.next_double()?;
        let bbo_exchange = message.next_string()?;
        let snapshot_permissions = message.next_int()?;
        debug!("tick request parameters: min_tick {min_tick}, bbo exchange {bbo_exchange}, snapshot permissions {snapshot_permissions}");

        Ok(())
    }
}

// === Encoders ===

pub(crate) fn encode_request_market_data(
    server_version: i32,
    request_id: i32,
    contract: &Contract,
    generic_ticks: &[&str],
    snapshot: bool,
    regulatory_snapshot: bool,
) -> Result<RequestMessage, Error> {
    const VERSION: i32 = 11;

    let mut message = RequestMessage::new();

    message.push_field(&OutgoingMessages::RequestMarketData);
    message.push_field(&VERSION);
    message.push_field(&request_id);
    message.push_field(&contract.contract_id);
    message.push_field(&contract.symbol);
    message.push_field(&contract.security_type);
    message.push_field(&contract.last_trade_date_or_contract_month);
    message.push_field(&contract.strike);
    message.push_field(&contract.right);
    message.push_field(&contract.multiplier);
    message.push_field(&contract.exchange);
    message.push_field(&contract.primary_exchange);
    message.push_field(&contract.currency);
    message.push_field(&contract.local_symbol);
    message.push_field(&contract.trading_class);
    message.push_field(&false); // no delta neutral contract
    message.push_field(&generic_ticks.join(","));
    message.push_field(&snapshot);

    if server_version >= server_versions::REQ_SMART_COMPONENTS {
        message.push_field(&regulatory_snapshot);
    }

    message.push_field(&"");

    Ok(message)
}

pub(crate) fn encode_cancel_market_data(request_id: i32) -> Result<RequestMessage, Error> {
    const VERSION: i32 = 1;

    let mut message = RequestMessage::new();

    message.push_field(&OutgoingMessages::CancelMarketData);
    message.push_field(&VERSION);
    message.push_field(&request_id);

    Ok(message)
}

pub(crate) fn encode_request_market_data_type(market_data_type: MarketDataType) -> Result<RequestMessage, Error> {
    const VERSION: i32 = 1;

    let mut message = RequestMessage::new();

    message.push_field(&OutgoingMessages::RequestMarketDataType);
    message.push_field(&VERSION);
    message.push_field(&(market_data_type as i32));

    Ok(message)
}

// === Decoders ===

pub(crate) fn decode_option_computation(server_version: i32, message: &mut ResponseMessage) -> Result<OptionComputation, Error> {
    message.skip(); // message type

    let message_version = if server_version >= server_versions::PRICE_BASED_VOLATILITY {
        i32::MAX
    } else {
        message.next_int()?
    };

    message.skip(); // message request id

    let mut computation = OptionComputation {
        field: TickType::from(message.next_int()?),
        ..Default::default()
    };

    if server_version >= server_versions::PRICE_BASED_VOLATILITY {
        computation.tick_attribute = Some(message.next_int()?);
    }

    computation.implied_volatility = next_optional_double(message, -1.0)?;
    computation.delta = next_optional_double(message, -2.0)?;

    if message_version >= 6 || computation.field == TickType::ModelOption || computation.field == TickType::DelayedModelOption {
        computation.option_price = next_optional_double(message, -1.0)?;
        computation.present_value_dividend = next_optional_double(message, -1.0)?;
    }

    if message_version >= 6 {
        computation.gamma = next_optional_double(message, -2.0)?;
        computation.vega = next_optional_double(message, -2.0)?;
        computation.theta = next_optional_double(message, -2.0)?;
        computation.underlying_price = next_optional_double(message, -1.0)?;
    }

    Ok(computation)
}

fn next_optional_double(message: &mut ResponseMessage, none_value: f64) -> Result<Option<f64>, Error> {
    let value = message.next_double()?;
    if value == none_value {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}
