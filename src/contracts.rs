//! Trading instruments, contract details and option chain descriptors.
//!
//! The gateway answers a contract details request with the qualified form of an
//! instrument (contract id, listing venue, tick size) and an option parameters
//! request with one chain descriptor per venue and trading class. Chain
//! selection picks the descriptor an automation would route orders through.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::messages::{OutgoingMessages, RequestMessage, ResponseMessage};
use crate::{server_versions, Error, ToField};

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
/// SecurityType enumerates the instrument types the doctor exercises.
pub enum SecurityType {
    /// Stock (or ETF)
    #[default]
    Stock,
    /// Option
    Option,
    /// Index
    Index,
    /// Other
    Other(String),
}

impl ToField for SecurityType {
    fn to_field(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for SecurityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityType::Stock => write!(f, "STK"),
            SecurityType::Option => write!(f, "OPT"),
            SecurityType::Index => write!(f, "IND"),
            SecurityType::Other(name) => write!(f, "{name}"),
        }
    }
}

impl SecurityType {
    pub fn from(name: &str) -> SecurityType {
        match name {
            "STK" => SecurityType::Stock,
            "OPT" => SecurityType::Option,
            "IND" => SecurityType::Index,
            other => {
                warn!("Unknown security type: {other}. Defaulting to Other");
                SecurityType::Other(other.to_string())
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// Contract describes an instrument's definition.
pub struct Contract {
    /// The unique IB contract identifier.
    pub contract_id: i32,
    /// The underlying's asset symbol.
    pub symbol: String,
    pub security_type: SecurityType,
    /// The contract's last trading day or contract month (for Options).
    /// Strings with format YYYYMM will be interpreted as the Contract Month whereas YYYYMMDD will be interpreted as Last Trading Day.
    pub last_trade_date_or_contract_month: String,
    /// The option's strike price.
    pub strike: f64,
    /// Either Put or Call (i.e. Options). Valid values are P, PUT, C, CALL.
    pub right: String,
    /// The instrument's multiplier (i.e. options).
    pub multiplier: String,
    /// The destination exchange.
    pub exchange: String,
    /// The underlying's currency.
    pub currency: String,
    /// The contract's symbol within its primary exchange. For options, this will be the OCC symbol.
    pub local_symbol: String,
    /// The contract's primary exchange.
    /// For smart routed contracts, used to define contract in case of ambiguity.
    pub primary_exchange: String,
    /// The trading class name for this contract.
    pub trading_class: String,
    /// If set to true, contract details requests can be performed pertaining to expired contracts.
    pub include_expired: bool,
    /// Security identifier scheme when querying contract details, e.g. ISIN or CUSIP.
    pub security_id_type: String,
    /// Identifier for the scheme given in `security_id_type`.
    pub security_id: String,
    pub issuer_id: String,
}

impl Contract {
    /// Creates a stock contract from the specified symbol.
    ///
    /// Currency defaults to USD and exchange defaults to SMART.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibgw_doctor::contracts::Contract;
    ///
    /// let aapl = Contract::stock("AAPL");
    /// assert_eq!(aapl.symbol, "AAPL");
    /// assert_eq!(aapl.currency, "USD");
    /// assert_eq!(aapl.exchange, "SMART");
    /// ```
    pub fn stock(symbol: &str) -> Contract {
        Contract {
            symbol: symbol.to_string(),
            security_type: SecurityType::Stock,
            currency: "USD".to_string(),
            exchange: "SMART".to_string(),
            ..Default::default()
        }
    }

    /// Creates an index contract from the specified symbol and listing exchange.
    ///
    /// Currency defaults to USD.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibgw_doctor::contracts::Contract;
    ///
    /// let vix = Contract::index("VIX", "CBOE");
    /// assert_eq!(vix.symbol, "VIX");
    /// assert_eq!(vix.exchange, "CBOE");
    /// ```
    pub fn index(symbol: &str, exchange: &str) -> Contract {
        Contract {
            symbol: symbol.to_string(),
            security_type: SecurityType::Index,
            currency: "USD".to_string(),
            exchange: exchange.to_string(),
            ..Default::default()
        }
    }

    /// Creates an option contract from the specified parameters.
    ///
    /// Currency defaults to USD and exchange defaults to SMART.
    ///
    /// # Arguments
    /// * `symbol` - Symbol of the underlying asset
    /// * `expiration_date` - Expiration date of option contract (YYYYMMDD)
    /// * `strike` - Strike price of the option contract
    /// * `right` - Option type: "C" for Call, "P" for Put
    pub fn option(symbol: &str, expiration_date: &str, strike: f64, right: &str) -> Contract {
        Contract {
            symbol: symbol.into(),
            security_type: SecurityType::Option,
            exchange: "SMART".into(),
            currency: "USD".into(),
            last_trade_date_or_contract_month: expiration_date.into(),
            strike,
            right: right.into(),
            ..Default::default()
        }
    }

    /// Short human-readable description used in check output.
    pub fn label(&self) -> String {
        match self.security_type {
            SecurityType::Option => format!(
                "{} {} {} {}",
                self.symbol, self.last_trade_date_or_contract_month, self.strike, self.right
            ),
            _ => format!("{} ({})", self.symbol, self.exchange),
        }
    }
}

/// ContractDetails provides extended contract details.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDetails {
    /// A fully-defined Contract object.
    pub contract: Contract,
    /// The market name for this product.
    pub market_name: String,
    /// The minimum allowed price variation.
    pub min_tick: f64,
    /// Allows execution and strike prices to be reported consistently with market data.
    pub price_magnifier: i32,
    /// Supported order types for this product.
    pub order_types: Vec<String>,
    /// Valid exchange fields when placing an order for this contract.
    pub valid_exchanges: Vec<String>,
    /// For derivatives, the contract ID (conID) of the underlying instrument.
    pub under_contract_id: i32,
    /// Descriptive name of the product.
    pub long_name: String,
    /// Typically the contract month of the underlying for a Future contract.
    pub contract_month: String,
    /// The industry classification of the underlying/product.
    pub industry: String,
    /// The industry category of the underlying.
    pub category: String,
    /// The industry subcategory of the underlying.
    pub subcategory: String,
    /// The time zone for the trading hours of the product.
    pub time_zone_id: String,
    /// The trading hours of the product, one entry per day.
    pub trading_hours: Vec<String>,
    /// The liquid hours of the product, one entry per day.
    pub liquid_hours: Vec<String>,
    /// Economic Value Rule name and the respective optional argument.
    pub ev_rule: String,
    /// Approximate market value change if the price changes by 1.
    pub ev_multiplier: f64,
    /// Indicates the smart-routing group to which a contract belongs.
    pub agg_group: i32,
    /// A list of identifiers the customer is allowed to view (CUSIP/ISIN/etc).
    pub sec_id_list: Vec<TagValue>,
    /// For derivatives, the symbol of the underlying contract.
    pub under_symbol: String,
    /// For derivatives, the underlying security type.
    pub under_security_type: String,
    /// Market rule IDs, one per entry in `valid_exchanges`.
    pub market_rule_ids: Vec<String>,
    /// Real expiration date.
    pub real_expiration_date: String,
    /// Last trade time.
    pub last_trade_time: String,
    /// Stock type.
    pub stock_type: String,
    /// Order's minimal size.
    pub min_size: f64,
    /// Order's size increment.
    pub size_increment: f64,
    /// Order's suggested size increment.
    pub suggested_size_increment: f64,
}

/// TagValue is a convenience struct to define key-value pairs.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct TagValue {
    pub tag: String,
    pub value: String,
}

/// One option chain descriptor, as listed by a single venue for a single trading class.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OptionChain {
    /// The contract ID of the underlying security.
    pub underlying_contract_id: i32,
    /// The option trading class.
    pub trading_class: String,
    /// The option multiplier.
    pub multiplier: String,
    /// Exchange for which the derivative is hosted.
    pub exchange: String,
    /// A list of the expiries for the options of this underlying on this exchange.
    pub expirations: Vec<String>,
    /// A list of the possible strikes for options of this underlying on this exchange.
    pub strikes: Vec<f64>,
}

/// Picks the chain an automation would trade: the descriptor hosted on the
/// routing venue with the most strikes. When several descriptors on the venue
/// tie on strike count, the first one the gateway listed wins.
pub fn select_chain<'a>(chains: &'a [OptionChain], venue: &str) -> Result<&'a OptionChain, Error> {
    let mut selected: Option<&OptionChain> = None;

    for chain in chains.iter().filter(|chain| chain.exchange == venue) {
        match selected {
            Some(best) if chain.strikes.len() <= best.strikes.len() => {}
            _ => selected = Some(chain),
        }
    }

    selected.ok_or_else(|| Error::NoChainForVenue(venue.to_string()))
}

// === Encoders ===

pub(crate) fn encode_request_contract_data(server_version: i32, request_id: i32, contract: &Contract) -> Result<RequestMessage, Error> {
    const VERSION: i32 = 8;

    let mut packet = RequestMessage::default();

    packet.push_field(&OutgoingMessages::RequestContractData);
    packet.push_field(&VERSION);

    if server_version >= server_versions::CONTRACT_DATA_CHAIN {
        packet.push_field(&request_id);
    }

    if server_version >= server_versions::CONTRACT_CONID {
        packet.push_field(&contract.contract_id);
    }

    packet.push_field(&contract.symbol);
    packet.push_field(&contract.security_type);
    packet.push_field(&contract.last_trade_date_or_contract_month);
    packet.push_field(&contract.strike);
    packet.push_field(&contract.right);

    if server_version >= 15 {
        packet.push_field(&contract.multiplier);
    }

    if server_version >= server_versions::PRIMARYEXCH {
        packet.push_field(&contract.exchange);
        packet.push_field(&contract.primary_exchange);
    } else if server_version >= server_versions::LINKING {
        if !contract.primary_exchange.is_empty() && (contract.exchange == "BEST" || contract.exchange == "SMART") {
            packet.push_field(&format!("{}:{}", contract.exchange, contract.primary_exchange));
        } else {
            packet.push_field(&contract.exchange);
        }
    }

    packet.push_field(&contract.currency);
    packet.push_field(&contract.local_symbol);

    if server_version >= server_versions::TRADING_CLASS {
        packet.push_field(&contract.trading_class);
    }
    if server_version >= 31 {
        packet.push_field(&contract.include_expired);
    }
    if server_version >= server_versions::SEC_ID_TYPE {
        packet.push_field(&contract.security_id_type);
        packet.push_field(&contract.security_id);
    }
    if server_version >= server_versions::BOND_ISSUERID {
        packet.push_field(&contract.issuer_id);
    }

    Ok(packet)
}

pub(crate) fn encode_request_option_chain(
    request_id: i32,
    symbol: &str,
    exchange: &str,
    security_type: SecurityType,
    contract_id: i32,
) -> Result<RequestMessage, Error> {
    let mut message = RequestMessage::default();

    message.push_field(&OutgoingMessages::RequestSecurityDefinitionOptionalParameters);
    message.push_field(&request_id);
    message.push_field(&symbol);
    message.push_field(&exchange);
    message.push_field(&security_type);
    message.push_field(&contract_id);

    Ok(message)
}

// === Decoders ===

pub(crate) fn decode_contract_details(server_version: i32, message: &mut ResponseMessage) -> Result<ContractDetails, Error> {
    message.skip(); // message type

    let mut message_version = 8;
    if server_version < server_versions::SIZE_RULES {
        message_version = message.next_int()?;
    }

    if message_version >= 3 {
        // request id
        message.skip();
    }

    let mut contract = ContractDetails::default();

    contract.contract.symbol = message.next_string()?;
    contract.contract.security_type = SecurityType::from(&message.next_string()?);
    read_last_trade_date(&mut contract, &message.next_string()?)?;
    contract.contract.strike = message.next_double()?;
    contract.contract.right = message.next_string()?;
    contract.contract.exchange = message.next_string()?;
    contract.contract.currency = message.next_string()?;
    contract.contract.local_symbol = message.next_string()?;
    contract.market_name = message.next_string()?;
    contract.contract.trading_class = message.next_string()?;
    contract.contract.contract_id = message.next_int()?;
    contract.min_tick = message.next_double()?;
    if (server_versions::MD_SIZE_MULTIPLIER..server_versions::SIZE_RULES).contains(&server_version) {
        message.next_int()?; // mdSizeMultiplier no longer used
    }
    contract.contract.multiplier = message.next_string()?;
    contract.order_types = split_to_vec(&message.next_string()?);
    contract.valid_exchanges = split_to_vec(&message.next_string()?);
    if message_version >= 2 {
        contract.price_magnifier = message.next_int()?;
    }
    if message_version >= 4 {
        contract.under_contract_id = message.next_int()?;
    }
    if message_version >= 5 {
        contract.long_name = message.next_string()?;
        contract.contract.primary_exchange = message.next_string()?;
    }
    if message_version >= 6 {
        contract.contract_month = message.next_string()?;
        contract.industry = message.next_string()?;
        contract.category = message.next_string()?;
        contract.subcategory = message.next_string()?;
        contract.time_zone_id = message.next_string()?;
        contract.trading_hours = split_hours(&message.next_string()?);
        contract.liquid_hours = split_hours(&message.next_string()?);
    }
    if message_version >= 8 {
        contract.ev_rule = message.next_string()?;
        contract.ev_multiplier = message.next_double()?;
    }
    if message_version >= 7 {
        let sec_id_list_count = message.next_int()?;
        for _ in 0..sec_id_list_count {
            let tag = message.next_string()?;
            let value = message.next_string()?;
            contract.sec_id_list.push(TagValue { tag, value });
        }
    }
    if server_version > server_versions::AGG_GROUP {
        contract.agg_group = message.next_int()?;
    }
    if server_version > server_versions::UNDERLYING_INFO {
        contract.under_symbol = message.next_string()?;
        contract.under_security_type = message.next_string()?;
    }
    if server_version > server_versions::MARKET_RULES {
        contract.market_rule_ids = split_to_vec(&message.next_string()?);
    }
    if server_version > server_versions::REAL_EXPIRATION_DATE {
        contract.real_expiration_date = message.next_string()?;
    }
    if server_version > server_versions::STOCK_TYPE {
        contract.stock_type = message.next_string()?;
    }
    if (server_versions::FRACTIONAL_SIZE_SUPPORT..server_versions::SIZE_RULES).contains(&server_version) {
        message.next_double()?; // size min tick -- no longer used
    }
    if server_version >= server_versions::SIZE_RULES {
        contract.min_size = message.next_double()?;
        contract.size_increment = message.next_double()?;
        contract.suggested_size_increment = message.next_double()?;
    }

    Ok(contract)
}

pub(crate) fn decode_option_chain(message: &mut ResponseMessage) -> Result<OptionChain, Error> {
    message.skip(); // message type
    message.skip(); // request id

    let mut option_chain = OptionChain {
        exchange: message.next_string()?,
        underlying_contract_id: message.next_int()?,
        trading_class: message.next_string()?,
        multiplier: message.next_string()?,
        ..Default::default()
    };

    let expirations_count = message.next_int()?;
    option_chain.expirations.reserve(expirations_count as usize);
    for _ in 0..expirations_count {
        option_chain.expirations.push(message.next_string()?);
    }

    let strikes_count = message.next_int()?;
    option_chain.strikes.reserve(strikes_count as usize);
    for _ in 0..strikes_count {
        option_chain.strikes.push(message.next_double()?);
    }

    Ok(option_chain)
}

fn split_hours(hours: &str) -> Vec<String> {
    hours.split(";").map(|s| s.to_string()).collect()
}

fn split_to_vec(s: &str) -> Vec<String> {
    s.split(",").map(|s| s.to_string()).collect()
}

fn read_last_trade_date(contract: &mut ContractDetails, last_trade_date_or_contract_month: &str) -> Result<(), Error> {
    if last_trade_date_or_contract_month.is_empty() {
        return Ok(());
    }

    let splitted: Vec<&str> = if last_trade_date_or_contract_month.contains('-') {
        last_trade_date_or_contract_month.split('-').collect()
    } else {
        last_trade_date_or_contract_month.split(' ').collect()
    };

    if !splitted.is_empty() {
        contract.contract.last_trade_date_or_contract_month = splitted[0].to_string();
    }
    if splitted.len() > 1 {
        contract.last_trade_time = splitted[1].to_string();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain(exchange: &str, trading_class: &str, strike_count: usize) -> OptionChain {
        OptionChain {
            underlying_contract_id: 265598,
            trading_class: trading_class.to_string(),
            multiplier: "100".to_string(),
            exchange: exchange.to_string(),
            expirations: vec!["20240119".to_string(), "20240216".to_string()],
            strikes: (0..strike_count).map(|i| 100.0 + i as f64).collect(),
        }
    }

    #[test]
    fn test_security_type_round_trip() {
        struct TestCase {
            name: &'static str,
            code: &'static str,
            security_type: SecurityType,
        }

        let test_cases = vec![
            TestCase {
                name: "stock",
                code: "STK",
                security_type: SecurityType::Stock,
            },
            TestCase {
                name: "option",
                code: "OPT",
                security_type: SecurityType::Option,
            },
            TestCase {
                name: "index",
                code: "IND",
                security_type: SecurityType::Index,
            },
            TestCase {
                name: "unknown",
                code: "FUT",
                security_type: SecurityType::Other("FUT".to_string()),
            },
        ];

        for tc in test_cases {
            assert_eq!(SecurityType::from(tc.code), tc.security_type, "test case '{}' failed on from", tc.name);
            assert_eq!(tc.security_type.to_field(), tc.code, "test case '{}' failed on to_field", tc.name);
        }
    }

    #[test]
    fn test_contract_builders() {
        let stock = Contract::stock("TSLA");
        assert_eq!(stock.symbol, "TSLA");
        assert_eq!(stock.security_type, SecurityType::Stock);
        assert_eq!(stock.exchange, "SMART");
        assert_eq!(stock.currency, "USD");

        let index = Contract::index("VIX", "CBOE");
        assert_eq!(index.symbol, "VIX");
        assert_eq!(index.security_type, SecurityType::Index);
        assert_eq!(index.exchange, "CBOE");

        let option = Contract::option("TSLA", "20240119", 250.0, "P");
        assert_eq!(option.security_type, SecurityType::Option);
        assert_eq!(option.last_trade_date_or_contract_month, "20240119");
        assert_eq!(option.strike, 250.0);
        assert_eq!(option.right, "P");
    }

    #[test]
    fn test_select_chain_prefers_most_strikes() {
        let sparse = chain("SMART", "TSLA", 50);
        let dense = chain("SMART", "TSLA", 400);
        let chains = vec![sparse, dense];

        let selected = select_chain(&chains, "SMART").expect("expected a chain on SMART");

        assert_eq!(selected.strikes.len(), 400);
    }

    #[test]
    fn test_select_chain_order_does_not_matter() {
        let sparse = chain("SMART", "TSLA", 50);
        let dense = chain("SMART", "TSLA", 400);
        let chains = vec![dense, sparse];

        let selected = select_chain(&chains, "SMART").expect("expected a chain on SMART");

        assert_eq!(selected.strikes.len(), 400);
    }

    #[test]
    fn test_select_chain_tie_keeps_first_listed() {
        let first = chain("SMART", "TSLA", 100);
        let second = chain("SMART", "TSLA1", 100);
        let chains = vec![first, second];

        let selected = select_chain(&chains, "SMART").expect("expected a chain on SMART");

        assert_eq!(selected.trading_class, "TSLA");
    }

    #[test]
    fn test_select_chain_dense_smart_wins_over_sparse_and_other_venue() {
        let chains = vec![chain("SMART", "TSLA", 50), chain("SMART", "TSLA", 400), chain("CBOE", "TSLA", 300)];

        let selected = select_chain(&chains, "SMART").expect("expected a chain on SMART");

        assert_eq!(selected.exchange, "SMART");
        assert_eq!(selected.strikes.len(), 400);
    }

    #[test]
    fn test_select_chain_filters_by_venue() {
        let chains = vec![chain("CBOE", "TSLA", 400), chain("SMART", "TSLA", 50), chain("AMEX", "TSLA", 300)];

        let selected = select_chain(&chains, "SMART").expect("expected a chain on SMART");

        assert_eq!(selected.exchange, "SMART");
        assert_eq!(selected.strikes.len(), 50);
    }

    #[test]
    fn test_select_chain_no_match_is_an_error() {
        let chains = vec![chain("CBOE", "TSLA", 400)];

        let result = select_chain(&chains, "SMART");

        assert!(matches!(result, Err(Error::NoChainForVenue(ref venue)) if venue == "SMART"));
    }

    #[test]
    fn test_select_chain_empty_list_is_an_error() {
        let chains: Vec<OptionChain> = Vec::new();

        let result = select_chain(&chains, "SMART");

        assert!(matches!(result, Err(Error::NoChainForVenue(_))));
    }

    #[test]
    fn test_encode_request_contract_data() {
        let server_version = server_versions::BOND_ISSUERID;
        let request_id = 9001;
        let message_version = 8;

        let contract = Contract {
            contract_id: 12345,
            symbol: "AAPL".to_string(),
            security_type: SecurityType::Stock,
            exchange: "SMART".to_string(),
            primary_exchange: "NASDAQ".to_string(),
            currency: "USD".to_string(),
            local_symbol: "AAPL".to_string(),
            ..Default::default()
        };

        let message = encode_request_contract_data(server_version, request_id, &contract).expect("error encoding contract data request");

        assert_eq!(message[0], OutgoingMessages::RequestContractData.to_field(), "message.type");
        assert_eq!(message[1], message_version.to_field(), "message.version");
        assert_eq!(message[2], request_id.to_field(), "message.request_id");
        assert_eq!(message[3], contract.contract_id.to_field(), "message.contract_id");
        assert_eq!(message[4], contract.symbol, "message.symbol");
        assert_eq!(message[5], contract.security_type.to_field(), "message.security_type");
        assert_eq!(
            message[6], contract.last_trade_date_or_contract_month,
            "message.last_trade_date_or_contract_month"
        );
        assert_eq!(message[7], contract.strike.to_field(), "message.strike");
        assert_eq!(message[8], contract.right, "message.right");
        assert_eq!(message[9], contract.multiplier, "message.multiplier");
        assert_eq!(message[10], contract.exchange, "message.exchange");
        assert_eq!(message[11], contract.primary_exchange, "message.primary_exchange");
        assert_eq!(message[12], contract.currency, "message.currency");
        assert_eq!(message[13], contract.local_symbol, "message.local_symbol");
        assert_eq!(message[14], contract.trading_class, "message.trading_class");
        assert_eq!(message[15], contract.include_expired.to_field(), "message.include_expired");
        assert_eq!(message[16], contract.security_id_type, "message.security_id_type");
        assert_eq!(message[17], contract.security_id, "message.security_id");
        assert_eq!(message[18], contract.issuer_id, "message.issuer_id");
    }

    #[test]
    fn test_encode_request_option_chain() {
        let request_id = 9002;

        let message =
            encode_request_option_chain(request_id, "TSLA", "SMART", SecurityType::Stock, 76792991).expect("error encoding option chain request");

        assert_eq!(
            message[0],
            OutgoingMessages::RequestSecurityDefinitionOptionalParameters.to_field(),
            "message.type"
        );
        assert_eq!(message[1], request_id.to_field(), "message.request_id");
        assert_eq!(message[2], "TSLA", "message.symbol");
        assert_eq!(message[3], "SMART", "message.exchange");
        assert_eq!(message[4], SecurityType::Stock.to_field(), "message.security_type");
        assert_eq!(message[5], 76792991.to_field(), "message.contract_id");
    }

    #[test]
    fn test_decode_option_chain() {
        let mut message = ResponseMessage::from_simple("75|9000|CBOE|789456|GOOG|100|3|2023-06|2023-09|2023-12|3|100.5|110.0|120.5|");

        let option_chain = decode_option_chain(&mut message).expect("error decoding option chain");

        assert_eq!(option_chain.exchange, "CBOE", "option_chain.exchange");
        assert_eq!(option_chain.underlying_contract_id, 789456, "option_chain.underlying_contract_id");
        assert_eq!(option_chain.trading_class, "GOOG", "option_chain.trading_class");
        assert_eq!(option_chain.multiplier, "100", "option_chain.multiplier");
        assert_eq!(option_chain.expirations.len(), 3, "option_chain.expirations.len()");
        assert_eq!(option_chain.expirations[0], "2023-06", "option_chain.expirations[0]");
        assert_eq!(option_chain.strikes.len(), 3, "option_chain.strikes.len()");
        assert_eq!(option_chain.strikes[2], 120.5, "option_chain.strikes[2]");
    }

    #[test]
    fn test_decode_contract_details() {
        let mut message = ResponseMessage::from_simple(
            "10|9001|AAPL|STK||0||SMART|USD|AAPL|Apple Inc.|AAPL|12345|0.01|100|\
        ACTIVETIM,AD,ADJUST,ALERT,ALLOC|SMART,AMEX,NYSE,NASDAQ|1000|\
        0|Apple Inc.|NASDAQ|JUN23|TECHNOLOGY|ELECTRONICS|COMPUTERS|US/Eastern|\
        20230630:0930-20230630:1600;20230701:CLOSED|20230630:0930-20230630:1600|VOL=P|1.0|1|ISIN|US0378331005|\
        1|AAPL|STK|26|20230630|COMMON|0.1|0.01|1|",
        );

        let contract_details = decode_contract_details(server_versions::SIZE_RULES, &mut message).expect("error decoding contract details");

        assert_eq!(contract_details.contract.symbol, "AAPL", "contract.symbol");
        assert_eq!(contract_details.contract.security_type, SecurityType::Stock, "contract.security_type");
        assert_eq!(contract_details.contract.strike, 0.0, "contract.strike");
        assert_eq!(contract_details.contract.exchange, "SMART", "contract.exchange");
        assert_eq!(contract_details.contract.currency, "USD", "contract.currency");
        assert_eq!(contract_details.market_name, "Apple Inc.", "market_name");
        assert_eq!(contract_details.contract.trading_class, "AAPL", "contract.trading_class");
        assert_eq!(contract_details.contract.contract_id, 12345, "contract.contract_id");
        assert_eq!(contract_details.min_tick, 0.01, "min_tick");
        assert_eq!(contract_details.contract.multiplier, "100", "contract.multiplier");
        assert_eq!(contract_details.order_types.len(), 5, "order_types.len()");
        assert_eq!(contract_details.valid_exchanges.len(), 4, "valid_exchanges.len()");
        assert_eq!(contract_details.valid_exchanges[0], "SMART", "valid_exchanges[0]");
        assert_eq!(contract_details.price_magnifier, 1000, "price_magnifier");
        assert_eq!(contract_details.long_name, "Apple Inc.", "long_name");
        assert_eq!(contract_details.contract.primary_exchange, "NASDAQ", "contract.primary_exchange");
        assert_eq!(contract_details.time_zone_id, "US/Eastern", "time_zone_id");
        assert_eq!(contract_details.trading_hours.len(), 2, "trading_hours.len()");
        assert_eq!(contract_details.liquid_hours.len(), 1, "liquid_hours.len()");
        assert_eq!(contract_details.ev_rule, "VOL=P", "ev_rule");
        assert_eq!(contract_details.ev_multiplier, 1.0, "ev_multiplier");
        assert_eq!(contract_details.sec_id_list.len(), 1, "sec_id_list.len()");
        assert_eq!(contract_details.sec_id_list[0].tag, "ISIN", "sec_id_list[0].tag");
        assert_eq!(contract_details.agg_group, 1, "agg_group");
        assert_eq!(contract_details.under_symbol, "AAPL", "under_symbol");
        assert_eq!(contract_details.under_security_type, "STK", "under_security_type");
        assert_eq!(contract_details.market_rule_ids[0], "26", "market_rule_ids[0]");
        assert_eq!(contract_details.real_expiration_date, "20230630", "real_expiration_date");
        assert_eq!(contract_details.stock_type, "COMMON", "stock_type");
        assert_eq!(contract_details.min_size, 0.1, "min_size");
        assert_eq!(contract_details.size_increment, 0.01, "size_increment");
        assert_eq!(contract_details.suggested_size_increment, 1.0, "suggested_size_increment");
    }

    #[test]
    fn test_read_last_trade_date() {
        let mut contract = ContractDetails::default();
        read_last_trade_date(&mut contract, "20240119 15:00:00").expect("error reading last trade date");
        assert_eq!(contract.contract.last_trade_date_or_contract_month, "20240119");
        assert_eq!(contract.last_trade_time, "15:00:00");

        let mut contract = ContractDetails::default();
        read_last_trade_date(&mut contract, "").expect("error reading last trade date");
        assert_eq!(contract.contract.last_trade_date_or_contract_month, "");
        assert_eq!(contract.last_trade_time, "");
    }
}
