#![allow(dead_code)]
//! Server version constants for gateway feature compatibility.
//!
//! These constants represent the minimum server version required for specific features.
//! They are used internally to check if a feature is supported by the connected gateway
//! before sending requests that depend on that feature, and to decide which optional
//! fields appear in request and response messages.

/// Minimum server version for snapshot market data.
pub const SNAPSHOT_MKT_DATA: i32 = 35;
/// Minimum server version for contract ID support.
pub const CONTRACT_CONID: i32 = 37;
/// Minimum server version for contract data chain.
pub const CONTRACT_DATA_CHAIN: i32 = 40;
/// Minimum server version for security ID type.
pub const SEC_ID_TYPE: i32 = 45;
/// Minimum server version for market data type requests.
pub const REQ_MARKET_DATA_TYPE: i32 = 55;
/// Minimum server version for trading class support.
pub const TRADING_CLASS: i32 = 68;
/// Minimum server version for order linking.
pub const LINKING: i32 = 70;
pub const OPTIONAL_CAPABILITIES: i32 = 72;
pub const PRIMARYEXCH: i32 = 75;
pub const SEC_DEF_OPT_PARAMS_REQ: i32 = 104;
pub const PAST_LIMIT: i32 = 109;
pub const MD_SIZE_MULTIPLIER: i32 = 110;
pub const REQ_SMART_COMPONENTS: i32 = 114;
pub const AGG_GROUP: i32 = 121;
pub const UNDERLYING_INFO: i32 = 122;
pub const MARKET_RULES: i32 = 126;
pub const PRE_OPEN_BID_ASK: i32 = 132;
pub const REAL_EXPIRATION_DATE: i32 = 134;
pub const STOCK_TYPE: i32 = 152;
pub const PRICE_BASED_VOLATILITY: i32 = 156;
pub const FRACTIONAL_SIZE_SUPPORT: i32 = 163;
/// Minimum server version for size rules support.
pub const SIZE_RULES: i32 = 164;
pub const WSH_EVENT_DATA_FILTERS_DATE: i32 = 173;
pub const BOND_ISSUERID: i32 = 176;
