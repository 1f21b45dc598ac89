//! Health checks for the market data feed of a running [TWS or IB Gateway](https://interactivebrokers.github.io/tws-api/introduction.html) instance.
//!
//! Trading automations that sit on top of the gateway tend to fail in opaque ways: a
//! quote subscription that never fills in, an option chain with a fraction of the
//! expected strikes, or live data silently withheld because another session holds the
//! market data lines. This crate connects to the gateway the same way an automation
//! would, runs a fixed series of checks (connectivity, account, stock quote, option
//! chain, option quote, index quote) and reports which ones pass.
//!
//! The crate ships two binaries: `ibgw-doctor`, which runs the checks and exits
//! non-zero if any fail, and `ibgw-chains`, which lists the option chain descriptors
//! the gateway returns for a symbol.
//!
//!```no_run
//!     use ibgw_doctor::session::Session;
//!     use std::time::Duration;
//!
//!     fn main() -> anyhow::Result<()> {
//!         let session = Session::connect("127.0.0.1:4002", 999, Duration::from_secs(60))?;
//!         println!("server version {}", session.server_version());
//!         session.disconnect();
//!         Ok(())
//!     }
//!```

/// Chain selection, value polling and the individual gateway checks.
pub mod checks;

/// Trading instruments and option chain descriptors.
pub mod contracts;

/// Quote snapshots, tick handling and readiness predicates.
pub mod market_data;

/// Bounded fixed-interval polling against a pumped quote feed.
pub mod poll;

/// Retry wrapper for transient acquisition failures.
pub mod retry;

/// Gateway session lifecycle and request plumbing.
pub mod session;

mod connection;
mod errors;
mod messages;
mod server_versions;
mod trace;
mod transport;

#[cfg(test)]
pub(crate) mod stubs;

pub use errors::Error;

pub(crate) trait ToField {
    fn to_field(&self) -> String;
}

impl ToField for bool {
    fn to_field(&self) -> String {
        if *self {
            String::from("1")
        } else {
            String::from("0")
        }
    }
}

impl ToField for String {
    fn to_field(&self) -> String {
        self.clone()
    }
}

impl ToField for &str {
    fn to_field(&self) -> String {
        <&str>::clone(self).to_string()
    }
}

impl ToField for i32 {
    fn to_field(&self) -> String {
        self.to_string()
    }
}

impl ToField for f64 {
    fn to_field(&self) -> String {
        self.to_string()
    }
}
