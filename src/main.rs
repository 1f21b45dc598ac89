use std::process;
use std::time::Duration;

use anyhow::anyhow;
use clap::{arg, value_parser, Command};
use log::info;

use ibgw_doctor::checks::{self, DoctorSettings};
use ibgw_doctor::market_data::MarketDataType;
use ibgw_doctor::session::Session;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = Command::new("ibgw-doctor")
        .version("1.0")
        .about("Checks the market data feed of a running TWS or IB Gateway instance")
        .arg(arg!(--host <VALUE> "gateway host").default_value("127.0.0.1"))
        .arg(
            arg!(--port <VALUE> "gateway API port (4002 = IB Gateway, 7497 = TWS)")
                .value_parser(value_parser!(u16))
                .default_value("4002"),
        )
        .arg(
            arg!(--"client-id" <VALUE> "client id identifying this session to the gateway")
                .value_parser(value_parser!(i32))
                .default_value("999"),
        )
        .arg(arg!(--symbol <VALUE> "stock symbol the quote and option checks exercise").default_value("SPY"))
        .arg(
            arg!(--"market-data-type" <VALUE> "1 = live, 2 = frozen, 3 = delayed, 4 = delayed frozen")
                .value_parser(value_parser!(i32))
                .default_value("1"),
        )
        .arg(arg!(--"test-options" "also check the option chain and an option quote"))
        .arg(arg!(--"test-index" "also check an index quote (VIX on CBOE)"))
        .arg(arg!(--"test-all" "run every check"))
        .arg(
            arg!(--timeout <VALUE> "connection timeout in seconds")
                .value_parser(value_parser!(u64))
                .default_value("60"),
        )
        .get_matches();

    let host = matches.get_one::<String>("host").expect("host has a default");
    let port = matches.get_one::<u16>("port").expect("port has a default");
    let client_id = *matches.get_one::<i32>("client-id").expect("client-id has a default");
    let symbol = matches.get_one::<String>("symbol").expect("symbol has a default");
    let timeout = *matches.get_one::<u64>("timeout").expect("timeout has a default");

    let code = *matches.get_one::<i32>("market-data-type").expect("market-data-type has a default");
    let market_data_type = MarketDataType::from_code(code).ok_or_else(|| anyhow!("market data type must be 1-4, got {code}"))?;

    let test_all = matches.get_flag("test-all");
    let settings = DoctorSettings {
        symbol: symbol.clone(),
        market_data_type,
        test_options: test_all || matches.get_flag("test-options"),
        test_index: test_all || matches.get_flag("test-index"),
        ..Default::default()
    };

    info!("checking gateway at {host}:{port} with symbol {symbol}");

    let session = Session::connect(&format!("{host}:{port}"), client_id, Duration::from_secs(timeout))?;

    let reports = checks::run(&session, &settings);
    let all_passed = checks::print_summary(&reports, &settings);

    session.disconnect();

    if !all_passed {
        process::exit(1);
    }

    Ok(())
}
