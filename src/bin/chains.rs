use std::process;
use std::time::Duration;

use clap::{arg, value_parser, Command};
use log::info;

use ibgw_doctor::contracts::{self, Contract, SecurityType};
use ibgw_doctor::session::Session;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = Command::new("ibgw-chains")
        .version("1.0")
        .about("Lists the option chain descriptors the gateway returns for a symbol")
        .arg(arg!(--host <VALUE> "gateway host").default_value("127.0.0.1"))
        .arg(
            arg!(--port <VALUE> "gateway API port (4002 = IB Gateway, 7497 = TWS)")
                .value_parser(value_parser!(u16))
                .default_value("4002"),
        )
        .arg(
            arg!(--"client-id" <VALUE> "client id identifying this session to the gateway")
                .value_parser(value_parser!(i32))
                .default_value("998"),
        )
        .arg(arg!(--symbol <VALUE> "underlying stock symbol").default_value("SPY"))
        .arg(arg!(--venue <VALUE> "routing venue to select a chain for").default_value("SMART"))
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
    let venue = matches.get_one::<String>("venue").expect("venue has a default");
    let timeout = *matches.get_one::<u64>("timeout").expect("timeout has a default");

    let session = Session::connect(&format!("{host}:{port}"), client_id, Duration::from_secs(timeout))?;

    let details = session.qualify(&Contract::stock(symbol))?;
    info!("qualified {} as contract id {}", symbol, details.contract.contract_id);

    let chains = session.option_chains(symbol, SecurityType::Stock, details.contract.contract_id)?;

    println!("{} chains listed for {}", chains.len(), symbol);
    for chain in &chains {
        println!(
            "  {:<8} trading class {:<10} {:>3} expirations {:>5} strikes",
            chain.exchange,
            chain.trading_class,
            chain.expirations.len(),
            chain.strikes.len()
        );
    }

    match contracts::select_chain(&chains, venue) {
        Ok(selected) => {
            println!(
                "selected on {}: trading class {} with {} strikes",
                selected.exchange,
                selected.trading_class,
                selected.strikes.len()
            );
            let mut expirations = selected.expirations.clone();
            expirations.sort();
            if let Some(expiration) = expirations.first() {
                println!("nearest expiration: {expiration}");
            }
            session.disconnect();
        }
        Err(err) => {
            eprintln!("{err}");
            session.disconnect();
            process::exit(1);
        }
    }

    Ok(())
}
