//! Connection establishment and message framing for the gateway session.
//!
//! Establishing a session is a three step conversation: a version range
//! handshake, a start API message carrying the client id, and an initial burst
//! of account messages that the gateway sends before it will service requests.

use std::sync::Mutex;

use log::{debug, error, warn};
use time::macros::format_description;
use time::OffsetDateTime;
use time_tz::{timezones, OffsetResult, PrimitiveDateTimeExt, Tz};

use crate::errors::Error;
use crate::messages::{encode_length, IncomingMessages, OutgoingMessages, RequestMessage, ResponseMessage};
use crate::server_versions;
use crate::trace::MessageRecorder;
use crate::transport::Stream;

const MIN_SERVER_VERSION: i32 = 100;
const MAX_SERVER_VERSION: i32 = server_versions::WSH_EVENT_DATA_FILTERS_DATE;

type Response = Result<ResponseMessage, Error>;

/// Metadata reported by the gateway while the session is established.
#[derive(Default, Clone, Debug)]
pub struct ConnectionMetadata {
    /// Client ID for this connection.
    pub client_id: i32,
    /// Server version reported during the handshake.
    pub server_version: i32,
    /// Comma-separated list of managed accounts.
    pub managed_accounts: String,
    /// Next valid order id announced at session start.
    pub next_order_id: i32,
    /// Connection time.
    pub connection_time: Option<OffsetDateTime>,
    /// Server time zone.
    pub time_zone: Option<&'static Tz>,
}

/// Established connection to the gateway.
#[derive(Debug)]
pub(crate) struct Connection<S: Stream> {
    client_id: i32,
    socket: S,
    connection_metadata: Mutex<ConnectionMetadata>,
    recorder: MessageRecorder,
}

/// Account messages merged while draining the post-handshake burst.
#[derive(Debug, Clone, Default)]
struct AccountInfo {
    next_order_id: Option<i32>,
    managed_accounts: Option<String>,
}

impl<S: Stream> Connection<S> {
    /// Run the full establishment conversation over an already dialed socket.
    pub fn connect(socket: S, client_id: i32) -> Result<Self, Error> {
        let connection = Self {
            client_id,
            socket,
            connection_metadata: Mutex::new(ConnectionMetadata {
                client_id,
                ..Default::default()
            }),
            recorder: MessageRecorder::from_env(),
        };

        connection.establish_connection()?;

        Ok(connection)
    }

    /// Get a copy of the connection metadata.
    pub fn connection_metadata(&self) -> ConnectionMetadata {
        let metadata = self.connection_metadata.lock().unwrap();
        metadata.clone()
    }

    /// Get the server version.
    pub fn server_version(&self) -> i32 {
        let connection_metadata = self.connection_metadata.lock().unwrap();
        connection_metadata.server_version
    }

    fn establish_connection(&self) -> Result<(), Error> {
        self.handshake()?;
        self.start_api()?;
        self.receive_account_info()?;
        Ok(())
    }

    /// Write a message to the connection.
    pub fn write_message(&self, message: &RequestMessage) -> Result<(), Error> {
        self.recorder.record_request(message);
        let encoded = message.encode();
        debug!("-> {encoded:?}");
        let length_encoded = encode_length(&encoded);
        self.socket.write_all(&length_encoded)?;
        Ok(())
    }

    /// Read a message from the connection.
    pub fn read_message(&self) -> Response {
        let data = self.socket.read_message()?;
        let raw_string = String::from_utf8(data)?;
        debug!("<- {raw_string:?}");

        let message = ResponseMessage::from(&raw_string);

        self.recorder.record_response(&message);

        Ok(message)
    }

    // sends server handshake
    fn handshake(&self) -> Result<(), Error> {
        let version_string = format!("v{MIN_SERVER_VERSION}..{MAX_SERVER_VERSION}");
        debug!("-> handshake: {version_string:?}");

        let mut handshake = Vec::from(b"API\0");
        handshake.extend_from_slice(&encode_length(&version_string));

        self.socket.write_all(&handshake)?;

        let ack = self.read_message();

        let mut connection_metadata = self.connection_metadata.lock()?;

        match ack {
            Ok(mut response) => {
                connection_metadata.server_version = response.next_int()?;

                let (time, tz) = parse_connection_time(&response.next_string()?);
                connection_metadata.connection_time = time;
                connection_metadata.time_zone = tz;
            }
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(Error::Simple(format!("The server may be rejecting connections from this host: {err}")));
            }
            Err(err) => {
                return Err(err);
            }
        }
        Ok(())
    }

    // asks server to start processing messages
    fn start_api(&self) -> Result<(), Error> {
        const VERSION: i32 = 2;

        let mut message = RequestMessage::default();
        message.push_field(&OutgoingMessages::StartApi);
        message.push_field(&VERSION);
        message.push_field(&self.client_id);

        if self.server_version() > server_versions::OPTIONAL_CAPABILITIES {
            message.push_field(&"");
        }

        self.write_message(&message)?;
        Ok(())
    }

    // drains next order id and managed accounts sent at session start
    fn receive_account_info(&self) -> Result<(), Error> {
        let mut account_info = AccountInfo::default();

        let mut attempts = 0;
        const MAX_ATTEMPTS: i32 = 100;
        loop {
            let mut message = self.read_message()?;
            let info = parse_account_info(&mut message)?;

            if info.next_order_id.is_some() {
                account_info.next_order_id = info.next_order_id;
            }
            if info.managed_accounts.is_some() {
                account_info.managed_accounts = info.managed_accounts;
            }

            attempts += 1;
            if (account_info.next_order_id.is_some() && account_info.managed_accounts.is_some()) || attempts > MAX_ATTEMPTS {
                break;
            }
        }

        let mut connection_metadata = self.connection_metadata.lock()?;
        if let Some(next_order_id) = account_info.next_order_id {
            connection_metadata.next_order_id = next_order_id;
        }
        if let Some(managed_accounts) = account_info.managed_accounts {
            connection_metadata.managed_accounts = managed_accounts;
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn stubbed(socket: S, client_id: i32, server_version: i32) -> Connection<S> {
        Connection {
            client_id,
            socket,
            connection_metadata: Mutex::new(ConnectionMetadata {
                client_id,
                server_version,
                ..Default::default()
            }),
            recorder: MessageRecorder::new(false, String::from("")),
        }
    }
}

fn parse_account_info(message: &mut ResponseMessage) -> Result<AccountInfo, Error> {
    let mut info = AccountInfo::default();

    match message.message_type() {
        IncomingMessages::NextValidId => {
            message.skip(); // message type
            message.skip(); // message version
            info.next_order_id = Some(message.next_int()?);
        }
        IncomingMessages::ManagedAccounts => {
            message.skip(); // message type
            message.skip(); // message version
            info.managed_accounts = Some(message.next_string()?);
        }
        IncomingMessages::Error => {
            error!("Error during account info: {message:?}");
        }
        _ => {
            // Other messages during connection are logged but not processed
            warn!(
                "CONSUMING MESSAGE during connection setup: {:?} - THIS MESSAGE IS LOST!",
                message.message_type()
            );
        }
    }

    Ok(info)
}

/// Parse connection time from the gateway format.
/// Format: "20230405 22:20:39 PST"
fn parse_connection_time(connection_time: &str) -> (Option<OffsetDateTime>, Option<&'static Tz>) {
    let parts: Vec<&str> = connection_time.split(' ').collect();

    if parts.len() < 3 {
        error!("Invalid connection time format: {connection_time}");
        return (None, None);
    }

    let zones = timezones::find_by_name(parts[2]);

    if zones.is_empty() {
        error!("Time zone not found for {}", parts[2]);
        return (None, None);
    }

    let timezone = zones[0];

    let format = format_description!("[year][month][day] [hour]:[minute]:[second]");
    let date_str = format!("{} {}", parts[0], parts[1]);
    let date = time::PrimitiveDateTime::parse(date_str.as_str(), format);

    match date {
        Ok(connected_at) => match connected_at.assume_timezone(timezone) {
            OffsetResult::Some(date) => (Some(date), Some(timezone)),
            _ => {
                log::warn!("Error setting timezone");
                (None, Some(timezone))
            }
        },
        Err(err) => {
            log::warn!("Could not parse connection time from {date_str}: {err}");
            (None, Some(timezone))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::{Exchange, MockSocket};
    use time::macros::datetime;

    #[test]
    fn test_parse_connection_time() {
        let example = "20230405 22:20:39 PST";
        let (connection_time, _) = parse_connection_time(example);

        let la = timezones::db::america::LOS_ANGELES;
        if let OffsetResult::Some(other) = datetime!(2023-04-05 22:20:39).assume_timezone(la) {
            assert_eq!(connection_time, Some(other));
        }
    }

    #[test]
    fn test_parse_connection_time_invalid_format() {
        let (connection_time, time_zone) = parse_connection_time("garbage");

        assert_eq!(connection_time, None);
        assert!(time_zone.is_none());
    }

    #[test]
    fn test_connect_establishes_session() {
        let stream = MockSocket::new(vec![
            Exchange::simple("v100..173", &["173|20240119 12:15:01 PST|"]),
            Exchange::simple("71|2|28||", &["15|1|DU1234567|", "9|1|32|"]),
        ]);

        let connection = Connection::connect(stream, 28).expect("error establishing connection");

        assert_eq!(connection.server_version(), 173);

        let metadata = connection.connection_metadata();
        assert_eq!(metadata.client_id, 28);
        assert_eq!(metadata.managed_accounts, "DU1234567");
        assert_eq!(metadata.next_order_id, 32);
        assert!(metadata.connection_time.is_some());
    }

    #[test]
    fn test_connect_survives_farm_notices_during_setup() {
        // benign farm status notices may arrive before the account messages
        let stream = MockSocket::new(vec![
            Exchange::simple("v100..173", &["173|20240119 12:15:01 PST|"]),
            Exchange::simple(
                "71|2|28||",
                &[
                    "4|2|-1|2104|Market data farm connection is OK:usfarm||",
                    "15|1|DU1234567|",
                    "9|1|7|",
                ],
            ),
        ]);

        let connection = Connection::connect(stream, 28).expect("error establishing connection");

        let metadata = connection.connection_metadata();
        assert_eq!(metadata.managed_accounts, "DU1234567");
        assert_eq!(metadata.next_order_id, 7);
    }

    #[test]
    fn test_start_api_omits_capabilities_for_old_servers() {
        let stream = MockSocket::new(vec![
            Exchange::simple("v100..173", &["72|20240119 12:15:01 PST|"]),
            Exchange::simple("71|2|28|", &["15|1|DU1234567|", "9|1|1|"]),
        ]);

        let connection = Connection::connect(stream, 28).expect("error establishing connection");

        assert_eq!(connection.server_version(), 72);
    }
}
