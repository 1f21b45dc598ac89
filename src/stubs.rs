//! Scripted socket used to exercise the session layer without a gateway.
//!
//! Tests declare the conversation as a sequence of exchanges. Each exchange
//! pairs one expected request with the responses the gateway would send back.
//! Writes are asserted against the expected request; reads drain the current
//! exchange's responses and then time out like an idle socket.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io::ErrorKind;

use log::{debug, trace};

use crate::messages::{encode_length, RequestMessage, ResponseMessage};
use crate::transport::{read_message, Io, Stream};
use crate::Error;

fn mock_socket_error(kind: ErrorKind) -> Error {
    let message = format!("Simulated {} error", kind);
    debug!("mock -> {message}");
    let io_error = std::io::Error::new(kind, message);
    Error::Io(io_error)
}

#[derive(Debug)]
pub(crate) struct MockSocket {
    exchanges: Vec<Exchange>,
    write_call_count: Cell<usize>,
    read_call_count: Cell<usize>,
}

impl MockSocket {
    pub fn new(exchanges: Vec<Exchange>) -> Self {
        Self {
            exchanges,
            write_call_count: Cell::new(0),
            read_call_count: Cell::new(0),
        }
    }
}

impl Stream for MockSocket {}

impl Io for MockSocket {
    fn read_message(&self) -> Result<Vec<u8>, Error> {
        trace!("===== mock read =====");

        let write_call_count = self.write_call_count.get();
        let read_call_count = self.read_call_count.get();

        // a read before any write, or past the scripted responses, behaves
        // like an idle socket hitting the read timeout
        if write_call_count == 0 {
            return Err(mock_socket_error(ErrorKind::WouldBlock));
        }

        let exchange = &self.exchanges[write_call_count - 1];
        let responses = &exchange.responses;

        if read_call_count >= responses.len() {
            return Err(mock_socket_error(ErrorKind::WouldBlock));
        }

        let response = responses.get(read_call_count).unwrap();

        // disconnect if a null byte response is encountered
        if response.fields[0] == "\0" {
            return Err(mock_socket_error(ErrorKind::ConnectionReset));
        }

        self.read_call_count.set(read_call_count + 1);

        // run the declared response through the transport framing
        // to force any errors
        let encoded = response.encode();
        debug!("mock read {:?}", &encoded);
        let expected = encode_length(&encoded);
        read_message(&mut expected.as_slice())
    }

    fn write_all(&self, buf: &[u8]) -> Result<(), Error> {
        trace!("===== mock write =====");
        let write_call_count = self.write_call_count.get();
        trace!("mock write: write_call_count: {write_call_count}");

        let exchange = self.exchanges.get(write_call_count).unwrap();
        let request = &exchange.request;

        let is_handshake = buf.starts_with(b"API\0");

        // strip API\0 if handshake
        let buf = if is_handshake {
            &buf[4..] // strip prefix
        } else {
            buf
        };

        // the handshake does not include the trailing null byte
        // Message encode() cannot be used to encode the handshake
        let expected = if is_handshake {
            assert_eq!(request.len(), 1);
            &encode_length(&request.fields[0])
        } else {
            &encode_length(&request.encode())
        };

        let raw_string = std::str::from_utf8(&buf[4..]).unwrap(); // strip length
        debug!("mock write {:?}", raw_string);

        assert_eq!(
            expected,
            buf,
            "assertion left == right failed\nexpected: {:?}\nbuf: {:?}\n",
            std::str::from_utf8(expected).unwrap(),
            std::str::from_utf8(buf).unwrap()
        );

        self.read_call_count.set(0);
        self.write_call_count.set(write_call_count + 1);

        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Exchange {
    request: RequestMessage,
    responses: VecDeque<ResponseMessage>,
}

impl Exchange {
    pub fn new(request: RequestMessage, responses: Vec<ResponseMessage>) -> Self {
        Self {
            request,
            responses: VecDeque::from(responses),
        }
    }

    pub fn simple(request: &str, responses: &[&str]) -> Self {
        let responses = responses
            .iter()
            .map(|s| ResponseMessage::from_simple(s))
            .collect::<Vec<ResponseMessage>>();
        Self::new(RequestMessage::from_simple(request), responses)
    }
}
