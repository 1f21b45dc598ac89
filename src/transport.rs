//! Socket plumbing for the gateway connection.
//!
//! Messages travel as length-prefixed packets: a big-endian u32 byte count
//! followed by NUL-delimited fields. Reads are bounded by a short socket
//! timeout so the caller can interleave deadline checks between messages.

use std::io::{Cursor, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;

use byteorder::{BigEndian, ReadBytesExt};

use crate::Error;

const GATEWAY_READ_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) trait Io {
    fn read_message(&self) -> Result<Vec<u8>, Error>;
    fn write_all(&self, buf: &[u8]) -> Result<(), Error>;
}

pub(crate) trait Stream: Io + std::fmt::Debug {}

impl Io for Box<dyn Stream> {
    fn read_message(&self) -> Result<Vec<u8>, Error> {
        (**self).read_message()
    }

    fn write_all(&self, buf: &[u8]) -> Result<(), Error> {
        (**self).write_all(buf)
    }
}

impl Stream for Box<dyn Stream> {}

#[derive(Debug)]
pub(crate) struct TcpSocket {
    reader: Mutex<TcpStream>,
    writer: Mutex<TcpStream>,
}

impl TcpSocket {
    /// Dial the gateway, waiting at most `timeout` for the TCP connection.
    pub fn connect(connection_url: &str, timeout: Duration) -> Result<Self, Error> {
        let address = connection_url
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Simple(format!("could not resolve address: {connection_url}")))?;

        let stream = TcpStream::connect_timeout(&address, timeout)?;
        Self::new(stream)
    }

    pub fn new(stream: TcpStream) -> Result<Self, Error> {
        let writer = stream.try_clone()?;

        stream.set_read_timeout(Some(GATEWAY_READ_TIMEOUT))?;

        Ok(Self {
            reader: Mutex::new(stream),
            writer: Mutex::new(writer),
        })
    }
}

impl Stream for TcpSocket {}

impl Io for TcpSocket {
    fn read_message(&self) -> Result<Vec<u8>, Error> {
        let mut reader = self.reader.lock()?;
        read_message(&mut *reader)
    }

    fn write_all(&self, buf: &[u8]) -> Result<(), Error> {
        let mut writer = self.writer.lock()?;
        writer.write_all(buf)?;
        Ok(())
    }
}

fn read_header(reader: &mut impl Read) -> Result<usize, Error> {
    let buffer = &mut [0_u8; 4];
    reader.read_exact(buffer)?;
    let mut reader = Cursor::new(buffer);
    let count = reader.read_u32::<BigEndian>()?;
    Ok(count as usize)
}

pub(crate) fn read_message(reader: &mut impl Read) -> Result<Vec<u8>, Error> {
    let message_size = read_header(reader)?;
    let mut data = vec![0_u8; message_size];
    reader.read_exact(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::encode_length;

    #[test]
    fn test_read_message_framing() {
        let packet = encode_length("58\x001\x009000\x001\x00");

        let message = read_message(&mut packet.as_slice()).expect("error reading framed message");

        assert_eq!(message, "58\x001\x009000\x001\x00".as_bytes());
    }

    #[test]
    fn test_read_message_truncated_payload() {
        let mut packet = encode_length("58\x001\x009000\x001\x00");
        packet.truncate(packet.len() - 3);

        let result = read_message(&mut packet.as_slice());

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_read_message_empty_stream() {
        let packet: Vec<u8> = Vec::new();

        let result = read_message(&mut packet.as_slice());

        assert!(matches!(result, Err(Error::Io(_))));
    }
}
