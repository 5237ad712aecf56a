//! Byte-stream transport and wire framing primitives.
//!
//! Every packet on the native protocol is built out of three primitives:
//!
//! - unsigned LEB128 varints for packet codes, lengths and counts,
//! - fixed-width little-endian scalars for flags, codes and bucket numbers,
//! - varint length-prefixed byte strings.
//!
//! The primitives are exposed as the [`WireRead`] and [`WireWrite`] extension traits, blanket
//! implemented for every [`Read`]/[`Write`], so that column codecs can use them on a
//! `&mut dyn Read` just like the driver does on a [`ProtocolTransport`].
//!
//! No read ever returns a partially decoded value: a stream that ends early yields
//! [`TransportError::Truncated`].
use std::io::{self, BufReader, Read, Write};

use bincode::{
    Decode, Encode,
    config::{Configuration, Fixint, LittleEndian},
    decode_from_std_read, encode_into_std_write,
    error::DecodeError,
};
use log::trace;
use thiserror::Error;

/// Longest LEB128 encoding of a `u64`.
const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode value: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("stream ended before a complete value was read")]
    Truncated,
    #[error("malformed value on the wire: {0}")]
    Malformed(String),
    #[error("Transport IO Error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for TransportError {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::UnexpectedEof => TransportError::Truncated,
            _ => TransportError::Io(value),
        }
    }
}

impl From<DecodeError> for TransportError {
    fn from(value: DecodeError) -> Self {
        match value {
            DecodeError::UnexpectedEnd { .. } => TransportError::Truncated,
            DecodeError::Io { inner, .. } => inner.into(),
            other => TransportError::Malformed(other.to_string()),
        }
    }
}

fn wire_config() -> Configuration<LittleEndian, Fixint> {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

/// Decoding half of the wire format.
pub trait WireRead: Read {
    fn read_varint(&mut self) -> Result<u64, TransportError> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let mut byte = [0u8; 1];
            self.read_exact(&mut byte)?;

            let bits = u64::from(byte[0] & 0x7f);
            if i == MAX_VARINT_LEN - 1 && bits > 1 {
                break;
            }
            value |= bits << (7 * i);

            if byte[0] & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(TransportError::Malformed(
            "varint does not fit in 64 bits".into(),
        ))
    }

    /// Reads a varint that is used as an in-memory count or length.
    fn read_len(&mut self) -> Result<usize, TransportError> {
        let len = self.read_varint()?;
        usize::try_from(len)
            .map_err(|_| TransportError::Malformed(format!("length {len} overflows usize")))
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>, TransportError> {
        let len = self.read_len()?;
        let mut buf = Vec::new();
        // `take` keeps a bogus prefix from allocating more than the stream can deliver.
        Read::take(&mut *self, len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(TransportError::Truncated);
        }
        Ok(buf)
    }

    fn read_string(&mut self) -> Result<String, TransportError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| TransportError::Malformed(e.to_string()))
    }

    fn read_fixed<D: Decode<()>>(&mut self) -> Result<D, TransportError> {
        let mut reader = self;
        Ok(decode_from_std_read(&mut reader, wire_config())?)
    }
}

impl<R: Read + ?Sized> WireRead for R {}

/// Encoding half of the wire format.
pub trait WireWrite: Write {
    fn write_varint(&mut self, mut value: u64) -> Result<(), TransportError> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let mut len = 0;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                buf[len] = byte;
                len += 1;
                break;
            }
            buf[len] = byte | 0x80;
            len += 1;
        }
        self.write_all(&buf[..len])?;
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<(), TransportError> {
        self.write_varint(len as u64)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.write_len(bytes.len())?;
        self.write_all(bytes)?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), TransportError> {
        self.write_bytes(value.as_bytes())
    }

    fn write_fixed<E: Encode>(&mut self, value: E) -> Result<(), TransportError> {
        let mut writer = self;
        encode_into_std_write(value, &mut writer, wire_config())?;
        Ok(())
    }
}

impl<W: Write + ?Sized> WireWrite for W {}

/// Buffered, packet-oriented view over a bidirectional stream.
///
/// Reads go through a [`BufReader`]; writes are staged in memory and only reach the stream on
/// [`ProtocolTransport::flush`], so that a packet is handed to the socket in one piece.
pub struct ProtocolTransport<T: Read + Write> {
    stream: BufReader<T>,
    out: Vec<u8>,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream: BufReader::new(stream),
            out: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    pub fn into_inner(self) -> T {
        self.stream.into_inner()
    }

    /// Bytes written since the last flush.
    pub fn pending(&self) -> &[u8] {
        &self.out
    }
}

impl<T: Read + Write> Read for ProtocolTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl<T: Read + Write> Write for ProtocolTransport<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.out.is_empty() {
            trace!("flushing {} bytes", self.out.len());
            let inner = self.stream.get_mut();
            inner.write_all(&self.out)?;
            self.out.clear();
        }
        self.stream.get_mut().flush()
    }
}
