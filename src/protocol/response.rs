//! Server-to-client packet codes and the Hello, Progress and ProfileInfo payloads.
use std::io::Read;

use super::{
    ProtocolError, TransportError, WireRead,
    revision::{Feature, Revision},
};

/// Packet codes sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCode {
    Hello = 0,
    Data = 1,
    Exception = 2,
    Progress = 3,
    Pong = 4,
    EndOfStream = 5,
    ProfileInfo = 6,
}

impl TryFrom<u64> for ServerCode {
    type Error = ProtocolError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ServerCode::Hello),
            1 => Ok(ServerCode::Data),
            2 => Ok(ServerCode::Exception),
            3 => Ok(ServerCode::Progress),
            4 => Ok(ServerCode::Pong),
            5 => Ok(ServerCode::EndOfStream),
            6 => Ok(ServerCode::ProfileInfo),
            code => Err(ProtocolError::UnknownPacket(code)),
        }
    }
}

/// Server identity learned during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version_major: u64,
    pub version_minor: u64,
    pub revision: u64,
    pub timezone: Option<String>,
}

impl ServerInfo {
    /// Reads the body of a server Hello packet.
    pub(crate) fn read<R: Read + ?Sized>(input: &mut R) -> Result<Self, TransportError> {
        let name = input.read_string()?;
        let version_major = input.read_varint()?;
        let version_minor = input.read_varint()?;
        let revision = input.read_varint()?;

        let timezone = if Revision::negotiate(revision).supports(Feature::ServerTimezone) {
            Some(input.read_string()?)
        } else {
            None
        };

        Ok(Self {
            name,
            version_major,
            version_minor,
            revision,
            timezone,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub rows: u64,
    pub bytes: u64,
    /// Absent when the negotiated revision predates it.
    pub total_rows: Option<u64>,
}

impl Progress {
    pub(crate) fn read<R: Read + ?Sized>(
        input: &mut R,
        revision: Revision,
    ) -> Result<Self, TransportError> {
        let rows = input.read_varint()?;
        let bytes = input.read_varint()?;
        let total_rows = if revision.supports(Feature::TotalRowsInProgress) {
            Some(input.read_varint()?)
        } else {
            None
        };
        Ok(Self {
            rows,
            bytes,
            total_rows,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Profile {
    pub rows: u64,
    pub blocks: u64,
    pub bytes: u64,
    pub applied_limit: bool,
    pub rows_before_limit: u64,
    pub calculated_rows_before_limit: bool,
}

impl Profile {
    pub(crate) fn read<R: Read + ?Sized>(input: &mut R) -> Result<Self, TransportError> {
        Ok(Self {
            rows: input.read_varint()?,
            blocks: input.read_varint()?,
            bytes: input.read_varint()?,
            applied_limit: input.read_fixed()?,
            rows_before_limit: input.read_varint()?,
            calculated_rows_before_limit: input.read_fixed()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::protocol::{WireWrite, revision::CLIENT_REVISION};

    fn hello_bytes(revision: u64, timezone: Option<&str>) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_string("ClickHouse").unwrap();
        out.write_varint(21).unwrap();
        out.write_varint(8).unwrap();
        out.write_varint(revision).unwrap();
        if let Some(tz) = timezone {
            out.write_string(tz).unwrap();
        }
        out
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(ServerCode::try_from(5).unwrap(), ServerCode::EndOfStream);
        assert!(matches!(
            ServerCode::try_from(7),
            Err(ProtocolError::UnknownPacket(7))
        ));
    }

    #[test]
    fn hello_with_timezone() {
        let mut input = Cursor::new(hello_bytes(CLIENT_REVISION, Some("UTC")));
        let info = ServerInfo::read(&mut input).unwrap();

        assert_eq!(info.name, "ClickHouse");
        assert_eq!((info.version_major, info.version_minor), (21, 8));
        assert_eq!(info.timezone.as_deref(), Some("UTC"));
        assert_eq!(input.position() as usize, input.get_ref().len());
    }

    #[test]
    fn hello_before_timezone_revision() {
        let revision = Feature::ServerTimezone.min_revision() - 1;
        let mut bytes = hello_bytes(revision, None);
        let body_len = bytes.len();
        // Trailing data belongs to the next packet and must be left alone.
        bytes.push(0x04);

        let mut input = Cursor::new(bytes);
        let info = ServerInfo::read(&mut input).unwrap();
        assert_eq!(info.timezone, None);
        assert_eq!(input.position() as usize, body_len);
    }

    #[test]
    fn progress_total_rows_is_gated() {
        let threshold = Feature::TotalRowsInProgress.min_revision();
        let bytes = vec![10, 20, 30];

        let old = Progress::read(&mut Cursor::new(&bytes[..2]), Revision::new(threshold - 1));
        assert_eq!(
            old.unwrap(),
            Progress {
                rows: 10,
                bytes: 20,
                total_rows: None
            }
        );

        let new = Progress::read(&mut Cursor::new(&bytes[..]), Revision::new(threshold));
        assert_eq!(new.unwrap().total_rows, Some(30));

        let short = Progress::read(&mut Cursor::new(&bytes[..2]), Revision::new(threshold));
        assert!(matches!(short, Err(TransportError::Truncated)));
    }

    #[test]
    fn profile_fields_in_order() {
        let mut out = Vec::new();
        out.write_varint(100).unwrap();
        out.write_varint(2).unwrap();
        out.write_varint(4096).unwrap();
        out.write_fixed(true).unwrap();
        out.write_varint(1000).unwrap();
        out.write_fixed(false).unwrap();

        let profile = Profile::read(&mut Cursor::new(out)).unwrap();
        assert_eq!(
            profile,
            Profile {
                rows: 100,
                blocks: 2,
                bytes: 4096,
                applied_limit: true,
                rows_before_limit: 1000,
                calculated_rows_before_limit: false,
            }
        );
    }
}
