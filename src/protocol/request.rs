//! Client-to-server packets: Hello, Query and Ping.
use std::io::Write;

use super::{
    ClientOptions, TransportError, WireWrite,
    revision::{CLIENT_REVISION, CLIENT_VERSION_MAJOR, CLIENT_VERSION_MINOR, Feature, Revision},
};

/// Packet codes sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    Hello = 0,
    Query = 1,
    Data = 2,
    Cancel = 3,
    Ping = 4,
}

impl From<ClientCode> for u64 {
    fn from(value: ClientCode) -> Self {
        value as u64
    }
}

/// Stage up to which the server should process a query.
const STAGE_COMPLETE: u64 = 2;
const COMPRESSION_DISABLED: u64 = 0;

const QUERY_KIND_INITIAL: u8 = 1;
const INTERFACE_TCP: u8 = 1;
const DEFAULT_INITIAL_ADDRESS: &str = "[::ffff:127.0.0.1]:0";

/// Describes the client to the server alongside every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub query_kind: u8,
    pub initial_user: String,
    pub initial_query_id: String,
    pub initial_address: String,
    pub interface: u8,
    pub os_user: String,
    pub client_hostname: String,
    pub client_name: String,
    pub version_major: u64,
    pub version_minor: u64,
    pub revision: u64,
    pub quota_key: String,
}

impl ClientInfo {
    pub fn new(options: &ClientOptions) -> Self {
        Self {
            query_kind: QUERY_KIND_INITIAL,
            initial_user: String::new(),
            initial_query_id: String::new(),
            initial_address: DEFAULT_INITIAL_ADDRESS.into(),
            interface: INTERFACE_TCP,
            os_user: String::new(),
            client_hostname: String::new(),
            client_name: options.client_name.clone(),
            version_major: CLIENT_VERSION_MAJOR,
            version_minor: CLIENT_VERSION_MINOR,
            revision: CLIENT_REVISION,
            quota_key: options.quota_key.clone(),
        }
    }

    fn write<W: Write + ?Sized>(&self, out: &mut W, revision: Revision) -> Result<(), TransportError> {
        out.write_fixed(self.query_kind)?;
        out.write_string(&self.initial_user)?;
        out.write_string(&self.initial_query_id)?;
        out.write_string(&self.initial_address)?;
        out.write_fixed(self.interface)?;

        out.write_string(&self.os_user)?;
        out.write_string(&self.client_hostname)?;
        out.write_string(&self.client_name)?;
        out.write_varint(self.version_major)?;
        out.write_varint(self.version_minor)?;
        out.write_varint(self.revision)?;

        if revision.supports(Feature::QuotaKeyInClientInfo) {
            out.write_string(&self.quota_key)?;
        }
        Ok(())
    }
}

pub(crate) fn write_hello<W: Write + ?Sized>(
    out: &mut W,
    options: &ClientOptions,
) -> Result<(), TransportError> {
    out.write_varint(ClientCode::Hello.into())?;
    out.write_string(&options.client_name)?;
    out.write_varint(CLIENT_VERSION_MAJOR)?;
    out.write_varint(CLIENT_VERSION_MINOR)?;
    out.write_varint(CLIENT_REVISION)?;
    out.write_string(&options.database)?;
    out.write_string(&options.user)?;
    out.write_string(&options.password)?;
    Ok(())
}

/// Writes a Query packet up to and including the query text. The caller follows it with an
/// empty data block.
pub(crate) fn write_query<W: Write + ?Sized>(
    out: &mut W,
    revision: Revision,
    query_id: &str,
    info: &ClientInfo,
    text: &str,
) -> Result<(), TransportError> {
    out.write_varint(ClientCode::Query.into())?;
    out.write_string(query_id)?;

    if revision.supports(Feature::ClientInfo) {
        info.write(out, revision)?;
    }

    // Per-query settings are not negotiated; an empty name ends the list.
    out.write_string("")?;

    out.write_varint(STAGE_COMPLETE)?;
    out.write_varint(COMPRESSION_DISABLED)?;
    out.write_string(text)?;
    Ok(())
}

pub(crate) fn write_ping<W: Write + ?Sized>(out: &mut W) -> Result<(), TransportError> {
    out.write_varint(ClientCode::Ping.into())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::protocol::WireRead;

    fn query_bytes(revision: u64, options: &ClientOptions) -> Vec<u8> {
        let mut out = Vec::new();
        let info = ClientInfo::new(options);
        write_query(&mut out, Revision::new(revision), "7", &info, "SELECT 1").unwrap();
        out
    }

    #[test]
    fn hello_layout() {
        let options = ClientOptions::default().with_credentials("alice", "pw");
        let mut out = Vec::new();
        write_hello(&mut out, &options).unwrap();

        let mut input = Cursor::new(out);
        assert_eq!(input.read_varint().unwrap(), 0);
        assert_eq!(input.read_string().unwrap(), "ClickHouse client");
        assert_eq!(input.read_varint().unwrap(), CLIENT_VERSION_MAJOR);
        assert_eq!(input.read_varint().unwrap(), CLIENT_VERSION_MINOR);
        assert_eq!(input.read_varint().unwrap(), CLIENT_REVISION);
        assert_eq!(input.read_string().unwrap(), "default");
        assert_eq!(input.read_string().unwrap(), "alice");
        assert_eq!(input.read_string().unwrap(), "pw");
    }

    #[test]
    fn query_without_client_info() {
        let revision = Feature::ClientInfo.min_revision() - 1;
        let mut input = Cursor::new(query_bytes(revision, &ClientOptions::default()));

        assert_eq!(input.read_varint().unwrap(), 1);
        assert_eq!(input.read_string().unwrap(), "7");
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.read_varint().unwrap(), STAGE_COMPLETE);
        assert_eq!(input.read_varint().unwrap(), COMPRESSION_DISABLED);
        assert_eq!(input.read_string().unwrap(), "SELECT 1");
        assert_eq!(input.position() as usize, input.get_ref().len());
    }

    #[test]
    fn query_with_client_info() {
        let options = ClientOptions::default().with_quota_key("q");
        let revision = Feature::QuotaKeyInClientInfo.min_revision() - 1;
        let mut input = Cursor::new(query_bytes(revision, &options));

        assert_eq!(input.read_varint().unwrap(), 1);
        assert_eq!(input.read_string().unwrap(), "7");
        assert_eq!(input.read_fixed::<u8>().unwrap(), QUERY_KIND_INITIAL);
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.read_string().unwrap(), DEFAULT_INITIAL_ADDRESS);
        assert_eq!(input.read_fixed::<u8>().unwrap(), INTERFACE_TCP);
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.read_string().unwrap(), "ClickHouse client");
        assert_eq!(input.read_varint().unwrap(), CLIENT_VERSION_MAJOR);
        assert_eq!(input.read_varint().unwrap(), CLIENT_VERSION_MINOR);
        assert_eq!(input.read_varint().unwrap(), CLIENT_REVISION);
        // No quota key below its revision: the settings terminator comes next.
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.read_varint().unwrap(), STAGE_COMPLETE);
    }

    #[test]
    fn quota_key_is_gated() {
        let options = ClientOptions::default().with_quota_key("q");
        let threshold = Feature::QuotaKeyInClientInfo.min_revision();

        let without = query_bytes(threshold - 1, &options);
        let with = query_bytes(threshold, &options);
        assert_eq!(with.len(), without.len() + 2);
    }

    #[test]
    fn ping_is_a_bare_code() {
        let mut out = Vec::new();
        write_ping(&mut out).unwrap();
        assert_eq!(out, vec![4]);
    }
}
