//! Protocol revision gate.
//!
//! Optional wire fields are introduced at a given server revision. Every encoder and decoder
//! asks [`Revision::supports`] about the same [`Feature`], which keeps the read and write paths
//! symmetric.
use std::fmt;

pub const CLIENT_NAME: &str = "ClickHouse client";
pub const CLIENT_VERSION_MAJOR: u64 = 1;
pub const CLIENT_VERSION_MINOR: u64 = 1;
pub const CLIENT_REVISION: u64 = 54126;

/// Wire fields that only exist from a certain revision onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Temporary table name ahead of every data block.
    TemporaryTables,
    /// `total_rows` in progress packets.
    TotalRowsInProgress,
    /// Index-tagged block info section in data packets.
    BlockInfo,
    /// Full client info in query packets.
    ClientInfo,
    /// Timezone string in the server hello.
    ServerTimezone,
    /// Quota key at the end of the client info.
    QuotaKeyInClientInfo,
}

impl Feature {
    pub const fn min_revision(self) -> u64 {
        match self {
            Feature::TemporaryTables => 50264,
            Feature::TotalRowsInProgress => 51554,
            Feature::BlockInfo => 51903,
            Feature::ClientInfo => 54032,
            Feature::ServerTimezone => 54058,
            Feature::QuotaKeyInClientInfo => 54060,
        }
    }
}

/// Revision both sides agreed on during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Revision(u64);

impl Revision {
    pub const fn new(revision: u64) -> Self {
        Self(revision)
    }

    /// The server speaks at most its own revision and never more than ours.
    pub fn negotiate(server_revision: u64) -> Self {
        Self(server_revision.min(CLIENT_REVISION))
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn supports(self, feature: Feature) -> bool {
        self.0 >= feature.min_revision()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
