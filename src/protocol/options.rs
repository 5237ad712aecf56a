use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use super::revision::CLIENT_NAME;

pub const DEFAULT_PORT: u16 = 9000;

/// Source of query ids.
///
/// Clones share one counter, so connections opened from clones of the same [`ClientOptions`]
/// never hand out the same id.
#[derive(Debug, Clone, Default)]
pub struct QueryIdGenerator(Arc<AtomicU64>);

impl QueryIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id, starting at 1.
    pub fn generate(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub quota_key: String,
    pub client_name: String,
    /// Raise server exceptions as errors in addition to reporting them to the event sink.
    pub rethrow_exceptions: bool,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub query_ids: QueryIdGenerator,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            database: "default".into(),
            user: "default".into(),
            password: String::new(),
            quota_key: String::new(),
            client_name: CLIENT_NAME.into(),
            rethrow_exceptions: true,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            query_ids: QueryIdGenerator::new(),
        }
    }
}

impl ClientOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_quota_key(mut self, quota_key: impl Into<String>) -> Self {
        self.quota_key = quota_key.into();
        self
    }

    pub fn with_rethrow_exceptions(mut self, rethrow: bool) -> Self {
        self.rethrow_exceptions = rethrow;
        self
    }

    /// Applies the same timeout to connect, read and write.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }

    pub fn with_query_ids(mut self, query_ids: QueryIdGenerator) -> Self {
        self.query_ids = query_ids;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_ids_increase() {
        let ids = QueryIdGenerator::new();
        assert_eq!(ids.generate(), 1);
        assert_eq!(ids.generate(), 2);
    }

    #[test]
    fn cloned_options_share_query_ids() {
        let a = ClientOptions::default();
        let b = a.clone();

        let first = a.query_ids.generate();
        let second = b.query_ids.generate();
        assert_ne!(first, second);
    }

    #[test]
    fn builder_overrides_defaults() {
        let options = ClientOptions::new("db", 9440)
            .with_database("metrics")
            .with_credentials("reader", "secret")
            .with_rethrow_exceptions(false)
            .with_timeout(Duration::from_secs(3));

        assert_eq!(options.host, "db");
        assert_eq!(options.database, "metrics");
        assert_eq!(options.user, "reader");
        assert!(!options.rethrow_exceptions);
        assert_eq!(options.read_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.client_name, CLIENT_NAME);
    }
}
