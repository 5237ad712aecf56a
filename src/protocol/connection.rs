//! Packet dispatch state machine.
//!
//! A [`Connection`] owns one byte stream and runs at most one request/response cycle on it at a
//! time:
//!
//! ```text
//! Disconnected -> Handshaking -> Idle -> QueryInFlight -> Idle
//!                      |                      |
//!                      +----> Disconnected <--+   (fatal error)
//! ```
//!
//! Every request borrows the caller's [`QueryEvents`] sink through an `Exchange`, a scope guard
//! that releases the sink and settles the connection state when it is dropped. A response that
//! ended in EndOfStream or an Exception leaves the connection idle; anything else (transport
//! failure, unknown packet, undecodable block) leaves it disconnected because the stream position
//! can no longer be trusted.
use std::{
    io::{Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
};

use log::{debug, info, trace, warn};

use crate::block::{Block, BuiltinColumns, ColumnRegistry};

use super::{
    ClientError, ClientOptions, NoEvents, Profile, Progress, ProtocolError, ProtocolTransport,
    QueryEvents, ServerCode, ServerException, ServerInfo, WireRead,
    data::{read_data, write_data},
    exception::read_exception,
    request::{ClientInfo, write_hello, write_ping, write_query},
    revision::Revision,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Idle,
    QueryInFlight,
}

/// How a query response ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The server sent EndOfStream.
    Finished,
    /// The server reported an exception, already delivered to the sink, and rethrowing was off.
    ServerException,
}

/// Query text plus a per-call override of [`ClientOptions::rethrow_exceptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    rethrow: Option<bool>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rethrow: None,
        }
    }

    pub fn with_rethrow(mut self, rethrow: bool) -> Self {
        self.rethrow = Some(rethrow);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Query::new(value)
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Query::new(value)
    }
}

pub struct Connection<T: Read + Write> {
    transport: ProtocolTransport<T>,
    options: ClientOptions,
    registry: Box<dyn ColumnRegistry>,
    server: ServerInfo,
    revision: Revision,
    state: ConnectionState,
}

impl Connection<TcpStream> {
    /// Opens a TCP connection to `options.host:options.port` and performs the handshake.
    pub fn connect(options: ClientOptions) -> Result<Self, ClientError> {
        info!("connecting to {}:{}", options.host, options.port);

        let stream = match options.connect_timeout {
            None => TcpStream::connect((options.host.as_str(), options.port))?,
            Some(timeout) => {
                let mut last_error = None;
                let mut connected = None;
                for address in (options.host.as_str(), options.port).to_socket_addrs()? {
                    match TcpStream::connect_timeout(&address, timeout) {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(e) => {
                            debug!("connect to {address} failed: {e}");
                            last_error = Some(e);
                        }
                    }
                }
                match (connected, last_error) {
                    (Some(stream), _) => stream,
                    (None, Some(e)) => return Err(e.into()),
                    (None, None) => {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::AddrNotAvailable,
                            format!("'{}' did not resolve to any address", options.host),
                        )
                        .into());
                    }
                }
            }
        };

        stream.set_read_timeout(options.read_timeout)?;
        stream.set_write_timeout(options.write_timeout)?;
        stream.set_nodelay(true)?;

        Self::handshake(stream, options)
    }

    /// Second handle on the socket. Shutting it down makes any blocked call on this connection
    /// fail instead of hanging.
    pub fn cancel_handle(&self) -> Result<TcpStream, ClientError> {
        Ok(self.transport.get_ref().try_clone()?)
    }

    pub fn close(self) -> Result<(), ClientError> {
        let stream = self.transport.into_inner();
        match stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<T: Read + Write> Connection<T> {
    /// Runs the Hello exchange over an already open stream.
    ///
    /// Any failure, including an exception reported by the server, is returned as
    /// [`ClientError::Handshake`].
    pub fn handshake(stream: T, options: ClientOptions) -> Result<Self, ClientError> {
        let mut conn = Self {
            transport: ProtocolTransport::new(stream),
            options,
            registry: Box::new(BuiltinColumns),
            server: ServerInfo::default(),
            revision: Revision::new(0),
            state: ConnectionState::Handshaking,
        };

        match conn.exchange_hello() {
            Ok(()) => {
                conn.state = ConnectionState::Idle;
                info!(
                    "connected to {} {}.{} (revision {}, negotiated {})",
                    conn.server.name,
                    conn.server.version_major,
                    conn.server.version_minor,
                    conn.server.revision,
                    conn.revision
                );
                Ok(conn)
            }
            Err(e) => {
                warn!("handshake failed: {e}");
                Err(ClientError::Handshake(Box::new(e)))
            }
        }
    }

    fn exchange_hello(&mut self) -> Result<(), ClientError> {
        write_hello(&mut self.transport, &self.options)?;
        self.transport.flush()?;

        let code = ServerCode::try_from(self.transport.read_varint()?)?;
        debug!("handshake received {code:?}");
        match code {
            ServerCode::Hello => {
                self.server = ServerInfo::read(&mut self.transport)?;
                self.revision = Revision::negotiate(self.server.revision);
                Ok(())
            }
            ServerCode::Exception => Err(read_exception(&mut self.transport)?.into()),
            received => Err(ProtocolError::UnexpectedPacket {
                expected: "server hello",
                received,
            }
            .into()),
        }
    }

    /// Replaces the registry used to decode result columns.
    pub fn with_registry(mut self, registry: impl ColumnRegistry + 'static) -> Self {
        self.registry = Box::new(registry);
        self
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_usable(&self) -> bool {
        self.state == ConnectionState::Idle
    }

    /// Sends a query and feeds every response packet to `events` until the response ends.
    pub fn execute(
        &mut self,
        query: impl Into<Query>,
        events: &mut dyn QueryEvents,
    ) -> Result<Outcome, ClientError> {
        let query = query.into();
        let rethrow = query.rethrow.unwrap_or(self.options.rethrow_exceptions);

        let mut exchange = self.begin(events, rethrow)?;
        exchange.send_query(&query.text)?;
        exchange.receive_until_end()
    }

    /// Inserts `block` into `table_name`.
    ///
    /// The server first answers with a (normally empty) block describing the table; the rows
    /// are only sent once it has arrived. Server exceptions are always raised here.
    pub fn insert(&mut self, table_name: &str, block: &Block) -> Result<(), ClientError> {
        let mut events = NoEvents;
        let mut exchange = self.begin(&mut events, true)?;
        exchange.send_query(&format!("INSERT INTO {table_name} VALUES"))?;

        loop {
            match exchange.read_code()? {
                ServerCode::Progress => {
                    exchange.receive_progress()?;
                }
                ServerCode::Data => {
                    let schema = exchange.read_block()?;
                    trace!(
                        "insert into {table_name}: server expects {} columns",
                        schema.column_count()
                    );
                    break;
                }
                ServerCode::Exception => {
                    let exception = exchange.receive_exception()?;
                    return Err(exception.into());
                }
                received => {
                    return Err(ProtocolError::UnexpectedPacket {
                        expected: "data or progress before insert",
                        received,
                    }
                    .into());
                }
            }
        }

        debug!(
            "sending {} rows x {} columns to {table_name}",
            block.row_count(),
            block.column_count()
        );
        exchange.send_data(block)?;
        exchange.send_data(&Block::new())?;
        exchange.flush()?;

        exchange.receive_until_end()?;
        Ok(())
    }

    /// Sends a Ping and reads until the Pong.
    ///
    /// Progress, profile and data packets that arrive first are decoded and dropped. An
    /// EndOfStream also ends the exchange; server exceptions are always raised.
    pub fn ping(&mut self) -> Result<(), ClientError> {
        let mut events = NoEvents;
        let mut exchange = self.begin(&mut events, true)?;

        write_ping(&mut exchange.conn.transport)?;
        exchange.flush()?;

        loop {
            match exchange.read_code()? {
                ServerCode::Pong | ServerCode::EndOfStream => {
                    exchange.drained = true;
                    return Ok(());
                }
                ServerCode::Progress => exchange.receive_progress()?,
                ServerCode::ProfileInfo => {
                    Profile::read(&mut exchange.conn.transport)?;
                }
                ServerCode::Data => {
                    exchange.read_block()?;
                }
                ServerCode::Exception => {
                    let exception = exchange.receive_exception()?;
                    return Err(exception.into());
                }
                received @ ServerCode::Hello => {
                    return Err(ProtocolError::UnexpectedPacket {
                        expected: "pong",
                        received,
                    }
                    .into());
                }
            }
        }
    }

    fn begin<'c, 'e>(
        &'c mut self,
        events: &'e mut dyn QueryEvents,
        rethrow: bool,
    ) -> Result<Exchange<'c, 'e, T>, ClientError> {
        match self.state {
            ConnectionState::Idle => {}
            ConnectionState::QueryInFlight => return Err(ClientError::Busy),
            ConnectionState::Disconnected | ConnectionState::Handshaking => {
                return Err(ClientError::Disconnected);
            }
        }

        self.state = ConnectionState::QueryInFlight;
        Ok(Exchange {
            conn: self,
            events,
            rethrow,
            drained: false,
        })
    }
}

/// Where the receive loop stands after one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Finished,
    ServerException,
}

/// One request/response cycle. Holds the sink for exactly as long as the call runs.
struct Exchange<'c, 'e, T: Read + Write> {
    conn: &'c mut Connection<T>,
    events: &'e mut dyn QueryEvents,
    rethrow: bool,
    /// The server has finished its response; the stream is positioned at a packet boundary.
    drained: bool,
}

impl<T: Read + Write> Drop for Exchange<'_, '_, T> {
    fn drop(&mut self) {
        self.conn.state = if self.drained {
            ConnectionState::Idle
        } else {
            warn!("response was not fully received, closing connection");
            ConnectionState::Disconnected
        };
    }
}

impl<T: Read + Write> Exchange<'_, '_, T> {
    fn flush(&mut self) -> Result<(), ClientError> {
        Ok(self.conn.transport.flush()?)
    }

    fn send_query(&mut self, text: &str) -> Result<(), ClientError> {
        let query_id = self.conn.options.query_ids.generate().to_string();
        debug!("sending query {query_id}: {text}");

        let info = ClientInfo::new(&self.conn.options);
        let revision = self.conn.revision;
        let out = &mut self.conn.transport;
        write_query(out, revision, &query_id, &info, text)?;
        write_data(out, revision, &Block::new())?;
        self.flush()
    }

    fn send_data(&mut self, block: &Block) -> Result<(), ClientError> {
        Ok(write_data(&mut self.conn.transport, self.conn.revision, block)?)
    }

    fn read_code(&mut self) -> Result<ServerCode, ClientError> {
        let code = ServerCode::try_from(self.conn.transport.read_varint()?)?;
        debug!("received {code:?}");
        Ok(code)
    }

    fn read_block(&mut self) -> Result<Block, ClientError> {
        let conn = &mut *self.conn;
        read_data(&mut conn.transport, conn.revision, conn.registry.as_ref())
    }

    fn receive_progress(&mut self) -> Result<(), ClientError> {
        let progress = Progress::read(&mut self.conn.transport, self.conn.revision)?;
        self.events.on_progress(&progress);
        Ok(())
    }

    /// Decodes an exception chain and reports it. The server sends nothing after it.
    fn receive_exception(&mut self) -> Result<ServerException, ClientError> {
        let exception = read_exception(&mut self.conn.transport)?;
        self.drained = true;
        warn!("server exception: {exception}");
        self.events.on_server_exception(&exception);
        Ok(exception)
    }

    fn receive_packet(&mut self) -> Result<Step, ClientError> {
        match self.read_code()? {
            ServerCode::Data => {
                let block = self.read_block()?;
                self.events.on_data(&block);
                Ok(Step::Continue)
            }
            ServerCode::ProfileInfo => {
                let profile = Profile::read(&mut self.conn.transport)?;
                self.events.on_profile(&profile);
                Ok(Step::Continue)
            }
            ServerCode::Progress => {
                self.receive_progress()?;
                Ok(Step::Continue)
            }
            ServerCode::Pong => Ok(Step::Continue),
            ServerCode::EndOfStream => {
                self.drained = true;
                self.events.on_finish();
                Ok(Step::Finished)
            }
            ServerCode::Exception => {
                let exception = self.receive_exception()?;
                if self.rethrow {
                    Err(exception.into())
                } else {
                    Ok(Step::ServerException)
                }
            }
            received @ ServerCode::Hello => Err(ProtocolError::UnexpectedPacket {
                expected: "response packet",
                received,
            }
            .into()),
        }
    }

    fn receive_until_end(&mut self) -> Result<Outcome, ClientError> {
        loop {
            match self.receive_packet()? {
                Step::Continue => {}
                Step::Finished => return Ok(Outcome::Finished),
                Step::ServerException => return Ok(Outcome::ServerException),
            }
        }
    }
}
