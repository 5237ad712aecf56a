//! Scripted server streams for driver tests.
use std::io::{self, Cursor, Read, Write};

use crate::block::Block;

use super::{
    Profile, Progress, QueryEvents, ServerCode, ServerException, TransportError, WireWrite,
    data::write_data_body,
    revision::{Feature, Revision},
};

/// Replays canned server bytes and records everything the client writes.
#[derive(Debug, Default)]
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
}

impl ScriptedStream {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            output: Vec::new(),
        }
    }

    pub fn written(&self) -> &[u8] {
        &self.output
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) fn write_exception<W: Write + ?Sized>(
    out: &mut W,
    records: &[ServerException],
) -> Result<(), TransportError> {
    for (i, record) in records.iter().enumerate() {
        out.write_fixed(record.code)?;
        out.write_string(&record.name)?;
        out.write_string(&record.display_text)?;
        out.write_string(&record.stack_trace)?;
        out.write_fixed(i + 1 < records.len())?;
    }
    Ok(())
}

/// Builds the bytes a server would send, packet by packet.
pub(crate) struct ServerScript {
    revision: Revision,
    bytes: Vec<u8>,
}

impl ServerScript {
    pub fn new(revision: u64) -> Self {
        Self {
            revision: Revision::negotiate(revision),
            bytes: Vec::new(),
        }
    }

    fn code(mut self, code: ServerCode) -> Self {
        self.bytes.write_varint(code as u64).unwrap();
        self
    }

    pub fn hello(mut self, name: &str, major: u64, minor: u64, revision: u64) -> Self {
        self = self.code(ServerCode::Hello);
        self.bytes.write_string(name).unwrap();
        self.bytes.write_varint(major).unwrap();
        self.bytes.write_varint(minor).unwrap();
        self.bytes.write_varint(revision).unwrap();
        if Revision::negotiate(revision).supports(Feature::ServerTimezone) {
            self.bytes.write_string("UTC").unwrap();
        }
        self
    }

    pub fn data(mut self, block: &Block) -> Self {
        self = self.code(ServerCode::Data);
        write_data_body(&mut self.bytes, self.revision, block).unwrap();
        self
    }

    pub fn progress(mut self, progress: Progress) -> Self {
        self = self.code(ServerCode::Progress);
        self.bytes.write_varint(progress.rows).unwrap();
        self.bytes.write_varint(progress.bytes).unwrap();
        if self.revision.supports(Feature::TotalRowsInProgress) {
            self.bytes
                .write_varint(progress.total_rows.unwrap_or_default())
                .unwrap();
        }
        self
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self = self.code(ServerCode::ProfileInfo);
        self.bytes.write_varint(profile.rows).unwrap();
        self.bytes.write_varint(profile.blocks).unwrap();
        self.bytes.write_varint(profile.bytes).unwrap();
        self.bytes.write_fixed(profile.applied_limit).unwrap();
        self.bytes.write_varint(profile.rows_before_limit).unwrap();
        self.bytes
            .write_fixed(profile.calculated_rows_before_limit)
            .unwrap();
        self
    }

    pub fn exception(mut self, records: &[ServerException]) -> Self {
        self = self.code(ServerCode::Exception);
        write_exception(&mut self.bytes, records).unwrap();
        self
    }

    pub fn pong(self) -> Self {
        self.code(ServerCode::Pong)
    }

    pub fn end_of_stream(self) -> Self {
        self.code(ServerCode::EndOfStream)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Data { columns: usize, rows: usize },
    Progress(Progress),
    Profile(Profile),
    Exception { code: i32, name: String, depth: usize },
    Finish,
}

/// Sink that remembers every notification in order.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub events: Vec<Event>,
}

impl QueryEvents for Recorder {
    fn on_data(&mut self, block: &Block) {
        self.events.push(Event::Data {
            columns: block.column_count(),
            rows: block.row_count(),
        });
    }

    fn on_progress(&mut self, progress: &Progress) {
        self.events.push(Event::Progress(*progress));
    }

    fn on_profile(&mut self, profile: &Profile) {
        self.events.push(Event::Profile(*profile));
    }

    fn on_server_exception(&mut self, exception: &ServerException) {
        self.events.push(Event::Exception {
            code: exception.code,
            name: exception.name.clone(),
            depth: exception.depth(),
        });
    }

    fn on_finish(&mut self) {
        self.events.push(Event::Finish);
    }
}
