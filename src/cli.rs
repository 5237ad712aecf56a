//! CLI utilities for chwire.
//!
//! [`prompt`] reads one [`Command`] from the user; [`PrintEvents`] renders query responses as
//! tab-separated text.
use std::io::{self, BufRead, Write};

use log::debug;

use crate::{
    Command,
    block::Block,
    command::CommandError,
    protocol::{Profile, Progress, QueryEvents, ServerException},
};

/// Prompt user for a command. End of input is treated as `.exit`.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CommandError>
where
    R: BufRead,
    W: Write,
{
    write!(&mut writer, ":) ")?;
    writer.flush()?;

    let mut s = String::default();
    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }
    s.as_str().try_into()
}

/// Writes result blocks to `out` and diagnostics to `err`.
pub struct PrintEvents<O: Write, E: Write> {
    out: O,
    err: E,
    rows: usize,
    header_written: bool,
    error: Option<io::Error>,
}

impl<O: Write, E: Write> PrintEvents<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            rows: 0,
            header_written: false,
            error: None,
        }
    }

    /// Rows printed since the last [`PrintEvents::reset`].
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn reset(&mut self) {
        self.rows = 0;
        self.header_written = false;
    }

    /// First write failure seen while printing, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
    }

    fn write_block(&mut self, block: &Block) -> io::Result<()> {
        if !self.header_written && block.column_count() > 0 {
            let names: Vec<_> = block.columns().iter().map(|c| c.name()).collect();
            writeln!(self.out, "{}", names.join("\t"))?;
            self.header_written = true;
        }

        for row in 0..block.row_count() {
            let values: Vec<_> = block
                .columns()
                .iter()
                .map(|c| c.column().value_text(row).unwrap_or_default())
                .collect();
            writeln!(self.out, "{}", values.join("\t"))?;
        }
        self.rows += block.row_count();
        Ok(())
    }

    fn write_exception(&mut self, exception: &ServerException) -> io::Result<()> {
        writeln!(self.err, "Received exception from server:")?;
        for (depth, e) in exception.chain().enumerate() {
            writeln!(self.err, "{:indent$}Code: {}. {}", "", e.code, e, indent = depth * 2)?;
        }
        Ok(())
    }
}

impl<O: Write, E: Write> QueryEvents for PrintEvents<O, E> {
    fn on_data(&mut self, block: &Block) {
        let result = self.write_block(block);
        self.record(result);
    }

    fn on_progress(&mut self, progress: &Progress) {
        debug!(
            "progress: {} rows, {} bytes, total {:?}",
            progress.rows, progress.bytes, progress.total_rows
        );
    }

    fn on_profile(&mut self, profile: &Profile) {
        debug!(
            "profile: {} rows in {} blocks, {} bytes",
            profile.rows, profile.blocks, profile.bytes
        );
    }

    fn on_server_exception(&mut self, exception: &ServerException) {
        let result = self.write_exception(exception);
        self.record(result);
    }

    fn on_finish(&mut self) {
        let result = self.out.flush();
        self.record(result);
    }
}
