//! Data packet body: optional temporary table name, optional block info, then the block.
//!
//! ```text
//! [table name: string]          revision >= TemporaryTables
//! [1 overflow: bool              revision >= BlockInfo
//!  2 bucket: i32
//!  0]
//! columns: varint, rows: varint
//! columns x (name: string, type: string, values)
//! ```
use std::io::{Read, Write};

use log::trace;

use crate::block::{Block, BlockInfo, ColumnRegistry};

use super::{
    ClientError, ProtocolError, TransportError, WireRead, WireWrite,
    request::ClientCode,
    revision::{Feature, Revision},
};

const BLOCK_INFO_END: u64 = 0;
const BLOCK_INFO_OVERFLOWS: u64 = 1;
const BLOCK_INFO_BUCKET_NUM: u64 = 2;

pub(crate) fn read_block_info<R: Read + ?Sized>(input: &mut R) -> Result<BlockInfo, ClientError> {
    let mut info = BlockInfo::default();
    loop {
        match input.read_varint()? {
            BLOCK_INFO_END => return Ok(info),
            BLOCK_INFO_OVERFLOWS => info.is_overflows = input.read_fixed()?,
            BLOCK_INFO_BUCKET_NUM => info.bucket_num = input.read_fixed()?,
            field => return Err(ProtocolError::UnknownBlockInfoField(field).into()),
        }
    }
}

/// Always writes both fields so the section has the same shape for every block.
pub(crate) fn write_block_info<W: Write + ?Sized>(
    out: &mut W,
    info: BlockInfo,
) -> Result<(), TransportError> {
    out.write_varint(BLOCK_INFO_OVERFLOWS)?;
    out.write_fixed(info.is_overflows)?;
    out.write_varint(BLOCK_INFO_BUCKET_NUM)?;
    out.write_fixed(info.bucket_num)?;
    out.write_varint(BLOCK_INFO_END)
}

/// Reads a data packet body (the packet code has already been consumed).
///
/// A column type the registry cannot resolve aborts the whole read: its values cannot be
/// skipped, so the stream is out of sync from here on.
pub(crate) fn read_data<R: Read + ?Sized>(
    input: &mut R,
    revision: Revision,
    registry: &dyn ColumnRegistry,
) -> Result<Block, ClientError> {
    if revision.supports(Feature::TemporaryTables) {
        let _table = input.read_string()?;
    }
    let info = if revision.supports(Feature::BlockInfo) {
        read_block_info(input)?
    } else {
        BlockInfo::default()
    };

    let columns = input.read_len()?;
    let rows = input.read_len()?;
    trace!("reading block of {columns} columns x {rows} rows");

    let mut block = Block::with_rows(rows);
    block.set_info(info);

    for _ in 0..columns {
        let name = input.read_string()?;
        let type_name = input.read_string()?;

        let mut column = registry
            .resolve(&type_name)
            .ok_or(ProtocolError::UnknownColumnType(type_name))?;
        if rows > 0 {
            let mut reader: &mut R = &mut *input;
            column.load(&mut reader, rows)?;
        }
        block.append_column(name, column).map_err(ProtocolError::from)?;
    }

    Ok(block)
}

/// Writes a client Data packet, code included.
pub(crate) fn write_data<W: Write + ?Sized>(
    out: &mut W,
    revision: Revision,
    block: &Block,
) -> Result<(), TransportError> {
    out.write_varint(ClientCode::Data.into())?;
    write_data_body(out, revision, block)
}

pub(crate) fn write_data_body<W: Write + ?Sized>(
    out: &mut W,
    revision: Revision,
    block: &Block,
) -> Result<(), TransportError> {
    if revision.supports(Feature::TemporaryTables) {
        out.write_string("")?;
    }
    if revision.supports(Feature::BlockInfo) {
        write_block_info(out, block.info())?;
    }

    out.write_len(block.column_count())?;
    out.write_len(block.row_count())?;

    for named in block.columns() {
        out.write_string(named.name())?;
        out.write_string(named.type_name())?;
        let mut writer: &mut W = &mut *out;
        named.column().save(&mut writer)?;
    }
    Ok(())
}
