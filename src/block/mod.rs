//! Columnar batches exchanged with the server.
//!
//! A [`Block`] is an ordered list of named, typed columns that all hold the same number of
//! values, plus a small [`BlockInfo`] header used by distributed aggregation. Blocks flow in both
//! directions: the server streams query results as blocks, and inserts ship one block of rows.
//!
//! A block with no columns and no rows is a valid value; the protocol uses it as an
//! end-of-data marker.
//!
//! # Example
//! ```rust
//! use chwire::block::{Block, NumericColumn, StringColumn};
//!
//! let mut block = Block::new();
//! block
//!     .append_column("id", Box::new(NumericColumn::from(vec![1u64, 2])))
//!     .unwrap();
//! block
//!     .append_column("name", Box::new(["a", "b"].into_iter().collect::<StringColumn>()))
//!     .unwrap();
//!
//! assert_eq!(block.column_count(), 2);
//! assert_eq!(block.row_count(), 2);
//! ```
pub mod column;

use thiserror::Error;

pub use column::{BuiltinColumns, Column, ColumnRegistry, NativeType, NumericColumn, StringColumn};

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("column '{column}' holds {actual} values, block has {expected} rows")]
    RowCountMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Per-block metadata for two-level aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub is_overflows: bool,
    pub bucket_num: i32,
}

impl Default for BlockInfo {
    fn default() -> Self {
        Self {
            is_overflows: false,
            bucket_num: -1,
        }
    }
}

#[derive(Debug)]
pub struct NamedColumn {
    name: String,
    column: Box<dyn Column>,
}

impl NamedColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        self.column.type_name()
    }

    pub fn column(&self) -> &dyn Column {
        self.column.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct Block {
    info: BlockInfo,
    rows: usize,
    // Set when the row count came from the wire rather than from the first column.
    declared: bool,
    columns: Vec<NamedColumn>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block whose row count is fixed up front; every appended column must match it.
    pub fn with_rows(rows: usize) -> Self {
        Self {
            rows,
            declared: true,
            ..Self::default()
        }
    }

    pub fn info(&self) -> BlockInfo {
        self.info
    }

    pub fn set_info(&mut self, info: BlockInfo) {
        self.info = info;
    }

    pub fn append_column(
        &mut self,
        name: impl Into<String>,
        column: Box<dyn Column>,
    ) -> Result<(), BlockError> {
        let name = name.into();
        if self.columns.is_empty() && !self.declared {
            self.rows = column.len();
        } else if column.len() != self.rows {
            return Err(BlockError::RowCountMismatch {
                column: name,
                expected: self.rows,
                actual: column.len(),
            });
        }

        self.columns.push(NamedColumn { name, column });
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// True for the end-of-data marker shape: no columns, no rows.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows == 0
    }

    pub fn columns(&self) -> &[NamedColumn] {
        &self.columns
    }

    /// First column with the given name.
    pub fn column(&self, name: &str) -> Option<&dyn Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(NamedColumn::column)
    }
}
