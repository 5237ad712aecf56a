//! Column value stores and the registry that maps wire type names onto them.
//!
//! The driver never looks inside a column: it only asks the [`ColumnRegistry`] for an empty
//! column by type name, tells it to [`Column::load`] exactly `N` values, or to [`Column::save`]
//! everything it holds. [`BuiltinColumns`] covers the fixed-width numeric types and `String`;
//! anything else can be plugged in through a custom registry.
use std::{
    any::Any,
    fmt,
    io::{Read, Write},
};

use bincode::{Decode, Encode};

use crate::protocol::{TransportError, WireRead, WireWrite};

/// Upper bound on up-front allocation when a block announces its row count.
const MAX_PREALLOCATED_ROWS: usize = 1 << 16;

/// Columnar value store for a single wire type.
pub trait Column: fmt::Debug + Send {
    /// Wire type name, e.g. `UInt64`.
    fn type_name(&self) -> &str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends exactly `rows` values read from `input`.
    fn load(&mut self, input: &mut dyn Read, rows: usize) -> Result<(), TransportError>;

    /// Writes every stored value to `output`.
    fn save(&self, output: &mut dyn Write) -> Result<(), TransportError>;

    /// Text rendering of one value, `None` when `row` is out of range.
    fn value_text(&self, row: usize) -> Option<String>;

    fn as_any(&self) -> &dyn Any;
}

/// Resolves wire type names into empty columns.
pub trait ColumnRegistry: Send {
    fn resolve(&self, type_name: &str) -> Option<Box<dyn Column>>;
}

/// Rust scalars with a fixed-width little-endian wire encoding.
pub trait NativeType: Encode + Decode<()> + Copy + fmt::Debug + fmt::Display + Send + 'static {
    const NAME: &'static str;
}

macro_rules! native_type {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(impl NativeType for $ty {
            const NAME: &'static str = $name;
        })*
    };
}

native_type! {
    u8 => "UInt8",
    u16 => "UInt16",
    u32 => "UInt32",
    u64 => "UInt64",
    i8 => "Int8",
    i16 => "Int16",
    i32 => "Int32",
    i64 => "Int64",
    f32 => "Float32",
    f64 => "Float64",
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumericColumn<T> {
    values: Vec<T>,
}

impl<T: NativeType> NumericColumn<T> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn push(&mut self, value: T) {
        self.values.push(value);
    }
}

impl<T: NativeType> From<Vec<T>> for NumericColumn<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T: NativeType> Column for NumericColumn<T> {
    fn type_name(&self) -> &str {
        T::NAME
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn load(&mut self, input: &mut dyn Read, rows: usize) -> Result<(), TransportError> {
        self.values.reserve(rows.min(MAX_PREALLOCATED_ROWS));
        for _ in 0..rows {
            self.values.push(input.read_fixed()?);
        }
        Ok(())
    }

    fn save(&self, output: &mut dyn Write) -> Result<(), TransportError> {
        for value in &self.values {
            output.write_fixed(*value)?;
        }
        Ok(())
    }

    fn value_text(&self, row: usize) -> Option<String> {
        self.values.get(row).map(ToString::to_string)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringColumn {
    values: Vec<String>,
}

impl StringColumn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }
}

impl<S: Into<String>> FromIterator<S> for StringColumn {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl Column for StringColumn {
    fn type_name(&self) -> &str {
        "String"
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn load(&mut self, input: &mut dyn Read, rows: usize) -> Result<(), TransportError> {
        self.values.reserve(rows.min(MAX_PREALLOCATED_ROWS));
        for _ in 0..rows {
            self.values.push(input.read_string()?);
        }
        Ok(())
    }

    fn save(&self, output: &mut dyn Write) -> Result<(), TransportError> {
        for value in &self.values {
            output.write_string(value)?;
        }
        Ok(())
    }

    fn value_text(&self, row: usize) -> Option<String> {
        self.values.get(row).cloned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registry for the numeric types and `String`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinColumns;

impl ColumnRegistry for BuiltinColumns {
    fn resolve(&self, type_name: &str) -> Option<Box<dyn Column>> {
        let column: Box<dyn Column> = match type_name {
            "UInt8" => Box::new(NumericColumn::<u8>::new()),
            "UInt16" => Box::new(NumericColumn::<u16>::new()),
            "UInt32" => Box::new(NumericColumn::<u32>::new()),
            "UInt64" => Box::new(NumericColumn::<u64>::new()),
            "Int8" => Box::new(NumericColumn::<i8>::new()),
            "Int16" => Box::new(NumericColumn::<i16>::new()),
            "Int32" => Box::new(NumericColumn::<i32>::new()),
            "Int64" => Box::new(NumericColumn::<i64>::new()),
            "Float32" => Box::new(NumericColumn::<f32>::new()),
            "Float64" => Box::new(NumericColumn::<f64>::new()),
            "String" => Box::new(StringColumn::new()),
            _ => return None,
        };
        Some(column)
    }
}
