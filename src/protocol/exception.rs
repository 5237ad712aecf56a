//! Server exception chains.
//!
//! An Exception packet carries one or more records, outermost first. Each record ends with a
//! boolean telling whether a nested cause follows, so the chain is decoded iteratively and then
//! linked bottom-up into owned [`ServerException`] nodes.
use std::io::Read;

use thiserror::Error;

use super::{TransportError, WireRead};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name} (code {code}): {display_text}")]
pub struct ServerException {
    pub code: i32,
    pub name: String,
    pub display_text: String,
    pub stack_trace: String,
    #[source]
    pub nested: Option<Box<ServerException>>,
}

impl ServerException {
    /// This exception followed by its causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ServerException> {
        std::iter::successors(Some(self), |e| e.nested.as_deref())
    }

    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// Innermost cause.
    pub fn root_cause(&self) -> &ServerException {
        self.chain().last().unwrap_or(self)
    }
}

pub(crate) fn read_exception<R: Read + ?Sized>(
    input: &mut R,
) -> Result<ServerException, TransportError> {
    let mut records = Vec::new();
    loop {
        let code: i32 = input.read_fixed()?;
        let name = input.read_string()?;
        let display_text = input.read_string()?;
        let stack_trace = input.read_string()?;
        let has_nested: bool = input.read_fixed()?;

        records.push(ServerException {
            code,
            name,
            display_text,
            stack_trace,
            nested: None,
        });

        if !has_nested {
            break;
        }
    }

    let mut head: Option<ServerException> = None;
    while let Some(mut record) = records.pop() {
        record.nested = head.take().map(Box::new);
        head = Some(record);
    }
    head.ok_or_else(|| TransportError::Malformed("empty exception chain".into()))
}
