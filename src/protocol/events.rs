//! Caller-supplied sink for decoded server packets.
//!
//! A sink is borrowed by the connection for a single call and released when that call returns,
//! whichever way it returns.
use crate::block::Block;

use super::{Profile, Progress, ServerException};

/// Notifications produced while a response is being received. Every method defaults to a
/// no-op, so implementors only override what they care about.
pub trait QueryEvents {
    fn on_data(&mut self, _block: &Block) {}

    fn on_progress(&mut self, _progress: &Progress) {}

    fn on_profile(&mut self, _profile: &Profile) {}

    fn on_server_exception(&mut self, _exception: &ServerException) {}

    fn on_finish(&mut self) {}
}

/// Sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl QueryEvents for NoEvents {}
