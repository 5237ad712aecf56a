pub mod block;
pub mod cli;
pub mod command;
pub mod protocol;

pub use block::Block;
pub use cli::{PrintEvents, prompt};
pub use command::Command;
pub use protocol::{ClientError, ClientOptions, Connection, Outcome, Query, QueryEvents};
