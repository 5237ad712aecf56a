//! Shell commands.
//!
//! Lines starting with `.` are client commands; anything else is sent to the server verbatim.
//!
//! - `.exit`: close the connection and leave the shell.
//! - `.ping`: check that the server is alive.
//! - `.server`: print what the server reported during the handshake.
//!
//! # Example
//! ```rust
//! use chwire::Command;
//!
//! let cmd: Command = "SELECT 1".try_into().unwrap();
//! assert_eq!(cmd, Command::Query("SELECT 1".into()));
//! ```
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("no command provided")]
    Empty,

    #[error("failed to read command: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Ping,
    ServerInfo,
    Query(String),
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "" => Err(CommandError::Empty),
            ".exit" | ".quit" => Ok(Command::Exit),
            ".ping" => Ok(Command::Ping),
            ".server" => Ok(Command::ServerInfo),
            s if s.starts_with('.') => Err(CommandError::UnrecognizedCommand(s.to_string())),
            s => Ok(Command::Query(s.trim_end_matches(';').to_string())),
        }
    }
}
