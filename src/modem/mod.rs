//! Modem link - the byte transport the pipelines talk through
//!
//! Everything above this module sees the modem only through [`Transport`],
//! so the pipelines run the same against the serial bridge and against a
//! scripted modem in tests.

pub mod bridge;
pub mod commands;
pub mod exchange;
pub mod response;

pub use bridge::TcpModemBridge;
pub use exchange::{Exchange, ExchangeReply, ExchangeSequence};

use thiserror::Error;

/// Error types for transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("modem link I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("modem link closed")]
    Closed,
}

/// Non-blocking byte channel to the modem
pub trait Transport {
    /// Queue bytes for the modem
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Return whatever bytes have arrived since the last call, possibly none
    fn poll_available(&mut self) -> Vec<u8>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn poll_available(&mut self) -> Vec<u8> {
        (**self).poll_available()
    }
}

/// Write a command line terminated by CRLF
pub fn write_line(transport: &mut dyn Transport, command: &str) -> Result<(), TransportError> {
    let mut line = Vec::with_capacity(command.len() + 2);
    line.extend_from_slice(command.as_bytes());
    line.extend_from_slice(b"\r\n");
    transport.write(&line)
}
