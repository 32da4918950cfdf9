//! TCP bridge to a modem serial line
//!
//! On a host, the modem UART is exposed as a TCP stream (ser2net or a
//! simulator). Reader and writer tasks move bytes through channels so the
//! synchronous [`Transport`] calls never wait on the socket.

use crate::modem::{Transport, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 1024;

/// Transport backed by a TCP connection to the modem
pub struct TcpModemBridge {
    outgoing: UnboundedSender<Vec<u8>>,
    incoming: UnboundedReceiver<Vec<u8>>,
    closed: bool,
}

impl TcpModemBridge {
    /// Connect to the modem bridge at `address`
    pub async fn connect(address: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address).await?;
        info!("Connected to modem at {}", address);
        Ok(Self::from_stream(stream))
    }

    /// Wrap an established stream; must be called inside a tokio runtime
    pub fn from_stream(stream: TcpStream) -> Self {
        let (mut reader, mut writer) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        debug!("Modem link reached EOF");
                        break;
                    }
                    Ok(n) => {
                        if in_tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Modem link read failed: {}", e);
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                if let Err(e) = writer.write_all(&bytes).await {
                    warn!("Modem link write failed: {}", e);
                    break;
                }
            }
        });

        Self {
            outgoing: out_tx,
            incoming: in_rx,
            closed: false,
        }
    }

    /// False once the reader side has shut down
    pub fn is_connected(&self) -> bool {
        !self.closed
    }
}

impl Transport for TcpModemBridge {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.outgoing
            .send(bytes.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn poll_available(&mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        loop {
            match self.incoming.try_recv() {
                Ok(chunk) => bytes.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        bytes
    }
}
