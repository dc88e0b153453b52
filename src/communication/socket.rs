use crate::codec::tcp::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN};
use crate::communication::accumulator::SerialFrameAccumulator;
use crate::error::{ModbusError, ModbusResult};

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

//This trait is meant to abstract TCP, UDP and RTU system sockets in order to unify behaviour
#[async_trait]
pub trait ModbusSocket: Send {
    async fn write(&mut self, data: &[u8]) -> ModbusResult<()>;

    /// Reads one candidate frame, giving up at `deadline`.
    ///
    /// `expected_len` is only a hint for links without framing of their own.
    async fn read_frame(&mut self, expected_len: usize, deadline: Instant) -> ModbusResult<Vec<u8>>;

    async fn close(&mut self) -> ModbusResult<()> {
        Ok(())
    }
}

fn connection_error(err: std::io::Error) -> ModbusError {
    ModbusError::Connection(err.to_string())
}

/// Modbus TCP over one persistent stream.
///
/// Bytes of a frame cut off by a deadline stay buffered, so the next read
/// picks up where the last one stopped and the stream never loses alignment.
pub struct TcpLink {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl TcpLink {
    pub fn new(stream: TcpStream) -> Self {
        TcpLink {
            stream,
            buffer: Vec::with_capacity(MBAP_HEADER_LEN + MAX_MBAP_LENGTH),
        }
    }

    /// Length of the first buffered frame, once all of it has arrived.
    fn complete_frame_len(&mut self) -> ModbusResult<Option<usize>> {
        if self.buffer.len() < MBAP_HEADER_LEN {
            return Ok(None);
        }

        let protocol_id = u16::from_be_bytes([self.buffer[2], self.buffer[3]]);
        let length = u16::from_be_bytes([self.buffer[4], self.buffer[5]]) as usize;
        if protocol_id != 0 || length < 2 || length > MAX_MBAP_LENGTH {
            self.resync();
            return Err(ModbusError::InvalidResponse(format!(
                "Invalid mbap header, protocol id {protocol_id}, length {length}"
            )));
        }

        let frame_len = MBAP_HEADER_LEN + length - 1;
        Ok((self.buffer.len() >= frame_len).then_some(frame_len))
    }

    //Drops everything buffered or already waiting on the socket
    fn resync(&mut self) {
        let dropped = self.buffer.len();
        self.buffer.clear();

        let mut chunk = [0u8; MBAP_HEADER_LEN + MAX_MBAP_LENGTH];
        let mut drained = 0;
        while let Ok(n) = self.stream.try_read(&mut chunk) {
            if n == 0 {
                break;
            }
            drained += n;
        }

        debug!(dropped, drained, "tcp stream out of sync, discarded pending bytes");
    }
}

#[async_trait]
impl ModbusSocket for TcpLink {
    async fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
        self.stream.write_all(data).await.map_err(connection_error)
    }

    async fn read_frame(&mut self, _expected_len: usize, deadline: Instant) -> ModbusResult<Vec<u8>> {
        let mut chunk = [0u8; MBAP_HEADER_LEN + MAX_MBAP_LENGTH];

        loop {
            if let Some(frame_len) = self.complete_frame_len()? {
                let frame: Vec<u8> = self.buffer.drain(..frame_len).collect();
                trace!(len = frame.len(), buffered = self.buffer.len(), "tcp frame read");
                return Ok(frame);
            }

            match timeout_at(deadline, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    return Err(ModbusError::Connection(
                        "connection closed by the slave".to_string(),
                    ))
                }
                Ok(Ok(n)) => self.buffer.extend_from_slice(&chunk[..n]),
                Ok(Err(err)) => return Err(connection_error(err)),
                //Whatever arrived so far stays buffered for the next read
                Err(_) => return Err(ModbusError::Timeout),
            }
        }
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.buffer.clear();
        self.stream.shutdown().await.map_err(connection_error)
    }
}

/// Modbus over UDP. Every request goes out from a freshly bound ephemeral
/// port and only the peer's answer on that port is accepted.
pub struct UdpLink {
    peer: SocketAddr,
    socket: Option<UdpSocket>,
}

impl UdpLink {
    pub fn new(peer: SocketAddr) -> Self {
        UdpLink { peer, socket: None }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|socket| socket.local_addr().ok())
    }
}

#[async_trait]
impl ModbusSocket for UdpLink {
    async fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
        let bind_address: SocketAddr = if self.peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(bind_address)
            .await
            .map_err(connection_error)?;
        socket
            .connect(self.peer)
            .await
            .map_err(connection_error)?;
        socket
            .send(data)
            .await
            .map_err(connection_error)?;

        debug!(local = ?socket.local_addr().ok(), peer = %self.peer, "udp request sent");
        self.socket = Some(socket);
        Ok(())
    }

    async fn read_frame(&mut self, _expected_len: usize, deadline: Instant) -> ModbusResult<Vec<u8>> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ModbusError::Connection("no request outstanding".to_string()))?;

        let mut buffer = [0u8; MBAP_HEADER_LEN + MAX_MBAP_LENGTH];
        match timeout_at(deadline, socket.recv(&mut buffer)).await {
            Ok(Ok(n)) => Ok(buffer[..n].to_vec()),
            Ok(Err(err)) => Err(connection_error(err)),
            Err(_) => Err(ModbusError::Timeout),
        }
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.socket = None;
        Ok(())
    }
}

/// Modbus RTU over any byte stream, normally a `tokio_serial::SerialStream`.
pub struct RtuLink<S> {
    stream: S,
    poll_interval: Duration,
}

impl<S> RtuLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, poll_interval: Duration) -> Self {
        RtuLink {
            stream,
            poll_interval,
        }
    }
}

#[async_trait]
impl<S> ModbusSocket for RtuLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
        self.stream.write_all(data).await.map_err(connection_error)?;
        self.stream.flush().await.map_err(connection_error)
    }

    async fn read_frame(&mut self, expected_len: usize, deadline: Instant) -> ModbusResult<Vec<u8>> {
        SerialFrameAccumulator::accumulate(
            &mut self.stream,
            expected_len,
            deadline,
            self.poll_interval,
        )
        .await
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.stream.shutdown().await.map_err(connection_error)
    }
}
