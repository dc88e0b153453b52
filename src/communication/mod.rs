use crate::error::{ModbusError, ModbusResult};
use crate::notification::{log_line, ModbusEvent, ModbusNotificationSink};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info};

pub(crate) mod accumulator;
mod socket;

pub use socket::{ModbusSocket, RtuLink, TcpLink, UdpLink};

/// Serial port settings for Modbus RTU. Data bits are always 8.
#[derive(Clone, Debug, PartialEq)]
pub struct RtuSettings {
    pub device: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl RtuSettings {
    /// 9600 baud, even parity, one stop bit.
    pub fn new(device: impl Into<String>) -> Self {
        RtuSettings {
            device: device.into(),
            baud_rate: 9600,
            parity: Parity::Even,
            stop_bits: StopBits::One,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }
}

pub enum AddressingInfo {
    TcpConnection { address: SocketAddr },
    UdpConnection { address: SocketAddr },
    RtuConnection(RtuSettings),
    //Socket handed over already open by the caller
    Injected,
}

pub struct ModbusCommunicationInfo {
    comm: Option<Box<dyn ModbusSocket>>,
    addressing_info: AddressingInfo,
    sink: Arc<dyn ModbusNotificationSink>,
}

impl ModbusCommunicationInfo {
    pub fn new(addressing_info: AddressingInfo, sink: Arc<dyn ModbusNotificationSink>) -> Self {
        ModbusCommunicationInfo {
            comm: None,
            addressing_info,
            sink,
        }
    }

    pub fn from_socket(socket: Box<dyn ModbusSocket>, sink: Arc<dyn ModbusNotificationSink>) -> Self {
        ModbusCommunicationInfo {
            comm: Some(socket),
            addressing_info: AddressingInfo::Injected,
            sink,
        }
    }

    pub fn set_sink(&mut self, sink: Arc<dyn ModbusNotificationSink>) {
        self.sink = sink;
    }

    pub fn sink(&self) -> &Arc<dyn ModbusNotificationSink> {
        &self.sink
    }

    pub fn log(&self, text: &str) {
        self.sink.on_event(ModbusEvent::Log(log_line(text)));
    }

    pub async fn connect(&mut self, connect_timeout: Duration, poll_interval: Duration) -> ModbusResult<()> {
        if self.comm.is_some() {
            return Ok(());
        }

        let socket: Box<dyn ModbusSocket> = match &self.addressing_info {
            AddressingInfo::TcpConnection { address } => {
                self.log(&format!(
                    "Open TCP-Socket, IP-Address: {}, Port: {}",
                    address.ip(),
                    address.port()
                ));

                let stream = match timeout(connect_timeout, TcpStream::connect(address)).await {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(err)) => return Err(ModbusError::Connection(err.to_string())),
                    Err(_) => {
                        return Err(ModbusError::Connection("connection timed out".to_string()))
                    }
                };
                stream
                    .set_nodelay(true)
                    .map_err(|err| ModbusError::Connection(err.to_string()))?;

                Box::new(TcpLink::new(stream))
            }
            AddressingInfo::UdpConnection { address } => {
                self.log(&format!(
                    "Open UDP-Socket, IP-Address: {}, Port: {}",
                    address.ip(),
                    address.port()
                ));
                Box::new(UdpLink::new(*address))
            }
            AddressingInfo::RtuConnection(settings) => {
                self.log(&format!(
                    "Open Serial port {}, Baudrate: {}, Parity: {:?}, Stopbits: {:?}",
                    settings.device, settings.baud_rate, settings.parity, settings.stop_bits
                ));

                let port = tokio_serial::new(settings.device.as_str(), settings.baud_rate)
                    .data_bits(DataBits::Eight)
                    .parity(settings.parity)
                    .stop_bits(settings.stop_bits)
                    .open_native_async()
                    .map_err(|err| {
                        ModbusError::Connection(format!("{}: {}", settings.device, err))
                    })?;

                Box::new(RtuLink::new(port, poll_interval))
            }
            AddressingInfo::Injected => {
                return Err(ModbusError::Connection(
                    "injected socket was closed and cannot be reopened".to_string(),
                ))
            }
        };

        info!("modbus link open");
        self.comm = Some(socket);
        Ok(())
    }

    pub async fn disconnect(&mut self) -> ModbusResult<()> {
        if let Some(mut comm) = self.comm.take() {
            comm.close().await?;
            debug!("modbus link closed");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.comm.is_some()
    }

    fn socket(&mut self) -> ModbusResult<&mut Box<dyn ModbusSocket>> {
        self.comm
            .as_mut()
            .ok_or_else(|| ModbusError::Connection("not connected".to_string()))
    }

    pub async fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
        let socket = self
            .comm
            .as_mut()
            .ok_or_else(|| ModbusError::Connection("not connected".to_string()))?;
        self.sink.on_event(ModbusEvent::Sent(data.to_vec()));
        socket.write(data).await
    }

    pub async fn read_frame(&mut self, expected_len: usize, deadline: Instant) -> ModbusResult<Vec<u8>> {
        let frame = self.socket()?.read_frame(expected_len, deadline).await?;
        self.sink.on_event(ModbusEvent::Received(frame.clone()));
        Ok(frame)
    }
}
