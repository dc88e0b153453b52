mod codec;
mod common;
mod communication;
mod error;
mod master;
mod messages;
mod notification;

pub use master::ModbusMasterConnection;
pub use master::ModbusMasterConnectionParams;
pub use master::TransactionState;

pub use communication::{ModbusSocket, RtuLink, RtuSettings, TcpLink, UdpLink};

pub use common::{ModbusDataType, ModbusSubprotocol};

pub use error::{ModbusError, ModbusResult};

pub use messages::{ExceptionCode, FunctionCode};

pub use notification::{
    format_hex, ChannelNotificationSink, ModbusEvent, ModbusNotificationSink,
    TracingNotificationSink,
};

pub use codec::rtu::{append_crc, crc16, validate_crc};
pub use codec::utils::{pack_coils, unpack_coils};

pub use tokio_serial::{Parity, StopBits};
