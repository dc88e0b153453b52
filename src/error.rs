use crate::messages::ExceptionCode;

use thiserror::Error;

pub type ModbusResult<T> = Result<T, ModbusError>;

#[derive(Debug, Error)]
pub enum ModbusError {
    /// Port or socket not open, or the connect attempt failed / timed out
    #[error("connection error: {0}")]
    Connection(String),

    /// Address or quantity outside the function's valid range, raised before any I/O
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("no response from modbus slave")]
    Timeout,

    #[error("response CRC check failed")]
    CrcCheckFailed,

    #[error("function code not supported by slave")]
    FunctionCodeNotSupported,

    #[error("starting address invalid or starting address + quantity invalid")]
    StartingAddressInvalid,

    #[error("quantity invalid")]
    QuantityInvalid,

    /// Slave device failure (exception code 4) or an exception code we don't know
    #[error("slave device failure, exception code {0}")]
    Modbus(u8),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModbusError {
    pub fn from_exception_code(exception_code: u8) -> Self {
        match ExceptionCode::try_from(exception_code) {
            Ok(ExceptionCode::IllegalFunction) => ModbusError::FunctionCodeNotSupported,
            Ok(ExceptionCode::IllegalDataAddress) => ModbusError::StartingAddressInvalid,
            Ok(ExceptionCode::IllegalDataValue) => ModbusError::QuantityInvalid,
            Ok(ExceptionCode::ServerDeviceFailure) | Err(_) => ModbusError::Modbus(exception_code),
        }
    }

    /// Only a missing or corrupted response is worth sending the request again for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModbusError::Timeout | ModbusError::CrcCheckFailed)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ModbusError::Connection(_) => "ConnectionException",
            ModbusError::Argument(_) => "ArgumentException",
            ModbusError::Timeout => "TimeoutException",
            ModbusError::CrcCheckFailed => "CRCCheckFailedException",
            ModbusError::FunctionCodeNotSupported => "FunctionCodeNotSupportedException",
            ModbusError::StartingAddressInvalid => "StartingAddressInvalidException",
            ModbusError::QuantityInvalid => "QuantityInvalidException",
            ModbusError::Modbus(_) => "ModbusException",
            ModbusError::InvalidResponse(_) => "InvalidResponseException",
            ModbusError::Io(_) => "IOException",
        }
    }
}
