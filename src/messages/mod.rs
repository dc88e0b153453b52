use num_enum::{IntoPrimitive, TryFromPrimitive};

pub mod query;
pub mod response;

/// Function codes this master can issue.
#[derive(Clone, Copy, PartialEq, Eq, Debug, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    ReadCoils = 1,
    ReadDiscreteInputs = 2,
    ReadHoldingRegisters = 3,
    ReadInputRegisters = 4,
    WriteSingleCoil = 5,
    WriteSingleRegister = 6,
    WriteMultipleCoils = 15,
    WriteMultipleRegisters = 16,
    ReadWriteMultipleRegisters = 23,
}

impl FunctionCode {
    pub fn exception_marker(self) -> u8 {
        u8::from(self) | 0x80
    }

    pub fn description(self) -> &'static str {
        match self {
            FunctionCode::ReadCoils => "Read Coils",
            FunctionCode::ReadDiscreteInputs => "Read Discrete Inputs",
            FunctionCode::ReadHoldingRegisters => "Read Holding Registers",
            FunctionCode::ReadInputRegisters => "Read Input Registers",
            FunctionCode::WriteSingleCoil => "Write Single Coil",
            FunctionCode::WriteSingleRegister => "Write Single Register",
            FunctionCode::WriteMultipleCoils => "Write Multiple Coils",
            FunctionCode::WriteMultipleRegisters => "Write Multiple Registers",
            FunctionCode::ReadWriteMultipleRegisters => "Read/Write Multiple Registers",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 1,
    IllegalDataAddress = 2,
    IllegalDataValue = 3,
    ServerDeviceFailure = 4,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ModbusMessageData {
    pub unit_id: u8,
    pub function_code: FunctionCode,
}

pub use query::ModbusQuery;
pub use response::ModbusResponse;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_function_code_conversions() {
        assert_eq!(FunctionCode::try_from(23u8).unwrap(), FunctionCode::ReadWriteMultipleRegisters);
        assert!(FunctionCode::try_from(7u8).is_err());
        assert_eq!(FunctionCode::ReadHoldingRegisters.exception_marker(), 0x83);
        assert_eq!(FunctionCode::WriteMultipleCoils.exception_marker(), 0x8F);
    }
}
