use crate::error::{ModbusError, ModbusResult};
use crate::messages::FunctionCode;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ModbusDataType {
    Coil(bool),
    Register(u16),
}

impl ModbusDataType {
    pub fn get_representation(&self) -> u16 {
        match self {
            ModbusDataType::Coil(value) => {
                if *value {
                    0xFF00
                } else {
                    0x0000
                }
            }
            ModbusDataType::Register(value) => *value,
        }
    }

    pub fn coil_from_representation(raw_value: u16) -> ModbusResult<Self> {
        match raw_value {
            0xFF00 => Ok(ModbusDataType::Coil(true)),
            0x0000 => Ok(ModbusDataType::Coil(false)),
            _ => Err(ModbusError::InvalidResponse(format!(
                "{raw_value:#06X} can't be decoded to a coil, only valid values are 0xFF00 and 0x0000"
            ))),
        }
    }
}

/// Wire framing used on a link. UDP carries the same MBAP framing as TCP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModbusSubprotocol {
    ModbusTCP,
    ModbusUDP,
    ModbusRTU,
}

impl ModbusSubprotocol {
    pub fn uses_mbap(&self) -> bool {
        matches!(self, ModbusSubprotocol::ModbusTCP | ModbusSubprotocol::ModbusUDP)
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Eq, Hash)]
pub enum ModbusTable {
    DiscreteInput,
    Coils,
    InputRegisters,
    HoldingRegisters,
}

impl ModbusTable {
    pub fn get_table_from_function_code(function_code: FunctionCode) -> ModbusTable {
        match function_code {
            FunctionCode::WriteSingleCoil
            | FunctionCode::ReadCoils
            | FunctionCode::WriteMultipleCoils => ModbusTable::Coils,
            FunctionCode::WriteSingleRegister
            | FunctionCode::ReadHoldingRegisters
            | FunctionCode::WriteMultipleRegisters
            | FunctionCode::ReadWriteMultipleRegisters => ModbusTable::HoldingRegisters,
            FunctionCode::ReadInputRegisters => ModbusTable::InputRegisters,
            FunctionCode::ReadDiscreteInputs => ModbusTable::DiscreteInput,
        }
    }

    pub fn is_bit_table(&self) -> bool {
        matches!(self, ModbusTable::Coils | ModbusTable::DiscreteInput)
    }
}
