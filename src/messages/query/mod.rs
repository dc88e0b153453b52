use crate::codec::utils::{byte_count_for, serialize_values};
use crate::codec::ModbusSerialize;
use crate::common::{ModbusDataType, ModbusTable};
use crate::error::{ModbusError, ModbusResult};
use crate::messages::{FunctionCode, ModbusMessageData};

mod rtu;
mod tcp;

pub const MAX_READ_BITS: u16 = 2000;
pub const MAX_READ_REGISTERS: u16 = 125;
pub const MAX_WRITE_COILS: u16 = 1968;
pub const MAX_WRITE_REGISTERS: u16 = 123;
pub const MAX_READ_WRITE_REGISTERS: u16 = 121;

/// Unit id, function code, CRC.
const RTU_WRITE_ECHO_LEN: usize = 8;
/// Unit id, function code, byte count, CRC.
const RTU_READ_OVERHEAD: usize = 5;

#[derive(Clone, PartialEq, Debug)]
pub struct ReadQueryParameters {
    pub table: ModbusTable,
    pub starting_address: u16,
    pub ammount: u16,
}
#[derive(Clone, PartialEq, Debug)]
pub struct SingleWriteQueryParameters {
    pub table: ModbusTable,
    pub starting_address: u16,
    pub value: ModbusDataType,
}
#[derive(Clone, PartialEq, Debug)]
pub struct MultipleWriteQueryParameters {
    pub table: ModbusTable,
    pub starting_address: u16,
    pub values: Vec<ModbusDataType>,
}
#[derive(Clone, PartialEq, Debug)]
pub struct MultipleReadWriteQueryParameters {
    pub read_starting_address: u16,
    pub read_ammount: u16,
    pub write_starting_address: u16,
    pub values: Vec<u16>,
}

/// One request, validated on construction and never mutated afterwards.
#[derive(Clone, PartialEq, Debug)]
pub enum ModbusQuery {
    ReadQuery {
        message_data: ModbusMessageData,
        params: ReadQueryParameters,
    },
    SingleWriteQuery {
        message_data: ModbusMessageData,
        params: SingleWriteQueryParameters,
    },
    MultipleWriteQuery {
        message_data: ModbusMessageData,
        params: MultipleWriteQueryParameters,
    },
    MultipleReadWriteQuery {
        message_data: ModbusMessageData,
        params: MultipleReadWriteQueryParameters,
    },
}

impl ModbusSerialize for ModbusQuery {}

fn check_ammount(what: &str, ammount: u16, max: u16) -> ModbusResult<()> {
    if ammount == 0 || ammount > max {
        return Err(ModbusError::Argument(format!(
            "{what} must be 1 - {max}, got {ammount}"
        )));
    }
    Ok(())
}

fn check_span(starting_address: u16, ammount: u16) -> ModbusResult<()> {
    if starting_address as u32 + ammount as u32 > 0x1_0000 {
        return Err(ModbusError::Argument(format!(
            "starting address {starting_address} + quantity {ammount} exceeds the address space"
        )));
    }
    Ok(())
}

fn check_write_len(what: &str, len: usize, max: u16) -> ModbusResult<u16> {
    let ammount = u16::try_from(len).unwrap_or(u16::MAX);
    check_ammount(what, ammount, max)?;
    Ok(ammount)
}

impl ModbusQuery {
    pub fn read(
        unit_id: u8,
        function_code: FunctionCode,
        starting_address: u16,
        ammount: u16,
    ) -> ModbusResult<Self> {
        let max = match function_code {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => MAX_READ_BITS,
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                MAX_READ_REGISTERS
            }
            other => {
                return Err(ModbusError::Argument(format!(
                    "{other:?} is not a read function"
                )))
            }
        };
        check_ammount("quantity", ammount, max)?;
        check_span(starting_address, ammount)?;

        Ok(ModbusQuery::ReadQuery {
            message_data: ModbusMessageData {
                unit_id,
                function_code,
            },
            params: ReadQueryParameters {
                table: ModbusTable::get_table_from_function_code(function_code),
                starting_address,
                ammount,
            },
        })
    }

    pub fn single_write(
        unit_id: u8,
        starting_address: u16,
        value: ModbusDataType,
    ) -> ModbusResult<Self> {
        let function_code = match value {
            ModbusDataType::Coil(_) => FunctionCode::WriteSingleCoil,
            ModbusDataType::Register(_) => FunctionCode::WriteSingleRegister,
        };

        Ok(ModbusQuery::SingleWriteQuery {
            message_data: ModbusMessageData {
                unit_id,
                function_code,
            },
            params: SingleWriteQueryParameters {
                table: ModbusTable::get_table_from_function_code(function_code),
                starting_address,
                value,
            },
        })
    }

    pub fn multiple_write(
        unit_id: u8,
        starting_address: u16,
        values: Vec<ModbusDataType>,
    ) -> ModbusResult<Self> {
        let function_code = match values.first() {
            Some(ModbusDataType::Coil(_)) => FunctionCode::WriteMultipleCoils,
            Some(ModbusDataType::Register(_)) => FunctionCode::WriteMultipleRegisters,
            None => {
                return Err(ModbusError::Argument(
                    "At least one value must be sent".to_string(),
                ))
            }
        };
        let max = match function_code {
            FunctionCode::WriteMultipleCoils => MAX_WRITE_COILS,
            _ => MAX_WRITE_REGISTERS,
        };
        let ammount = check_write_len("number of values", values.len(), max)?;
        check_span(starting_address, ammount)?;

        // Catches mixed value types before anything is sent
        serialize_values(&values)?;

        Ok(ModbusQuery::MultipleWriteQuery {
            message_data: ModbusMessageData {
                unit_id,
                function_code,
            },
            params: MultipleWriteQueryParameters {
                table: ModbusTable::get_table_from_function_code(function_code),
                starting_address,
                values,
            },
        })
    }

    pub fn multiple_read_write(
        unit_id: u8,
        read_starting_address: u16,
        read_ammount: u16,
        write_starting_address: u16,
        values: Vec<u16>,
    ) -> ModbusResult<Self> {
        check_ammount("read quantity", read_ammount, MAX_READ_REGISTERS)?;
        check_span(read_starting_address, read_ammount)?;
        let write_ammount =
            check_write_len("number of write values", values.len(), MAX_READ_WRITE_REGISTERS)?;
        check_span(write_starting_address, write_ammount)?;

        Ok(ModbusQuery::MultipleReadWriteQuery {
            message_data: ModbusMessageData {
                unit_id,
                function_code: FunctionCode::ReadWriteMultipleRegisters,
            },
            params: MultipleReadWriteQueryParameters {
                read_starting_address,
                read_ammount,
                write_starting_address,
                values,
            },
        })
    }

    pub fn get_message_data(&self) -> &ModbusMessageData {
        match self {
            ModbusQuery::ReadQuery { message_data, .. }
            | ModbusQuery::SingleWriteQuery { message_data, .. }
            | ModbusQuery::MultipleWriteQuery { message_data, .. }
            | ModbusQuery::MultipleReadWriteQuery { message_data, .. } => message_data,
        }
    }

    /// Function code plus function specific data, shared by every framing.
    pub fn pdu(&self) -> ModbusResult<Vec<u8>> {
        let mut pdu = Vec::new();

        //Function code
        pdu.push(self.get_message_data().function_code.into());

        match self {
            ModbusQuery::ReadQuery { params, .. } => {
                //Starting Address
                pdu.extend_from_slice(&params.starting_address.to_be_bytes());

                //Ammount
                pdu.extend_from_slice(&params.ammount.to_be_bytes());
            }
            ModbusQuery::SingleWriteQuery { params, .. } => {
                //Address
                pdu.extend_from_slice(&params.starting_address.to_be_bytes());

                //Value
                pdu.extend_from_slice(&params.value.get_representation().to_be_bytes());
            }
            ModbusQuery::MultipleWriteQuery { params, .. } => {
                //Starting Address
                pdu.extend_from_slice(&params.starting_address.to_be_bytes());

                //Ammount
                let ammount = params.values.len() as u16;
                pdu.extend_from_slice(&ammount.to_be_bytes());

                //Byte count + values
                pdu.extend_from_slice(&serialize_values(&params.values)?);
            }
            ModbusQuery::MultipleReadWriteQuery { params, .. } => {
                //Read Starting Address
                pdu.extend_from_slice(&params.read_starting_address.to_be_bytes());

                //Read Ammount
                pdu.extend_from_slice(&params.read_ammount.to_be_bytes());

                //Write Starting Address
                pdu.extend_from_slice(&params.write_starting_address.to_be_bytes());

                //Write Ammount
                let write_ammount = params.values.len() as u16;
                pdu.extend_from_slice(&write_ammount.to_be_bytes());

                //Byte count + write values
                let values: Vec<ModbusDataType> = params
                    .values
                    .iter()
                    .map(|value| ModbusDataType::Register(*value))
                    .collect();
                pdu.extend_from_slice(&serialize_values(&values)?);
            }
        }

        Ok(pdu)
    }

    /// Size of a complete, non exception RTU answer to this query.
    pub fn expected_rtu_response_len(&self) -> usize {
        match self {
            ModbusQuery::ReadQuery { params, .. } => {
                RTU_READ_OVERHEAD + byte_count_for(params.table, params.ammount)
            }
            ModbusQuery::SingleWriteQuery { .. } | ModbusQuery::MultipleWriteQuery { .. } => {
                RTU_WRITE_ECHO_LEN
            }
            ModbusQuery::MultipleReadWriteQuery { params, .. } => {
                RTU_READ_OVERHEAD + byte_count_for(ModbusTable::HoldingRegisters, params.read_ammount)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_bounds() {
        assert!(ModbusQuery::read(1, FunctionCode::ReadCoils, 0, 2000).is_ok());
        assert!(matches!(
            ModbusQuery::read(1, FunctionCode::ReadCoils, 0, 2001),
            Err(ModbusError::Argument(_))
        ));
        assert!(matches!(
            ModbusQuery::read(1, FunctionCode::ReadDiscreteInputs, 0, 0),
            Err(ModbusError::Argument(_))
        ));
        assert!(ModbusQuery::read(1, FunctionCode::ReadInputRegisters, 0, 125).is_ok());
        assert!(matches!(
            ModbusQuery::read(1, FunctionCode::ReadHoldingRegisters, 0, 126),
            Err(ModbusError::Argument(_))
        ));
        assert!(matches!(
            ModbusQuery::read(1, FunctionCode::WriteSingleCoil, 0, 1),
            Err(ModbusError::Argument(_))
        ));
    }

    #[test]
    fn test_address_span() {
        assert!(ModbusQuery::read(1, FunctionCode::ReadHoldingRegisters, 65535, 1).is_ok());
        assert!(matches!(
            ModbusQuery::read(1, FunctionCode::ReadHoldingRegisters, 65535, 2),
            Err(ModbusError::Argument(_))
        ));
    }

    #[test]
    fn test_write_bounds() {
        let registers = vec![ModbusDataType::Register(0); 123];
        assert!(ModbusQuery::multiple_write(1, 0, registers).is_ok());

        let registers = vec![ModbusDataType::Register(0); 124];
        assert!(matches!(
            ModbusQuery::multiple_write(1, 0, registers),
            Err(ModbusError::Argument(_))
        ));

        let coils = vec![ModbusDataType::Coil(true); 1969];
        assert!(matches!(
            ModbusQuery::multiple_write(1, 0, coils),
            Err(ModbusError::Argument(_))
        ));

        assert!(matches!(
            ModbusQuery::multiple_write(1, 0, vec![]),
            Err(ModbusError::Argument(_))
        ));

        assert!(ModbusQuery::multiple_read_write(1, 0, 125, 0, vec![0; 121]).is_ok());
        assert!(matches!(
            ModbusQuery::multiple_read_write(1, 0, 125, 0, vec![0; 122]),
            Err(ModbusError::Argument(_))
        ));
        assert!(matches!(
            ModbusQuery::multiple_read_write(1, 0, 126, 0, vec![1]),
            Err(ModbusError::Argument(_))
        ));
    }

    #[test]
    fn test_write_multiple_coils_pdu() {
        let query = ModbusQuery::multiple_write(
            1,
            0,
            vec![
                ModbusDataType::Coil(true),
                ModbusDataType::Coil(false),
                ModbusDataType::Coil(true),
            ],
        )
        .unwrap();

        assert_eq!(
            query.pdu().unwrap(),
            vec![0x0F, 0x00, 0x00, 0x00, 0x03, 0x01, 0b0000_0101]
        );
    }

    #[test]
    fn test_read_write_pdu() {
        let query = ModbusQuery::multiple_read_write(1, 3, 6, 14, vec![0x00FF, 0x00FF]).unwrap();
        assert_eq!(
            query.pdu().unwrap(),
            vec![0x17, 0x00, 0x03, 0x00, 0x06, 0x00, 0x0E, 0x00, 0x02, 0x04, 0x00, 0xFF, 0x00, 0xFF]
        );
    }

    #[test]
    fn test_expected_rtu_response_len() {
        let coils = ModbusQuery::read(1, FunctionCode::ReadCoils, 0, 9).unwrap();
        assert_eq!(coils.expected_rtu_response_len(), 7);

        let registers = ModbusQuery::read(1, FunctionCode::ReadHoldingRegisters, 0, 2).unwrap();
        assert_eq!(registers.expected_rtu_response_len(), 9);

        let write = ModbusQuery::single_write(1, 4, ModbusDataType::Coil(true)).unwrap();
        assert_eq!(write.expected_rtu_response_len(), 8);

        let read_write = ModbusQuery::multiple_read_write(1, 0, 3, 0, vec![1]).unwrap();
        assert_eq!(read_write.expected_rtu_response_len(), 11);
    }
}
