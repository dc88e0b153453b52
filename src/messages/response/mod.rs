use crate::codec::utils::{deserialize_values, FrameReadExt};
use crate::codec::ModbusDeserialize;
use crate::common::{ModbusDataType, ModbusTable};
use crate::error::{ModbusError, ModbusResult};
use crate::messages::{ModbusMessageData, ModbusQuery};

use std::io::Cursor;

mod rtu;
mod tcp;

#[derive(Clone, PartialEq, Debug)]
pub struct ReadResponseParameters {
    pub table: ModbusTable,
    pub values: Vec<ModbusDataType>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct SingleWriteResponseParameters {
    pub table: ModbusTable,
    pub address: u16,
    pub value: ModbusDataType,
}

#[derive(Clone, PartialEq, Debug)]
pub struct MultipleWriteResponseParameters {
    pub table: ModbusTable,
    pub address: u16,
    pub ammount: u16,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ModbusResponse {
    ReadResponse {
        message_data: ModbusMessageData,
        params: ReadResponseParameters,
    },
    SingleWriteResponse {
        message_data: ModbusMessageData,
        params: SingleWriteResponseParameters,
    },
    MultipleWriteResponse {
        message_data: ModbusMessageData,
        params: MultipleWriteResponseParameters,
    },

    Error {
        message_data: ModbusMessageData,
        exception_code: u8,
    },
}

impl ModbusDeserialize for ModbusResponse {}

impl ModbusResponse {
    /// Turns an exception response into the matching typed error.
    pub fn into_result(self) -> ModbusResult<Self> {
        match self {
            ModbusResponse::Error { exception_code, .. } => {
                Err(ModbusError::from_exception_code(exception_code))
            }
            response => Ok(response),
        }
    }

    pub fn into_coils(self) -> ModbusResult<Vec<bool>> {
        self.into_read_values()?
            .into_iter()
            .map(|value| match value {
                ModbusDataType::Coil(value) => Ok(value),
                ModbusDataType::Register(_) => Err(ModbusError::InvalidResponse(
                    "Expected coils, got registers".to_string(),
                )),
            })
            .collect()
    }

    pub fn into_registers(self) -> ModbusResult<Vec<u16>> {
        self.into_read_values()?
            .into_iter()
            .map(|value| match value {
                ModbusDataType::Register(value) => Ok(value),
                ModbusDataType::Coil(_) => Err(ModbusError::InvalidResponse(
                    "Expected registers, got coils".to_string(),
                )),
            })
            .collect()
    }

    fn into_read_values(self) -> ModbusResult<Vec<ModbusDataType>> {
        match self.into_result()? {
            ModbusResponse::ReadResponse { params, .. } => Ok(params.values),
            other => Err(ModbusError::InvalidResponse(format!(
                "Expected a read response, got {other:?}"
            ))),
        }
    }
}

/// Decodes the PDU of a frame already known to be addressed to `query`.
pub(crate) fn deserialize_pdu(
    unit_id: u8,
    query: &ModbusQuery,
    body: &[u8],
) -> ModbusResult<ModbusResponse> {
    let mut data = Cursor::new(body);

    let function_code = query.get_message_data().function_code;
    let message_data = ModbusMessageData {
        unit_id,
        function_code,
    };

    let raw_function_code = data.frame_u8()?;

    //Is in error range
    if raw_function_code == function_code.exception_marker() {
        let exception_code = data.frame_u8()?;
        return Ok(ModbusResponse::Error {
            message_data,
            exception_code,
        });
    }

    if raw_function_code != u8::from(function_code) {
        return Err(ModbusError::InvalidResponse(format!(
            "Expected function code {}, got {}",
            u8::from(function_code),
            raw_function_code
        )));
    }

    let response = match query {
        ModbusQuery::ReadQuery { params, .. } => ModbusResponse::ReadResponse {
            message_data,
            params: ReadResponseParameters {
                table: params.table,
                values: deserialize_values(params.table, params.ammount, &mut data)?,
            },
        },
        ModbusQuery::MultipleReadWriteQuery { params, .. } => ModbusResponse::ReadResponse {
            message_data,
            params: ReadResponseParameters {
                table: ModbusTable::HoldingRegisters,
                values: deserialize_values(
                    ModbusTable::HoldingRegisters,
                    params.read_ammount,
                    &mut data,
                )?,
            },
        },
        ModbusQuery::SingleWriteQuery { params, .. } => {
            let address = data.frame_u16()?;
            let raw_value = data.frame_u16()?;

            let value = if params.table.is_bit_table() {
                ModbusDataType::coil_from_representation(raw_value)?
            } else {
                ModbusDataType::Register(raw_value)
            };

            ModbusResponse::SingleWriteResponse {
                message_data,
                params: SingleWriteResponseParameters {
                    table: params.table,
                    address,
                    value,
                },
            }
        }
        ModbusQuery::MultipleWriteQuery { params, .. } => {
            let address = data.frame_u16()?;
            let ammount = data.frame_u16()?;

            ModbusResponse::MultipleWriteResponse {
                message_data,
                params: MultipleWriteResponseParameters {
                    table: params.table,
                    address,
                    ammount,
                },
            }
        }
    };

    let position = data.position() as usize;
    if position != body.len() {
        return Err(ModbusError::InvalidResponse(format!(
            "Response too long, {} too many bytes",
            body.len() - position
        )));
    }

    Ok(response)
}
