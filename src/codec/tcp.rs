use crate::codec::utils::FrameReadExt;
use crate::error::{ModbusError, ModbusResult};
use crate::messages::ModbusQuery;

use std::io::Cursor;

/// Transaction id, protocol id, length and unit id.
pub const MBAP_HEADER_LEN: usize = 7;

/// Unit id plus the largest PDU (253 bytes).
pub const MAX_MBAP_LENGTH: usize = 254;

pub trait ModbusTcpSerialize
where
    Self: Sized,
{
    fn tcp_serialize(&self, transaction_id: u16) -> ModbusResult<Vec<u8>>;
}

pub trait ModbusTcpDeserialize
where
    Self: Sized,
{
    fn tcp_deserialize(
        data: &[u8],
        query: &ModbusQuery,
        transaction_id: u16,
    ) -> ModbusResult<Option<Self>>;
}

pub struct MbapHeader {
    pub transaction_id: u16,
    pub length: u16,
    pub unit_id: u8,
}

pub fn serialize_mbap(transaction_id: u16, unit_id: u8, pdu_len: usize) -> ModbusResult<Vec<u8>> {
    let length = pdu_len + 1;
    if length > MAX_MBAP_LENGTH {
        return Err(ModbusError::Argument(format!(
            "PDU of {pdu_len} bytes doesn't fit in a modbus frame"
        )));
    }

    let mut result = Vec::with_capacity(MBAP_HEADER_LEN + pdu_len);

    //Transaction Identifier
    result.extend_from_slice(&transaction_id.to_be_bytes());

    //Protocol Identifier: 0u16 means Modbus
    result.extend_from_slice(&0u16.to_be_bytes());

    //Length: unit id + PDU
    result.extend_from_slice(&(length as u16).to_be_bytes());

    //Unit Id
    result.push(unit_id);

    Ok(result)
}

pub fn deserialize_mbap(data: &mut Cursor<&[u8]>) -> ModbusResult<MbapHeader> {
    let position = data.position() as usize;
    let size_left = data.get_ref().len().saturating_sub(position);

    if size_left < MBAP_HEADER_LEN {
        return Err(ModbusError::InvalidResponse(format!(
            "Not enough bytes to form an mbap: position {}, bytes left {}",
            position, size_left
        )));
    }

    let transaction_id = data.frame_u16()?;
    let protocol_id = data.frame_u16()?;
    let length = data.frame_u16()?;
    let unit_id = data.frame_u8()?;

    if protocol_id != 0 {
        return Err(ModbusError::InvalidResponse(format!(
            "Unknown protocol id {protocol_id} in mbap"
        )));
    }

    if length < 2 || length as usize > MAX_MBAP_LENGTH {
        return Err(ModbusError::InvalidResponse(format!(
            "Invalid mbap length {length}"
        )));
    }

    if size_left - MBAP_HEADER_LEN < length as usize - 1 {
        return Err(ModbusError::InvalidResponse(format!(
            "Frame shorter than its mbap length: {} bytes of body, {} declared",
            size_left - MBAP_HEADER_LEN,
            length - 1
        )));
    }

    Ok(MbapHeader {
        transaction_id,
        length,
        unit_id,
    })
}
