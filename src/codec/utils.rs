use crate::common::{ModbusDataType, ModbusTable};
use crate::error::{ModbusError, ModbusResult};

use byteorder::{BigEndian, ReadBytesExt};
use std::mem::discriminant;

/// Reads from a received frame, turning a short read into an invalid response.
pub trait FrameReadExt: ReadBytesExt {
    fn frame_u8(&mut self) -> ModbusResult<u8> {
        self.read_u8().map_err(truncated)
    }

    fn frame_u16(&mut self) -> ModbusResult<u16> {
        self.read_u16::<BigEndian>().map_err(truncated)
    }
}

impl<R: ReadBytesExt> FrameReadExt for R {}

fn truncated(err: std::io::Error) -> ModbusError {
    ModbusError::InvalidResponse(format!("truncated frame: {err}"))
}

/// Packs coils 8 per byte, first coil in the least significant bit.
pub fn pack_coils(values: &[bool]) -> Vec<u8> {
    let mut result = vec![0u8; values.len().div_ceil(8)];
    for (index, value) in values.iter().enumerate() {
        if *value {
            result[index / 8] |= 1 << (index % 8);
        }
    }
    result
}

/// Inverse of [`pack_coils`]; bits past `count` are ignored.
pub fn unpack_coils(data: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|index| data.get(index / 8).is_some_and(|byte| (byte >> (index % 8)) & 1 == 1))
        .collect()
}

pub fn byte_count_for(table: ModbusTable, ammount: u16) -> usize {
    if table.is_bit_table() {
        (ammount as usize).div_ceil(8)
    } else {
        ammount as usize * 2
    }
}

/// Serializes write values as `byteCount` followed by the packed data.
pub fn serialize_values(values: &[ModbusDataType]) -> ModbusResult<Vec<u8>> {
    if !check_same_data_type_variant(values) {
        return Err(ModbusError::Argument(
            "All values in a query must have the same type".to_string(),
        ));
    }

    let first_value = values
        .first()
        .ok_or_else(|| ModbusError::Argument("At least one value must be sent".to_string()))?;

    let data = match first_value {
        ModbusDataType::Coil(_) => {
            let coils: Vec<bool> = values
                .iter()
                .map(|value| value.get_representation() != 0)
                .collect();
            pack_coils(&coils)
        }
        ModbusDataType::Register(_) => values
            .iter()
            .flat_map(|value| value.get_representation().to_be_bytes())
            .collect(),
    };

    let byte_count = u8::try_from(data.len()).map_err(|_| {
        ModbusError::Argument(format!("{} bytes of values don't fit in one query", data.len()))
    })?;

    let mut result = Vec::with_capacity(data.len() + 1);
    result.push(byte_count);
    result.extend_from_slice(&data);
    Ok(result)
}

/// Reads `byteCount` and exactly `ammount` values of the table's type.
pub fn deserialize_values<R: ReadBytesExt>(
    table: ModbusTable,
    ammount: u16,
    data: &mut R,
) -> ModbusResult<Vec<ModbusDataType>> {
    let byte_count = data.frame_u8()? as usize;

    let expected_byte_count = byte_count_for(table, ammount);

    if expected_byte_count != byte_count {
        return Err(ModbusError::InvalidResponse(format!(
            "Expected {} bytes for values, got {}",
            expected_byte_count, byte_count
        )));
    }

    let mut values = Vec::with_capacity(ammount as usize);
    if table.is_bit_table() {
        let mut raw = vec![0u8; byte_count];
        data.read_exact(&mut raw).map_err(truncated)?;
        values.extend(
            unpack_coils(&raw, ammount as usize)
                .into_iter()
                .map(ModbusDataType::Coil),
        );
    } else {
        for _ in 0..ammount {
            values.push(ModbusDataType::Register(data.frame_u16()?));
        }
    }

    Ok(values)
}

fn check_same_data_type_variant(values: &[ModbusDataType]) -> bool {
    if let Some((first, others)) = values.split_first() {
        let ref_discriminant = discriminant(first);
        others.iter().all(|e| discriminant(e) == ref_discriminant)
    } else {
        true
    }
}
