use super::*;
use crate::codec::rtu::{validate_crc, ModbusRtuDeserialize, CRC_LEN};

impl ModbusRtuDeserialize for ModbusResponse {
    fn rtu_deserialize(data: &[u8], query: &ModbusQuery) -> ModbusResult<Option<Self>> {
        let unit_id = match data.first() {
            Some(unit_id) => *unit_id,
            None => return Ok(None),
        };

        // On a shared bus another slave may be talking
        if unit_id != query.get_message_data().unit_id {
            return Ok(None);
        }

        if !validate_crc(data) {
            return Err(ModbusError::CrcCheckFailed);
        }

        deserialize_pdu(unit_id, query, &data[1..data.len() - CRC_LEN]).map(Some)
    }
}
