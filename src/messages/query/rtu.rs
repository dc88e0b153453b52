use super::*;
use crate::codec::rtu::{append_crc, ModbusRtuSerialize};

impl ModbusRtuSerialize for ModbusQuery {
    fn rtu_serialize(&self) -> ModbusResult<Vec<u8>> {
        let pdu = self.pdu()?;

        let mut result = Vec::with_capacity(pdu.len() + 3);
        result.push(self.get_message_data().unit_id);
        result.extend_from_slice(&pdu);
        append_crc(&mut result);

        Ok(result)
    }
}
