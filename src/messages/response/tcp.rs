use super::*;
use crate::codec::tcp::{deserialize_mbap, ModbusTcpDeserialize, MBAP_HEADER_LEN};

impl ModbusTcpDeserialize for ModbusResponse {
    fn tcp_deserialize(
        data: &[u8],
        query: &ModbusQuery,
        transaction_id: u16,
    ) -> ModbusResult<Option<Self>> {
        let mut cursor = Cursor::new(data);
        let header = deserialize_mbap(&mut cursor)?;

        // A late answer to an earlier attempt, or another unit's frame
        if header.transaction_id != transaction_id
            || header.unit_id != query.get_message_data().unit_id
        {
            return Ok(None);
        }

        let body_end = MBAP_HEADER_LEN + header.length as usize - 1;
        deserialize_pdu(header.unit_id, query, &data[MBAP_HEADER_LEN..body_end]).map(Some)
    }
}
