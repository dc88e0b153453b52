use super::*;
use crate::codec::tcp::{serialize_mbap, ModbusTcpSerialize};

impl ModbusTcpSerialize for ModbusQuery {
    fn tcp_serialize(&self, transaction_id: u16) -> ModbusResult<Vec<u8>> {
        let pdu = self.pdu()?;

        let mut result =
            serialize_mbap(transaction_id, self.get_message_data().unit_id, pdu.len())?;
        result.extend_from_slice(&pdu);

        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::ModbusSubprotocol;

    #[test]
    fn test_read_holding_registers_frame() {
        let query = ModbusQuery::read(1, FunctionCode::ReadHoldingRegisters, 0, 2).unwrap();
        let bytes = query.serialize(ModbusSubprotocol::ModbusTCP, 5).unwrap();

        assert_eq!(
            bytes,
            vec![0x00, 0x05, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02]
        );
    }

    #[test]
    fn test_udp_uses_tcp_framing() {
        let query = ModbusQuery::single_write(9, 0x00AC, ModbusDataType::Coil(true)).unwrap();

        let tcp = query.serialize(ModbusSubprotocol::ModbusTCP, 0x1234).unwrap();
        let udp = query.serialize(ModbusSubprotocol::ModbusUDP, 0x1234).unwrap();

        assert_eq!(tcp, udp);
        assert_eq!(
            tcp,
            vec![0x12, 0x34, 0x00, 0x00, 0x00, 0x06, 0x09, 0x05, 0x00, 0xAC, 0xFF, 0x00]
        );
    }

    #[test]
    fn test_write_multiple_registers_length_field() {
        let query = ModbusQuery::multiple_write(
            0x11,
            1,
            vec![ModbusDataType::Register(0x000A), ModbusDataType::Register(0x0102)],
        )
        .unwrap();
        let bytes = query.serialize(ModbusSubprotocol::ModbusTCP, 1).unwrap();

        // unit id + fc + address + ammount + byte count + 4 bytes of values
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 11);
        assert_eq!(
            &bytes[6..],
            &[0x11, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
    }
}
