use crate::error::ModbusResult;
use crate::messages::ModbusQuery;

pub trait ModbusRtuSerialize
where
    Self: Sized,
{
    fn rtu_serialize(&self) -> ModbusResult<Vec<u8>>;
}

pub trait ModbusRtuDeserialize
where
    Self: Sized,
{
    fn rtu_deserialize(data: &[u8], query: &ModbusQuery) -> ModbusResult<Option<Self>>;
}

pub const CRC_LEN: usize = 2;

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const CRC16_TABLE: [u16; 256] = build_crc16_table();

/// Modbus RTU CRC-16 (reflected polynomial 0xA001, initial value 0xFFFF).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for byte in data {
        let index = ((crc ^ *byte as u16) & 0x00FF) as usize;
        crc = (crc >> 8) ^ CRC16_TABLE[index];
    }
    crc
}

/// Appends the CRC of `frame`, low byte first.
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Recomputes the CRC over everything but the trailing two bytes and compares.
pub fn validate_crc(frame: &[u8]) -> bool {
    if frame.len() <= CRC_LEN {
        return false;
    }
    let (body, crc) = frame.split_at(frame.len() - CRC_LEN);
    crc16(body) == u16::from_le_bytes([crc[0], crc[1]])
}
