pub mod rtu;
pub mod tcp;
pub mod utils;

use rtu::{ModbusRtuDeserialize, ModbusRtuSerialize};
use tcp::{ModbusTcpDeserialize, ModbusTcpSerialize};

use crate::common::ModbusSubprotocol;
use crate::error::ModbusResult;
use crate::messages::ModbusQuery;

pub trait ModbusSerialize: ModbusTcpSerialize + ModbusRtuSerialize
where
    Self: Sized,
{
    /// `transaction_id` only ends up on the wire for MBAP framed links.
    fn serialize(&self, subprotocol: ModbusSubprotocol, transaction_id: u16) -> ModbusResult<Vec<u8>> {
        if subprotocol.uses_mbap() {
            self.tcp_serialize(transaction_id)
        } else {
            self.rtu_serialize()
        }
    }
}

pub trait ModbusDeserialize: ModbusTcpDeserialize + ModbusRtuDeserialize
where
    Self: Sized,
{
    /// Decodes a received frame against the query it answers.
    ///
    /// `Ok(None)` means the frame belongs to some other unit or transaction and
    /// the caller should keep listening.
    fn deserialize(
        data: &[u8],
        subprotocol: ModbusSubprotocol,
        query: &ModbusQuery,
        transaction_id: u16,
    ) -> ModbusResult<Option<Self>> {
        if subprotocol.uses_mbap() {
            Self::tcp_deserialize(data, query, transaction_id)
        } else {
            Self::rtu_deserialize(data, query)
        }
    }
}
