#![allow(dead_code)]

use async_trait::async_trait;
use modbus_master::{append_crc, ModbusError, ModbusResult, ModbusSocket};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

pub type Reply = Box<dyn FnMut(usize, &[u8]) -> Option<Vec<u8>> + Send>;

/// In-process link whose answers come from a closure.
///
/// The closure gets the zero based request index and the raw request. `None`
/// means the slave stays silent and the read runs into its deadline.
pub struct MockSocket {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    reply: Reply,
    pending: Option<Vec<u8>>,
    delay: Duration,
}

impl MockSocket {
    pub fn new<F>(reply: F) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>)
    where
        F: FnMut(usize, &[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        let writes = Arc::new(Mutex::new(Vec::new()));
        (
            MockSocket {
                writes: writes.clone(),
                reply: Box::new(reply),
                pending: None,
                delay: Duration::ZERO,
            },
            writes,
        )
    }

    /// Holds every answer back for `delay` before handing it out.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ModbusSocket for MockSocket {
    async fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
        let index = {
            let mut writes = self.writes.lock().unwrap();
            writes.push(data.to_vec());
            writes.len() - 1
        };
        self.pending = (self.reply)(index, data);
        Ok(())
    }

    async fn read_frame(&mut self, _expected_len: usize, deadline: Instant) -> ModbusResult<Vec<u8>> {
        match self.pending.take() {
            Some(frame) => {
                tokio::time::sleep(self.delay).await;
                Ok(frame)
            }
            None => {
                tokio::time::sleep_until(deadline).await;
                Err(ModbusError::Timeout)
            }
        }
    }
}

pub fn write_count(writes: &Arc<Mutex<Vec<Vec<u8>>>>) -> usize {
    writes.lock().unwrap().len()
}

/// MBAP framed answer echoing the request's transaction id.
pub fn tcp_reply(request: &[u8], pdu: &[u8]) -> Vec<u8> {
    let mut frame = vec![request[0], request[1], 0, 0];
    frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
    frame.push(request[6]);
    frame.extend_from_slice(pdu);
    frame
}

pub fn rtu_reply(unit_id: u8, pdu: &[u8]) -> Vec<u8> {
    let mut frame = vec![unit_id];
    frame.extend_from_slice(pdu);
    append_crc(&mut frame);
    frame
}

/// Reads one MBAP framed request from `stream`.
pub async fn read_tcp_request(stream: &mut TcpStream) -> anyhow::Result<Vec<u8>> {
    let mut request = vec![0u8; 7];
    stream.read_exact(&mut request).await?;
    let length = u16::from_be_bytes([request[4], request[5]]) as usize;
    request.resize(7 + length - 1, 0);
    stream.read_exact(&mut request[7..]).await?;
    Ok(request)
}

pub async fn answer_tcp(stream: &mut TcpStream, request: &[u8], pdu: &[u8]) -> anyhow::Result<()> {
    stream.write_all(&tcp_reply(request, pdu)).await?;
    Ok(())
}
