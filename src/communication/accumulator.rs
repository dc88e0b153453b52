use crate::codec::rtu::validate_crc;
use crate::error::{ModbusError, ModbusResult};

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout, Instant};
use tracing::trace;

/// Largest RTU frame: unit id, 253 byte PDU, CRC.
pub const MAX_RTU_FRAME_LEN: usize = 256;

/// Unit id, function code | 0x80, exception code, CRC.
const RTU_EXCEPTION_LEN: usize = 5;

/// Collects an RTU answer from a byte stream that has no length header.
///
/// A frame is considered done once the expected byte count for the outstanding
/// query is reached or a valid exception frame shows up. There is no
/// inter-character gap detection; anything else ends at the response deadline.
pub struct SerialFrameAccumulator {
    buffer: Vec<u8>,
    expected_len: usize,
}

impl SerialFrameAccumulator {
    pub fn new(expected_len: usize) -> Self {
        SerialFrameAccumulator {
            buffer: Vec::with_capacity(MAX_RTU_FRAME_LEN),
            expected_len: expected_len.min(MAX_RTU_FRAME_LEN),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        let room = MAX_RTU_FRAME_LEN - self.buffer.len();
        self.buffer.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn is_exception_frame(&self) -> bool {
        self.buffer.len() >= RTU_EXCEPTION_LEN
            && self.buffer[1] & 0x80 != 0
            && validate_crc(&self.buffer[..RTU_EXCEPTION_LEN])
    }

    pub fn is_complete(&self) -> bool {
        self.buffer.len() >= self.expected_len || self.is_exception_frame()
    }

    /// The candidate frame, cut to the expected size when more arrived.
    pub fn into_frame(mut self) -> Vec<u8> {
        if self.is_exception_frame() {
            self.buffer.truncate(RTU_EXCEPTION_LEN);
        } else {
            self.buffer.truncate(self.expected_len);
        }
        self.buffer
    }

    /// Polls `reader` until the frame is complete or `deadline` passes.
    ///
    /// Returns [`ModbusError::Timeout`] when not a single byte arrived.
    pub async fn accumulate<R>(
        reader: &mut R,
        expected_len: usize,
        deadline: Instant,
        poll_interval: Duration,
    ) -> ModbusResult<Vec<u8>>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut accumulator = SerialFrameAccumulator::new(expected_len);
        let mut chunk = [0u8; MAX_RTU_FRAME_LEN];

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let step = poll_interval.min(deadline - now);

            match timeout(step, reader.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    return Err(ModbusError::Connection("serial link closed".to_string()))
                }
                Ok(Ok(n)) => {
                    accumulator.push(&chunk[..n]);
                    trace!(
                        received = n,
                        accumulated = accumulator.buffer.len(),
                        expected = accumulator.expected_len,
                        "rtu bytes"
                    );
                    if accumulator.is_complete() {
                        break;
                    }
                }
                Ok(Err(err)) => return Err(ModbusError::Connection(err.to_string())),
                // Nothing arrived during this poll step
                Err(_) => {}
            }
        }

        if accumulator.is_empty() {
            return Err(ModbusError::Timeout);
        }

        Ok(accumulator.into_frame())
    }
}
