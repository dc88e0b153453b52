use crate::codec::{ModbusDeserialize, ModbusSerialize};
use crate::common::ModbusSubprotocol;
use crate::communication::ModbusCommunicationInfo;
use crate::error::{ModbusError, ModbusResult};
use crate::messages::{ModbusQuery, ModbusResponse};

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Encoding,
    Sending,
    AwaitingResponse,
    Decoding,
    RetryPending,
    Success,
    Failed,
}

//This struct is meant to hold the state of the on going modbus communication
pub struct ModbusContext {
    pub comm: ModbusCommunicationInfo,
    pub subprotocol: ModbusSubprotocol,
    current_transaction_id: u16,
    state: TransactionState,
}

impl ModbusContext {
    pub fn new(comm: ModbusCommunicationInfo, subprotocol: ModbusSubprotocol) -> Self {
        ModbusContext {
            comm,
            subprotocol,
            current_transaction_id: 0,
            state: TransactionState::Idle,
        }
    }

    fn get_next_free_transaction_id(&mut self) -> u16 {
        self.current_transaction_id = self.current_transaction_id.wrapping_add(1);
        self.current_transaction_id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    fn transition(&mut self, state: TransactionState) {
        trace!(from = ?self.state, to = ?state, "transaction state");
        self.state = state;
    }

    /// Runs `query` to completion, sending it at most `retries + 1` times.
    ///
    /// Only a timeout or a CRC failure triggers another attempt. Cancelling
    /// `cancel` aborts the transaction with a connection error.
    pub async fn execute(
        &mut self,
        query: &ModbusQuery,
        response_timeout: Duration,
        retries: u32,
        cancel: &CancellationToken,
    ) -> ModbusResult<ModbusResponse> {
        let mut attempt = 0;

        let result = loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    Err(ModbusError::Connection("disconnected".to_string()))
                }
                outcome = self.attempt(query, response_timeout) => outcome,
            };

            match outcome {
                Ok(response) => break Ok(response),
                Err(err) if err.is_retryable() && attempt < retries => {
                    attempt += 1;
                    self.transition(TransactionState::RetryPending);
                    self.comm.log(&format!(
                        "{} Throwed, retry {} of {}",
                        err.kind_name(),
                        attempt,
                        retries
                    ));
                    debug!(error = %err, attempt, retries, "retrying modbus request");
                }
                Err(err) => break Err(err),
            }
        };

        match &result {
            Ok(_) => self.transition(TransactionState::Success),
            Err(_) => self.transition(TransactionState::Failed),
        }
        self.transition(TransactionState::Idle);

        result
    }

    async fn attempt(
        &mut self,
        query: &ModbusQuery,
        response_timeout: Duration,
    ) -> ModbusResult<ModbusResponse> {
        self.transition(TransactionState::Encoding);
        let transaction_id = self.get_next_free_transaction_id();
        let frame = query.serialize(self.subprotocol, transaction_id)?;

        self.transition(TransactionState::Sending);
        self.comm.write(&frame).await?;

        self.transition(TransactionState::AwaitingResponse);
        let deadline = Instant::now() + response_timeout;
        let expected_len = query.expected_rtu_response_len();

        loop {
            let bytes = self.comm.read_frame(expected_len, deadline).await?;

            self.transition(TransactionState::Decoding);
            match ModbusResponse::deserialize(&bytes, self.subprotocol, query, transaction_id)? {
                Some(response) => return response.into_result(),
                None => {
                    //Not ours, keep listening until the deadline
                    debug!(len = bytes.len(), "ignoring frame for another transaction");
                    self.transition(TransactionState::AwaitingResponse);
                }
            }
        }
    }
}
