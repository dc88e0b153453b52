use crate::common::{ModbusDataType, ModbusSubprotocol};
use crate::communication::{AddressingInfo, ModbusCommunicationInfo, ModbusSocket, RtuSettings};
use crate::error::{ModbusError, ModbusResult};
use crate::messages::{FunctionCode, ModbusQuery, ModbusResponse};
use crate::notification::{ModbusEvent, ModbusNotificationSink, TracingNotificationSink};
use context::ModbusContext;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod context;

pub use context::TransactionState;

const DEFAULT_UNIT_ID: u8 = 1;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModbusMasterConnectionParams {
    pub unit_id: u8,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// Extra transmissions after the first one on timeout or CRC failure
    pub retries: u32,
    /// Serial read poll step
    pub poll_interval: Duration,
}

impl Default for ModbusMasterConnectionParams {
    fn default() -> Self {
        ModbusMasterConnectionParams {
            unit_id: DEFAULT_UNIT_ID,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            retries: DEFAULT_RETRIES,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ModbusMasterConnectionParams {
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// A Modbus master talking to one slave link.
///
/// All operations take `&self`; transactions on the same connection run one
/// at a time in call order.
pub struct ModbusMasterConnection {
    context: Mutex<ModbusContext>,
    params: ModbusMasterConnectionParams,
    unit_id: AtomicU8,
    cancel: std::sync::Mutex<CancellationToken>,
    sink: Arc<dyn ModbusNotificationSink>,
}

impl ModbusMasterConnection {
    fn new(
        comm: ModbusCommunicationInfo,
        subprotocol: ModbusSubprotocol,
        params: ModbusMasterConnectionParams,
    ) -> Self {
        let sink = comm.sink().clone();
        ModbusMasterConnection {
            context: Mutex::new(ModbusContext::new(comm, subprotocol)),
            unit_id: AtomicU8::new(params.unit_id),
            params,
            cancel: std::sync::Mutex::new(CancellationToken::new()),
            sink,
        }
    }

    fn default_sink() -> Arc<dyn ModbusNotificationSink> {
        Arc::new(TracingNotificationSink)
    }

    pub fn new_tcp(address: SocketAddr, params: ModbusMasterConnectionParams) -> Self {
        let comm = ModbusCommunicationInfo::new(
            AddressingInfo::TcpConnection { address },
            Self::default_sink(),
        );
        Self::new(comm, ModbusSubprotocol::ModbusTCP, params)
    }

    pub fn new_udp(address: SocketAddr, params: ModbusMasterConnectionParams) -> Self {
        let comm = ModbusCommunicationInfo::new(
            AddressingInfo::UdpConnection { address },
            Self::default_sink(),
        );
        Self::new(comm, ModbusSubprotocol::ModbusUDP, params)
    }

    pub fn new_rtu(settings: RtuSettings, params: ModbusMasterConnectionParams) -> Self {
        let comm = ModbusCommunicationInfo::new(
            AddressingInfo::RtuConnection(settings),
            Self::default_sink(),
        );
        Self::new(comm, ModbusSubprotocol::ModbusRTU, params)
    }

    /// Wraps an already open link. The connection starts out connected.
    pub fn from_socket(
        socket: Box<dyn ModbusSocket>,
        subprotocol: ModbusSubprotocol,
        params: ModbusMasterConnectionParams,
    ) -> Self {
        let comm = ModbusCommunicationInfo::from_socket(socket, Self::default_sink());
        Self::new(comm, subprotocol, params)
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn ModbusNotificationSink>) -> Self {
        self.context.get_mut().comm.set_sink(sink.clone());
        self.sink = sink;
        self
    }

    pub fn params(&self) -> &ModbusMasterConnectionParams {
        &self.params
    }

    pub fn set_unit_id(&self, unit_id: u8) {
        self.unit_id.store(unit_id, Ordering::Relaxed);
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id.load(Ordering::Relaxed)
    }

    fn cancel_token(&self) -> CancellationToken {
        match self.cancel.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_cancel_token(&self) {
        let mut token = match self.cancel.lock() {
            Ok(token) => token,
            Err(poisoned) => poisoned.into_inner(),
        };
        *token = CancellationToken::new();
    }

    pub async fn connect(&self) -> ModbusResult<()> {
        let mut context = self.context.lock().await;
        if context.comm.is_connected() {
            return Ok(());
        }

        match context
            .comm
            .connect(self.params.connect_timeout, self.params.poll_interval)
            .await
        {
            Ok(()) => {
                self.sink.on_event(ModbusEvent::ConnectionChanged(true));
                Ok(())
            }
            Err(err) => {
                context
                    .comm
                    .log(&format!("{} Throwed: {}", err.kind_name(), err));
                warn!(error = %err, "modbus connect failed");
                Err(err)
            }
        }
    }

    /// Closes the link. A transaction in flight fails with a connection error.
    pub async fn disconnect(&self) -> ModbusResult<()> {
        //Wake up whoever holds the context before asking for it
        self.cancel_token().cancel();

        let mut context = self.context.lock().await;
        let was_connected = context.comm.is_connected();
        let result = context.comm.disconnect().await;
        self.replace_cancel_token();

        if was_connected {
            context.comm.log("Disconnect");
            self.sink.on_event(ModbusEvent::ConnectionChanged(false));
            info!("modbus master disconnected");
        }

        result
    }

    pub async fn is_connected(&self) -> bool {
        self.context.lock().await.comm.is_connected()
    }

    async fn transact(
        &self,
        function_code: FunctionCode,
        detail: String,
        query: ModbusResult<ModbusQuery>,
    ) -> ModbusResult<ModbusResponse> {
        let cancel = self.cancel_token();
        let mut context = self.context.lock().await;

        context.comm.log(&format!(
            "FC{} ({}), {}",
            u8::from(function_code),
            function_code.description(),
            detail
        ));

        let result = match query {
            Ok(query) if context.comm.is_connected() => {
                let result = context
                    .execute(&query, self.params.response_timeout, self.params.retries, &cancel)
                    .await;
                debug_assert_eq!(context.state(), TransactionState::Idle);
                result
            }
            Ok(_) => Err(ModbusError::Connection("not connected".to_string())),
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            context
                .comm
                .log(&format!("{} Throwed: {}", err.kind_name(), err));
            warn!(function_code = u8::from(function_code), error = %err, "modbus request failed");
        }

        result
    }

    async fn read(
        &self,
        function_code: FunctionCode,
        starting_address: u16,
        ammount: u16,
    ) -> ModbusResult<ModbusResponse> {
        let query = ModbusQuery::read(self.unit_id(), function_code, starting_address, ammount);
        self.transact(
            function_code,
            format!("starting address: {starting_address}, quantity: {ammount}"),
            query,
        )
        .await
    }

    pub async fn read_coils(&self, starting_address: u16, ammount: u16) -> ModbusResult<Vec<bool>> {
        self.read(FunctionCode::ReadCoils, starting_address, ammount)
            .await?
            .into_coils()
    }

    pub async fn read_discrete_inputs(
        &self,
        starting_address: u16,
        ammount: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read(FunctionCode::ReadDiscreteInputs, starting_address, ammount)
            .await?
            .into_coils()
    }

    pub async fn read_holding_registers(
        &self,
        starting_address: u16,
        ammount: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read(FunctionCode::ReadHoldingRegisters, starting_address, ammount)
            .await?
            .into_registers()
    }

    pub async fn read_input_registers(
        &self,
        starting_address: u16,
        ammount: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read(FunctionCode::ReadInputRegisters, starting_address, ammount)
            .await?
            .into_registers()
    }

    pub async fn write_single_coil(&self, address: u16, value: bool) -> ModbusResult<()> {
        let query = ModbusQuery::single_write(self.unit_id(), address, ModbusDataType::Coil(value));
        self.transact(
            FunctionCode::WriteSingleCoil,
            format!("starting address: {address}, value: {value}"),
            query,
        )
        .await?;
        Ok(())
    }

    pub async fn write_single_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        let query =
            ModbusQuery::single_write(self.unit_id(), address, ModbusDataType::Register(value));
        self.transact(
            FunctionCode::WriteSingleRegister,
            format!("starting address: {address}, value: {value}"),
            query,
        )
        .await?;
        Ok(())
    }

    pub async fn write_multiple_coils(&self, starting_address: u16, values: &[bool]) -> ModbusResult<()> {
        let modbus_values = values.iter().map(|value| ModbusDataType::Coil(*value)).collect();
        let query = ModbusQuery::multiple_write(self.unit_id(), starting_address, modbus_values);
        self.transact(
            FunctionCode::WriteMultipleCoils,
            format!(
                "starting address: {starting_address}, quantity: {}",
                values.len()
            ),
            query,
        )
        .await?;
        Ok(())
    }

    pub async fn write_multiple_registers(
        &self,
        starting_address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        let modbus_values = values
            .iter()
            .map(|value| ModbusDataType::Register(*value))
            .collect();
        let query = ModbusQuery::multiple_write(self.unit_id(), starting_address, modbus_values);
        self.transact(
            FunctionCode::WriteMultipleRegisters,
            format!(
                "starting address: {starting_address}, quantity: {}",
                values.len()
            ),
            query,
        )
        .await?;
        Ok(())
    }

    /// Writes `values` at `write_starting_address`, then reads back
    /// `read_ammount` registers, in one request.
    pub async fn read_write_multiple_registers(
        &self,
        read_starting_address: u16,
        read_ammount: u16,
        write_starting_address: u16,
        values: &[u16],
    ) -> ModbusResult<Vec<i16>> {
        let query = ModbusQuery::multiple_read_write(
            self.unit_id(),
            read_starting_address,
            read_ammount,
            write_starting_address,
            values.to_vec(),
        );
        let registers = self
            .transact(
                FunctionCode::ReadWriteMultipleRegisters,
                format!(
                    "starting address read: {read_starting_address}, quantity read: {read_ammount}, starting address write: {write_starting_address}, quantity write: {}",
                    values.len()
                ),
                query,
            )
            .await?
            .into_registers()?;

        Ok(registers.into_iter().map(|value| value as i16).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::notification::ChannelNotificationSink;
    use tracing_test::traced_test;

    #[test]
    fn test_default_params() {
        let params = ModbusMasterConnectionParams::default();
        assert_eq!(params.unit_id, 1);
        assert_eq!(params.connect_timeout, Duration::from_millis(1000));
        assert_eq!(params.response_timeout, Duration::from_millis(1000));
        assert_eq!(params.retries, 3);
        assert_eq!(params.poll_interval, Duration::from_millis(10));

        let params = params.with_retries(0).with_unit_id(17);
        assert_eq!(params.retries, 0);
        assert_eq!(params.unit_id, 17);
    }

    #[tokio::test]
    async fn test_not_connected_fails_without_io() {
        let (sink, mut events) = ChannelNotificationSink::new();
        let master = ModbusMasterConnection::new_tcp(
            "127.0.0.1:502".parse().unwrap(),
            ModbusMasterConnectionParams::default(),
        )
        .with_notification_sink(Arc::new(sink));

        let result = master.read_coils(0, 8).await;
        assert!(matches!(result, Err(ModbusError::Connection(_))));

        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, ModbusEvent::Sent(_)));
        }
    }

    #[tokio::test]
    async fn test_unit_id_is_shared() {
        let master = ModbusMasterConnection::new_udp(
            "127.0.0.1:502".parse().unwrap(),
            ModbusMasterConnectionParams::default().with_unit_id(5),
        );
        assert_eq!(master.unit_id(), 5);
        master.set_unit_id(9);
        assert_eq!(master.unit_id(), 9);
        assert!(!master.is_connected().await);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failures_are_logged() {
        let master = ModbusMasterConnection::new_tcp(
            "127.0.0.1:502".parse().unwrap(),
            ModbusMasterConnectionParams::default(),
        );

        let result = master.write_single_coil(3, true).await;
        assert!(matches!(result, Err(ModbusError::Connection(_))));

        assert!(logs_contain("FC5 (Write Single Coil), starting address: 3, value: true"));
        assert!(logs_contain("modbus request failed"));
    }
}
