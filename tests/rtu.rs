mod common;

use common::rtu_reply;
use modbus_master::{
    validate_crc, ModbusError, ModbusMasterConnection, ModbusMasterConnectionParams,
    ModbusSubprotocol, RtuLink,
};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

fn rtu_master(stream: DuplexStream, params: ModbusMasterConnectionParams) -> ModbusMasterConnection {
    let link = RtuLink::new(stream, params.poll_interval);
    ModbusMasterConnection::from_socket(Box::new(link), ModbusSubprotocol::ModbusRTU, params)
}

async fn read_request(stream: &mut DuplexStream, len: usize) -> anyhow::Result<Vec<u8>> {
    let mut request = vec![0u8; len];
    stream.read_exact(&mut request).await?;
    assert!(validate_crc(&request));
    Ok(request)
}

#[tokio::test]
async fn test_read_holding_registers_over_serial() -> anyhow::Result<()> {
    let (master_end, mut slave_end) = tokio::io::duplex(256);
    let master = rtu_master(master_end, ModbusMasterConnectionParams::default());

    let slave = tokio::spawn(async move {
        let request = read_request(&mut slave_end, 8).await?;
        assert_eq!(request, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]);

        //Answer in two bursts
        let mut pdu = vec![0x03, 0x14];
        for register in 0..10u16 {
            pdu.extend_from_slice(&register.to_be_bytes());
        }
        let reply = rtu_reply(0x01, &pdu);
        slave_end.write_all(&reply[..6]).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        slave_end.write_all(&reply[6..]).await?;
        anyhow::Ok(slave_end)
    });

    let registers = master.read_holding_registers(0, 10).await?;
    assert_eq!(registers, (0..10).collect::<Vec<u16>>());

    let _slave_end = slave.await??;
    Ok(())
}

#[tokio::test]
async fn test_exception_frame_ends_the_wait_early() -> anyhow::Result<()> {
    let (master_end, mut slave_end) = tokio::io::duplex(256);
    let params = ModbusMasterConnectionParams::default().with_response_timeout(Duration::from_secs(5));
    let master = rtu_master(master_end, params);

    let slave = tokio::spawn(async move {
        read_request(&mut slave_end, 8).await?;
        slave_end.write_all(&rtu_reply(0x01, &[0x81, 0x01])).await?;
        anyhow::Ok(slave_end)
    });

    let started = Instant::now();
    let result = master.read_coils(0, 100).await;

    assert!(matches!(result, Err(ModbusError::FunctionCodeNotSupported)));
    assert!(started.elapsed() < Duration::from_secs(5));

    let _slave_end = slave.await??;
    Ok(())
}

#[tokio::test]
async fn test_truncated_answer_fails_the_crc_check() -> anyhow::Result<()> {
    let (master_end, mut slave_end) = tokio::io::duplex(256);
    let params = ModbusMasterConnectionParams::default()
        .with_response_timeout(Duration::from_millis(50))
        .with_retries(1);
    let master = rtu_master(master_end, params);

    let slave = tokio::spawn(async move {
        for _ in 0..2 {
            read_request(&mut slave_end, 8).await?;
            let reply = rtu_reply(0x01, &[0x04, 0x02, 0x00, 0x01]);
            slave_end.write_all(&reply[..4]).await?;
        }
        anyhow::Ok(slave_end)
    });

    let result = master.read_input_registers(0, 1).await;
    assert!(matches!(result, Err(ModbusError::CrcCheckFailed)));

    let _slave_end = slave.await??;
    Ok(())
}

#[tokio::test]
async fn test_write_multiple_registers_over_serial() -> anyhow::Result<()> {
    let (master_end, mut slave_end) = tokio::io::duplex(256);
    let master = rtu_master(
        master_end,
        ModbusMasterConnectionParams::default().with_unit_id(0x11),
    );

    let slave = tokio::spawn(async move {
        let request = read_request(&mut slave_end, 13).await?;
        assert_eq!(
            &request[..11],
            &[0x11, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
        slave_end
            .write_all(&rtu_reply(0x11, &[0x10, 0x00, 0x01, 0x00, 0x02]))
            .await?;
        anyhow::Ok(slave_end)
    });

    master.write_multiple_registers(1, &[0x000A, 0x0102]).await?;

    let _slave_end = slave.await??;
    Ok(())
}
