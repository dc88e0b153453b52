use std::fmt::Write;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq)]
pub enum ModbusEvent {
    /// Raw frame as written to the link
    Sent(Vec<u8>),
    /// Raw bytes as read back from the link, possibly a partial frame
    Received(Vec<u8>),
    /// Timestamped, newline terminated protocol log line
    Log(String),
    ConnectionChanged(bool),
}

/// Receives everything the engine reports while it talks to a slave.
///
/// Called synchronously from the transaction, so implementations should hand
/// the event off rather than block.
pub trait ModbusNotificationSink: Send + Sync {
    fn on_event(&self, event: ModbusEvent);
}

/// Forwards events to `tracing`. Used when no other sink is installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotificationSink;

impl ModbusNotificationSink for TracingNotificationSink {
    fn on_event(&self, event: ModbusEvent) {
        match event {
            ModbusEvent::Sent(bytes) => debug!("Tx: {}", format_hex(&bytes)),
            ModbusEvent::Received(bytes) => debug!("Rx: {}", format_hex(&bytes)),
            ModbusEvent::Log(line) => info!("{}", line.trim_end()),
            ModbusEvent::ConnectionChanged(connected) => info!(connected, "connection changed"),
        }
    }
}

/// Pushes events into an unbounded channel for a presentation layer to drain.
#[derive(Clone, Debug)]
pub struct ChannelNotificationSink {
    sender: UnboundedSender<ModbusEvent>,
}

impl ChannelNotificationSink {
    pub fn new() -> (Self, UnboundedReceiver<ModbusEvent>) {
        let (sender, receiver) = unbounded_channel();
        (ChannelNotificationSink { sender }, receiver)
    }
}

impl ModbusNotificationSink for ChannelNotificationSink {
    fn on_event(&self, event: ModbusEvent) {
        // The receiving side going away just means nobody is watching anymore
        let _ = self.sender.send(event);
    }
}

/// `"HH:MM:SS:mmm : <text>\n"` in local time.
pub fn log_line(text: &str) -> String {
    format!(
        "{} : {}\n",
        chrono::Local::now().format("%H:%M:%S:%3f"),
        text
    )
}

/// Space separated upper case hex, e.g. `01 03 00 2A`.
pub fn format_hex(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 3);
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            result.push(' ');
        }
        let _ = write!(result, "{byte:02X}");
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x01, 0x03, 0x00, 0x2A, 0xFF]), "01 03 00 2A FF");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_log_line_shape() {
        let line = log_line("Disconnect");
        assert!(line.ends_with(" : Disconnect\n"));
        // HH:MM:SS:mmm
        assert_eq!(line.find(" : "), Some(12));
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut receiver) = ChannelNotificationSink::new();
        sink.on_event(ModbusEvent::Sent(vec![1, 2]));
        sink.on_event(ModbusEvent::Received(vec![3]));

        assert_eq!(receiver.recv().await, Some(ModbusEvent::Sent(vec![1, 2])));
        assert_eq!(receiver.recv().await, Some(ModbusEvent::Received(vec![3])));
    }
}
