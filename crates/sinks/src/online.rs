//! OnlineSink - UDP fire-and-forget telemetry

use std::net::{SocketAddr, UdpSocket};

use contracts::{CompositeEvent, ContractError, EventSink, WriterEntry};
use tracing::{debug, error, instrument, warn};

use crate::error::SinkError;

/// Default max datagram size
pub const DEFAULT_MAX_PACKET_SIZE: usize = 65000;

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnlineFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for OnlineSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: OnlineFormat,
    /// Datagrams larger than this are dropped
    pub max_packet_size: usize,
}

impl OnlineSinkConfig {
    /// Config from a writer entry
    pub fn from_entry(name: &str, entry: &WriterEntry) -> Result<Self, SinkError> {
        let addr_str = entry
            .str_field("addr")
            .ok_or_else(|| SinkError::sink_creation(name, "missing 'addr' field"))?;

        let addr: SocketAddr = addr_str.parse().map_err(|e| {
            SinkError::sink_creation(name, format!("invalid address '{addr_str}': {e}"))
        })?;

        let format = match entry.str_field("format") {
            Some("bincode") => OnlineFormat::Bincode,
            Some("json") | None => OnlineFormat::Json,
            Some(other) => {
                return Err(SinkError::sink_creation(
                    name,
                    format!("unknown format '{other}'"),
                ))
            }
        };

        let max_packet_size = entry
            .fields
            .get("max_packet_size")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_MAX_PACKET_SIZE, |n| n as usize);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that sends composite events over UDP
pub struct OnlineSink {
    name: String,
    config: OnlineSinkConfig,
    socket: Option<UdpSocket>,
}

impl OnlineSink {
    pub fn new(name: impl Into<String>, config: OnlineSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            socket: None,
        }
    }

    /// Create from a writer entry (for factory)
    pub fn from_entry(name: impl Into<String>, entry: &WriterEntry) -> Result<Self, SinkError> {
        let name = name.into();
        let config = OnlineSinkConfig::from_entry(&name, entry)?;
        Ok(Self::new(name, config))
    }

    fn serialize_event(&self, event: &CompositeEvent) -> Result<Vec<u8>, String> {
        match self.config.format {
            OnlineFormat::Json => serde_json::to_vec(event).map_err(|e| format!("json error: {e}")),
            OnlineFormat::Bincode => {
                bincode::serialize(event).map_err(|e| format!("bincode error: {e}"))
            }
        }
    }

    fn transmit(&self, socket: &UdpSocket, data: &[u8], seq: u64) {
        match socket.send(data) {
            Ok(sent) => {
                debug!(sink = %self.name, seq, bytes = sent, "Sent");
            }
            Err(e) => {
                // best-effort: a lost datagram is not a write failure
                error!(sink = %self.name, seq, error = %e, "UDP send failed");
            }
        }
    }
}

impl EventSink for OnlineSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "online_sink_start", skip(self), fields(sink = %self.name, target = %self.config.addr))]
    fn start(&mut self) -> Result<(), ContractError> {
        let bind_addr: SocketAddr = if self.config.addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .and_then(|socket| socket.connect(self.config.addr).map(|()| socket))
            .map_err(|e| ContractError::sink_lifecycle(&self.name, e.to_string()))?;

        debug!(sink = %self.name, target = %self.config.addr, "OnlineSink connected");
        self.socket = Some(socket);
        Ok(())
    }

    #[instrument(
        name = "online_sink_write",
        skip(self, event),
        fields(sink = %self.name, seq = event.seq)
    )]
    fn write(&mut self, event: &CompositeEvent) -> Result<(), ContractError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))?;

        let data = self
            .serialize_event(event)
            .map_err(|e| ContractError::sink_write(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Packet too large, dropped"
            );
            return Ok(());
        }

        self.transmit(socket, &data, event.seq);
        Ok(())
    }

    #[instrument(name = "online_sink_stop", skip(self))]
    fn stop(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "OnlineSink closed");
        Ok(())
    }
}
