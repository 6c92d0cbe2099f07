//! 消息总线
//!
//! 处理器只依赖 `MessageBus::send`。`MemoryMessageBus` 记录所有发出的
//! 消息，`ChannelMessageBus` 把消息交给网络服务按目的地转发。

use common::{AlarmMessage, BusEnvelope, Response};
use log::debug;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Bus closed: {0}")]
    Closed(String),
}

/// 发往某个目的地的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub destination: String,
    pub envelope: BusEnvelope,
}

pub trait MessageBus: Send + Sync {
    fn send(&self, destination: &str, envelope: BusEnvelope) -> Result<(), BusError>;
}

/// 内存总线（测试用）
#[derive(Default)]
pub struct MemoryMessageBus {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl MemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// 取出并清空已发送的消息
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// 已发送的响应（按发送顺序）
    pub fn responses(&self) -> Vec<Response> {
        self.sent()
            .iter()
            .filter_map(|m| serde_json::from_str::<Response>(&m.envelope.body).ok())
            .collect()
    }

    /// 已发送的告警
    pub fn alarms(&self) -> Vec<AlarmMessage> {
        self.sent()
            .iter()
            .filter_map(|m| serde_json::from_str::<AlarmMessage>(&m.envelope.body).ok())
            .collect()
    }
}

impl MessageBus for MemoryMessageBus {
    fn send(&self, destination: &str, envelope: BusEnvelope) -> Result<(), BusError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(OutboundMessage {
                destination: destination.to_string(),
                envelope,
            });
        Ok(())
    }
}

/// 通过 tokio 通道把消息交给网络层
pub struct ChannelMessageBus {
    sender: UnboundedSender<OutboundMessage>,
}

impl ChannelMessageBus {
    pub fn new(sender: UnboundedSender<OutboundMessage>) -> Self {
        ChannelMessageBus { sender }
    }
}

impl MessageBus for ChannelMessageBus {
    fn send(&self, destination: &str, envelope: BusEnvelope) -> Result<(), BusError> {
        debug!("Queueing message for '{}'", destination);
        self.sender
            .send(OutboundMessage {
                destination: destination.to_string(),
                envelope,
            })
            .map_err(|_| BusError::Closed(format!("no receiver for '{}'", destination)))
    }
}
