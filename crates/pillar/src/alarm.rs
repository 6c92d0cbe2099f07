use crate::bus::MessageBus;
use chrono::Utc;
use common::{Alarm, AlarmCode, AlarmMessage, BusEnvelope};
use log::{error, warn};
use security::SecurityManager;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 告警分发器
///
/// 告警先写日志，再签名发往配置的告警目的地。发送失败只记日志，
/// 不影响正在处理的请求。
pub struct AlarmDispatcher {
    component_id: String,
    destination: String,
    bus: Arc<dyn MessageBus>,
    security: Arc<dyn SecurityManager>,
    counter: AtomicU64,
}

impl AlarmDispatcher {
    pub fn new(
        component_id: impl Into<String>,
        destination: impl Into<String>,
        bus: Arc<dyn MessageBus>,
        security: Arc<dyn SecurityManager>,
    ) -> Self {
        AlarmDispatcher {
            component_id: component_id.into(),
            destination: destination.into(),
            bus,
            security,
            counter: AtomicU64::new(0),
        }
    }

    pub fn raise(
        &self,
        code: AlarmCode,
        collection_id: Option<&str>,
        file_id: Option<&str>,
        text: &str,
    ) {
        match code {
            AlarmCode::ChecksumAlarm | AlarmCode::ComponentFailure => error!(
                "ALARM {:?} file={:?} collection={:?}: {}",
                code, file_id, collection_id, text
            ),
            _ => warn!(
                "ALARM {:?} file={:?} collection={:?}: {}",
                code, file_id, collection_id, text
            ),
        }

        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        let message = AlarmMessage {
            correlation_id: format!(
                "{}-alarm-{}-{}",
                self.component_id,
                Utc::now().timestamp_millis(),
                sequence
            ),
            to: self.destination.clone(),
            from: self.component_id.clone(),
            alarm: Alarm {
                alarm_code: code,
                alarm_raiser: self.component_id.clone(),
                file_id: file_id.map(str::to_string),
                collection_id: collection_id.map(str::to_string),
                alarm_text: text.to_string(),
                orig_date_time: Utc::now(),
            },
        };

        if let Err(e) = self.send(&message) {
            error!("Failed to send alarm to '{}': {}", self.destination, e);
        }
    }

    fn send(&self, message: &AlarmMessage) -> anyhow::Result<()> {
        let body = serde_json::to_string(message)?;
        let signature = self.security.sign_message(body.as_bytes())?.map(hex::encode);
        self.bus
            .send(&self.destination, BusEnvelope { body, signature })?;
        Ok(())
    }
}
