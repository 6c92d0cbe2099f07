use crate::alarm::AlarmDispatcher;
use crate::audit::{AuditRecord, AuditTrailManager};
use crate::bus::MessageBus;
use crate::exchange::FileExchange;
use crate::locks::FileLockTable;
use crate::storage::{StorageError, StorageModel};
use chrono::{DateTime, Utc};
use common::{ChecksumData, ChecksumSpec, FileAction, PillarSettings, Request};
use regex::Regex;
use security::SecurityManager;
use std::sync::Arc;

/// 所有处理器共享的只读上下文
///
/// 处理器本身不保存任何请求状态，请求之间共享的只有这里的协作者。
pub struct PillarContext {
    pub settings: PillarSettings,
    pub file_id_pattern: Option<Regex>,
    pub model: StorageModel,
    pub exchange: Arc<dyn FileExchange>,
    pub audit: Arc<dyn AuditTrailManager>,
    pub alarms: AlarmDispatcher,
    pub security: Arc<dyn SecurityManager>,
    pub bus: Arc<dyn MessageBus>,
    pub locks: FileLockTable,
    pub started_at: DateTime<Utc>,
}

impl PillarContext {
    pub fn pillar_id(&self) -> &str {
        &self.settings.pillar_id
    }

    pub fn time_to_deliver(&self) -> u64 {
        self.settings.time_to_deliver_ms
    }

    /// 以请求发送者为操作者记录审计事件
    pub fn record_audit(
        &self,
        request: &Request,
        collection_id: &str,
        file_id: Option<&str>,
        action: FileAction,
        info: &str,
    ) {
        self.audit.add_audit_event(AuditRecord {
            collection_id,
            file_id,
            actor: &request.header.from,
            info,
            audit_trail_information: request.header.audit_trail_information.as_deref(),
            action,
            operation_id: Some(&request.header.correlation_id),
        });
    }

    /// 按请求的规格计算已归档文件的校验和，并记录审计事件
    pub fn calculate_requested_checksum(
        &self,
        request: &Request,
        collection_id: &str,
        file_id: &str,
        spec: Option<&ChecksumSpec>,
    ) -> Result<Option<ChecksumData>, StorageError> {
        let Some(spec) = spec else {
            return Ok(None);
        };
        let data = self.model.checksum_data(file_id, collection_id, Some(spec))?;
        self.record_audit(
            request,
            collection_id,
            Some(file_id),
            FileAction::ChecksumCalculated,
            &format!("Calculated {} checksum", spec),
        );
        Ok(Some(data))
    }
}
