//! 节点组装

use crate::alarm::AlarmDispatcher;
use crate::audit::{AuditTrailManager, MemoryAuditTrail};
use crate::bus::MessageBus;
use crate::error::PillarError;
use crate::exchange::{FileExchange, LocalFileExchange};
use crate::handler::PillarContext;
use crate::locks::FileLockTable;
use crate::mediator::PillarMediator;
use crate::storage::{
    verify_algorithm_supported, FileStore, ReferenceArchive, StorageError, StorageModel,
};
use chrono::Utc;
use common::{BusEnvelope, PillarSettings};
use log::info;
use security::{security_manager_from_settings, SecurityManager};
use std::sync::Arc;

/// 可替换的外部协作者
pub struct PillarParts {
    pub archive: Arc<dyn FileStore>,
    pub exchange: Arc<dyn FileExchange>,
    pub audit: Arc<dyn AuditTrailManager>,
    pub security: Arc<dyn SecurityManager>,
    pub bus: Arc<dyn MessageBus>,
}

pub struct Pillar {
    mediator: Arc<PillarMediator>,
}

impl Pillar {
    /// 按配置组装：本地目录归档、本地文件交换、有上限的内存审计
    pub fn new(settings: PillarSettings, bus: Arc<dyn MessageBus>) -> Result<Self, PillarError> {
        settings.validate()?;
        let security = security_manager_from_settings(&settings.security, &settings.pillar_id)?;
        let archive = ReferenceArchive::new(
            &settings.storage_dir,
            settings.collections.clone(),
            settings.capacity_bytes,
            settings.minimum_size_left,
        )?;
        let exchange = LocalFileExchange::new(settings.exchange_dir());
        let parts = PillarParts {
            archive: Arc::new(archive),
            exchange: Arc::new(exchange),
            audit: Arc::new(MemoryAuditTrail::with_capacity(settings.max_audit_events)),
            security,
            bus,
        };
        Self::with_parts(settings, parts)
    }

    pub fn with_parts(settings: PillarSettings, parts: PillarParts) -> Result<Self, PillarError> {
        settings.validate()?;
        let file_id_pattern = settings.file_id_pattern()?;
        verify_algorithm_supported(&settings.default_checksum_spec).map_err(StorageError::from)?;
        let alarms = AlarmDispatcher::new(
            settings.pillar_id.clone(),
            settings.alarm_destination.clone(),
            Arc::clone(&parts.bus),
            Arc::clone(&parts.security),
        );
        let model = StorageModel::new(parts.archive, settings.default_checksum_spec.clone());

        info!(
            "Pillar '{}' serving {:?} (default checksum {})",
            settings.pillar_id, settings.collections, settings.default_checksum_spec
        );
        let ctx = PillarContext {
            settings,
            file_id_pattern,
            model,
            exchange: parts.exchange,
            audit: parts.audit,
            alarms,
            security: parts.security,
            bus: parts.bus,
            locks: FileLockTable::new(),
            started_at: Utc::now(),
        };
        Ok(Pillar {
            mediator: Arc::new(PillarMediator::new(Arc::new(ctx))),
        })
    }

    pub fn id(&self) -> &str {
        self.context().pillar_id()
    }

    pub fn context(&self) -> &PillarContext {
        self.mediator.context()
    }

    pub fn mediator(&self) -> Arc<PillarMediator> {
        Arc::clone(&self.mediator)
    }

    /// 节点接收消息的主题：自己的 ID 和所服务的各个集合
    pub fn topics(&self) -> Vec<String> {
        let settings = &self.context().settings;
        let mut topics = vec![settings.pillar_id.clone()];
        topics.extend(settings.collections.iter().cloned());
        topics
    }

    /// 同步处理一条消息
    pub fn handle_envelope(&self, envelope: &BusEnvelope) {
        self.mediator.handle_envelope(envelope);
    }
}
