//! 审计记录
//!
//! 只追加；每个事件有单调递增的序号。

use chrono::{DateTime, Utc};
use common::{AuditEvent, FileAction};
use log::debug;
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

/// 内存审计默认保留的事件数
pub const DEFAULT_AUDIT_CAPACITY: usize = 100_000;

/// 审计查询条件，所有条件都是可选的
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub collection_id: Option<String>,
    pub file_id: Option<String>,
    pub min_sequence_number: Option<u64>,
    pub max_sequence_number: Option<u64>,
    pub min_timestamp: Option<DateTime<Utc>>,
    pub max_timestamp: Option<DateTime<Utc>>,
    pub max_results: usize,
}

impl AuditQuery {
    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(collection) = &self.collection_id {
            if &event.collection_id != collection {
                return false;
            }
        }
        if let Some(file_id) = &self.file_id {
            if event.file_id.as_deref() != Some(file_id.as_str()) {
                return false;
            }
        }
        if self.min_sequence_number.is_some_and(|min| event.sequence_number < min) {
            return false;
        }
        if self.max_sequence_number.is_some_and(|max| event.sequence_number > max) {
            return false;
        }
        if self.min_timestamp.is_some_and(|min| event.action_date_time < min) {
            return false;
        }
        if self.max_timestamp.is_some_and(|max| event.action_date_time > max) {
            return false;
        }
        true
    }
}

/// 查询结果；`more_available` 表示还有超出上限的事件
#[derive(Debug, Clone, Default)]
pub struct AuditEventPage {
    pub events: Vec<AuditEvent>,
    pub more_available: bool,
}

/// 一次审计记录的内容
#[derive(Debug, Clone)]
pub struct AuditRecord<'a> {
    pub collection_id: &'a str,
    pub file_id: Option<&'a str>,
    pub actor: &'a str,
    pub info: &'a str,
    pub audit_trail_information: Option<&'a str>,
    pub action: FileAction,
    pub operation_id: Option<&'a str>,
}

pub trait AuditTrailManager: Send + Sync {
    fn add_audit_event(&self, record: AuditRecord<'_>);

    fn get_audit_events(&self, query: &AuditQuery) -> AuditEventPage;
}

/// 内存审计，最多保留 `capacity` 个事件，超出时丢弃最旧的
///
/// 序号不会因为丢弃而重用。
pub struct MemoryAuditTrail {
    capacity: usize,
    inner: RwLock<AuditLog>,
}

struct AuditLog {
    events: VecDeque<AuditEvent>,
    next_sequence_number: u64,
}

impl Default for MemoryAuditTrail {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }
}

impl MemoryAuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemoryAuditTrail {
            capacity: capacity.max(1),
            inner: RwLock::new(AuditLog {
                events: VecDeque::new(),
                next_sequence_number: 1,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditTrailManager for MemoryAuditTrail {
    fn add_audit_event(&self, record: AuditRecord<'_>) {
        let mut log = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let sequence_number = log.next_sequence_number;
        log.next_sequence_number += 1;
        if log.events.len() >= self.capacity {
            if let Some(dropped) = log.events.pop_front() {
                debug!("Audit trail full, dropping event #{}", dropped.sequence_number);
            }
        }
        log.events.push_back(AuditEvent {
            sequence_number,
            collection_id: record.collection_id.to_string(),
            file_id: record.file_id.map(str::to_string),
            actor_on_file: record.actor.to_string(),
            info: record.info.to_string(),
            audit_trail_information: record.audit_trail_information.map(str::to_string),
            action_on_file: record.action,
            operation_id: record.operation_id.map(str::to_string),
            action_date_time: Utc::now(),
        });
    }

    fn get_audit_events(&self, query: &AuditQuery) -> AuditEventPage {
        let log = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut page = AuditEventPage::default();
        for event in log.events.iter().filter(|e| query.matches(e)) {
            if page.events.len() >= query.max_results {
                page.more_available = true;
                break;
            }
            page.events.push(event.clone());
        }
        page
    }
}
