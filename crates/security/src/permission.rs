//! 权限索引
//!
//! 索引是不可变快照，重新加载时整体替换 `Arc`，并发读者看到的
//! 要么是旧索引要么是新索引，不会看到一半。未知身份一律拒绝。

use crate::error::SecurityError;
use crate::identity::{CertificateIdentity, TrustedCertificate};
use common::{OperationPermission, OperationType, PermissionSet};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

/// 单张证书的权限
#[derive(Debug, Clone)]
pub struct CertificatePermission {
    pub certificate: Arc<TrustedCertificate>,
    pub allowed_users: HashSet<String>,
    pub operations: Vec<OperationPermission>,
}

impl CertificatePermission {
    fn permits(&self, operation: OperationType, collection_id: Option<&str>) -> bool {
        self.operations.iter().any(|p| {
            p.operation.permits(operation) && p.applies_to_collection(collection_id)
        })
    }
}

/// 权限索引快照
#[derive(Debug, Default)]
pub struct PermissionIndex {
    entries: HashMap<CertificateIdentity, CertificatePermission>,
    own_identity: Option<CertificateIdentity>,
}

impl PermissionIndex {
    /// 从配置构建索引；任何一条规则出错则整体失败
    pub fn build(set: &PermissionSet, own_component_id: &str) -> Result<Self, SecurityError> {
        let mut entries: HashMap<CertificateIdentity, CertificatePermission> = HashMap::new();
        let mut own_identity = None;

        for (idx, permission) in set.permissions.iter().enumerate() {
            let certificate = TrustedCertificate::from_pem(permission.certificate.as_bytes())
                .map_err(|e| {
                    SecurityError::PermissionConfiguration(format!("permission #{}: {}", idx, e))
                })?;

            if permission.allowed_certificate_users.is_empty() {
                return Err(SecurityError::PermissionConfiguration(format!(
                    "permission #{} ({}) has no allowed certificate users",
                    idx,
                    certificate.identity()
                )));
            }

            let identity = certificate.identity().clone();
            if own_identity.is_none()
                && permission
                    .allowed_certificate_users
                    .iter()
                    .any(|u| u == own_component_id)
            {
                own_identity = Some(identity.clone());
            }

            match entries.get_mut(&identity) {
                Some(existing) => {
                    // 同一身份的多条规则取并集，但证书本身必须一致
                    if existing.certificate.fingerprint() != certificate.fingerprint() {
                        return Err(SecurityError::PermissionConfiguration(format!(
                            "permission #{}: two different certificates share identity {}",
                            idx, identity
                        )));
                    }
                    existing
                        .allowed_users
                        .extend(permission.allowed_certificate_users.iter().cloned());
                    existing
                        .operations
                        .extend(permission.operation_permissions.iter().cloned());
                }
                None => {
                    entries.insert(
                        identity,
                        CertificatePermission {
                            certificate: Arc::new(certificate),
                            allowed_users: permission
                                .allowed_certificate_users
                                .iter()
                                .cloned()
                                .collect(),
                            operations: permission.operation_permissions.clone(),
                        },
                    );
                }
            }
        }

        Ok(PermissionIndex {
            entries,
            own_identity,
        })
    }

    pub fn get(&self, identity: &CertificateIdentity) -> Option<&CertificatePermission> {
        self.entries.get(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 权限存储
pub struct PermissionStore {
    index: RwLock<Arc<PermissionIndex>>,
}

impl PermissionStore {
    /// 创建空的权限存储（拒绝一切）
    pub fn new() -> Self {
        PermissionStore {
            index: RwLock::new(Arc::new(PermissionIndex::default())),
        }
    }

    /// 从配置创建
    pub fn from_permissions(set: &PermissionSet, own_component_id: &str) -> Result<Self, SecurityError> {
        let store = Self::new();
        store.load_permissions(set, own_component_id)?;
        Ok(store)
    }

    /// 加载权限配置并原子替换当前索引
    pub fn load_permissions(
        &self,
        set: &PermissionSet,
        own_component_id: &str,
    ) -> Result<(), SecurityError> {
        let index = PermissionIndex::build(set, own_component_id)?;
        if index.own_identity.is_none() {
            warn!(
                "No permission lists '{}' as an allowed certificate user",
                own_component_id
            );
        }
        info!("Loaded permissions for {} certificate(s)", index.len());

        let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(index);
        Ok(())
    }

    /// 当前索引快照
    pub fn snapshot(&self) -> Arc<PermissionIndex> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_user_permitted_for_certificate(
        &self,
        identity: &CertificateIdentity,
        user: &str,
    ) -> bool {
        let index = self.snapshot();
        match index.get(identity) {
            Some(entry) => entry.allowed_users.contains(user),
            None => {
                debug!("Unknown certificate {} presented by '{}'", identity, user);
                false
            }
        }
    }

    pub fn is_operation_permitted_for_certificate(
        &self,
        identity: &CertificateIdentity,
        operation: OperationType,
        collection_id: Option<&str>,
    ) -> bool {
        let index = self.snapshot();
        match index.get(identity) {
            Some(entry) => entry.permits(operation, collection_id),
            None => false,
        }
    }

    /// 注册证书的指纹（SHA-256 十六进制）
    pub fn fingerprint(&self, identity: &CertificateIdentity) -> Result<String, SecurityError> {
        self.snapshot()
            .get(identity)
            .map(|entry| entry.certificate.fingerprint().to_string())
            .ok_or_else(|| SecurityError::UnregisteredPermission(identity.to_string()))
    }

    /// 已注册的证书
    pub fn certificate(&self, identity: &CertificateIdentity) -> Option<Arc<TrustedCertificate>> {
        self.snapshot()
            .get(identity)
            .map(|entry| entry.certificate.clone())
    }

    /// 本组件自己的证书身份（如果配置中有）
    pub fn own_identity(&self) -> Option<CertificateIdentity> {
        self.snapshot().own_identity.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl Default for PermissionStore {
    fn default() -> Self {
        Self::new()
    }
}
