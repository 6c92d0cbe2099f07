use crate::error::SecurityError;
use crate::identity::CertificateIdentity;
use crate::permission::PermissionStore;
use common::OperationType;
use log::{debug, warn};
use std::sync::Arc;

/// 操作授权器
///
/// 身份必须已经通过认证；这里只查权限索引。
pub struct OperationAuthorizor {
    permission_store: Arc<PermissionStore>,
}

impl OperationAuthorizor {
    pub fn new(permission_store: Arc<PermissionStore>) -> Self {
        OperationAuthorizor { permission_store }
    }

    pub fn authorize_operation(
        &self,
        identity: &CertificateIdentity,
        operation: OperationType,
        collection_id: Option<&str>,
    ) -> Result<(), SecurityError> {
        if self
            .permission_store
            .is_operation_permitted_for_certificate(identity, operation, collection_id)
        {
            debug!("{:?} permitted for {}", operation, identity);
            return Ok(());
        }
        warn!(
            "{:?} on collection {:?} denied for {}",
            operation, collection_id, identity
        );
        Err(SecurityError::OperationAuthorization(format!(
            "{} is not permitted to perform {:?} on collection {}",
            identity,
            operation,
            collection_id.unwrap_or("<none>")
        )))
    }

    /// 检查签名证书是否允许由 `user` 这个组件使用
    pub fn authorize_certificate_use(
        &self,
        identity: &CertificateIdentity,
        user: &str,
    ) -> Result<(), SecurityError> {
        if self
            .permission_store
            .is_user_permitted_for_certificate(identity, user)
        {
            return Ok(());
        }
        warn!("Component '{}' presented certificate {} it may not use", user, identity);
        Err(SecurityError::CertificateUse(format!(
            "'{}' is not an allowed user of certificate {}",
            user, identity
        )))
    }
}
