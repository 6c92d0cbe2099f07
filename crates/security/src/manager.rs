//! SecurityManager 门面
//!
//! `BasicSecurityManager` 组合认证、签名与授权；两项检查可以分别通过
//! 配置关闭。`PermissiveSecurityManager` 是显式命名的直通模式，只能
//! 通过 `TrustMode::Permissive` 选中。

use crate::authenticator::MessageAuthenticator;
use crate::authorizer::OperationAuthorizor;
use crate::error::SecurityError;
use crate::identity::CertificateIdentity;
use crate::permission::PermissionStore;
use crate::signer::{MessageSigner, SigningCredential};
use common::{OperationType, PermissionSet, SecuritySettings, TrustMode};
use log::{info, warn};
use std::fmt;
use std::sync::Arc;

/// 经过（或未经过）认证的消息发送者
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerIdentity {
    Certificate(CertificateIdentity),
    /// 认证被关闭，不推断调用者身份
    Anonymous,
}

impl SignerIdentity {
    pub fn certificate(&self) -> Option<&CertificateIdentity> {
        match self {
            SignerIdentity::Certificate(identity) => Some(identity),
            SignerIdentity::Anonymous => None,
        }
    }
}

impl fmt::Display for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerIdentity::Certificate(identity) => write!(f, "{}", identity),
            SignerIdentity::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// 安全管理器接口
pub trait SecurityManager: Send + Sync {
    /// 校验消息签名
    fn authenticate_message(
        &self,
        message: &[u8],
        signature: Option<&[u8]>,
    ) -> Result<SignerIdentity, SecurityError>;

    /// 对外发消息签名；不签名的模式返回 `None`
    fn sign_message(&self, message: &[u8]) -> Result<Option<Vec<u8>>, SecurityError>;

    /// 认证后检查操作权限
    fn authorize_operation(
        &self,
        operation: OperationType,
        message: &[u8],
        signature: Option<&[u8]>,
        collection_id: Option<&str>,
    ) -> Result<SignerIdentity, SecurityError>;

    /// 认证后检查签名证书是否允许由 `user` 使用
    fn authorize_certificate_use(
        &self,
        user: &str,
        message: &[u8],
        signature: Option<&[u8]>,
    ) -> Result<(), SecurityError>;

    fn certificate_fingerprint(&self, identity: &CertificateIdentity)
        -> Result<String, SecurityError>;
}

/// 根据配置构建安全管理器
pub fn security_manager_from_settings(
    settings: &SecuritySettings,
    component_id: &str,
) -> Result<Arc<dyn SecurityManager>, SecurityError> {
    match settings.mode {
        TrustMode::Verified => Ok(Arc::new(BasicSecurityManager::new(settings, component_id)?)),
        TrustMode::Permissive => {
            warn!("Trust mode PERMISSIVE: messages are neither verified nor signed");
            Ok(Arc::new(PermissiveSecurityManager))
        }
    }
}

pub struct BasicSecurityManager {
    component_id: String,
    require_message_authentication: bool,
    require_operation_authorization: bool,
    permission_store: Arc<PermissionStore>,
    authenticator: MessageAuthenticator,
    authorizor: OperationAuthorizor,
    signer: Option<MessageSigner>,
}

impl BasicSecurityManager {
    /// 加载权限配置和（可选的）签名凭据
    pub fn new(settings: &SecuritySettings, component_id: &str) -> Result<Self, SecurityError> {
        let store = PermissionStore::from_permissions(&settings.permissions, component_id)?;
        let signer = match &settings.credential_file {
            Some(path) => {
                let credential = SigningCredential::from_pem_file(path)?;
                info!(
                    "Loaded signing credential {} from {}",
                    credential.certificate().identity(),
                    path.display()
                );
                Some(MessageSigner::new(credential))
            }
            None => None,
        };
        Ok(Self::with_parts(
            component_id,
            settings.require_message_authentication,
            settings.require_operation_authorization,
            Arc::new(store),
            signer,
        ))
    }

    pub fn with_parts(
        component_id: &str,
        require_message_authentication: bool,
        require_operation_authorization: bool,
        permission_store: Arc<PermissionStore>,
        signer: Option<MessageSigner>,
    ) -> Self {
        if let Some(signer) = &signer {
            let identity = signer.certificate().identity();
            if permission_store.certificate(identity).is_none() {
                warn!(
                    "Signing certificate {} is not registered; peers will reject our messages",
                    identity
                );
            }
        }
        BasicSecurityManager {
            component_id: component_id.to_string(),
            require_message_authentication,
            require_operation_authorization,
            authenticator: MessageAuthenticator::new(permission_store.clone()),
            authorizor: OperationAuthorizor::new(permission_store.clone()),
            permission_store,
            signer,
        }
    }

    pub fn permission_store(&self) -> &Arc<PermissionStore> {
        &self.permission_store
    }

    /// 重新加载权限；失败时保留旧索引
    pub fn reload_permissions(&self, set: &PermissionSet) -> Result<(), SecurityError> {
        self.permission_store
            .load_permissions(set, &self.component_id)
    }

    fn verify(
        &self,
        message: &[u8],
        signature: Option<&[u8]>,
    ) -> Result<CertificateIdentity, SecurityError> {
        let signature = signature.ok_or_else(|| {
            SecurityError::MessageAuthentication("message carries no signature".into())
        })?;
        self.authenticator.authenticate_message(message, signature)
    }
}

impl SecurityManager for BasicSecurityManager {
    fn authenticate_message(
        &self,
        message: &[u8],
        signature: Option<&[u8]>,
    ) -> Result<SignerIdentity, SecurityError> {
        if !self.require_message_authentication {
            return Ok(SignerIdentity::Anonymous);
        }
        self.verify(message, signature).map(SignerIdentity::Certificate)
    }

    fn sign_message(&self, message: &[u8]) -> Result<Option<Vec<u8>>, SecurityError> {
        match &self.signer {
            Some(signer) => signer.sign_message(message).map(Some),
            None => Ok(None),
        }
    }

    fn authorize_operation(
        &self,
        operation: OperationType,
        message: &[u8],
        signature: Option<&[u8]>,
        collection_id: Option<&str>,
    ) -> Result<SignerIdentity, SecurityError> {
        if !self.require_operation_authorization {
            return self.authenticate_message(message, signature);
        }
        let identity = self.verify(message, signature)?;
        self.authorizor
            .authorize_operation(&identity, operation, collection_id)?;
        Ok(SignerIdentity::Certificate(identity))
    }

    fn authorize_certificate_use(
        &self,
        user: &str,
        message: &[u8],
        signature: Option<&[u8]>,
    ) -> Result<(), SecurityError> {
        if !self.require_operation_authorization {
            return self.authenticate_message(message, signature).map(|_| ());
        }
        let identity = self.verify(message, signature)?;
        self.authorizor.authorize_certificate_use(&identity, user)
    }

    fn certificate_fingerprint(
        &self,
        identity: &CertificateIdentity,
    ) -> Result<String, SecurityError> {
        self.permission_store.fingerprint(identity)
    }
}

/// 直通安全管理器：不认证、不授权、不签名
pub struct PermissiveSecurityManager;

impl SecurityManager for PermissiveSecurityManager {
    fn authenticate_message(
        &self,
        _message: &[u8],
        _signature: Option<&[u8]>,
    ) -> Result<SignerIdentity, SecurityError> {
        Ok(SignerIdentity::Anonymous)
    }

    fn sign_message(&self, _message: &[u8]) -> Result<Option<Vec<u8>>, SecurityError> {
        Ok(None)
    }

    fn authorize_operation(
        &self,
        _operation: OperationType,
        _message: &[u8],
        _signature: Option<&[u8]>,
        _collection_id: Option<&str>,
    ) -> Result<SignerIdentity, SecurityError> {
        Ok(SignerIdentity::Anonymous)
    }

    fn authorize_certificate_use(
        &self,
        _user: &str,
        _message: &[u8],
        _signature: Option<&[u8]>,
    ) -> Result<(), SecurityError> {
        Ok(())
    }

    fn certificate_fingerprint(
        &self,
        identity: &CertificateIdentity,
    ) -> Result<String, SecurityError> {
        Err(SecurityError::UnregisteredPermission(identity.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive_manager_is_anonymous() {
        let manager = PermissiveSecurityManager;
        assert_eq!(
            manager.authenticate_message(b"hello", None).unwrap(),
            SignerIdentity::Anonymous
        );
        assert_eq!(manager.sign_message(b"hello").unwrap(), None);
        assert!(manager
            .authorize_certificate_use("anyone", b"hello", None)
            .is_ok());
    }

    #[test]
    fn test_unsigned_message_rejected_when_required() {
        let manager = BasicSecurityManager::with_parts(
            "pillar-1",
            true,
            true,
            Arc::new(PermissionStore::new()),
            None,
        );
        assert!(matches!(
            manager.authenticate_message(b"hello", None),
            Err(SecurityError::MessageAuthentication(_))
        ));
        assert!(matches!(
            manager.authorize_operation(OperationType::GetFile, b"hello", None, Some("books")),
            Err(SecurityError::MessageAuthentication(_))
        ));
    }

    #[test]
    fn test_disabled_checks_pass_through() {
        let manager = BasicSecurityManager::with_parts(
            "pillar-1",
            false,
            false,
            Arc::new(PermissionStore::new()),
            None,
        );
        assert_eq!(
            manager
                .authorize_operation(OperationType::DeleteFile, b"x", None, None)
                .unwrap(),
            SignerIdentity::Anonymous
        );
        assert_eq!(manager.sign_message(b"x").unwrap(), None);
    }

    #[test]
    fn test_permissive_mode_selected_by_name() {
        let manager = security_manager_from_settings(&SecuritySettings::permissive(), "pillar-1")
            .unwrap();
        assert_eq!(
            manager.authenticate_message(b"x", None).unwrap(),
            SignerIdentity::Anonymous
        );
    }
}
