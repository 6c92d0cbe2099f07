//! 文件交换
//!
//! 请求中的 `fileAddress` / `resultAddress` 指向交换位置。这里只实现
//! 本地文件系统（`file://` URL 或普通路径），所有地址都必须落在
//! 交换目录内，相对路径相对于交换目录解析。

use log::debug;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Invalid exchange address '{0}'")]
    InvalidAddress(String),

    #[error("Address '{0}' is outside the exchange directory")]
    OutsideExchangeDir(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

pub trait FileExchange: Send + Sync {
    fn download(&self, address: &str) -> Result<Box<dyn Read + Send>, ExchangeError>;

    /// 上传数据流，返回字节数
    fn upload(&self, source: &mut dyn Read, address: &str) -> Result<u64, ExchangeError>;
}

pub struct LocalFileExchange {
    base_dir: PathBuf,
}

impl LocalFileExchange {
    pub fn new(base_dir: PathBuf) -> Self {
        LocalFileExchange { base_dir }
    }

    fn resolve(&self, address: &str) -> Result<PathBuf, ExchangeError> {
        let raw = match address.strip_prefix("file://") {
            Some(rest) => rest,
            None if address.contains("://") => {
                return Err(ExchangeError::InvalidAddress(address.to_string()))
            }
            None => address,
        };
        if raw.is_empty() || raw.contains('\0') {
            return Err(ExchangeError::InvalidAddress(address.to_string()));
        }
        let path = Path::new(raw);
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(ExchangeError::OutsideExchangeDir(address.to_string()));
        }

        if !path.is_absolute() {
            return Ok(self.base_dir.join(path));
        }
        if path.starts_with(&self.base_dir) {
            Ok(path.to_path_buf())
        } else {
            Err(ExchangeError::OutsideExchangeDir(address.to_string()))
        }
    }
}

impl FileExchange for LocalFileExchange {
    fn download(&self, address: &str) -> Result<Box<dyn Read + Send>, ExchangeError> {
        let path = self.resolve(address)?;
        debug!("Downloading from {}", path.display());
        Ok(Box::new(File::open(path)?))
    }

    fn upload(&self, source: &mut dyn Read, address: &str) -> Result<u64, ExchangeError> {
        let path = self.resolve(address)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut target = File::create(&path)?;
        let written = io::copy(source, &mut target)?;
        target.sync_all()?;
        debug!("Uploaded {} bytes to {}", written, path.display());
        Ok(written)
    }
}
