//! 存储模型：文件归档 + 校验和缓存
//!
//! 处理器只通过这里访问存储。默认规格的校验和会被缓存，
//! 文件删除或替换时失效。

use super::archive::{FileInfo, FileStore};
use super::checksum::{compute_digest, ChecksumEntry, ChecksumStore};
use super::error::StorageError;
use chrono::Utc;
use common::{ChecksumData, ChecksumSpec};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;

pub struct StorageModel {
    archive: Arc<dyn FileStore>,
    checksums: ChecksumStore,
    default_spec: ChecksumSpec,
}

impl StorageModel {
    pub fn new(archive: Arc<dyn FileStore>, default_spec: ChecksumSpec) -> Self {
        StorageModel {
            archive,
            checksums: ChecksumStore::new(),
            default_spec,
        }
    }

    pub fn default_spec(&self) -> &ChecksumSpec {
        &self.default_spec
    }

    pub fn has_file(&self, file_id: &str, collection_id: &str) -> Result<bool, StorageError> {
        self.archive.has_file(file_id, collection_id)
    }

    pub fn verify_file_exists(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        if self.archive.has_file(file_id, collection_id)? {
            Ok(())
        } else {
            Err(StorageError::not_found(file_id, collection_id))
        }
    }

    pub fn file_info(&self, file_id: &str, collection_id: &str) -> Result<FileInfo, StorageError> {
        self.archive.file_info(file_id, collection_id)
    }

    pub fn open_file(&self, file_id: &str, collection_id: &str) -> Result<File, StorageError> {
        self.archive.open_file(file_id, collection_id)
    }

    pub fn list_files(&self, collection_id: &str) -> Result<Vec<FileInfo>, StorageError> {
        self.archive.list_files(collection_id)
    }

    pub fn size_left(&self, collection_id: &str) -> Result<u64, StorageError> {
        self.archive.size_left(collection_id)
    }

    /// 已归档文件在指定规格（缺省为默认规格）下的校验和
    pub fn checksum_data(
        &self,
        file_id: &str,
        collection_id: &str,
        spec: Option<&ChecksumSpec>,
    ) -> Result<ChecksumData, StorageError> {
        let spec = spec.unwrap_or(&self.default_spec);
        if spec == &self.default_spec {
            let entry = self.default_checksum(file_id, collection_id)?;
            return Ok(ChecksumData {
                checksum_spec: spec.clone(),
                checksum_value: entry.checksum,
                calculation_timestamp: entry.calculation_timestamp,
            });
        }
        let mut file = self.archive.open_file(file_id, collection_id)?;
        Ok(ChecksumData {
            checksum_spec: spec.clone(),
            checksum_value: compute_digest(&mut file, spec)?,
            calculation_timestamp: Utc::now(),
        })
    }

    /// 默认规格的校验和，未缓存时计算并缓存
    pub fn default_checksum(
        &self,
        file_id: &str,
        collection_id: &str,
    ) -> Result<ChecksumEntry, StorageError> {
        if let Some(entry) = self.checksums.get(collection_id, file_id) {
            return Ok(entry);
        }
        self.calculate_default_checksum(file_id, collection_id)
    }

    /// 不经缓存，直接读取归档中的文件计算校验和
    ///
    /// 写路径保护使用这里，结果按默认规格时顺带刷新缓存。
    pub fn fresh_checksum_data(
        &self,
        file_id: &str,
        collection_id: &str,
        spec: &ChecksumSpec,
    ) -> Result<ChecksumData, StorageError> {
        if spec == &self.default_spec {
            let entry = self.calculate_default_checksum(file_id, collection_id)?;
            return Ok(ChecksumData {
                checksum_spec: spec.clone(),
                checksum_value: entry.checksum,
                calculation_timestamp: entry.calculation_timestamp,
            });
        }
        let mut file = self.archive.open_file(file_id, collection_id)?;
        Ok(ChecksumData {
            checksum_spec: spec.clone(),
            checksum_value: compute_digest(&mut file, spec)?,
            calculation_timestamp: Utc::now(),
        })
    }

    fn calculate_default_checksum(
        &self,
        file_id: &str,
        collection_id: &str,
    ) -> Result<ChecksumEntry, StorageError> {
        // 代数必须在打开文件之前读取
        let generation = self.checksums.generation(collection_id, file_id);
        let mut file = self.archive.open_file(file_id, collection_id)?;
        let entry = ChecksumEntry {
            file_id: file_id.to_string(),
            checksum: compute_digest(&mut file, &self.default_spec)?,
            calculation_timestamp: Utc::now(),
        };
        if self
            .checksums
            .insert_if_current(collection_id, entry.clone(), generation)
        {
            debug!(
                "Calculated {} checksum for {}/{}",
                self.default_spec, collection_id, file_id
            );
        } else {
            debug!(
                "{}/{} changed while its checksum was calculated, not caching",
                collection_id, file_id
            );
        }
        Ok(entry)
    }

    /// 下载数据写入暂存区
    pub fn stage_file(
        &self,
        file_id: &str,
        collection_id: &str,
        source: &mut dyn Read,
    ) -> Result<u64, StorageError> {
        self.archive.stage_file(file_id, collection_id, source)
    }

    pub fn staged_checksum(
        &self,
        file_id: &str,
        collection_id: &str,
        spec: &ChecksumSpec,
    ) -> Result<String, StorageError> {
        let mut file = self.archive.open_staged(file_id, collection_id)?;
        Ok(compute_digest(&mut file, spec)?)
    }

    pub fn discard_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        self.archive.discard_staged(file_id, collection_id)
    }

    // 归档变更之后再失效缓存，失败时也一样

    pub fn commit_new_file(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        let result = self.archive.commit_staged(file_id, collection_id);
        self.checksums.invalidate(collection_id, file_id);
        result
    }

    pub fn replace_file(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        let result = self.archive.replace_with_staged(file_id, collection_id);
        self.checksums.invalidate(collection_id, file_id);
        result
    }

    pub fn delete_file(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        let result = self.archive.delete_file(file_id, collection_id);
        self.checksums.invalidate(collection_id, file_id);
        result
    }
}
