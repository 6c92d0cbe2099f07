//! 各处理器共用的校验步骤
//!
//! 每一步失败都对应一个确定的响应码，并且不产生任何副作用
//! （校验和不匹配时的告警除外）。

use super::{OperationFailure, PillarContext};
use crate::storage::{check_file_id, checksums_match, verify_algorithm_supported};
use chrono::{DateTime, Utc};
use common::{AlarmCode, ChecksumData, ChecksumSpec, FilePart, Request, ResponseCode};
use log::warn;

/// 请求必须指定本节点服务的集合
pub fn validate_collection<'r>(
    ctx: &PillarContext,
    request: &'r Request,
) -> Result<&'r str, OperationFailure> {
    let collection_id = request
        .header
        .collection_id
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| OperationFailure::not_understood("request carries no collectionID"))?;
    if !ctx.settings.serves_collection(collection_id) {
        return Err(OperationFailure::new(
            ResponseCode::RequestNotSupported,
            format!("collection '{}' is not served by pillar '{}'", collection_id, ctx.pillar_id()),
        ));
    }
    Ok(collection_id)
}

/// 操作请求必须指向本节点；识别请求可以不带 pillarID
pub fn validate_pillar_id(
    ctx: &PillarContext,
    request: &Request,
    required: bool,
) -> Result<(), OperationFailure> {
    match request.header.pillar_id.as_deref() {
        Some(id) if id == ctx.pillar_id() => Ok(()),
        Some(id) => Err(OperationFailure::not_understood(format!(
            "request is addressed to pillar '{}', this is '{}'",
            id,
            ctx.pillar_id()
        ))),
        None if required => Err(OperationFailure::not_understood("request carries no pillarID")),
        None => Ok(()),
    }
}

/// 文件 ID 格式：长度、白名单正则、不能逃出存储目录
pub fn validate_file_id(ctx: &PillarContext, file_id: &str) -> Result<(), OperationFailure> {
    if file_id.chars().count() > ctx.settings.max_file_id_length {
        return Err(OperationFailure::not_understood(format!(
            "file id is longer than {} characters",
            ctx.settings.max_file_id_length
        )));
    }
    check_file_id(file_id)?;
    if let Some(pattern) = &ctx.file_id_pattern {
        if !pattern.is_match(file_id) {
            return Err(OperationFailure::not_understood(format!(
                "file id '{}' does not match the allowed pattern",
                file_id
            )));
        }
    }
    Ok(())
}

pub fn validate_checksum_spec(spec: &ChecksumSpec) -> Result<(), OperationFailure> {
    verify_algorithm_supported(spec)?;
    Ok(())
}

/// 只校验规格；校验和值本身在比较时才解析，无法解析的值视为不匹配
pub fn validate_checksum_data(data: &ChecksumData) -> Result<(), OperationFailure> {
    validate_checksum_spec(&data.checksum_spec)
}

/// 破坏性操作需要调用方提供现有文件的校验和（可配置）
pub fn require_existing_checksum<'r>(
    ctx: &PillarContext,
    data: Option<&'r ChecksumData>,
) -> Result<Option<&'r ChecksumData>, OperationFailure> {
    match data {
        Some(data) => {
            validate_checksum_data(data)?;
            Ok(Some(data))
        }
        None if ctx.settings.require_checksum_for_destructive_requests => {
            Err(OperationFailure::new(
                ResponseCode::ExistingFileChecksumFailure,
                "a checksum for the existing file is required",
            ))
        }
        None => Ok(None),
    }
}

pub fn require_new_checksum<'r>(
    ctx: &PillarContext,
    data: Option<&'r ChecksumData>,
) -> Result<Option<&'r ChecksumData>, OperationFailure> {
    match data {
        Some(data) => {
            validate_checksum_data(data)?;
            Ok(Some(data))
        }
        None if ctx.settings.require_checksum_for_new_file_requests => Err(OperationFailure::new(
            ResponseCode::NewFileChecksumFailure,
            "a checksum for the new file is required",
        )),
        None => Ok(None),
    }
}

pub fn verify_file_exists(
    ctx: &PillarContext,
    collection_id: &str,
    file_id: &str,
) -> Result<(), OperationFailure> {
    ctx.model.verify_file_exists(file_id, collection_id)?;
    Ok(())
}

pub fn verify_file_absent(
    ctx: &PillarContext,
    collection_id: &str,
    file_id: &str,
) -> Result<(), OperationFailure> {
    if ctx.model.has_file(file_id, collection_id)? {
        return Err(OperationFailure::new(
            ResponseCode::DuplicateFileFailure,
            format!("file '{}' already exists", file_id),
        ));
    }
    Ok(())
}

/// 空间检查；`freed` 是操作完成后会释放的字节数（替换时的旧文件）
pub fn verify_space(
    ctx: &PillarContext,
    collection_id: &str,
    needed: Option<u64>,
    freed: u64,
) -> Result<(), OperationFailure> {
    let Some(needed) = needed else {
        return Ok(());
    };
    let available = ctx.model.size_left(collection_id)?.saturating_add(freed);
    if needed > available {
        return Err(OperationFailure::new(
            ResponseCode::Failure,
            format!(
                "not enough space: {} bytes requested, {} bytes left",
                needed, available
            ),
        ));
    }
    Ok(())
}

pub fn validate_file_part(part: &FilePart, file_size: u64) -> Result<(), OperationFailure> {
    let end = part.part_offset.checked_add(part.part_length);
    match end {
        Some(end) if end <= file_size => Ok(()),
        _ => Err(OperationFailure::not_understood(format!(
            "file part {}+{} exceeds file size {}",
            part.part_offset, part.part_length, file_size
        ))),
    }
}

/// 结果数量上限：请求值和节点配置取较小者
pub fn effective_max_results(ctx: &PillarContext, requested: Option<u64>) -> usize {
    let cap = match requested {
        Some(requested) => requested.min(ctx.settings.max_number_of_results),
        None => ctx.settings.max_number_of_results,
    };
    usize::try_from(cap).unwrap_or(usize::MAX)
}

/// 时间戳是否落在请求给出的闭区间内
pub fn in_time_range(
    timestamp: DateTime<Utc>,
    min: Option<DateTime<Utc>>,
    max: Option<DateTime<Utc>>,
) -> bool {
    min.map_or(true, |min| timestamp >= min) && max.map_or(true, |max| timestamp <= max)
}

/// 写路径保护：调用方提供的现有文件校验和必须与存储中的一致
///
/// 总是重新计算，不使用缓存。
pub fn verify_existing_checksum(
    ctx: &PillarContext,
    collection_id: &str,
    file_id: &str,
    expected: &ChecksumData,
) -> Result<(), OperationFailure> {
    let actual = ctx
        .model
        .fresh_checksum_data(file_id, collection_id, &expected.checksum_spec)?;
    if checksums_match(&expected.checksum_value, &actual.checksum_value) {
        return Ok(());
    }

    let text = format!(
        "checksum of existing file '{}' does not match: expected {}, stored {} ({})",
        file_id, expected.checksum_value, actual.checksum_value, expected.checksum_spec
    );
    warn!("{}", text);
    ctx.alarms
        .raise(AlarmCode::ChecksumAlarm, Some(collection_id), Some(file_id), &text);
    Err(OperationFailure::new(
        ResponseCode::ExistingFileChecksumFailure,
        text,
    ))
}

/// 暂存的新文件必须与调用方给出的校验和一致，否则丢弃暂存文件
pub fn verify_new_checksum(
    ctx: &PillarContext,
    collection_id: &str,
    file_id: &str,
    expected: &ChecksumData,
) -> Result<(), OperationFailure> {
    let actual = match ctx
        .model
        .staged_checksum(file_id, collection_id, &expected.checksum_spec)
    {
        Ok(actual) => actual,
        Err(e) => {
            discard_staged(ctx, collection_id, file_id);
            return Err(e.into());
        }
    };
    if checksums_match(&expected.checksum_value, &actual) {
        return Ok(());
    }

    discard_staged(ctx, collection_id, file_id);
    let text = format!(
        "checksum of received file '{}' does not match: expected {}, received {} ({})",
        file_id, expected.checksum_value, actual, expected.checksum_spec
    );
    warn!("{}", text);
    ctx.alarms
        .raise(AlarmCode::ChecksumAlarm, Some(collection_id), Some(file_id), &text);
    Err(OperationFailure::new(ResponseCode::NewFileChecksumFailure, text))
}

/// 丢弃暂存文件；失败只记日志
pub fn discard_staged(ctx: &PillarContext, collection_id: &str, file_id: &str) {
    if let Err(e) = ctx.model.discard_staged(file_id, collection_id) {
        warn!("Could not discard staged file {}/{}: {}", collection_id, file_id, e);
    }
}
