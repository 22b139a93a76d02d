//! 文件校验 - 业务能力层
//!
//! 纯函数，不产生任何副作用；拒绝原因由调用方负责展示

use thiserror::Error;

use crate::models::{CandidateFile, QueueLimits, UploadRecord};

/// 单个文件被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("File \"{name}\" is too large. Maximum size is {max_size_mb}MB.")]
    TooLarge { name: String, max_size_mb: u64 },
    #[error("File type not supported for \"{name}\" ({mime_type}).")]
    UnsupportedType { name: String, mime_type: String },
    #[error("File \"{name}\" is already in the queue.")]
    Duplicate { name: String },
}

/// 大小是否在限制之内
pub fn is_acceptable_size(file: &CandidateFile, max_size_mb: u64) -> bool {
    file.size <= max_size_mb.saturating_mul(1024 * 1024)
}

/// 类型是否在允许列表中
///
/// 支持精确匹配和 `image/*` 这种前缀通配；列表为空时全部接受
pub fn is_acceptable_type(file: &CandidateFile, allowed_patterns: &[String]) -> bool {
    if allowed_patterns.is_empty() {
        return true;
    }

    let mime = file.mime_type.trim();
    allowed_patterns.iter().any(|pattern| {
        let pattern = pattern.trim();
        if pattern == "*" || pattern == "*/*" {
            return true;
        }
        match pattern.strip_suffix("/*") {
            Some(major) => mime
                .split_once('/')
                .is_some_and(|(m, _)| m.eq_ignore_ascii_case(major)),
            None => mime.eq_ignore_ascii_case(pattern),
        }
    })
}

/// 是否与队列中已有记录重复（文件名和大小都相同）
pub fn is_duplicate(candidate: &CandidateFile, existing: &[UploadRecord]) -> bool {
    existing
        .iter()
        .any(|record| record.name == candidate.name && record.size == candidate.size)
}

/// 依次检查大小、类型、重复，返回第一个不通过的原因
pub fn validate(
    candidate: &CandidateFile,
    limits: &QueueLimits,
    existing: &[UploadRecord],
) -> Result<(), RejectReason> {
    if !is_acceptable_size(candidate, limits.max_size_mb) {
        return Err(RejectReason::TooLarge {
            name: candidate.name.clone(),
            max_size_mb: limits.max_size_mb,
        });
    }

    if !is_acceptable_type(candidate, &limits.accepted_types) {
        return Err(RejectReason::UnsupportedType {
            name: candidate.name.clone(),
            mime_type: candidate.mime_type.clone(),
        });
    }

    if is_duplicate(candidate, existing) {
        return Err(RejectReason::Duplicate {
            name: candidate.name.clone(),
        });
    }

    Ok(())
}
