use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::mime;
use crate::models::record::FileDescriptor;

/// 待提交的候选文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            path: None,
        }
    }

    /// 根据扩展名推断 MIME 类型
    pub fn guessed(name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        let mime_type = mime::guess_from_name(&name).to_string();
        Self {
            name,
            size,
            mime_type,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            name: self.name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            source_path: self.path.clone(),
        }
    }
}

/// 队列准入限制
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueLimits {
    /// 队列中最多文件数
    pub max_files: usize,
    /// 单个文件大小上限（MB）
    pub max_size_mb: u64,
    /// 允许的 MIME 类型，空表示不限制
    #[serde(default)]
    pub accepted_types: Vec<String>,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_size_mb: 50,
            accepted_types: default_accepted_types(),
        }
    }
}

/// 默认允许的类型：图片、PDF、Office 文档和 CSV
pub fn default_accepted_types() -> Vec<String> {
    [
        "image/*",
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.ms-excel",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "text/csv",
        "application/vnd.ms-powerpoint",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
