//! 上传记录模型
//!
//! 一个排队文件对应一条 `UploadRecord`，状态机见 `UploadStatus`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 上传状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 已入队，尚未开始
    Queued,
    /// 上传中
    Uploading,
    /// 上传完成，正在生成图片描述
    Analyzing,
    /// 已完成
    Completed,
    /// 失败（可重试）
    Failed,
}

impl UploadStatus {
    /// 状态名称
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Queued => "queued",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Analyzing => "analyzing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    /// 是否为一次运行的终止状态
    pub fn is_terminal(self) -> bool {
        match self {
            UploadStatus::Completed | UploadStatus::Failed => true,
            UploadStatus::Queued | UploadStatus::Uploading | UploadStatus::Analyzing => false,
        }
    }

    /// 是否处于传输/分析阶段
    pub fn is_active(self) -> bool {
        match self {
            UploadStatus::Uploading | UploadStatus::Analyzing => true,
            UploadStatus::Queued | UploadStatus::Completed | UploadStatus::Failed => false,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 图片描述的生成结果
///
/// 区分"没有尝试"和"尝试了但失败"，两者最终状态都是 `Completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    /// 未请求（非图片，或尚未走到这一步）
    #[default]
    NotRequested,
    /// 已生成描述
    Described,
    /// 请求失败、超时或服务不可用
    Unavailable,
}

/// 上传记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: u64,
    pub name: String,
    /// 字节数
    pub size: u64,
    pub mime_type: String,
    pub status: UploadStatus,
    /// 0..=100
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub enrichment: EnrichmentOutcome,
    pub created_at: DateTime<Utc>,
    /// 本地文件路径，仅用于给图片描述服务读取内容
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl UploadRecord {
    /// 是否为图片
    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }
}

/// 判断 MIME 是否为图片
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// 创建记录所需的描述信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub source_path: Option<PathBuf>,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            source_path: None,
        }
    }
}

/// 记录的部分更新
///
/// 可为空的字段使用 `Option<Option<_>>`：外层 `None` 表示不修改，
/// `Some(None)` 表示清空
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub status: Option<UploadStatus>,
    pub progress: Option<u8>,
    pub error: Option<Option<String>>,
    pub resource_locator: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub enrichment: Option<EnrichmentOutcome>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RecordPatch {
    /// 重新进入上传阶段：进度归零，清空上一次运行的结果
    pub fn restart() -> Self {
        Self {
            status: Some(UploadStatus::Uploading),
            progress: Some(0),
            error: Some(None),
            resource_locator: Some(None),
            description: Some(None),
            enrichment: Some(EnrichmentOutcome::NotRequested),
            created_at: None,
        }
    }

    /// 进度推进
    pub fn progress(progress: u8, status: UploadStatus) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// 在检查点失败
    pub fn failed(progress: u8, error: impl Into<String>) -> Self {
        Self {
            status: Some(UploadStatus::Failed),
            progress: Some(progress),
            error: Some(Some(error.into())),
            ..Default::default()
        }
    }

    /// 将补丁合并进记录
    ///
    /// 合并后如果状态不是 `Failed`，错误信息一律清空
    pub fn apply_to(self, record: &mut UploadRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(progress) = self.progress {
            record.progress = progress.min(100);
        }
        if let Some(error) = self.error {
            record.error = error;
        }
        if let Some(locator) = self.resource_locator {
            record.resource_locator = locator;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(enrichment) = self.enrichment {
            record.enrichment = enrichment;
        }
        if let Some(created_at) = self.created_at {
            record.created_at = created_at;
        }

        if record.status != UploadStatus::Failed {
            record.error = None;
        }
    }
}

/// 推送给展示层的进度事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub id: u64,
    pub progress: u8,
    pub status: UploadStatus,
}
