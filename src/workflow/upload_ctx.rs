//! 上传上下文
//!
//! 封装"我正在上传哪个文件"这一信息，运行期间只读

use std::fmt::Display;
use std::path::PathBuf;

use crate::models::UploadRecord;

/// 单次上传运行的上下文
#[derive(Debug, Clone)]
pub struct UploadCtx {
    pub id: u64,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub is_image: bool,
    pub source_path: Option<PathBuf>,
}

impl UploadCtx {
    pub fn from_record(record: &UploadRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            size: record.size,
            mime_type: record.mime_type.clone(),
            is_image: record.is_image(),
            source_path: record.source_path.clone(),
        }
    }
}

impl Display for UploadCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[文件 #{} {}]", self.id, self.name)
    }
}
