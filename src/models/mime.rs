//! 扩展名到 MIME 类型的静态映射
//!
//! 清单文件中未写 `mime_type` 时使用

use phf::phf_map;

/// 无法识别时的兜底类型
pub const FALLBACK_MIME: &str = "application/octet-stream";

static EXTENSION_MIME: phf::Map<&'static str, &'static str> = phf_map! {
    "png" => "image/png",
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    "bmp" => "image/bmp",
    "pdf" => "application/pdf",
    "doc" => "application/msword",
    "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "xls" => "application/vnd.ms-excel",
    "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "ppt" => "application/vnd.ms-powerpoint",
    "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "csv" => "text/csv",
    "txt" => "text/plain",
    "json" => "application/json",
    "zip" => "application/zip",
    "mp4" => "video/mp4",
    "mp3" => "audio/mpeg",
};

/// 根据文件名推断 MIME 类型
pub fn guess_from_name(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return FALLBACK_MIME;
    };
    EXTENSION_MIME
        .get(ext.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(FALLBACK_MIME)
}
