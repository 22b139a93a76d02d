use crate::models::candidate::CandidateFile;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 一个批次清单（一个 TOML 文件）
#[derive(Debug, Clone)]
pub struct BatchManifest {
    pub name: String,
    pub files: Vec<CandidateFile>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    files: Vec<RawFileEntry>,
}

#[derive(Debug, Deserialize)]
struct RawFileEntry {
    name: String,
    size: Option<u64>,
    mime_type: Option<String>,
    path: Option<PathBuf>,
}

/// 从 TOML 文件加载批次清单
///
/// - `mime_type` 缺省时按扩展名推断
/// - `size` 缺省时读取 `path` 指向文件的大小
/// - 相对 `path` 以清单所在目录为基准
pub async fn load_manifest(toml_file_path: &Path) -> Result<BatchManifest> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let raw: RawManifest = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    let base_dir = toml_file_path.parent().unwrap_or_else(|| Path::new("."));

    let mut files = Vec::with_capacity(raw.files.len());
    for entry in raw.files {
        files.push(resolve_entry(entry, base_dir).await?);
    }

    let name = if raw.name.is_empty() {
        toml_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    } else {
        raw.name
    };

    Ok(BatchManifest { name, files })
}

async fn resolve_entry(entry: RawFileEntry, base_dir: &Path) -> Result<CandidateFile> {
    let path = entry.path.map(|p| {
        if p.is_relative() {
            base_dir.join(p)
        } else {
            p
        }
    });

    let size = match (entry.size, &path) {
        (Some(size), _) => size,
        (None, Some(p)) => fs::metadata(p)
            .await
            .with_context(|| format!("无法读取文件大小: {}", p.display()))?
            .len(),
        (None, None) => anyhow::bail!("文件 {} 既没有 size 也没有 path", entry.name),
    };

    let file = match entry.mime_type {
        Some(mime_type) => CandidateFile::new(entry.name, size, mime_type),
        None => CandidateFile::guessed(entry.name, size),
    };

    Ok(match path {
        Some(path) => file.with_path(path),
        None => file,
    })
}

/// 从文件夹中加载所有 TOML 清单
///
/// 单个文件解析失败只记录警告，不影响其他清单
pub async fn load_all_manifests(folder_path: &str) -> Result<Vec<BatchManifest>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    // read_dir 的顺序不固定
    paths.sort();

    let mut manifests = Vec::new();
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_manifest(&path).await {
            Ok(manifest) => {
                tracing::info!("成功加载 {} 个文件", manifest.files.len());
                manifests.push(manifest);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_manifest_infers_mime_and_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cat.png"), vec![0u8; 300]).unwrap();
        let manifest_path = dir.path().join("batch.toml");
        std::fs::write(
            &manifest_path,
            r#"
name = "第一批"

[[files]]
name = "cat.png"
path = "cat.png"

[[files]]
name = "report.pdf"
size = 1024
"#,
        )
        .unwrap();

        let manifest = load_manifest(&manifest_path).await.unwrap();

        assert_eq!(manifest.name, "第一批");
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[0].mime_type, "image/png");
        assert_eq!(manifest.files[0].size, 300);
        assert_eq!(manifest.files[0].path, Some(dir.path().join("cat.png")));
        assert_eq!(manifest.files[1].mime_type, "application/pdf");
        assert_eq!(manifest.files[1].size, 1024);
        assert!(manifest.files[1].path.is_none());
    }

    #[tokio::test]
    async fn test_entry_without_size_or_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("bad.toml");
        std::fs::write(&manifest_path, "[[files]]\nname = \"x.txt\"\n").unwrap();

        assert!(load_manifest(&manifest_path).await.is_err());
    }

    #[tokio::test]
    async fn test_load_all_skips_broken_manifests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.toml"),
            "[[files]]\nname = \"a.csv\"\nsize = 10\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.toml"), "not = [valid").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let manifests = load_all_manifests(dir.path().to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].name, "a");
    }

    #[tokio::test]
    async fn test_missing_folder_is_error() {
        assert!(load_all_manifests("/definitely/not/here").await.is_err());
    }
}
