use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::UploadRecord;
use crate::services::UploadStats;

/// 初始化 tracing 输出
///
/// 优先读取 `RUST_LOG`，未设置时使用 `info`
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n文件上传日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 向日志文件追加一行
pub fn append_log_line(log_file_path: &str, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// 单条记录在日志文件中的格式
pub fn format_record_line(record: &UploadRecord) -> String {
    let mut line = format!(
        "#{} {} [{}] {}%",
        record.id, record.name, record.status, record.progress
    );
    if let Some(error) = &record.error {
        line.push_str(&format!(" 错误: {}", error));
    }
    if let Some(locator) = &record.resource_locator {
        line.push_str(&format!(" -> {}", locator));
    }
    if let Some(description) = &record.description {
        line.push_str(&format!(" 描述: {}", truncate_text(description, 60)));
    }
    line
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发上传队列模式");
    info!(
        "📊 数量上限: {}，单文件上限: {} MB",
        config.max_files, config.max_size_mb
    );
    info!(
        "⏱️ 进度步长: {}%，间隔: {}ms，检查点 {}% 失败概率 {}",
        config.progress_step,
        config.progress_interval_ms,
        config.failure_checkpoint,
        config.failure_probability
    );
    info!("{}", "=".repeat(60));
}

/// 记录清单加载信息
///
/// # 参数
/// - `total`: 清单总数
pub fn log_manifests_loaded(total: usize) {
    info!("✓ 找到 {} 个待上传的批次清单", total);
    info!("💡 每批完成后再开始下一批\n");
}

/// 记录批次开始信息
pub fn log_batch_start(batch_num: usize, total_batches: usize, name: &str, files: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始上传第 {}/{} 批: {}", batch_num, total_batches, name);
    info!("📄 本批文件: {} 个", files);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `stats`: 本批结束时的队列统计
pub fn log_batch_complete(batch_num: usize, stats: &UploadStats) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 批完成: 成功 {}/{}，失败 {}",
        batch_num, stats.completed_count, stats.total_count, stats.failed_count
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(
    completed: usize,
    failed: usize,
    skipped: usize,
    total: usize,
    log_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部上传完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", completed, total);
    info!("❌ 失败: {}", failed);
    info!("⏭️ 跳过: {}", skipped);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
