//! # Upload Queue
//!
//! 一个带进度模拟的并发文件上传队列
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有共享状态，只暴露能力
//! - `RecordRepository` - 唯一的记录 owner，提供增删改查
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `validator` - 大小 / 类型 / 重复校验
//! - `Enricher` - 图片描述能力
//! - `UploadStats` - 队列统计
//! - `FailureWriter` - 写失败报告能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文件"的完整上传流程
//! - `UploadCtx` - 上下文封装
//! - `UploadFlow` - 流程编排（进度 → 失败检查点 → 完成 → 图片描述）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/queue` - 上传队列编排器，管理准入和并发
//! - `orchestrator/batch_processor` - 批量上传处理器，命令行入口
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, SimulationSettings};
pub use error::{AdmissionError, AppError, AppResult};
pub use infrastructure::{format_file_size, RecordRepository};
pub use models::{CandidateFile, ProgressEvent, QueueLimits, UploadRecord, UploadStatus};
pub use orchestrator::{App, BatchReport, QueueOrchestrator, SkippedFile};
pub use services::{Enricher, RejectReason, UploadStats};
pub use workflow::{RunOutcome, UploadCtx, UploadFlow};
