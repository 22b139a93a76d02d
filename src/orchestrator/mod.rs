//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次准入和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `queue` - 上传队列编排器
//! - 批次准入（数量上限、逐个文件校验）
//! - 为每个通过的文件启动并发上传任务
//! - 维护在途集合，限制重试、删除和清空
//! - 广播进度事件
//!
//! ### `batch_processor` - 批量上传处理器
//! - 管理命令行程序的生命周期（初始化、运行）
//! - 按清单逐批提交，等待完成后自动重试
//! - 写出失败报告和全局统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<BatchManifest>)
//!     ↓
//! queue::QueueOrchestrator (处理一批 CandidateFile)
//!     ↓
//! workflow::UploadFlow (处理单个文件)
//!     ↓
//! services (能力层：validator / enrichment / stats)
//!     ↓
//! infrastructure (基础设施：RecordRepository)
//! ```

pub mod batch_processor;
pub mod queue;

// 重新导出主要类型
pub use batch_processor::App;
pub use queue::{BatchReport, QueueOrchestrator, SkippedFile};
