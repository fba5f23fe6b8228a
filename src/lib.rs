//! 视频切片自动化
//!
//! 驱动浏览器里的 AI Studio 对话页面，对清单里的每个视频按固定
//! 步骤序列提交提示词，从响应里重建字幕轨与切片表格，最终汇总成
//! 切片总表并移交外部渲染脚本。
//!
//! # 架构分层
//!
//! ```text
//! orchestrator  批处理编排（清单循环、批次收尾、渲染移交）
//!     ↓
//! workflow      会话工作流（单轮驱动、恢复状态机、单视频流程）
//!     ↓
//! services      业务服务（状态分类、字幕/表格重建、提取、账号轮换、落盘）
//!     ↓
//! infrastructure 页面能力（选择器探测、JS 执行、剪贴板、文件上传）
//! ```
//!
//! 会话状态全部显式保存在 `models::Session` 里，三类故障
//! （内容拦截 / 配额耗尽 / 超时未完成）由纯函数状态机
//! `workflow::recovery` 裁决恢复动作，可以离线测试。

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::App;
