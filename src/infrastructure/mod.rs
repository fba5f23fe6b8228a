//! 基础设施层 - 页面能力
//!
//! 只与浏览器页面打交道，不包含任何会话或业务语义。

pub mod ui_executor;

pub use ui_executor::{RunButtonProbe, UiExecutor};
