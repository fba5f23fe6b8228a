//! 编排层 - 批处理入口
//!
//! 自上而下的分层：编排层驱动工作流层，工作流层组合服务层，
//! 服务层只通过基础设施层触碰页面。

pub mod batch_processor;

pub use batch_processor::App;
