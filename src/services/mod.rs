//! 服务层 - 单一职责的业务能力
//!
//! 每个服务只做一件事：状态分类、字幕重建、表格重建、响应提取、
//! 账号轮换、产物落盘。流程编排在 workflow 层。

pub mod artifact_writer;
pub mod classifier;
pub mod extractor;
pub mod identity_switcher;
pub mod srt_parser;
pub mod table_parser;

pub use artifact_writer::ArtifactWriter;
pub use extractor::ResponseExtractor;
pub use identity_switcher::IdentitySwitcher;
