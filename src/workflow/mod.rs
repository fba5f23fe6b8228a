//! 工作流层 - 会话编排
//!
//! `TurnDriver` 驱动单轮往返，`recovery` 是纯函数恢复状态机，
//! `VideoFlow` 把两者串成一个视频的完整会话。

pub mod recovery;
pub mod turn_driver;
pub mod video_flow;

pub use recovery::{Decision, OperatorConsole, RecoveryPolicy, RecoveryPrompt, StdinConsole};
pub use turn_driver::TurnDriver;
pub use video_flow::VideoFlow;
