pub mod payload;
pub mod prompts;
pub mod session;
pub mod video;

pub use payload::{CaptionEntry, CaptionTrack, ExtractedPayload, StepRole, TableRecordSet};
pub use prompts::{PromptSet, PromptStep};
pub use session::{RenderedContent, Session, SessionEnd, TurnOutcome};
pub use video::{load_video_list, VideoEntry};
