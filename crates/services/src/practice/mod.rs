//! Live practice: hold detection feeding a session recorder on a fixed tick.

mod attempt;
mod runner;

pub use attempt::PracticeAttempt;
pub use runner::{FrameSource, PracticeHandle, PracticeLoop, ScriptedFrames};
