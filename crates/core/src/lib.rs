#![forbid(unsafe_code)]

pub mod achievements;
pub mod error;
pub mod hold_timer;
pub mod model;
pub mod recorder;
pub mod stats;
pub mod streak;
pub mod time;

pub use error::Error;
pub use time::Clock;
