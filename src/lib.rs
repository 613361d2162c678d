#![forbid(unsafe_code)]

pub mod anim;
pub mod assets;
pub mod audio;
pub mod compose;
pub mod composite;
pub mod config;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod prepare;
pub mod rows;

pub use anim::{Ease, SlideFrames};
pub use compose::{FrameRgba, SlideLayers};
pub use config::Config;
pub use encode::{EncodeConfig, FfmpegEncoder};
pub use error::{ReelError, ReelResult};
pub use pipeline::{RunReport, run};
pub use rows::SlideRecord;
