pub mod activity;
pub mod config;
pub mod correlate;
pub mod error;
pub mod estimate;
pub mod io;
pub mod regularize;
pub mod shift;
pub mod synth;

pub use activity::*;
pub use config::SyncConfig;
pub use error::*;
pub use estimate::*;
pub use regularize::{regularize, HrTrack};
pub use shift::*;
