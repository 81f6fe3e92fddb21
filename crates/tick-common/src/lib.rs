#![doc = "Common types shared across the tick-system workspace."]

pub mod config;
pub mod error;
pub mod rate;
pub mod state;

pub use config::*;
pub use error::*;
pub use rate::*;
pub use state::*;
