#![doc = "Fixed-rate tick driver and performance monitor."]

pub mod callback;
pub mod clock;
mod deferred;
pub mod driver;
pub mod monitor;
pub mod timer;

pub use callback::*;
pub use clock::*;
pub use deferred::DeferredAction;
pub use driver::*;
pub use monitor::*;
pub use timer::*;
