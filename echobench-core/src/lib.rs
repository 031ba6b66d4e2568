mod codec;
mod config;
mod constants;
mod stats;

pub use codec::*;
pub use config::*;
pub use constants::*;
pub use stats::*;
