pub mod config;
pub mod traits;
pub mod util;

pub use config::*;
