pub mod config;
pub mod error;
pub mod types;

pub use config::SkylarkConfig;
pub use error::{Result, SkylarkError};
pub use types::*;
