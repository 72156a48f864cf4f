pub mod config;
pub mod error;
pub mod resource;
pub mod severity;

pub use config::{Config, PolicyConfig};
pub use error::*;
pub use resource::*;
pub use severity::*;
