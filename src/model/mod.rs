pub mod board;
pub mod config;
pub mod project;

pub use board::*;
pub use config::*;
pub use project::*;
