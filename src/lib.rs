pub mod config;
pub mod error;
pub mod generator;
pub mod loadgen;
pub mod model;

pub mod kafka;
pub mod pipeline;

pub use config::Config;
pub use error::{Error, Result};
pub use loadgen::LoadGenerator;
