pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod llm;
pub mod market;
pub mod models;
pub mod server;
pub mod utils;

pub use error::{Error, Result};
pub use llm::Llm;
