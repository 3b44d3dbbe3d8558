pub mod cli;
pub mod load_config;
pub mod openai;

pub use cli::{run, Cli, Commands};
