pub mod cli;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use models::{AskOutcome, Config, ConversationTurn};
pub use services::Pipeline;
