mod ask;
mod chat;
mod config;
mod ingest;
mod serve;
mod status;

pub use ask::{AskArgs, handle_ask};
pub use chat::{ChatArgs, handle_chat};
pub use config::{ConfigCommand, handle_config};
pub use ingest::{IngestArgs, handle_ingest};
pub use serve::{ServeArgs, handle_serve};
pub use status::handle_status;
