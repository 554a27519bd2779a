//! Serve command: run the HTTP API.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::models::Config;
use crate::server::run_server;
use crate::services::Pipeline;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind, e.g. 127.0.0.1:8080
    #[arg(long, short = 'b')]
    pub bind: Option<String>,
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let pipeline = Arc::new(Pipeline::from_config(config.clone()).await?);
    run_server(pipeline, &config.server.bind).await
}
