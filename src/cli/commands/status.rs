use anyhow::Result;

use crate::cli::output::{OutputFormat, StatusInfo, get_formatter};
use crate::models::{Config, VectorDriver};
use crate::services::{Pipeline, create_backend};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let vector_store_connected =
        if let Ok(store) = create_backend(&config.vector_store, config.embedding.dimension).await {
            store.health_check().await.unwrap_or(false)
        } else {
            false
        };

    let pipeline = Pipeline::from_config(config.clone()).await?;
    let report = pipeline.status().await;

    let status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        embedding_model: config.embedding.model.clone(),
        completion_model: config.completion.model.clone(),
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        collection: config.vector_store.collection.clone(),
        report,
    };

    print!("{}", formatter.format_status(&status));

    if !vector_store_connected && config.vector_store.driver == VectorDriver::Qdrant {
        eprintln!();
        eprintln!("Warning: Qdrant not reachable at {}.", config.vector_store.url);
        eprintln!("         Start it, or switch to the in-memory driver in the config.");
    }

    Ok(())
}
