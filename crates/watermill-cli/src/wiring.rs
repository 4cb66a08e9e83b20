//! Turns a validated [`Config`] into live adapters and a [`Pipeline`].

use anyhow::Context;
use std::sync::Arc;

use watermill_core::blob::HttpBlobUploader;
use watermill_core::config::Config;
use watermill_core::events::EventPublisher;
use watermill_core::pipeline::{Pipeline, PipelineParts};
use watermill_core::queue::RedisTaskSource;
use watermill_core::store::PostgrestStore;
use watermill_decider::OpenAiDecider;
use watermill_server::AppState;

/// Connect the queue and check the store. Either failing is fatal.
pub async fn build_pipeline(config: &Config, publisher: EventPublisher) -> anyhow::Result<Pipeline> {
    let source = RedisTaskSource::connect(&config.queue.redis_url, config.queue.key.clone())
        .await
        .context("bundle queue is unreachable")?;
    tracing::info!(queue = %source.key(), "connected to bundle queue");

    let store = PostgrestStore::new(&config.store.url, config.store.key.clone());
    store
        .health_check()
        .await
        .context("relational store is unreachable")?;
    tracing::info!("relational store reachable");

    let decider = OpenAiDecider::new(&config.decider).context("failed to build decision client")?;
    let uploader = HttpBlobUploader::coins(reqwest::Client::new(), &config.blob);

    let pipeline = Pipeline::new(
        PipelineParts {
            source: Arc::new(source),
            store: Arc::new(store),
            decider: Arc::new(decider),
            uploader: Arc::new(uploader),
            publisher,
        },
        &config.pipeline,
    )
    .context("failed to build image downloader")?;
    Ok(pipeline)
}

/// Handler state sharing `publisher` with the pipeline. Without a pipeline
/// the status stays idle.
pub fn app_state(config: &Config, publisher: EventPublisher, pipeline: Option<&Pipeline>) -> AppState {
    let client = reqwest::Client::new();
    let screenshots = Arc::new(HttpBlobUploader::screenshots(client.clone(), &config.blob));
    let lens = Arc::new(HttpBlobUploader::lens(client, &config.blob));
    let static_dir = config.pipeline.static_dir.clone();

    match pipeline {
        Some(p) => AppState::new(publisher, p.status(), screenshots, lens, static_dir),
        None => AppState::detached(publisher, screenshots, lens, static_dir),
    }
}
