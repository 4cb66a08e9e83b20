use anyhow::{bail, Context, Result};
use watermill_core::config::Config;
use watermill_core::paths;
use watermill_core::queue::RedisTaskSource;
use watermill_core::types::BundleTask;

use crate::output::print_json;

pub fn run(config: Config, bundle_id: &str, image_url: &str, json: bool) -> Result<()> {
    paths::validate_bundle_id(bundle_id)?;
    if image_url.trim().is_empty() {
        bail!("image url must not be empty");
    }
    let task = BundleTask::new(bundle_id, image_url);

    let rt = tokio::runtime::Runtime::new()?;
    let len = rt.block_on(async {
        let source = RedisTaskSource::connect(&config.queue.redis_url, config.queue.key.clone())
            .await
            .context("bundle queue is unreachable")?;
        source
            .enqueue(&task)
            .await
            .context("failed to push bundle")
    })?;

    if json {
        print_json(&serde_json::json!({
            "queue": config.queue.key,
            "bundle_id": task.bundle_id,
            "length": len,
        }))?;
    } else {
        println!("queued {} on {} ({len} waiting)", task.bundle_id, config.queue.key);
    }
    Ok(())
}
