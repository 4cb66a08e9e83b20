use anyhow::{bail, Result};
use watermill_core::config::Config;
use watermill_core::events::EventPublisher;
use watermill_core::pipeline::CycleOutcome;

use crate::output::print_json;
use crate::wiring;

pub fn run(mut config: Config, json: bool) -> Result<()> {
    config.validate()?;
    // Nobody is watching the feed, so there is nothing to fade for.
    config.pipeline.fade_delay_ms = 0;

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let pipeline = wiring::build_pipeline(&config, EventPublisher::new()).await?;
        anyhow::Ok(pipeline.run_cycle().await)
    })?;

    if json {
        print_json(&outcome)?;
    } else {
        match &outcome {
            CycleOutcome::Idle => println!("queue empty"),
            CycleOutcome::Finalized { bundle_id, report } => println!(
                "bundle {bundle_id}: {} yes, {} saved, {} uploaded, {} skipped",
                report.yes_count,
                report.created(),
                report.uploaded(),
                report.skipped.len()
            ),
            CycleOutcome::Aborted { .. } => {}
        }
    }

    if let CycleOutcome::Aborted {
        bundle_id,
        stage,
        error,
    } = outcome
    {
        let id = bundle_id.as_deref().unwrap_or("<undecoded>");
        bail!("bundle {id} aborted after {stage}: {error}");
    }
    Ok(())
}
