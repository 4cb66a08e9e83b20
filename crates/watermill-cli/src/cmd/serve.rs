use anyhow::{Context, Result};
use watermill_core::config::Config;
use watermill_core::events::EventPublisher;

use crate::wiring;

pub fn run(mut config: Config, port: Option<u16>, no_worker: bool) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if no_worker {
        config.validate_uploads()?;
    } else {
        config.validate()?;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let publisher = EventPublisher::new();

        let (state, worker) = if no_worker {
            tracing::info!("queue polling disabled");
            (wiring::app_state(&config, publisher, None), None)
        } else {
            let pipeline = wiring::build_pipeline(&config, publisher.clone()).await?;
            let state = wiring::app_state(&config, publisher, Some(&pipeline));
            let worker = tokio::spawn(async move { pipeline.run().await });
            (state, Some(worker))
        };

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let actual_port = listener.local_addr()?.port();
        println!("watermill feed → http://localhost:{actual_port}");

        let result = watermill_server::serve_on(state, listener, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await;

        if let Some(worker) = worker {
            worker.abort();
        }
        result
    })
}
