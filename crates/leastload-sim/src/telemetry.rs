//! # Logging
//!
//! The simulation logs through `tracing`, printed to the console by
//! `tracing_subscriber::fmt`. The balancer library emits its own events
//! (dispatch, completion, state changes) when built with its `tracing`
//! feature, which this binary enables.
//!
//! ## Filtering
//!
//! `RUST_LOG` selects what is shown; the default is `info`. Per-item dispatch
//! and completion events are at `trace`:
//!
//! ```bash
//! RUST_LOG=leastload=trace,leastload_sim=info cargo run --bin leastload-sim
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;

    Ok(())
}
