//! Requester simulation for the `leastload` balancer.
//!
//! Spawns a set of requesters that each issue a fixed number of requests
//! against one balancer, waits for them, closes the intake, and prints how
//! the work was spread over the pool.

mod config;
mod requester;
mod telemetry;

use clap::Parser;
use config::{CliArgs, SimConfig};
use leastload::{Balancer, Report};
use requester::requester;
use telemetry::init_telemetry;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = SimConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let (intake, balancer) = Balancer::new(config.balancer.clone())?;
    let stats = balancer.stats();
    let shutdown_token = balancer.shutdown_token();
    let running = tokio::spawn(balancer.run());

    let handles: Vec<_> = (0..config.num_requesters)
        .map(|id| {
            tokio::spawn(requester(
                id,
                intake.clone(),
                config.requests_per_requester,
                config.max_work,
                config.max_think,
            ))
        })
        .collect();
    // Requesters hold the only remaining intake handles; the intake closes
    // when the last one finishes.
    drop(intake);

    let requesters = futures::future::join_all(handles);
    tokio::pin!(requesters);

    tokio::select! {
        results = &mut requesters => {
            let mut answered = 0;
            for (id, result) in results.into_iter().enumerate() {
                match result {
                    Ok(Ok(total)) => answered += total,
                    Ok(Err(e)) => tracing::warn!("Requester {id} gave up: {e}"),
                    Err(e) => tracing::error!("Requester {id} task failed: {e}"),
                }
            }
            tracing::info!("All requesters finished, {answered} requests answered");
        }
        () = shutdown_signal() => {
            tracing::info!(
                "Shutdown signal received, cancelling with {} items in flight",
                stats.in_flight()
            );
            shutdown_token.cancel();
        }
    }

    let report = running.await??;
    log_report(&report);

    Ok(())
}

fn log_startup_info(config: &SimConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting simulation with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting simulation: {} workers, queue capacity {}, {} requesters x {} requests",
            config.balancer.workers,
            config.balancer.queue_capacity,
            config.num_requesters,
            config.requests_per_requester
        );
    }
}

fn log_report(report: &Report) {
    tracing::info!(
        "Balancer stopped ({:?}) after {:.2?}: {} dispatched, {} completed, {} panicked",
        report.reason,
        report.elapsed,
        report.dispatched,
        report.completed,
        report.panicked
    );

    for worker in &report.workers {
        let share = if report.dispatched == 0 {
            0.0
        } else {
            worker.dispatched as f64 * 100.0 / report.dispatched as f64
        };
        tracing::info!(
            "  worker {}: {} dispatched ({share:.1}%), {} pending",
            worker.worker,
            worker.dispatched,
            worker.pending
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
