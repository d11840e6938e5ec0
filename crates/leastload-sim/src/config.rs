use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use leastload::{Config, ShutdownPolicy};

/// How the simulated balancer is told to stop.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop once requesters are done and all in-flight work completed.
    Drain,
    /// Stop after `IDLE_TIMEOUT_MS` without intake or completions.
    Idle,
}

/// Runtime configuration for the `leastload-sim` binary.
///
/// These settings control the pool shape, the queueing between dispatch and
/// execution, and the synthetic load produced by requesters. All values are
/// parsed from CLI arguments or environment variables (a `.env` file is
/// honored).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "leastload-sim",
    version,
    about = "Drive a least-loaded balancer with simulated requesters"
)]
pub struct CliArgs {
    /// Number of workers in the pool.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 3)]
    pub num_workers: usize,

    /// Items each worker may hold ahead of the one it is running.
    ///
    /// `0` makes every dispatch a synchronous handoff: the balancer waits
    /// until the chosen worker is free. A good value for a buffered pool is
    /// `ceil(NUM_REQUESTERS / NUM_WORKERS)`, since each requester has at most
    /// one request outstanding.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 0)]
    pub queue_capacity: usize,

    /// Requests buffered between requesters and the balancer.
    ///
    /// Environment variable: `INTAKE_CAPACITY`
    #[arg(long, env = "INTAKE_CAPACITY", default_value_t = 1)]
    pub intake_capacity: usize,

    /// Number of concurrent requesters.
    ///
    /// Environment variable: `NUM_REQUESTERS`
    #[arg(long, env = "NUM_REQUESTERS", default_value_t = 8)]
    pub num_requesters: usize,

    /// Requests each requester issues, one at a time, before it exits.
    ///
    /// Environment variable: `REQUESTS_PER_REQUESTER`
    #[arg(long, env = "REQUESTS_PER_REQUESTER", default_value_t = 10)]
    pub requests_per_requester: usize,

    /// Upper bound of the random time an operation takes, in milliseconds.
    ///
    /// Environment variable: `MAX_WORK_MS`
    #[arg(long, env = "MAX_WORK_MS", default_value_t = 500)]
    pub max_work_ms: u64,

    /// Upper bound of the random pause between a requester's requests, in
    /// milliseconds. `0` sends back to back.
    ///
    /// Environment variable: `MAX_THINK_MS`
    #[arg(long, env = "MAX_THINK_MS", default_value_t = 0)]
    pub max_think_ms: u64,

    /// Shutdown policy of the balancer.
    ///
    /// Environment variable: `SHUTDOWN`
    #[arg(long, env = "SHUTDOWN", value_enum, default_value_t = ShutdownMode::Drain)]
    pub shutdown: ShutdownMode,

    /// Idle window for `--shutdown idle`, in milliseconds.
    ///
    /// Environment variable: `IDLE_TIMEOUT_MS`
    #[arg(long, env = "IDLE_TIMEOUT_MS", default_value_t = 10_000)]
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub balancer: Config,
    pub num_requesters: usize,
    pub requests_per_requester: usize,
    pub max_work: Duration,
    pub max_think: Duration,
}

impl TryFrom<CliArgs> for SimConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.intake_capacity == 0 {
            bail!("INTAKE_CAPACITY must be greater than 0");
        }

        if args.num_requesters == 0 {
            bail!("NUM_REQUESTERS must be greater than 0");
        }

        let shutdown = match args.shutdown {
            ShutdownMode::Drain => ShutdownPolicy::Drain,
            ShutdownMode::Idle if args.idle_timeout_ms == 0 => {
                bail!("IDLE_TIMEOUT_MS must be greater than 0 with --shutdown idle")
            }
            ShutdownMode::Idle => {
                ShutdownPolicy::IdleTimeout(Duration::from_millis(args.idle_timeout_ms))
            }
        };

        let balancer = Config::builder()
            .workers(args.num_workers)
            .queue_capacity(args.queue_capacity)
            .intake_capacity(args.intake_capacity)
            .shutdown(shutdown)
            .build()?;

        Ok(Self {
            balancer,
            num_requesters: args.num_requesters,
            requests_per_requester: args.requests_per_requester,
            max_work: Duration::from_millis(args.max_work_ms),
            max_think: Duration::from_millis(args.max_think_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<SimConfig> {
        let argv = std::iter::once("leastload-sim").chain(args.iter().copied());
        let args = CliArgs::try_parse_from(argv)?;
        SimConfig::try_from(args)
    }

    #[test]
    fn defaults_build_a_drain_config() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.balancer.workers, 3);
        assert_eq!(config.balancer.queue_capacity, 0);
        assert_eq!(config.balancer.shutdown, ShutdownPolicy::Drain);
        assert_eq!(config.num_requesters, 8);
    }

    #[test]
    fn idle_mode_uses_the_timeout() {
        let config = parse(&["--shutdown", "idle", "--idle-timeout-ms", "250"]).unwrap();
        assert_eq!(
            config.balancer.shutdown,
            ShutdownPolicy::IdleTimeout(Duration::from_millis(250))
        );
    }

    #[test]
    fn rejects_empty_pool() {
        assert!(parse(&["--num-workers", "0"]).is_err());
    }

    #[test]
    fn rejects_zero_idle_timeout() {
        assert!(parse(&["--shutdown", "idle", "--idle-timeout-ms", "0"]).is_err());
    }

    #[test]
    fn rejects_oversized_queue_capacity() {
        assert!(parse(&["--queue-capacity", "18446744073709551615"]).is_err());
    }
}
