use crate::error::{Error, Result};
use core::time::Duration;
use tokio::sync::Semaphore;

/// How the arbitration loop decides to stop.
///
/// Exactly one policy is active per balancer. An external cancellation is an
/// abort and applies under either policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Once the intake closes, keep processing completions and stop when
    /// every dispatched item has completed.
    #[default]
    Drain,
    /// Stop after the given duration passes with neither an intake nor a
    /// completion event. Closing the intake disables intake and publishes
    /// [`State::Draining`](crate::State::Draining) but does not stop the loop.
    IdleTimeout(Duration),
}

/// Runtime configuration for a [`Balancer`](crate::Balancer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Number of workers, fixed for the balancer's lifetime.
    pub workers: usize,
    /// Items a worker may hold ahead of the one it is running. `0` makes every
    /// dispatch a synchronous handoff.
    pub queue_capacity: usize,
    /// Items buffered between generators and the arbitration loop.
    pub intake_capacity: usize,
    pub shutdown: ShutdownPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 0,
            intake_capacity: 1,
            shutdown: ShutdownPolicy::Drain,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the pool or intake is empty, a
    /// capacity exceeds what a Tokio channel can hold, or the idle timeout is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "workers must be greater than 0".to_string(),
            });
        }

        if self.intake_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "intake_capacity must be greater than 0".to_string(),
            });
        }

        if self.queue_capacity > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "queue_capacity must not exceed {}",
                    Semaphore::MAX_PERMITS
                ),
            });
        }

        if self.intake_capacity > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "intake_capacity must not exceed {}",
                    Semaphore::MAX_PERMITS
                ),
            });
        }

        if self.shutdown == ShutdownPolicy::IdleTimeout(Duration::ZERO) {
            return Err(Error::InvalidConfig {
                reason: "idle timeout must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub const fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub const fn intake_capacity(mut self, capacity: usize) -> Self {
        self.config.intake_capacity = capacity;
        self
    }

    pub const fn shutdown(mut self, policy: ShutdownPolicy) -> Self {
        self.config.shutdown = policy;
        self
    }

    pub const fn idle_timeout(self, timeout: Duration) -> Self {
        self.shutdown(ShutdownPolicy::IdleTimeout(timeout))
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
