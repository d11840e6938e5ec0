use core::time::Duration;
use leastload::Intake;
use rand::Rng;
use tokio::time::sleep;

/// Synthetic load generator.
///
/// Issues `requests` requests one at a time: pause for a random think time,
/// submit an operation that blocks for a random duration and returns `1`, then
/// wait for its reply before sending the next. A requester therefore never has
/// more than one request outstanding.
///
/// Returns the sum of the replies, which equals `requests` on success.
///
/// # Errors
///
/// Fails if the balancer stops before all requests were answered.
pub async fn requester(
    requester_id: usize,
    intake: Intake<u64>,
    requests: usize,
    max_work: Duration,
    max_think: Duration,
) -> leastload::Result<u64> {
    let mut total = 0;

    for request in 0..requests {
        if !max_think.is_zero() {
            sleep(random_duration(max_think)).await;
        }

        let work = random_duration(max_work);
        let reply = intake
            .submit(move || {
                std::thread::sleep(work);
                1
            })
            .await?;
        total += reply.await?;

        tracing::debug!(
            requester = requester_id,
            request,
            work_ms = work.as_millis() as u64,
            "Request answered"
        );
    }

    tracing::debug!(requester = requester_id, "Requester finished");
    Ok(total)
}

/// Uniform duration in `[0, max]` at millisecond resolution.
fn random_duration(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use leastload::{Balancer, Config, StopReason};

    #[test]
    fn random_duration_stays_in_range() {
        assert_eq!(random_duration(Duration::ZERO), Duration::ZERO);
        for _ in 0..100 {
            assert!(random_duration(Duration::from_millis(5)) <= Duration::from_millis(5));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn requesters_receive_every_reply() {
        let config = Config::builder().workers(2).queue_capacity(1).build().unwrap();
        let (intake, balancer) = Balancer::new(config).unwrap();
        let running = tokio::spawn(balancer.run());

        let handles: Vec<_> = (0..3)
            .map(|id| {
                tokio::spawn(requester(
                    id,
                    intake.clone(),
                    5,
                    Duration::from_millis(2),
                    Duration::from_millis(1),
                ))
            })
            .collect();
        drop(intake);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(5));
        }

        let report = running.await.unwrap().unwrap();
        assert_eq!(report.reason, StopReason::Drained);
        assert_eq!(report.completed, 15);
    }
}
