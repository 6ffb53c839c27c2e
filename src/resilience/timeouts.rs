//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap protected calls with a deadline
//! - Report elapsed time for both completed and expired calls
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the wrapped future is dropped at the
//!   deadline, which cancels it at its next await point
//! - Work running on a blocking thread (`spawn_blocking`) cannot be cancelled:
//!   the thread keeps running after the deadline and its result is discarded
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Result of running a future under a deadline.
#[derive(Debug)]
pub enum Deadline<T> {
    /// The future finished in time.
    Completed { output: T, elapsed: Duration },
    /// The deadline passed first.
    Expired { elapsed: Duration },
}

/// Run `future` for at most `limit`.
pub async fn run_with_deadline<F>(limit: Duration, future: F) -> Deadline<F::Output>
where
    F: Future,
{
    let started = Instant::now();
    match tokio::time::timeout(limit, future).await {
        Ok(output) => Deadline::Completed {
            output,
            elapsed: started.elapsed(),
        },
        Err(_) => Deadline::Expired {
            elapsed: started.elapsed(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_deadline() {
        let result = run_with_deadline(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            7
        })
        .await;

        match result {
            Deadline::Completed { output, elapsed } => {
                assert_eq!(output, 7);
                assert!(elapsed >= Duration::from_millis(200));
            }
            Deadline::Expired { .. } => panic!("should complete"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_and_drops_future() {
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let f = flag.clone();
        let result = run_with_deadline(Duration::from_secs(1), async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            f.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .await;

        assert!(matches!(result, Deadline::Expired { elapsed } if elapsed >= Duration::from_secs(1)));
        tokio::time::sleep(Duration::from_secs(10)).await;
        // Cancelled work never reached its side effect.
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
