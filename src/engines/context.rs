//! Per-call execution context carrying cancellation and a deadline

use super::error::{EngineError, EngineResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Execution context passed into every engine call
///
/// Cloning shares the cancellation token, so cancelling any clone cancels
/// the call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl CallContext {
    /// Context with no deadline and a fresh cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Context driven by an externally owned token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set a deadline relative to now
    ///
    /// A deadline too far out to represent leaves the call without one.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now()
            .checked_add(timeout)
            .map(|deadline| (deadline, timeout));
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive a future to completion unless the call is cancelled or times out first
    pub async fn run<T, F>(&self, future: F) -> EngineResult<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        if self.token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        match self.deadline {
            Some((deadline, budget)) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(EngineError::Cancelled),
                outcome = tokio::time::timeout_at(deadline, future) => {
                    outcome.unwrap_or(Err(EngineError::Timeout(budget)))
                }
            },
            None => tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(EngineError::Cancelled),
                outcome = future => outcome,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = CallContext::new();
        let value = ctx.run(async { Ok::<_, EngineError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_cancelled_mid_flight() {
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, EngineError>(())
            })
            .await;

        assert!(matches!(outcome, Err(EngineError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_already_cancelled() {
        let ctx = CallContext::new();
        ctx.cancel();
        let outcome = ctx.run(async { Ok::<_, EngineError>(1) }).await;
        assert!(matches!(outcome, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline() {
        let ctx = CallContext::new().timeout(Duration::MAX);
        let value = ctx.run(async { Ok::<_, EngineError>(3) }).await.unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = CallContext::new().timeout(Duration::from_millis(50));
        let outcome = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, EngineError>(())
            })
            .await;

        match outcome {
            Err(EngineError::Timeout(budget)) => assert_eq!(budget, Duration::from_millis(50)),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
