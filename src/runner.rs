use crate::compiler::CompiledArtifact;
use crate::interpreter::{execute_test, ExecutionError};
use crate::result::{ExecutionResult, ExecutionStatus};
use crate::test_finder::Test;
use slog::{debug, warn, Logger};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tokio::time::timeout;

pub trait TestRunner {
    /// Runs `test` linked against exactly `artifacts`.
    ///
    /// Never fails: anything that goes wrong while executing is reported
    /// through the returned status.
    fn run_test(
        &self,
        test: &Test,
        artifacts: &[Arc<CompiledArtifact>],
    ) -> impl Future<Output = ExecutionResult> + Send;
}

/// Interprets the test entry point on a blocking worker, bounded both by a
/// wall-clock timeout and by an instruction budget.
#[derive(Debug, Clone)]
pub struct SimpleTestRunner {
    timeout: Duration,
    fuel: u64,
    logger: Logger,
}

impl SimpleTestRunner {
    pub fn new(timeout: Duration, fuel: u64, logger: Logger) -> Self {
        Self {
            timeout,
            fuel,
            logger,
        }
    }
}

impl TestRunner for SimpleTestRunner {
    fn run_test(
        &self,
        test: &Test,
        artifacts: &[Arc<CompiledArtifact>],
    ) -> impl Future<Output = ExecutionResult> + Send {
        let name = test.name().to_string();
        let artifacts = artifacts.to_vec();
        let fuel = self.fuel;
        let limit = self.timeout;
        let logger = self.logger.clone();

        async move {
            let start = Instant::now();
            let worker_name = name.clone();
            let worker = task::spawn_blocking(move || execute_test(&worker_name, &artifacts, fuel));

            let status = match timeout(limit, worker).await {
                Ok(Ok(Ok(value))) => {
                    if value != 0 {
                        ExecutionStatus::Passed
                    } else {
                        ExecutionStatus::Failed
                    }
                }
                Ok(Ok(Err(ExecutionError::Trap(reason)))) => {
                    debug!(logger, "test trapped"; "test" => &name, "reason" => reason);
                    ExecutionStatus::Failed
                }
                Ok(Ok(Err(ExecutionError::Link(reason)))) => {
                    warn!(logger, "can't link test"; "test" => &name, "reason" => reason);
                    ExecutionStatus::Invalid
                }
                Ok(Err(e)) => {
                    debug!(logger, "test worker crashed"; "test" => &name, "error" => %e);
                    ExecutionStatus::Failed
                }
                Err(_) => {
                    debug!(logger, "test timed out"; "test" => &name, "timeout_secs" => limit.as_secs());
                    ExecutionStatus::Failed
                }
            };

            ExecutionResult::new(status, start.elapsed())
        }
    }
}
