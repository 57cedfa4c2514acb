use crate::mutation::MutationPoint;
use crate::test_finder::Test;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Not executed, or the execution environment failed.
    Invalid,
    Failed,
    Passed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Invalid => "invalid",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Passed => "passed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub running_time: Duration,
}

impl ExecutionResult {
    pub fn new(status: ExecutionStatus, running_time: Duration) -> Self {
        Self {
            status,
            running_time,
        }
    }

    pub fn invalid() -> Self {
        Self::new(ExecutionStatus::Invalid, Duration::ZERO)
    }
}

/// Outcome of running a test against one mutant.
#[derive(Debug, Clone)]
pub struct MutationResult {
    result: ExecutionResult,
    point: MutationPoint,
}

impl MutationResult {
    pub fn new(result: ExecutionResult, point: MutationPoint) -> Self {
        Self { result, point }
    }

    pub fn execution_result(&self) -> ExecutionResult {
        self.result
    }

    pub fn mutation_point(&self) -> &MutationPoint {
        &self.point
    }

    /// The test still passed with the mutation in place.
    pub fn survived(&self) -> bool {
        self.result.status == ExecutionStatus::Passed
    }

    pub fn killed(&self) -> bool {
        self.result.status == ExecutionStatus::Failed
    }
}

#[derive(Debug, Clone)]
pub struct TestResult {
    original: ExecutionResult,
    test: Test,
    mutation_results: Vec<MutationResult>,
}

impl TestResult {
    pub fn new(original: ExecutionResult, test: Test) -> Self {
        Self {
            original,
            test,
            mutation_results: Vec::new(),
        }
    }

    pub fn add_mutant_result(&mut self, result: MutationResult) {
        self.mutation_results.push(result);
    }

    pub fn test(&self) -> &Test {
        &self.test
    }

    pub fn test_name(&self) -> &str {
        self.test.name()
    }

    pub fn original_test_result(&self) -> ExecutionResult {
        self.original
    }

    pub fn mutation_results(&self) -> &[MutationResult] {
        &self.mutation_results
    }
}
