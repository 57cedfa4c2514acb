use crate::error::Result;
use crate::result::{ExecutionStatus, TestResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub tests: usize,
    pub mutants: usize,
    pub killed: usize,
    pub survived: usize,
    pub invalid: usize,
    /// Mutants of tests that did not pass on the original program.
    pub unscored: usize,
    pub mutation_score: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MutantReport {
    pub id: String,
    pub function: String,
    pub mutator: String,
    pub location: Option<String>,
    pub status: String,
    pub running_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestReport {
    pub name: String,
    pub status: String,
    pub running_time_ms: u64,
    /// False when the test did not pass on the original program.
    pub scored: bool,
    pub mutants: Vec<MutantReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportData {
    pub date: String,
    pub summary: Summary,
    pub tests: Vec<TestReport>,
}

/// Killed mutants over the mutants that ran to completion. Invalid
/// mutants don't count either way, nor do mutants of a test that already
/// fails on the original program. With nothing to score the result is 1.
pub fn summarize(results: &[TestResult]) -> Summary {
    let mut summary = Summary {
        tests: results.len(),
        mutants: 0,
        killed: 0,
        survived: 0,
        invalid: 0,
        unscored: 0,
        mutation_score: 1.0,
    };

    for result in results {
        let mutants = result.mutation_results();
        summary.mutants += mutants.len();
        if !is_scored(result) {
            summary.unscored += mutants.len();
            continue;
        }
        for mutant in mutants {
            match mutant.execution_result().status {
                ExecutionStatus::Failed => summary.killed += 1,
                ExecutionStatus::Passed => summary.survived += 1,
                ExecutionStatus::Invalid => summary.invalid += 1,
            }
        }
    }

    let scored = summary.killed + summary.survived;
    if scored > 0 {
        summary.mutation_score = summary.killed as f64 / scored as f64;
    }

    summary
}

fn is_scored(result: &TestResult) -> bool {
    result.original_test_result().status == ExecutionStatus::Passed
}

/// Status of a mutant as seen by the user.
pub fn mutant_status(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Failed => "killed",
        ExecutionStatus::Passed => "survived",
        ExecutionStatus::Invalid => "invalid",
    }
}

pub fn build_report(results: &[TestResult]) -> ReportData {
    let now: DateTime<Local> = Local::now();

    let tests = results
        .iter()
        .map(|result| TestReport {
            name: result.test_name().to_string(),
            status: result.original_test_result().status.as_str().to_string(),
            running_time_ms: result.original_test_result().running_time.as_millis() as u64,
            scored: is_scored(result),
            mutants: result
                .mutation_results()
                .iter()
                .map(|mutant| {
                    let point = mutant.mutation_point();
                    let execution = mutant.execution_result();
                    MutantReport {
                        id: point.id(),
                        function: point.function().to_string(),
                        mutator: point.kind().name().to_string(),
                        location: point.source_location().map(|l| l.to_string()),
                        status: mutant_status(execution.status).to_string(),
                        running_time_ms: execution.running_time.as_millis() as u64,
                    }
                })
                .collect(),
        })
        .collect();

    ReportData {
        date: now.format("%d/%m/%Y %H:%M:%S").to_string(),
        summary: summarize(results),
        tests,
    }
}

pub fn generate_report(results: &[TestResult], path: &Path) -> Result<()> {
    let report = build_report(results);
    let json_content = serde_json::to_string_pretty(&report)?;
    fs::write(path, json_content)?;

    println!("Report saved to {}", path.display());
    Ok(())
}

pub fn print_summary(results: &[TestResult]) {
    let summary = summarize(results);

    let survivors: Vec<_> = results
        .iter()
        .flat_map(|r| r.mutation_results())
        .filter(|m| m.survived())
        .collect();
    if !survivors.is_empty() {
        println!("Surviving mutants:");
        for mutant in survivors {
            println!("{}", mutant.mutation_point());
        }
        println!("--------------");
    }

    println!(
        "Tests: {}, mutants: {}, killed: {}, survived: {}, invalid: {}, unscored: {}",
        summary.tests,
        summary.mutants,
        summary.killed,
        summary.survived,
        summary.invalid,
        summary.unscored
    );
    println!("Mutation score: {:.2}%", summary.mutation_score * 100.0);
}
