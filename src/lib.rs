//! # Mutang
//!
//! A mutation testing engine for compiled modules written in Rust.
//!
//! This library provides functionality to:
//! - Load program modules and compile each of them once
//! - Discover tests, the functions they exercise and the mutation points in them
//! - Apply each mutation in place, recompile the owning module, run the test and revert
//! - Skip junk mutations that don't correspond to source-level syntax
//! - Report which mutants survived
//!
//! ## Example
//!
//! ```rust,no_run
//! use mutang::prelude::*;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::new(vec![PathBuf::from("build/modules")]);
//!     let logger = terminal_logger(false)?;
//!     let runner = SimpleTestRunner::new(config.timeout(), config.fuel, logger.clone());
//!
//!     let driver = Driver::new(config, JsonModuleLoader, ObjectCompiler, runner, logger);
//!     let results = driver.run().await?;
//!     print_summary(&results);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod compdb;
pub mod compiler;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod interpreter;
pub mod ir;
pub mod junk_detection;
pub mod loader;
pub mod logging;
pub mod mutation;
pub mod operators;
pub mod report;
pub mod result;
pub mod runner;
pub mod sqlite;
pub mod test_finder;

pub use error::{MutationError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::compiler::{Compiler, ObjectCompiler};
    pub use crate::config::{Config, JunkDetectionConfig, TestFramework};
    pub use crate::context::Context;
    pub use crate::driver::Driver;
    pub use crate::error::{MutationError, Result};
    pub use crate::junk_detection::JunkDetector;
    pub use crate::loader::{JsonModuleLoader, ModuleLoader};
    pub use crate::logging::terminal_logger;
    pub use crate::mutation::MutationPoint;
    pub use crate::report::{generate_report, print_summary, summarize};
    pub use crate::result::{ExecutionStatus, TestResult};
    pub use crate::runner::{SimpleTestRunner, TestRunner};
}
