use anyhow::Context as _;
use crate::error::{MutationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FUEL: u64 = 10_000_000;
pub const SIMPLE_TEST_PATTERN: &str = "^test";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JunkDetectionConfig {
    pub enabled: bool,
    /// Directory holding a `compile_commands.json`.
    pub compdb_directory: Option<PathBuf>,
    /// Used when the database has no entry for a file, or there is no database.
    pub compilation_flags: Option<String>,
}

impl Default for JunkDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compdb_directory: None,
            compilation_flags: None,
        }
    }
}

/// Decides which functions count as tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestFramework {
    /// Functions whose name starts with `test`.
    Simple,
    /// Functions whose name matches the given regex.
    Pattern(String),
}

impl TestFramework {
    pub fn test_pattern(&self) -> &str {
        match self {
            TestFramework::Simple => SIMPLE_TEST_PATTERN,
            TestFramework::Pattern(pattern) => pattern,
        }
    }
}

impl Default for TestFramework {
    fn default() -> Self {
        TestFramework::Simple
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub module_paths: Vec<PathBuf>,
    pub junk_detection: JunkDetectionConfig,
    pub test_framework: TestFramework,
    /// Mutator names; empty selects the default set.
    pub mutators: Vec<String>,
    pub timeout_secs: u64,
    /// Instruction budget for a single test execution.
    pub fuel: u64,
    /// How many call edges away from a test a testee may be.
    pub max_distance: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            module_paths: Vec::new(),
            junk_detection: JunkDetectionConfig::default(),
            test_framework: TestFramework::default(),
            mutators: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            fuel: DEFAULT_FUEL,
            max_distance: 1,
        }
    }
}

impl Config {
    pub fn new(module_paths: Vec<PathBuf>) -> Self {
        Self {
            module_paths,
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.module_paths.is_empty() {
            return Err(MutationError::InvalidInput(
                "No module paths configured".to_string(),
            ));
        }
        if self.max_distance == 0 {
            return Err(MutationError::InvalidInput(
                "max_distance must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 || self.fuel == 0 {
            return Err(MutationError::InvalidInput(
                "timeout and fuel must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
