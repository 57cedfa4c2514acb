use crate::error::Result;
use crate::mutation::MutationPoint;
use crate::report::{mutant_status, summarize};
use crate::result::TestResult;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const DEFAULT_DB_PATH: &str = "db/mutation.db";

/// Identifies the edit a mutant makes, independent of where it is applied.
fn get_patch_hash(point: &MutationPoint) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(point.original())?);
    hasher.update(serde_json::to_vec(point.mutated())?);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn check_db(db_path: &Path) -> Result<()> {
    println!("SQLite option: Checking if db exist...");
    let is_new_db = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let connection = Connection::open(db_path)?;

    if is_new_db {
        _createdb(&connection)?;
    } else {
        println!("SQLite option: Current db exists!");
        _check_schema(&connection)?;
    }

    Ok(())
}

/// Persists one run and returns its id.
pub fn store_results(db_path: &Path, results: &[TestResult]) -> Result<i64> {
    println!("SQLite option: Storing current run on {}", db_path.display());
    let mut connection = Connection::open(db_path)?;
    let summary = summarize(results);
    let tool_version = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let tx = connection.transaction()?;
    tx.execute(
        "INSERT INTO runs (tool_version, mutation_score) VALUES (?1, ?2);",
        params![tool_version, summary.mutation_score],
    )?;
    let run_id = tx.last_insert_rowid();

    for result in results {
        let original = result.original_test_result();
        tx.execute(
            "INSERT INTO tests (run_id, name, status, running_time_ms) VALUES (?1, ?2, ?3, ?4);",
            params![
                run_id,
                result.test_name(),
                original.status.as_str(),
                original.running_time.as_millis() as i64
            ],
        )?;
        let test_id = tx.last_insert_rowid();

        for mutant in result.mutation_results() {
            let point = mutant.mutation_point();
            let execution = mutant.execution_result();
            tx.execute(
                "INSERT INTO mutants (run_id, test_id, mutation_id, function_name, operator,
                    location, patch_hash, status, running_time_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    run_id,
                    test_id,
                    point.id(),
                    point.function(),
                    point.kind().name(),
                    point.source_location().map(|l| l.to_string()),
                    get_patch_hash(point)?,
                    mutant_status(execution.status),
                    execution.running_time.as_millis() as i64
                ],
            )?;
        }
    }

    tx.commit()?;
    println!("SQLite option: Stored run {}", run_id);
    Ok(run_id)
}

fn _check_schema(connection: &Connection) -> Result<()> {
    println!("SQLite option: Checking schema integrity...");

    let table_columns: Vec<(&str, Vec<&str>)> = vec![
        ("runs", vec!["id", "created_at", "tool_version", "mutation_score"]),
        ("tests", vec!["id", "run_id", "name", "status", "running_time_ms"]),
        ("mutants", vec![
            "id", "run_id", "test_id", "mutation_id", "function_name", "operator",
            "location", "patch_hash", "status", "killed", "running_time_ms"
        ]),
    ];

    for (table, columns) in table_columns {
        let exists: bool = connection.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1;",
            params![table],
            |row| row.get(0),
        )?;

        if !exists {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(format!("Missing table: {}", table)),
            )
            .into());
        }

        let mut stmt = connection.prepare(&format!("PRAGMA table_xinfo({});", table))?;
        let column_names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|name| name.ok())
            .collect();

        for col in columns {
            if !column_names.iter().any(|name| name == col) {
                return Err(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(1),
                    Some(format!("Missing column '{}' in table '{}'", col, table)),
                )
                .into());
            }
        }
    }

    println!("SQLite option: Schema verified successfully.");
    Ok(())
}

fn _createdb(connection: &Connection) -> Result<()> {
    println!("SQLite option: New db detected, creating schema...");

    connection.execute_batch("
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS runs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            tool_version    TEXT,
            mutation_score  REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tests (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            name            TEXT NOT NULL,
            status          TEXT NOT NULL
                CHECK (status IN ('passed','failed','invalid')),
            running_time_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tests_run ON tests(run_id);

        CREATE TABLE IF NOT EXISTS mutants (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            test_id INTEGER NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
            mutation_id         TEXT NOT NULL,
            function_name       TEXT NOT NULL,
            operator            TEXT NOT NULL,
            location            TEXT,
            patch_hash          TEXT NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('killed','survived','invalid')),
            killed INTEGER GENERATED ALWAYS AS (CASE WHEN status='killed' THEN 1 ELSE 0 END) VIRTUAL,
            running_time_ms     INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_mutants_run_status ON mutants(run_id, status);
        CREATE INDEX IF NOT EXISTS idx_mutants_operator ON mutants(operator);
        CREATE INDEX IF NOT EXISTS idx_mutants_killed ON mutants(killed);
    ")?;

    Ok(())
}
