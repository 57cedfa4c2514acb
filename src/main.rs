use clap::{Parser, Subcommand};
use mutang::compiler::ObjectCompiler;
use mutang::config::{Config, TestFramework};
use mutang::driver::Driver;
use mutang::error::Result;
use mutang::loader::JsonModuleLoader;
use mutang::logging::terminal_logger;
use mutang::operators::get_all_operators;
use mutang::runner::SimpleTestRunner;
use mutang::{report, sqlite};
use slog::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mutang")]
#[command(about = "Mutation testing engine for compiled modules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mutate the given modules and run their tests against every mutant
    Run {
        /// Module files or directories containing *.ir.json modules
        modules: Vec<PathBuf>,

        /// JSON configuration file; command line options override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory containing compile_commands.json
        #[arg(long)]
        compdb_dir: Option<PathBuf>,

        /// Flags used to parse sources missing from the compilation database
        #[arg(long, allow_hyphen_values = true)]
        compilation_flags: Option<String>,

        /// Disable junk detection (run every mutation point)
        #[arg(long)]
        disable_junk_detection: bool,

        /// Comma-separated mutator names (default: conditionals_boundary,math_add,math_sub)
        #[arg(short, long, value_delimiter = ',')]
        mutators: Option<Vec<String>>,

        /// Regex selecting test functions (default: ^test)
        #[arg(long)]
        test_pattern: Option<String>,

        /// Timeout value per test execution in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// How many calls away from a test a mutated function may be
        #[arg(long)]
        max_distance: Option<usize>,

        /// Write a JSON report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Optional path to SQLite database file (default: db/mutation.db)
        #[arg(long, value_name = "PATH")]
        sqlite: Option<Option<PathBuf>>,

        /// Log debug output
        #[arg(short, long)]
        verbose: bool,
    },
    /// List the available mutators
    ListMutators,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            modules,
            config,
            compdb_dir,
            compilation_flags,
            disable_junk_detection,
            mutators,
            test_pattern,
            timeout,
            max_distance,
            report: report_path,
            sqlite,
            verbose,
        } => {
            let logger = terminal_logger(verbose)?;

            let mut settings = match config {
                Some(path) => Config::from_file(&path)?,
                None => Config::default(),
            };
            if !modules.is_empty() {
                settings.module_paths = modules;
            }
            if compdb_dir.is_some() {
                settings.junk_detection.compdb_directory = compdb_dir;
            }
            if compilation_flags.is_some() {
                settings.junk_detection.compilation_flags = compilation_flags;
            }
            if disable_junk_detection {
                settings.junk_detection.enabled = false;
            }
            if let Some(mutators) = mutators {
                settings.mutators = mutators;
            }
            if let Some(pattern) = test_pattern {
                settings.test_framework = TestFramework::Pattern(pattern);
            }
            if let Some(timeout) = timeout {
                settings.timeout_secs = timeout;
            }
            if let Some(max_distance) = max_distance {
                settings.max_distance = max_distance;
            }
            settings.validate()?;

            let db_path = match sqlite {
                Some(Some(path)) => Some(path),
                Some(None) => Some(PathBuf::from(sqlite::DEFAULT_DB_PATH)),
                None => None,
            };
            if let Some(ref path) = db_path {
                sqlite::check_db(path)?;
            }

            info!(logger, "starting run"; "modules" => settings.module_paths.len(),
                "mutators" => settings.mutators.join(","));

            let runner = SimpleTestRunner::new(settings.timeout(), settings.fuel, logger.clone());
            let driver = Driver::new(settings, JsonModuleLoader, ObjectCompiler, runner, logger);
            let results = driver.run().await?;

            report::print_summary(&results);

            if let Some(ref path) = report_path {
                report::generate_report(&results, path)?;
            }
            if let Some(ref path) = db_path {
                sqlite::store_results(path, &results)?;
            }
        }
        Commands::ListMutators => {
            for operator in get_all_operators() {
                println!("{}", operator.kind);
            }
        }
    }

    Ok(())
}
