use mutang::compdb::COMPDB_FILE_NAME;
use mutang::compiler::{Compiler, ObjectCompiler};
use mutang::config::Config;
use mutang::context::Context;
use mutang::driver::Driver;
use mutang::ir::{BinOp, Function, Instruction, Module, ModuleId, Opcode, Operand, Predicate};
use mutang::loader::JsonModuleLoader;
use mutang::logging::discard_logger;
use mutang::operators::MutatorKind;
use mutang::report::summarize;
use mutang::result::ExecutionStatus;
use mutang::runner::SimpleTestRunner;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const BAR_SOURCE: &str = "int negate(int x) {\n  if (x > 0) {\n    return x * -1;\n  }\n  return x;\n}\n";

// int testNegate() { return negate(3) == -3; }
fn foo() -> Module {
    Module::new(
        "foo",
        Some("foo.c"),
        vec![Function::new(
            "testNegate",
            0,
            vec![
                Instruction::new(Opcode::Call {
                    dst: Some(0),
                    callee: "negate".into(),
                    args: vec![Operand::Imm(3)],
                }),
                Instruction::new(Opcode::Compare {
                    dst: 1,
                    pred: Predicate::Eq,
                    lhs: Operand::Reg(0),
                    rhs: Operand::Imm(-3),
                }),
                Instruction::new(Opcode::Return {
                    value: Some(Operand::Reg(1)),
                }),
            ],
        )],
    )
}

/// `negate` from BAR_SOURCE. The comparison at 5:3 has no counterpart in
/// the source and only exists in the compiled form.
fn bar(source_file: &str) -> Module {
    Module::new(
        "bar",
        Some(source_file),
        vec![Function::new(
            "negate",
            1,
            vec![
                Instruction::at(
                    Opcode::Compare {
                        dst: 0,
                        pred: Predicate::Sgt,
                        lhs: Operand::Arg(0),
                        rhs: Operand::Imm(0),
                    },
                    2,
                    9,
                ),
                Instruction::new(Opcode::Branch {
                    cond: Operand::Reg(0),
                    then_target: 2,
                    else_target: 4,
                }),
                Instruction::at(
                    Opcode::Binary {
                        dst: 1,
                        op: BinOp::Mul,
                        lhs: Operand::Arg(0),
                        rhs: Operand::Imm(-1),
                    },
                    3,
                    14,
                ),
                Instruction::at(
                    Opcode::Return {
                        value: Some(Operand::Reg(1)),
                    },
                    3,
                    5,
                ),
                Instruction::at(
                    Opcode::Compare {
                        dst: 2,
                        pred: Predicate::Sle,
                        lhs: Operand::Arg(0),
                        rhs: Operand::Imm(0),
                    },
                    5,
                    3,
                ),
                Instruction::at(
                    Opcode::Return {
                        value: Some(Operand::Arg(0)),
                    },
                    5,
                    3,
                ),
            ],
        )],
    )
}

struct Fixture {
    dir: TempDir,
    source: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let source = dir.path().join("bar.c");
        fs::write(&source, BAR_SOURCE).unwrap();
        Self { dir, source }
    }

    fn context(&self) -> (Context, ModuleId) {
        let mut ctx = Context::new();
        ctx.add_module(foo());
        let bar = ctx.add_module(bar(&self.source.display().to_string()));
        (ctx, bar)
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn driver(config: Config) -> Driver<JsonModuleLoader, ObjectCompiler, SimpleTestRunner> {
    let runner = SimpleTestRunner::new(Duration::from_secs(5), 100_000, discard_logger());
    Driver::new(config, JsonModuleLoader, ObjectCompiler, runner, discard_logger())
}

fn config() -> Config {
    Config::new(vec![PathBuf::from("unused")])
}

#[tokio::test]
async fn test_negate_scenario_with_junk_detection() {
    let fixture = Fixture::new();
    let (mut ctx, bar) = fixture.context();
    let before = ObjectCompiler.compile(ctx.module(bar).unwrap()).unwrap();

    let results = driver(config()).execute(&mut ctx).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].test_name(), "testNegate");
    assert_eq!(results[0].original_test_result().status, ExecutionStatus::Passed);

    let mutants = results[0].mutation_results();
    assert_eq!(mutants.len(), 1);
    let point = mutants[0].mutation_point();
    assert_eq!(point.kind(), MutatorKind::ConditionalsBoundary);
    assert_eq!(point.function(), "negate");
    assert_eq!(point.address().instruction, 0);
    // negate(3) is the same under `x >= 0`
    assert!(mutants[0].survived());

    let after = ObjectCompiler.compile(ctx.module(bar).unwrap()).unwrap();
    assert_eq!(before.digest, after.digest);
    assert_eq!(before.object, after.object);
}

#[tokio::test]
async fn test_every_point_runs_without_junk_detection() {
    let fixture = Fixture::new();
    let (mut ctx, _) = fixture.context();

    let mut config = config();
    config.junk_detection.enabled = false;
    let results = driver(config).execute(&mut ctx).await.unwrap();

    let instructions: Vec<usize> = results[0]
        .mutation_results()
        .iter()
        .map(|m| m.mutation_point().address().instruction)
        .collect();
    assert_eq!(instructions, vec![0, 4]);
}

#[tokio::test]
async fn test_missing_compdb_entry_falls_back_to_flags() {
    let fixture = Fixture::new();
    let (mut ctx, _) = fixture.context();

    let compdb = format!(
        r#"[{{"directory": "{}", "file": "other.c", "arguments": ["cc", "-c", "other.c"]}}]"#,
        fixture.path().display()
    );
    fs::write(fixture.path().join(COMPDB_FILE_NAME), compdb).unwrap();

    let mut config = config();
    config.junk_detection.compdb_directory = Some(fixture.path().to_path_buf());
    config.junk_detection.compilation_flags = Some("-I include -DNDEBUG".to_string());

    let results = driver(config).execute(&mut ctx).await.unwrap();
    assert_eq!(results[0].mutation_results().len(), 1);
}

#[tokio::test]
async fn test_unparsable_source_aborts_the_run() {
    let fixture = Fixture::new();
    fs::write(&fixture.source, "int negate(int x) {\n  if (x > \n").unwrap();
    let (mut ctx, _) = fixture.context();

    assert!(driver(config()).execute(&mut ctx).await.is_err());
}

#[tokio::test]
async fn test_killed_mutants_count_towards_the_score() {
    let fixture = Fixture::new();
    let (mut ctx, _) = fixture.context();

    let mut config = config();
    config.junk_detection.enabled = false;
    config.mutators = vec!["negate_condition".to_string()];
    let results = driver(config).execute(&mut ctx).await.unwrap();

    // x > 0 becomes x <= 0, so negate(3) returns 3
    let summary = summarize(&results);
    assert_eq!(summary.mutants, 2);
    assert_eq!(summary.killed, 1);
    assert_eq!(summary.survived, 1);
    assert!((summary.mutation_score - 0.5).abs() < 1e-9);
}
