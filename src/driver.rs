//! Orchestration of a mutation testing run.

use crate::cache::ArtifactCache;
use crate::compiler::{CompiledArtifact, Compiler};
use crate::config::Config;
use crate::context::Context;
use crate::error::{MutationError, Result};
use crate::ir::ModuleId;
use crate::junk_detection::JunkDetector;
use crate::loader::{collect_module_paths, ModuleLoader};
use crate::mutation::MutationPoint;
use crate::operators::{get_operators_by_name, MutationOperator};
use crate::result::{ExecutionResult, ExecutionStatus, MutationResult, TestResult};
use crate::runner::TestRunner;
use crate::test_finder::{SimpleTestFinder, Test, TestFinder};
use rayon::prelude::*;
use slog::{debug, info, warn, Logger};
use std::sync::Arc;

pub struct Driver<L, C, R> {
    config: Config,
    loader: L,
    compiler: C,
    runner: R,
    logger: Logger,
}

impl<L, C, R> Driver<L, C, R>
where
    L: ModuleLoader,
    C: Compiler + Sync,
    R: TestRunner,
{
    pub fn new(config: Config, loader: L, compiler: C, runner: R, logger: Logger) -> Self {
        Self {
            config,
            loader,
            compiler,
            runner,
            logger,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Loads every configured module and mutation tests them.
    pub async fn run(&self) -> Result<Vec<TestResult>> {
        self.config.validate()?;
        let mut ctx = self.load_modules()?;
        self.execute(&mut ctx).await
    }

    /// Any module that fails to load aborts the run.
    pub fn load_modules(&self) -> Result<Context> {
        let mut ctx = Context::new();

        for path in collect_module_paths(&self.config.module_paths)? {
            let module = self.loader.load_module_at_path(&path)?;
            debug!(self.logger, "loaded module"; "name" => &module.name, "path" => %path.display());
            ctx.add_module(module);
        }

        if ctx.is_empty() {
            return Err(MutationError::InvalidInput(
                "No modules found in the configured paths".to_string(),
            ));
        }

        info!(self.logger, "modules loaded"; "count" => ctx.len());
        Ok(ctx)
    }

    /// Compiles every module once. The context is only read, so modules are
    /// compiled in parallel.
    pub fn compile_originals(&self, ctx: &Context) -> Result<ArtifactCache> {
        let compiler = &self.compiler;
        let modules: Vec<_> = ctx.modules().collect();

        let artifacts = modules
            .par_iter()
            .map(|(id, module)| compiler.compile(module).map(|artifact| (*id, artifact)))
            .collect::<Result<Vec<_>>>()?;

        let mut cache = ArtifactCache::new();
        for (id, artifact) in artifacts {
            cache.insert(id, artifact);
        }

        info!(self.logger, "original modules compiled"; "count" => cache.len());
        Ok(cache)
    }

    /// Runs the pipeline over an already loaded context. Every mutation is
    /// reverted before this returns successfully.
    pub async fn execute(&self, ctx: &mut Context) -> Result<Vec<TestResult>> {
        let mut cache = self.compile_originals(ctx)?;
        let operators = get_operators_by_name(&self.config.mutators)?;
        let finder = SimpleTestFinder::new(&self.config.test_framework, self.config.max_distance)?;

        let junk_detector = if self.config.junk_detection.enabled {
            Some(JunkDetector::new(
                &self.config.junk_detection,
                self.logger.clone(),
            ))
        } else {
            info!(self.logger, "junk detection disabled");
            None
        };

        self.run_tests(ctx, &mut cache, &finder, &operators, junk_detector.as_ref())
            .await
    }

    pub async fn run_tests<F: TestFinder>(
        &self,
        ctx: &mut Context,
        cache: &mut ArtifactCache,
        finder: &F,
        operators: &[MutationOperator],
        junk_detector: Option<&JunkDetector>,
    ) -> Result<Vec<TestResult>> {
        let tests = finder.find_tests(ctx);
        info!(self.logger, "tests found"; "count" => tests.len());

        let mut results = Vec::with_capacity(tests.len());

        for test in tests {
            let original = self.runner.run_test(&test, &cache.all()).await;
            if original.status != ExecutionStatus::Passed {
                warn!(self.logger, "test does not pass on the original program";
                    "test" => test.name(), "status" => original.status.as_str(), "scored" => false);
            }

            let mut test_result = TestResult::new(original, test.clone());

            for testee in finder.find_testees(ctx, &test) {
                let points = finder.find_mutation_points(ctx, operators, &testee);
                debug!(self.logger, "testee"; "test" => test.name(), "testee" => &testee.name,
                    "distance" => testee.distance, "points" => points.len());

                let base = cache.all_except(testee.module);

                for mut point in points {
                    if let Some(detector) = junk_detector {
                        if detector.is_junk(&point)? {
                            debug!(self.logger, "skipping junk mutation"; "point" => %point);
                            continue;
                        }
                    }

                    let result = self.run_mutant(ctx, cache, &test, &base, &mut point).await?;
                    test_result.add_mutant_result(MutationResult::new(result, point));
                }
            }

            info!(self.logger, "test done"; "test" => test.name(),
                "mutants" => test_result.mutation_results().len());
            results.push(test_result);
        }

        Ok(results)
    }

    /// Apply, compile, run, revert. A mutant that does not compile is
    /// recorded as invalid and the point is still reverted.
    async fn run_mutant(
        &self,
        ctx: &mut Context,
        cache: &mut ArtifactCache,
        test: &Test,
        base: &[Arc<CompiledArtifact>],
        point: &mut MutationPoint,
    ) -> Result<ExecutionResult> {
        let module_id = point.address().module;

        point.apply_mutation(ctx)?;
        let compiled = match ctx.module(module_id) {
            Some(module) => self.compiler.compile(module),
            None => Err(MutationError::StaleMutationPoint(point.id())),
        };

        let result = match compiled {
            Ok(mutant) => {
                let mut artifacts = base.to_vec();
                artifacts.push(Arc::new(mutant));
                self.runner.run_test(test, &artifacts).await
            }
            Err(e) => {
                warn!(self.logger, "mutant does not compile"; "point" => %point, "error" => %e);
                ExecutionResult::invalid()
            }
        };

        point.revert_mutation(ctx)?;
        self.restore_artifact(ctx, cache, module_id, point)?;

        debug!(self.logger, "mutant executed"; "point" => %point,
            "status" => result.status.as_str(), "ms" => result.running_time.as_millis() as u64);
        Ok(result)
    }

    /// Recompiles the reverted module; it must produce the same object the
    /// cache held before the mutation.
    fn restore_artifact(
        &self,
        ctx: &Context,
        cache: &mut ArtifactCache,
        module_id: ModuleId,
        point: &MutationPoint,
    ) -> Result<()> {
        let module = ctx
            .module(module_id)
            .ok_or_else(|| MutationError::StaleMutationPoint(point.id()))?;
        let restored = self.compiler.compile(module)?;

        let matches = cache
            .get(module_id)
            .map(|cached| cached.digest == restored.digest)
            .unwrap_or(false);
        if !matches {
            return Err(MutationError::RevertMismatch {
                module: module.name.clone(),
                point: point.id(),
            });
        }

        cache.insert(module_id, restored);
        Ok(())
    }
}
