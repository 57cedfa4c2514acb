use crate::config::TestFramework;
use crate::context::Context;
use crate::error::{MutationError, Result};
use crate::ir::ModuleId;
use crate::mutation::MutationPoint;
use crate::operators::MutationOperator;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Test {
    name: String,
    module: ModuleId,
    function: usize,
}

impl Test {
    pub fn new(name: &str, module: ModuleId, function: usize) -> Self {
        Self {
            name: name.to_string(),
            module,
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn function(&self) -> usize {
        self.function
    }
}

/// A production function exercised by a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Testee {
    pub name: String,
    pub module: ModuleId,
    pub function: usize,
    /// Call edges between the test and this function.
    pub distance: usize,
}

pub trait TestFinder {
    fn find_tests(&self, ctx: &Context) -> Vec<Test>;

    fn find_testees(&self, ctx: &Context, test: &Test) -> Vec<Testee>;

    /// Points of every operator in list order, each in discovery order.
    fn find_mutation_points(
        &self,
        ctx: &Context,
        operators: &[MutationOperator],
        testee: &Testee,
    ) -> Vec<MutationPoint> {
        let module = match ctx.module(testee.module) {
            Some(module) => module,
            None => return Vec::new(),
        };

        operators
            .iter()
            .flat_map(|operator| operator.mutation_points(testee.module, module, testee.function))
            .collect()
    }
}

/// Tests are functions whose name matches the framework's pattern; testees
/// are found by following call instructions out of the test body.
#[derive(Debug, Clone)]
pub struct SimpleTestFinder {
    pattern: Regex,
    max_distance: usize,
}

impl SimpleTestFinder {
    /// Fails when `max_distance` is zero, which would leave no testees.
    pub fn new(framework: &TestFramework, max_distance: usize) -> Result<Self> {
        if max_distance == 0 {
            return Err(MutationError::InvalidInput(
                "max_distance must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            pattern: Regex::new(framework.test_pattern())?,
            max_distance,
        })
    }

    pub fn is_test(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

impl TestFinder for SimpleTestFinder {
    fn find_tests(&self, ctx: &Context) -> Vec<Test> {
        ctx.modules()
            .flat_map(move |(id, module)| {
                module
                    .functions
                    .iter()
                    .enumerate()
                    .filter(move |(_, function)| self.is_test(&function.name))
                    .map(move |(index, function)| Test::new(&function.name, id, index))
            })
            .collect()
    }

    fn find_testees(&self, ctx: &Context, test: &Test) -> Vec<Testee> {
        let mut testees = Vec::new();
        let mut visited = HashSet::from([(test.module(), test.function())]);
        let mut queue = VecDeque::from([(test.module(), test.function(), 0usize)]);

        while let Some((module, function, distance)) = queue.pop_front() {
            let body = match ctx.function(module, function) {
                Some(body) => body,
                None => continue,
            };

            for callee in body.callees() {
                let (callee_module, callee_index) = match ctx.find_function(callee) {
                    Some(found) => found,
                    None => continue,
                };
                if self.is_test(callee) || !visited.insert((callee_module, callee_index)) {
                    continue;
                }

                testees.push(Testee {
                    name: callee.to_string(),
                    module: callee_module,
                    function: callee_index,
                    distance: distance + 1,
                });
                if distance + 1 < self.max_distance {
                    queue.push_back((callee_module, callee_index, distance + 1));
                }
            }
        }

        testees
    }
}
