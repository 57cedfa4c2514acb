use crate::error::{MutationError, Result};
use crate::ir::{BinOp, InstructionAddress, Module, ModuleId, Opcode, Predicate};
use crate::mutation::{MutationPoint, SourceLocation};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutatorKind {
    ConditionalsBoundary,
    MathAdd,
    MathSub,
    MathMul,
    MathDiv,
    NegateCondition,
    Custom(&'static str),
}

impl MutatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            MutatorKind::ConditionalsBoundary => "conditionals_boundary",
            MutatorKind::MathAdd => "math_add",
            MutatorKind::MathSub => "math_sub",
            MutatorKind::MathMul => "math_mul",
            MutatorKind::MathDiv => "math_div",
            MutatorKind::NegateCondition => "negate_condition",
            MutatorKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for MutatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the replacement for an eligible instruction, `None` otherwise.
pub type Rewrite = fn(&Opcode) -> Option<Opcode>;

/// One entry of the mutator dispatch table.
#[derive(Debug, Clone)]
pub struct MutationOperator {
    pub kind: MutatorKind,
    pub rewrite: Rewrite,
}

impl MutationOperator {
    pub fn new(kind: MutatorKind, rewrite: Rewrite) -> Self {
        MutationOperator { kind, rewrite }
    }

    pub fn mutate(&self, opcode: &Opcode) -> Option<Opcode> {
        (self.rewrite)(opcode)
    }

    /// Lazily yields one unapplied point per eligible instruction of the
    /// function. Calling it again restarts the scan.
    pub fn mutation_points<'a>(
        &'a self,
        module_id: ModuleId,
        module: &'a Module,
        function_index: usize,
    ) -> impl Iterator<Item = MutationPoint> + 'a {
        let function = module.functions.get(function_index);
        let function_name = function.map(|f| f.name.as_str()).unwrap_or_default();

        function
            .into_iter()
            .flat_map(|function| function.instructions.iter().enumerate())
            .filter_map(move |(index, instruction)| {
                let mutated = self.mutate(&instruction.opcode)?;
                let address = InstructionAddress {
                    module: module_id,
                    function: function_index,
                    instruction: index,
                };
                Some(MutationPoint::new(
                    address,
                    self.kind,
                    function_name,
                    instruction.opcode.clone(),
                    mutated,
                    SourceLocation::correlate(module, instruction),
                ))
            })
    }
}

fn swap_binary(opcode: &Opcode, from: BinOp, to: BinOp) -> Option<Opcode> {
    match opcode {
        Opcode::Binary { dst, op, lhs, rhs } if *op == from => Some(Opcode::Binary {
            dst: *dst,
            op: to,
            lhs: *lhs,
            rhs: *rhs,
        }),
        _ => None,
    }
}

fn swap_predicate(opcode: &Opcode, table: &[(Predicate, Predicate)]) -> Option<Opcode> {
    match opcode {
        Opcode::Compare {
            dst,
            pred,
            lhs,
            rhs,
        } => table
            .iter()
            .find(|(from, _)| from == pred)
            .map(|(_, to)| Opcode::Compare {
                dst: *dst,
                pred: *to,
                lhs: *lhs,
                rhs: *rhs,
            }),
        _ => None,
    }
}

fn conditionals_boundary(opcode: &Opcode) -> Option<Opcode> {
    swap_predicate(
        opcode,
        &[
            (Predicate::Slt, Predicate::Sle),
            (Predicate::Sle, Predicate::Slt),
            (Predicate::Sgt, Predicate::Sge),
            (Predicate::Sge, Predicate::Sgt),
        ],
    )
}

fn negate_condition(opcode: &Opcode) -> Option<Opcode> {
    swap_predicate(
        opcode,
        &[
            (Predicate::Eq, Predicate::Ne),
            (Predicate::Ne, Predicate::Eq),
            (Predicate::Slt, Predicate::Sge),
            (Predicate::Sge, Predicate::Slt),
            (Predicate::Sle, Predicate::Sgt),
            (Predicate::Sgt, Predicate::Sle),
        ],
    )
}

fn math_add(opcode: &Opcode) -> Option<Opcode> {
    swap_binary(opcode, BinOp::Add, BinOp::Sub)
}

fn math_sub(opcode: &Opcode) -> Option<Opcode> {
    swap_binary(opcode, BinOp::Sub, BinOp::Add)
}

fn math_mul(opcode: &Opcode) -> Option<Opcode> {
    swap_binary(opcode, BinOp::Mul, BinOp::Div)
}

fn math_div(opcode: &Opcode) -> Option<Opcode> {
    swap_binary(opcode, BinOp::Div, BinOp::Mul)
}

pub fn get_default_operators() -> Vec<MutationOperator> {
    vec![
        MutationOperator::new(MutatorKind::ConditionalsBoundary, conditionals_boundary),
        MutationOperator::new(MutatorKind::MathAdd, math_add),
        MutationOperator::new(MutatorKind::MathSub, math_sub),
    ]
}

pub fn get_all_operators() -> Vec<MutationOperator> {
    let mut operators = get_default_operators();
    operators.extend([
        MutationOperator::new(MutatorKind::MathMul, math_mul),
        MutationOperator::new(MutatorKind::MathDiv, math_div),
        MutationOperator::new(MutatorKind::NegateCondition, negate_condition),
    ]);
    operators
}

/// Resolves operator names in the given order; an empty list selects the
/// default set.
pub fn get_operators_by_name(names: &[String]) -> Result<Vec<MutationOperator>> {
    if names.is_empty() {
        return Ok(get_default_operators());
    }

    let available = get_all_operators();
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|operator| operator.kind.name() == name.trim())
                .cloned()
                .ok_or_else(|| MutationError::InvalidInput(format!("Unknown mutator: {}", name)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Instruction, Operand};

    fn binary(op: BinOp) -> Opcode {
        Opcode::Binary {
            dst: 0,
            op,
            lhs: Operand::Arg(0),
            rhs: Operand::Imm(1),
        }
    }

    fn compare(pred: Predicate) -> Opcode {
        Opcode::Compare {
            dst: 0,
            pred,
            lhs: Operand::Arg(0),
            rhs: Operand::Imm(0),
        }
    }

    #[test]
    fn test_boundary_flips_relational_predicates() {
        assert_eq!(conditionals_boundary(&compare(Predicate::Slt)), Some(compare(Predicate::Sle)));
        assert_eq!(conditionals_boundary(&compare(Predicate::Sge)), Some(compare(Predicate::Sgt)));
        assert_eq!(conditionals_boundary(&compare(Predicate::Eq)), None);
        assert_eq!(conditionals_boundary(&binary(BinOp::Add)), None);
    }

    #[test]
    fn test_math_operators() {
        assert_eq!(math_add(&binary(BinOp::Add)), Some(binary(BinOp::Sub)));
        assert_eq!(math_sub(&binary(BinOp::Sub)), Some(binary(BinOp::Add)));
        assert_eq!(math_add(&binary(BinOp::Sub)), None);
        assert_eq!(math_div(&binary(BinOp::Div)), Some(binary(BinOp::Mul)));
        assert_eq!(negate_condition(&compare(Predicate::Sle)), Some(compare(Predicate::Sgt)));
    }

    #[test]
    fn test_add_operator_finds_sum_and_increment() {
        // int f(int a, int b) { int s = a + b; a++; return s * a; }
        let module = Module::new(
            "sum",
            Some("sum.c"),
            vec![Function::new(
                "f",
                2,
                vec![
                    Instruction::at(
                        Opcode::Binary {
                            dst: 0,
                            op: BinOp::Add,
                            lhs: Operand::Arg(0),
                            rhs: Operand::Arg(1),
                        },
                        1,
                        32,
                    ),
                    Instruction::at(
                        Opcode::Binary {
                            dst: 1,
                            op: BinOp::Add,
                            lhs: Operand::Arg(0),
                            rhs: Operand::Imm(1),
                        },
                        1,
                        40,
                    ),
                    Instruction::at(
                        Opcode::Binary {
                            dst: 2,
                            op: BinOp::Mul,
                            lhs: Operand::Reg(0),
                            rhs: Operand::Reg(1),
                        },
                        1,
                        53,
                    ),
                    Instruction::new(Opcode::Return {
                        value: Some(Operand::Reg(2)),
                    }),
                ],
            )],
        );

        let operator = MutationOperator::new(MutatorKind::MathAdd, math_add);
        let points: Vec<MutationPoint> = operator.mutation_points(ModuleId(0), &module, 0).collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].address().instruction, 0);
        assert_eq!(points[1].address().instruction, 1);
        assert!(points.iter().all(|point| !point.is_applied()));

        let again = operator.mutation_points(ModuleId(0), &module, 0).count();
        assert_eq!(again, 2);
    }

    #[test]
    fn test_operators_by_name() {
        let operators =
            get_operators_by_name(&["math_sub".to_string(), "negate_condition".to_string()]).unwrap();
        assert_eq!(operators[0].kind, MutatorKind::MathSub);
        assert_eq!(operators[1].kind, MutatorKind::NegateCondition);

        assert_eq!(get_operators_by_name(&[]).unwrap().len(), 3);
        assert!(matches!(
            get_operators_by_name(&["bogus".to_string()]),
            Err(MutationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_custom_operator_registration() {
        fn swap_rem(opcode: &Opcode) -> Option<Opcode> {
            swap_binary(opcode, BinOp::Rem, BinOp::Mul)
        }

        let operator = MutationOperator::new(MutatorKind::Custom("math_rem"), swap_rem);
        assert_eq!(operator.kind.name(), "math_rem");
        assert_eq!(operator.mutate(&binary(BinOp::Rem)), Some(binary(BinOp::Mul)));
    }
}
