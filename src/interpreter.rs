//! Links object images and executes their code.

use crate::compiler::{CompiledArtifact, Symbol};
use crate::ir::{BinOp, Opcode, Operand, Reg};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The program could not be assembled from the given artifacts.
    #[error("link error: {0}")]
    Link(String),
    /// The program started but terminated abnormally.
    #[error("trap: {0}")]
    Trap(String),
}

#[derive(Debug, Default)]
pub struct LinkedProgram {
    symbols: HashMap<String, Symbol>,
}

impl LinkedProgram {
    pub fn link(artifacts: &[Arc<CompiledArtifact>]) -> Result<Self, ExecutionError> {
        let mut symbols = HashMap::new();

        for artifact in artifacts {
            let image = artifact.image().map_err(|e| {
                ExecutionError::Link(format!("can't decode {}: {}", artifact.module_name, e))
            })?;

            for symbol in image.symbols {
                if symbols.contains_key(&symbol.name) {
                    return Err(ExecutionError::Link(format!(
                        "duplicate symbol {} in {}",
                        symbol.name, artifact.module_name
                    )));
                }
                symbols.insert(symbol.name.clone(), symbol);
            }
        }

        Ok(Self { symbols })
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Runs `name` with a budget of `fuel` executed instructions.
    pub fn call(&self, name: &str, args: &[i64], fuel: u64) -> Result<i64, ExecutionError> {
        let mut machine = Machine {
            program: self,
            fuel,
            depth: 0,
        };
        machine.invoke(name, args)
    }
}

struct Machine<'a> {
    program: &'a LinkedProgram,
    fuel: u64,
    depth: usize,
}

fn trap(message: String) -> ExecutionError {
    ExecutionError::Trap(message)
}

impl Machine<'_> {
    fn invoke(&mut self, name: &str, args: &[i64]) -> Result<i64, ExecutionError> {
        let symbol = match self.program.symbol(name) {
            Some(symbol) => symbol,
            None => return builtin(name, args),
        };
        if symbol.params as usize != args.len() {
            return Err(trap(format!(
                "{} expects {} arguments, got {}",
                name,
                symbol.params,
                args.len()
            )));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(trap(format!("call depth exceeded in {}", name)));
        }

        self.depth += 1;
        let result = self.execute(symbol, args);
        self.depth -= 1;
        result
    }

    fn execute(&mut self, symbol: &Symbol, args: &[i64]) -> Result<i64, ExecutionError> {
        let mut regs: HashMap<Reg, i64> = HashMap::new();
        let mut pc = 0usize;

        loop {
            if self.fuel == 0 {
                return Err(trap("out of fuel".to_string()));
            }
            self.fuel -= 1;

            let opcode = symbol
                .code
                .get(pc)
                .ok_or_else(|| trap(format!("{} runs past its last instruction", symbol.name)))?;
            let read = |operand: &Operand| -> Result<i64, ExecutionError> {
                match operand {
                    Operand::Imm(value) => Ok(*value),
                    Operand::Arg(n) => args
                        .get(*n as usize)
                        .copied()
                        .ok_or_else(|| trap(format!("missing argument {}", n))),
                    Operand::Reg(r) => regs
                        .get(r)
                        .copied()
                        .ok_or_else(|| trap(format!("read of undefined register {}", r))),
                }
            };

            pc += 1;
            match opcode {
                Opcode::Move { dst, src } => {
                    let value = read(src)?;
                    regs.insert(*dst, value);
                }
                Opcode::Binary { dst, op, lhs, rhs } => {
                    let value = arithmetic(*op, read(lhs)?, read(rhs)?)?;
                    regs.insert(*dst, value);
                }
                Opcode::Compare {
                    dst,
                    pred,
                    lhs,
                    rhs,
                } => {
                    let value = pred.evaluate(read(lhs)?, read(rhs)?) as i64;
                    regs.insert(*dst, value);
                }
                Opcode::Call { dst, callee, args } => {
                    let values = args.iter().map(read).collect::<Result<Vec<_>, _>>()?;
                    let value = self.invoke(callee, &values)?;
                    if let Some(dst) = dst {
                        regs.insert(*dst, value);
                    }
                }
                Opcode::Jump { target } => pc = *target,
                Opcode::Branch {
                    cond,
                    then_target,
                    else_target,
                } => {
                    pc = if read(cond)? != 0 {
                        *then_target
                    } else {
                        *else_target
                    };
                }
                Opcode::Return { value } => {
                    return match value {
                        Some(value) => read(value),
                        None => Ok(0),
                    };
                }
            }
        }
    }
}

fn arithmetic(op: BinOp, lhs: i64, rhs: i64) -> Result<i64, ExecutionError> {
    match op {
        BinOp::Add => Ok(lhs.wrapping_add(rhs)),
        BinOp::Sub => Ok(lhs.wrapping_sub(rhs)),
        BinOp::Mul => Ok(lhs.wrapping_mul(rhs)),
        BinOp::Div | BinOp::Rem if rhs == 0 => Err(trap("division by zero".to_string())),
        BinOp::Div => Ok(lhs.wrapping_div(rhs)),
        BinOp::Rem => Ok(lhs.wrapping_rem(rhs)),
    }
}

fn builtin(name: &str, args: &[i64]) -> Result<i64, ExecutionError> {
    match (name, args) {
        ("abort", _) => Err(trap("abort called".to_string())),
        ("assert", [condition]) => {
            if *condition != 0 {
                Ok(0)
            } else {
                Err(trap("assertion failed".to_string()))
            }
        }
        _ => Err(trap(format!("unresolved symbol {}", name))),
    }
}

/// Links the artifacts and runs a test entry point with no arguments.
pub fn execute_test(
    name: &str,
    artifacts: &[Arc<CompiledArtifact>],
    fuel: u64,
) -> Result<i64, ExecutionError> {
    let program = LinkedProgram::link(artifacts)?;
    match program.symbol(name) {
        Some(symbol) if symbol.params == 0 => program.call(name, &[], fuel),
        Some(_) => Err(ExecutionError::Link(format!("test {} takes arguments", name))),
        None => Err(ExecutionError::Link(format!("test {} is not linked", name))),
    }
}
