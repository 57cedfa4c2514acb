//! In-memory form of a compiled translation unit.
//!
//! Modules are plain data: a list of functions, each a flat table of
//! register instructions. Mutations edit single slots of that table in
//! place, so every instruction is addressable by
//! `(module, function index, instruction index)`.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Reg = u32;

/// Position of a module inside the [`Context`](crate::context::Context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub usize);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Reg(Reg),
    Arg(u32),
    Imm(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl Predicate {
    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Predicate::Eq => lhs == rhs,
            Predicate::Ne => lhs != rhs,
            Predicate::Slt => lhs < rhs,
            Predicate::Sle => lhs <= rhs,
            Predicate::Sgt => lhs > rhs,
            Predicate::Sge => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Opcode {
    Move {
        dst: Reg,
        src: Operand,
    },
    Binary {
        dst: Reg,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Compare {
        dst: Reg,
        pred: Predicate,
        lhs: Operand,
        rhs: Operand,
    },
    Call {
        #[serde(default)]
        dst: Option<Reg>,
        callee: String,
        #[serde(default)]
        args: Vec<Operand>,
    },
    Jump {
        target: usize,
    },
    Branch {
        cond: Operand,
        then_target: usize,
        else_target: usize,
    },
    Return {
        #[serde(default)]
        value: Option<Operand>,
    },
}

/// Debug metadata attached to an instruction. Line 0 marks
/// compiler-generated code with no source counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLoc {
    pub line: u32,
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl DebugLoc {
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_loc: Option<DebugLoc>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            debug_loc: None,
        }
    }

    pub fn at(opcode: Opcode, line: u32, column: u32) -> Self {
        Self {
            opcode,
            debug_loc: Some(DebugLoc::new(line, column)),
        }
    }

    pub fn callee(&self) -> Option<&str> {
        match &self.opcode {
            Opcode::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub params: u32,
    pub instructions: Vec<Instruction>,
}

impl Function {
    pub fn new(name: &str, params: u32, instructions: Vec<Instruction>) -> Self {
        Self {
            name: name.to_string(),
            params,
            instructions,
        }
    }

    /// Names of the functions called from this body, in instruction order.
    pub fn callees(&self) -> impl Iterator<Item = &str> + '_ {
        self.instructions.iter().filter_map(Instruction::callee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub source_file: Option<String>,
    pub functions: Vec<Function>,
}

/// Address of a single instruction slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstructionAddress {
    pub module: ModuleId,
    pub function: usize,
    pub instruction: usize,
}

impl Module {
    pub fn new(name: &str, source_file: Option<&str>, functions: Vec<Function>) -> Self {
        Self {
            name: name.to_string(),
            source_file: source_file.map(str::to_string),
            functions,
        }
    }

    pub fn function(&self, name: &str) -> Option<(usize, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, function)| function.name == name)
    }

    pub fn instruction(&self, function: usize, instruction: usize) -> Option<&Instruction> {
        self.functions.get(function)?.instructions.get(instruction)
    }

    pub fn instruction_mut(&mut self, function: usize, instruction: usize) -> Option<&mut Instruction> {
        self.functions
            .get_mut(function)?
            .instructions
            .get_mut(instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_json_shape() {
        let json = r#"{
            "opcode": {"kind": "compare", "dst": 0, "pred": "sgt", "lhs": {"arg": 0}, "rhs": {"imm": 0}},
            "debug_loc": {"line": 3, "column": 11}
        }"#;
        let instruction: Instruction = serde_json::from_str(json).unwrap();

        assert_eq!(
            instruction.opcode,
            Opcode::Compare {
                dst: 0,
                pred: Predicate::Sgt,
                lhs: Operand::Arg(0),
                rhs: Operand::Imm(0),
            }
        );
        assert_eq!(instruction.debug_loc, Some(DebugLoc::new(3, 11)));
    }

    #[test]
    fn test_binary_instruction_json() {
        let instruction = Instruction::at(
            Opcode::Binary {
                dst: 2,
                op: BinOp::Sub,
                lhs: Operand::Reg(0),
                rhs: Operand::Imm(1),
            },
            4,
            7,
        );

        let json = serde_json::to_value(&instruction).unwrap();
        assert_eq!(json["opcode"]["kind"], "binary");
        assert_eq!(json["opcode"]["op"], "sub");

        let decoded: Instruction = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, instruction);
    }

    #[test]
    fn test_callees_in_order() {
        let function = Function::new(
            "test_all",
            0,
            vec![
                Instruction::new(Opcode::Call {
                    dst: Some(0),
                    callee: "first".into(),
                    args: vec![],
                }),
                Instruction::new(Opcode::Move {
                    dst: 1,
                    src: Operand::Imm(2),
                }),
                Instruction::new(Opcode::Call {
                    dst: None,
                    callee: "second".into(),
                    args: vec![Operand::Reg(1)],
                }),
                Instruction::new(Opcode::Return { value: None }),
            ],
        );

        let callees: Vec<&str> = function.callees().collect();
        assert_eq!(callees, vec!["first", "second"]);
    }

    #[test]
    fn test_instruction_mut_out_of_range() {
        let mut module = Module::new("empty", None, vec![]);
        assert!(module.instruction_mut(0, 0).is_none());
        assert!(module.function("missing").is_none());
    }
}
