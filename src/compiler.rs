//! Lowering of modules into linkable object images.

use crate::error::{MutationError, Result};
use crate::ir::{Function, Module, Opcode, Operand};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

pub const OBJECT_FORMAT_VERSION: u32 = 1;

/// Machine code for one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub params: u32,
    pub code: Vec<Opcode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectImage {
    pub format_version: u32,
    pub module: String,
    pub symbols: Vec<Symbol>,
}

/// Result of compiling a module at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub module_name: String,
    pub object: Vec<u8>,
    pub digest: String,
}

impl CompiledArtifact {
    pub fn from_image(image: &ObjectImage) -> Result<Self> {
        let object = serde_json::to_vec(image)?;
        Ok(Self {
            module_name: image.module.clone(),
            digest: digest_of(&object),
            object,
        })
    }

    pub fn image(&self) -> Result<ObjectImage> {
        Ok(serde_json::from_slice(&self.object)?)
    }
}

fn digest_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub trait Compiler {
    /// Compiles the module in its current, possibly mutated, state.
    fn compile(&self, module: &Module) -> Result<CompiledArtifact>;
}

#[derive(Debug, Default, Clone)]
pub struct ObjectCompiler;

impl Compiler for ObjectCompiler {
    fn compile(&self, module: &Module) -> Result<CompiledArtifact> {
        validate_module(module)?;

        let image = ObjectImage {
            format_version: OBJECT_FORMAT_VERSION,
            module: module.name.clone(),
            symbols: module.functions.iter().map(lower_function).collect(),
        };
        CompiledArtifact::from_image(&image)
    }
}

fn lower_function(function: &Function) -> Symbol {
    Symbol {
        name: function.name.clone(),
        params: function.params,
        code: function
            .instructions
            .iter()
            .map(|instruction| instruction.opcode.clone())
            .collect(),
    }
}

fn validate_module(module: &Module) -> Result<()> {
    let fail = |reason: String| MutationError::Compile {
        module: module.name.clone(),
        reason,
    };

    let mut names = HashSet::new();
    for function in &module.functions {
        if !names.insert(function.name.as_str()) {
            return Err(fail(format!("duplicate definition of {}", function.name)));
        }
        if function.instructions.is_empty() {
            return Err(fail(format!("function {} has no body", function.name)));
        }

        let len = function.instructions.len();
        for (index, instruction) in function.instructions.iter().enumerate() {
            let targets = match &instruction.opcode {
                Opcode::Jump { target } => vec![*target],
                Opcode::Branch {
                    then_target,
                    else_target,
                    ..
                } => vec![*then_target, *else_target],
                _ => Vec::new(),
            };
            if let Some(target) = targets.iter().find(|target| **target >= len) {
                return Err(fail(format!(
                    "{}:{} jumps to {} outside of the function",
                    function.name, index, target
                )));
            }

            if let Some(arg) = operands(&instruction.opcode).find_map(|operand| match operand {
                Operand::Arg(n) if *n >= function.params => Some(*n),
                _ => None,
            }) {
                return Err(fail(format!(
                    "{}:{} reads argument {} but takes {}",
                    function.name, index, arg, function.params
                )));
            }
        }
    }

    Ok(())
}

fn operands(opcode: &Opcode) -> Box<dyn Iterator<Item = &Operand> + '_> {
    match opcode {
        Opcode::Move { src, .. } => Box::new(std::iter::once(src)),
        Opcode::Binary { lhs, rhs, .. } | Opcode::Compare { lhs, rhs, .. } => {
            Box::new([lhs, rhs].into_iter())
        }
        Opcode::Call { args, .. } => Box::new(args.iter()),
        Opcode::Branch { cond, .. } => Box::new(std::iter::once(cond)),
        Opcode::Return { value } => Box::new(value.iter()),
        Opcode::Jump { .. } => Box::new(std::iter::empty()),
    }
}
