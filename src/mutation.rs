use crate::context::Context;
use crate::error::{MutationError, Result};
use crate::ir::{Instruction, InstructionAddress, Module, Opcode};
use crate::operators::MutatorKind;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Source position correlated from an instruction's debug metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file_path: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// `None` when the instruction carries no usable debug location or the
    /// module does not name its source file.
    pub fn correlate(module: &Module, instruction: &Instruction) -> Option<SourceLocation> {
        let loc = instruction.debug_loc.as_ref()?;
        if loc.line == 0 {
            return None;
        }

        let file_path = loc.file.as_deref().or(module.source_file.as_deref())?;
        if file_path.is_empty() {
            return None;
        }

        Some(SourceLocation {
            file_path: file_path.to_string(),
            line: loc.line,
            column: loc.column,
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        Path::new(&self.file_path).file_name()?.to_str()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.line, self.column)
    }
}

/// A single edit `{location, original form, mutated form}` that can be
/// applied to and reverted from its owning module.
///
/// Points are created unapplied. Every `apply_mutation` must be followed by
/// exactly one `revert_mutation`; calling either out of turn is an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationPoint {
    address: InstructionAddress,
    #[serde(serialize_with = "serialize_kind")]
    kind: MutatorKind,
    function: String,
    original: Opcode,
    mutated: Opcode,
    source_location: Option<SourceLocation>,
    #[serde(skip)]
    applied: bool,
}

fn serialize_kind<S: serde::Serializer>(kind: &MutatorKind, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.name())
}

impl MutationPoint {
    pub fn new(
        address: InstructionAddress,
        kind: MutatorKind,
        function: &str,
        original: Opcode,
        mutated: Opcode,
        source_location: Option<SourceLocation>,
    ) -> Self {
        Self {
            address,
            kind,
            function: function.to_string(),
            original,
            mutated,
            source_location,
            applied: false,
        }
    }

    pub fn address(&self) -> InstructionAddress {
        self.address
    }

    pub fn kind(&self) -> MutatorKind {
        self.kind
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn original(&self) -> &Opcode {
        &self.original
    }

    pub fn mutated(&self) -> &Opcode {
        &self.mutated
    }

    pub fn source_location(&self) -> Option<&SourceLocation> {
        self.source_location.as_ref()
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.address.module.0, self.function, self.address.instruction, self.kind
        )
    }

    pub fn apply_mutation(&mut self, ctx: &mut Context) -> Result<()> {
        if self.applied {
            return Err(MutationError::AlreadyApplied(self.id()));
        }
        self.swap(ctx, true)?;
        self.applied = true;
        Ok(())
    }

    pub fn revert_mutation(&mut self, ctx: &mut Context) -> Result<()> {
        if !self.applied {
            return Err(MutationError::NotApplied(self.id()));
        }
        self.swap(ctx, false)?;
        self.applied = false;
        Ok(())
    }

    fn swap(&self, ctx: &mut Context, forward: bool) -> Result<()> {
        let (expected, replacement) = if forward {
            (&self.original, &self.mutated)
        } else {
            (&self.mutated, &self.original)
        };

        let slot = ctx
            .module_mut(self.address.module)
            .and_then(|module| module.instruction_mut(self.address.function, self.address.instruction))
            .ok_or_else(|| MutationError::StaleMutationPoint(self.id()))?;

        if slot.opcode != *expected {
            return Err(MutationError::StaleMutationPoint(self.id()));
        }
        slot.opcode = replacement.clone();
        Ok(())
    }
}

impl fmt::Display for MutationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_location {
            Some(location) => write!(f, "{} at {}", self.id(), location),
            None => write!(f, "{} at <unknown>", self.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DebugLoc, Function, ModuleId, Operand, Predicate};
    use crate::operators::get_default_operators;

    fn context() -> Context {
        let mut ctx = Context::new();
        ctx.add_module(Module::new(
            "bar",
            Some("bar.c"),
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
                    Instruction::new(Opcode::Return {
                        value: Some(Operand::Reg(0)),
                    }),
                ],
            )],
        ));
        ctx
    }

    fn first_point(ctx: &Context) -> MutationPoint {
        let module = ctx.module(ModuleId(0)).unwrap();
        get_default_operators()[0]
            .mutation_points(ModuleId(0), module, 0)
            .next()
            .unwrap()
    }

    #[test]
    fn test_apply_then_revert_restores_instruction() {
        let mut ctx = context();
        let before = ctx.module(ModuleId(0)).unwrap().clone();
        let mut point = first_point(&ctx);

        point.apply_mutation(&mut ctx).unwrap();
        let slot = &ctx.module(ModuleId(0)).unwrap().functions[0].instructions[0];
        assert!(matches!(slot.opcode, Opcode::Compare { pred: Predicate::Sge, .. }));
        assert!(point.is_applied());

        point.revert_mutation(&mut ctx).unwrap();
        assert_eq!(ctx.module(ModuleId(0)).unwrap(), &before);
        assert!(!point.is_applied());
    }

    #[test]
    fn test_out_of_turn_calls_are_rejected() {
        let mut ctx = context();
        let mut point = first_point(&ctx);

        assert!(matches!(point.revert_mutation(&mut ctx), Err(MutationError::NotApplied(_))));
        point.apply_mutation(&mut ctx).unwrap();
        assert!(matches!(point.apply_mutation(&mut ctx), Err(MutationError::AlreadyApplied(_))));
        point.revert_mutation(&mut ctx).unwrap();
    }

    #[test]
    fn test_stale_point_is_detected() {
        let mut ctx = context();
        let mut point = first_point(&ctx);
        ctx.module_mut(ModuleId(0)).unwrap().functions[0].instructions[0].opcode =
            Opcode::Return { value: None };

        assert!(matches!(
            point.apply_mutation(&mut ctx),
            Err(MutationError::StaleMutationPoint(_))
        ));
        assert!(!point.is_applied());
    }

    #[test]
    fn test_source_location_correlation() {
        let module = Module::new("m", Some("src/m.c"), vec![]);
        let mut instruction = Instruction::at(Opcode::Return { value: None }, 4, 7);

        let location = SourceLocation::correlate(&module, &instruction).unwrap();
        assert_eq!(location.to_string(), "src/m.c:4:7");
        assert_eq!(location.file_name(), Some("m.c"));

        instruction.debug_loc = Some(DebugLoc {
            line: 4,
            column: 7,
            file: Some("include/m.h".to_string()),
        });
        assert_eq!(
            SourceLocation::correlate(&module, &instruction).unwrap().file_path,
            "include/m.h"
        );

        instruction.debug_loc = Some(DebugLoc::new(0, 0));
        assert!(SourceLocation::correlate(&module, &instruction).is_none());

        instruction.debug_loc = None;
        assert!(SourceLocation::correlate(&module, &instruction).is_none());

        let anonymous = Module::new("m", None, vec![]);
        let located = Instruction::at(Opcode::Return { value: None }, 4, 7);
        assert!(SourceLocation::correlate(&anonymous, &located).is_none());
    }
}
