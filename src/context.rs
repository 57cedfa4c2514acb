use crate::ir::{Function, Module, ModuleId};

/// Owns every loaded module for the duration of a run.
#[derive(Debug, Default)]
pub struct Context {
    modules: Vec<Module>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        self.modules.push(module);
        ModuleId(self.modules.len() - 1)
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.0)
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id.0)
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> + '_ {
        self.modules
            .iter()
            .enumerate()
            .map(|(index, module)| (ModuleId(index), module))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// First definition of `name` in load order.
    pub fn find_function(&self, name: &str) -> Option<(ModuleId, usize)> {
        self.modules().find_map(|(id, module)| {
            module.function(name).map(|(index, _)| (id, index))
        })
    }

    pub fn function(&self, module: ModuleId, index: usize) -> Option<&Function> {
        self.module(module)?.functions.get(index)
    }
}
