use crate::compiler::CompiledArtifact;
use crate::ir::ModuleId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One compiled artifact per module, for the lifetime of a run.
///
/// Not synchronized: callers touching the cache from several threads must
/// wrap it themselves.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    entries: BTreeMap<ModuleId, Arc<CompiledArtifact>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the artifact for `module`, replacing any previous one.
    pub fn insert(&mut self, module: ModuleId, artifact: CompiledArtifact) {
        self.entries.insert(module, Arc::new(artifact));
    }

    pub fn get(&self, module: ModuleId) -> Option<&Arc<CompiledArtifact>> {
        self.entries.get(&module)
    }

    /// Every cached artifact except the one owned by `excluded`, ordered by
    /// module id.
    pub fn all_except(&self, excluded: ModuleId) -> Vec<Arc<CompiledArtifact>> {
        self.entries
            .iter()
            .filter(|(module, _)| **module != excluded)
            .map(|(_, artifact)| Arc::clone(artifact))
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<CompiledArtifact>> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
