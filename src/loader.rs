use crate::error::{MutationError, Result};
use crate::ir::Module;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MODULE_EXTENSION: &str = ".ir.json";

pub trait ModuleLoader {
    fn load_module_at_path(&self, path: &Path) -> Result<Module>;
}

/// Reads modules serialized as JSON.
#[derive(Debug, Default, Clone)]
pub struct JsonModuleLoader;

impl ModuleLoader for JsonModuleLoader {
    fn load_module_at_path(&self, path: &Path) -> Result<Module> {
        let content = fs::read_to_string(path).map_err(|e| MutationError::ModuleLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| MutationError::ModuleLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Expands directories into the module files they contain, keeping the
/// configured order. Files inside one directory are sorted by path.
pub fn collect_module_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut modules = Vec::new();

    for path in paths {
        if !path.is_dir() {
            modules.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(MODULE_EXTENSION) {
                    found.push(entry.path().to_path_buf());
                }
            }
        }
        found.sort();
        modules.extend(found);
    }

    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_module_from_json() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bar.ir.json");
        fs::write(
            &path,
            r#"{
                "name": "bar",
                "source_file": "bar.c",
                "functions": [
                    {"name": "zero", "instructions": [
                        {"opcode": {"kind": "return", "value": {"imm": 0}}}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let module = JsonModuleLoader.load_module_at_path(&path).unwrap();
        assert_eq!(module.name, "bar");
        assert_eq!(module.source_file.as_deref(), Some("bar.c"));
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].params, 0);
    }

    #[test]
    fn test_missing_module_is_load_error() {
        let result = JsonModuleLoader.load_module_at_path(Path::new("/nonexistent/foo.ir.json"));
        assert!(matches!(result, Err(MutationError::ModuleLoad { .. })));
    }

    #[test]
    fn test_collect_module_paths() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("modules");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("b.ir.json"), "{}").unwrap();
        fs::write(dir.join("nested/a.ir.json"), "{}").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();

        let explicit = temp_dir.path().join("first.ir.json");
        let paths = collect_module_paths(&[explicit.clone(), dir.clone()]).unwrap();

        assert_eq!(
            paths,
            vec![explicit, dir.join("b.ir.json"), dir.join("nested/a.ir.json")]
        );
    }
}
