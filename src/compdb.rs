//! `compile_commands.json` lookup.

use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const COMPDB_FILE_NAME: &str = "compile_commands.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompileCommand {
    pub directory: String,
    pub file: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub command: Option<String>,
}

impl CompileCommand {
    pub fn command_line(&self) -> Vec<String> {
        if !self.arguments.is_empty() {
            return self.arguments.clone();
        }
        self.command
            .as_deref()
            .map(parse_compilation_flags)
            .unwrap_or_default()
    }

    pub fn full_path(&self) -> PathBuf {
        let file = Path::new(&self.file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            Path::new(&self.directory).join(file)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    commands: Vec<CompileCommand>,
}

impl CompilationDatabase {
    pub fn from_commands(commands: Vec<CompileCommand>) -> Self {
        Self { commands }
    }

    pub fn load_from_directory(directory: &Path) -> Result<Self> {
        let content = fs::read_to_string(directory.join(COMPDB_FILE_NAME))?;
        let commands: Vec<CompileCommand> = serde_json::from_str(&content)?;
        Ok(Self { commands })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Looks the file up by its full path first, then by file name alone.
    pub fn compile_command(&self, source_file: &str) -> Option<&CompileCommand> {
        let source_path = Path::new(source_file);

        let by_path = self
            .commands
            .iter()
            .find(|command| command.file == source_file || command.full_path() == source_path);
        if by_path.is_some() {
            return by_path;
        }

        let file_name = source_path.file_name()?;
        self.commands
            .iter()
            .find(|command| Path::new(&command.file).file_name() == Some(file_name))
    }
}

/// Splits a raw flags string on whitespace.
pub fn parse_compilation_flags(flags: &str) -> Vec<String> {
    flags.split_whitespace().map(str::to_string).collect()
}

/// Drops the `-c <file>` and `-o <file>` pairs and any mention of the source
/// file itself.
pub fn strip_compile_arguments(arguments: &[String], source_file: &str) -> Vec<String> {
    let mut stripped = Vec::new();
    let mut iter = arguments.iter();

    while let Some(argument) = iter.next() {
        if argument == "-c" || argument == "-o" {
            iter.next();
            continue;
        }
        if argument == source_file {
            continue;
        }
        stripped.push(argument.clone());
    }

    stripped
}

/// Include directories named by `-I<dir>` or `-I <dir>`.
pub fn include_directories(arguments: &[String]) -> Vec<PathBuf> {
    let mut directories = Vec::new();
    let mut iter = arguments.iter();

    while let Some(argument) = iter.next() {
        if argument == "-I" {
            if let Some(directory) = iter.next() {
                directories.push(PathBuf::from(directory));
            }
        } else if let Some(directory) = argument.strip_prefix("-I") {
            directories.push(PathBuf::from(directory));
        }
    }

    directories
}
