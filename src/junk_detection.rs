//! Source-level filtering of mutation points.
//!
//! A point is junk when no syntax at its source location could have
//! produced the instruction it mutates. The originating C or C++ file is
//! parsed once per run and searched for the innermost expression of the
//! right shape that encloses the location.

use crate::compdb::{
    include_directories, parse_compilation_flags, strip_compile_arguments, CompilationDatabase,
};
use crate::config::JunkDetectionConfig;
use crate::error::{MutationError, Result};
use crate::mutation::{MutationPoint, SourceLocation};
use crate::operators::MutatorKind;
use slog::{debug, error, Logger};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tree_sitter::{Language, Node, Parser, Tree};

/// Shape of syntax a mutator kind must correlate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxCategory {
    /// `<`, `<=`, `>`, `>=`
    Relational,
    /// `+`, `+=`, `++`
    Addition,
    /// `-`, `-=`, `--`
    Subtraction,
}

impl SyntaxCategory {
    pub fn for_kind(kind: MutatorKind) -> Option<SyntaxCategory> {
        match kind {
            MutatorKind::ConditionalsBoundary => Some(SyntaxCategory::Relational),
            MutatorKind::MathAdd => Some(SyntaxCategory::Addition),
            MutatorKind::MathSub => Some(SyntaxCategory::Subtraction),
            _ => None,
        }
    }

    fn matches(self, node: Node) -> bool {
        let operator = match node.child_by_field_name("operator") {
            Some(operator) => operator.kind(),
            None => return false,
        };

        match (self, node.kind()) {
            (SyntaxCategory::Relational, "binary_expression") => {
                matches!(operator, "<" | "<=" | ">" | ">=")
            }
            (SyntaxCategory::Addition, "binary_expression") => operator == "+",
            (SyntaxCategory::Addition, "assignment_expression") => operator == "+=",
            (SyntaxCategory::Addition, "update_expression") => operator == "++",
            (SyntaxCategory::Subtraction, "binary_expression") => operator == "-",
            (SyntaxCategory::Subtraction, "assignment_expression") => operator == "-=",
            (SyntaxCategory::Subtraction, "update_expression") => operator == "--",
            _ => false,
        }
    }
}

/// Byte range with an inclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRange {
    pub begin: usize,
    pub end: usize,
}

impl SourceRange {
    /// Bounds given in the wrong order are swapped.
    pub fn new(begin: usize, end: usize) -> Self {
        Self {
            begin: begin.min(end),
            end: begin.max(end),
        }
    }

    fn of(node: Node) -> Self {
        Self {
            begin: node.start_byte(),
            end: node.end_byte().saturating_sub(1).max(node.start_byte()),
        }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.begin <= offset && offset <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// Keeps the innermost candidate range that contains `offset`. Ties keep
/// the first range seen.
#[derive(Debug)]
pub struct RangeSearch {
    offset: usize,
    found: Option<SourceRange>,
}

impl RangeSearch {
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            found: None,
        }
    }

    pub fn visit(&mut self, range: SourceRange) {
        if !range.contains(self.offset) {
            return;
        }
        self.found = match self.found {
            Some(current) if current.len() <= range.len() => Some(current),
            _ => Some(range),
        };
    }

    pub fn found(&self) -> Option<SourceRange> {
        self.found
    }
}

pub const CXX_EXTENSIONS: &[&str] = &["cc", "cpp", "cxx", "c++", "hpp", "hh", "hxx"];

/// C++ grammar for C++ extensions, C for everything else.
pub fn language_for(path: &Path) -> Language {
    let is_cxx = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| CXX_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if is_cxx {
        tree_sitter_cpp::LANGUAGE.into()
    } else {
        tree_sitter_c::LANGUAGE.into()
    }
}

/// A parsed C or C++ source file.
pub struct SourceUnit {
    pub path: PathBuf,
    pub arguments: Vec<String>,
    text: String,
    tree: Tree,
    line_starts: Vec<usize>,
}

impl SourceUnit {
    pub fn parse(path: &Path, arguments: Vec<String>) -> Result<Self> {
        let fail = |reason: String| MutationError::SourceParse {
            path: path.display().to_string(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&language_for(path))
            .map_err(|e| fail(e.to_string()))?;
        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| fail("parser produced no tree".to_string()))?;
        if tree.root_node().has_error() {
            return Err(fail("source contains syntax errors".to_string()));
        }

        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(index, _)| index + 1))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            arguments,
            text,
            tree,
            line_starts,
        })
    }

    /// Byte offset of a 1-based line and column. Column 0 means "unknown"
    /// and maps to the start of the line.
    pub fn offset(&self, line: u32, column: u32) -> Option<usize> {
        let line_index = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(line_index)?;
        let end = self
            .line_starts
            .get(line_index + 1)
            .copied()
            .unwrap_or(self.text.len());

        let offset = start + (column as usize).saturating_sub(1);
        if offset < end || (offset == start && start == end) {
            Some(offset)
        } else {
            None
        }
    }

    pub fn smallest_enclosing(&self, offset: usize, category: SyntaxCategory) -> Option<SourceRange> {
        let mut search = RangeSearch::new(offset);
        visit_matching(self.tree.root_node(), category, &mut search);
        search.found()
    }

    pub fn text_of(&self, range: SourceRange) -> &str {
        self.text.get(range.begin..=range.end).unwrap_or_default()
    }
}

fn visit_matching(node: Node, category: SyntaxCategory, search: &mut RangeSearch) {
    if category.matches(node) {
        search.visit(SourceRange::of(node));
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_matching(child, category, search);
    }
}

/// One parsed unit per source file path. Lookup, parse and insert happen
/// under a single lock so a file is never parsed twice.
#[derive(Default)]
pub struct AstCache {
    units: Mutex<HashMap<String, Arc<SourceUnit>>>,
}

impl AstCache {
    pub fn get_or_parse<F>(&self, key: &str, parse: F) -> Result<Arc<SourceUnit>>
    where
        F: FnOnce() -> Result<SourceUnit>,
    {
        let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(unit) = units.get(key) {
            return Ok(Arc::clone(unit));
        }

        let unit = Arc::new(parse()?);
        units.insert(key.to_string(), Arc::clone(&unit));
        Ok(unit)
    }

    pub fn len(&self) -> usize {
        self.units.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Arguments a source file was built with, plus the directory they are
/// relative to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceArguments {
    pub directory: Option<PathBuf>,
    pub arguments: Vec<String>,
}

pub struct JunkDetector {
    compdb: Option<CompilationDatabase>,
    compilation_flags: Vec<String>,
    ast_cache: AstCache,
    logger: Logger,
}

impl JunkDetector {
    /// A compilation database that cannot be loaded is logged and ignored.
    pub fn new(config: &JunkDetectionConfig, logger: Logger) -> Self {
        let compdb = config.compdb_directory.as_ref().and_then(|directory| {
            match CompilationDatabase::load_from_directory(directory) {
                Ok(compdb) => Some(compdb),
                Err(e) => {
                    error!(logger, "can't load compilation database";
                        "directory" => %directory.display(), "error" => %e);
                    None
                }
            }
        });

        let compilation_flags = config
            .compilation_flags
            .as_deref()
            .map(parse_compilation_flags)
            .unwrap_or_default();

        Self {
            compdb,
            compilation_flags,
            ast_cache: AstCache::default(),
            logger,
        }
    }

    pub fn with_database(compdb: CompilationDatabase, compilation_flags: &str, logger: Logger) -> Self {
        Self {
            compdb: Some(compdb),
            compilation_flags: parse_compilation_flags(compilation_flags),
            ast_cache: AstCache::default(),
            logger,
        }
    }

    /// Errors only when the source file behind a located point cannot be
    /// read or parsed; callers treat that as fatal.
    pub fn is_junk(&self, point: &MutationPoint) -> Result<bool> {
        let location = match point.source_location() {
            Some(location) => location,
            None => return Ok(true),
        };

        match SyntaxCategory::for_kind(point.kind()) {
            Some(category) => self.is_junk_at(location, category),
            None => Ok(false),
        }
    }

    pub fn is_junk_at(&self, location: &SourceLocation, category: SyntaxCategory) -> Result<bool> {
        let unit = self.find_ast(location)?;

        let offset = match unit.offset(location.line, location.column) {
            Some(offset) => offset,
            None => {
                debug!(self.logger, "location is outside of its source file"; "location" => %location);
                return Ok(true);
            }
        };

        Ok(unit.smallest_enclosing(offset, category).is_none())
    }

    pub fn cached_units(&self) -> usize {
        self.ast_cache.len()
    }

    fn find_ast(&self, location: &SourceLocation) -> Result<Arc<SourceUnit>> {
        self.ast_cache.get_or_parse(&location.file_path, || {
            let source = self.command_line_arguments(&location.file_path);
            let path = resolve_source_path(&location.file_path, &source);
            debug!(self.logger, "parsing source"; "path" => %path.display(),
                "arguments" => source.arguments.len());
            SourceUnit::parse(&path, source.arguments)
        })
    }

    /// Database entry by full path, then by file name, then the raw flags.
    pub fn command_line_arguments(&self, source_file: &str) -> SourceArguments {
        let raw = || SourceArguments {
            directory: None,
            arguments: self.compilation_flags.clone(),
        };

        let command = match self
            .compdb
            .as_ref()
            .and_then(|compdb| compdb.compile_command(source_file))
        {
            Some(command) => command,
            None => return raw(),
        };

        SourceArguments {
            directory: Some(PathBuf::from(&command.directory)),
            arguments: strip_compile_arguments(&command.command_line(), &command.file),
        }
    }
}

/// Relative paths are tried against the working directory, the compile
/// command's directory and then every include directory.
pub fn resolve_source_path(file_path: &str, source: &SourceArguments) -> PathBuf {
    let path = Path::new(file_path);
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }

    let base = source.directory.clone();
    let includes = include_directories(&source.arguments).into_iter().map(|include| {
        match &base {
            Some(base) if include.is_relative() => base.join(include),
            _ => include,
        }
    });

    base.clone()
        .into_iter()
        .chain(includes)
        .map(|directory| directory.join(path))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
