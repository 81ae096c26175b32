//! Serves editor autocomplete queries from the live module index.
//!
//! Three contexts, tried in order: a LANGUAGE-pragma line, an import
//! statement, and the general expression fallback. All work is in-memory
//! lookups under the index's read locks; the engine never blocks on
//! subprocess calls and never fails visibly; inconsistencies degrade to
//! an empty candidate list.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

use crate::config::CompletionConfig;
use crate::lexicon::Lexicon;
use crate::storage::ModuleIndex;

/// Display text longer than this is ellipsized.
pub const MAX_COMPLETION_LENGTH: usize = 37;

// Line is inside a LANGUAGE pragma.
static LANGUAGE_PRAGMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{-#\s+LANGUAGE").unwrap());

// Line is an import statement; captures the module prefix typed so far.
static IMPORT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*import(\s+qualified)?\s+(.*)$").unwrap());

// Cursor sits right after `import `; captures the word in progress.
static IMPORT_QUALIFIED_POSSIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*import\s+(?P<qualifiedprefix>\S*)$").unwrap());

// Candidates with characters outside alphanumerics, `-`, and `_` disrupt
// the host editor's built-in completion list.
static PLAIN_DISPLAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w-]*$").unwrap());

/// One completion candidate: what the editor shows, and what it inserts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub display: String,
    pub insertion: String,
}

impl Candidate {
    pub fn new(display: impl Into<String>, insertion: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            insertion: insertion.into(),
        }
    }

    /// Display and insertion are the same text.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            display: text.clone(),
            insertion: text,
        }
    }
}

pub struct CompletionEngine {
    index: Arc<ModuleIndex>,
    lexicon: Arc<Lexicon>,
    settings: RwLock<CompletionConfig>,
}

impl CompletionEngine {
    pub fn new(index: Arc<ModuleIndex>, lexicon: Arc<Lexicon>, settings: CompletionConfig) -> Self {
        Self {
            index,
            lexicon,
            settings: RwLock::new(settings),
        }
    }

    /// Re-apply configuration toggles; takes effect on the next query.
    pub fn apply_settings(&self, settings: CompletionConfig) {
        *self.settings.write() = settings;
    }

    /// All completions for the current line (text up to the cursor) in the
    /// given file, deduplicated and filtered.
    pub fn completions(&self, file: &Path, line: &str) -> Vec<Candidate> {
        let raw = match self.special_completions(line) {
            Some(candidates) => candidates,
            None => self.expression_completions(file, line),
        };
        dedup(raw)
            .into_iter()
            .filter(|candidate| PLAIN_DISPLAY.is_match(&candidate.display))
            .collect()
    }

    /// Pragma and import contexts. `None` means the line is neither and
    /// the expression fallback applies.
    fn special_completions(&self, line: &str) -> Option<Vec<Candidate>> {
        let settings = self.settings.read().clone();

        if settings.language_pragmas && LANGUAGE_PRAGMA.is_match(line) {
            return Some(self.lexicon.languages().into_iter().map(Candidate::literal).collect());
        }

        if settings.imports {
            if let Some(caps) = IMPORT_PREFIX.captures(line) {
                let prefix = caps.get(2).map_or("", |m| m.as_str());
                let mut candidates = self.module_completions_for(prefix);

                // Right after `import `? Propose `qualified` as well.
                if let Some(qcaps) = IMPORT_QUALIFIED_POSSIBLE.captures(line) {
                    let typed = &qcaps["qualifiedprefix"];
                    if typed.is_empty() || "qualified".starts_with(typed) {
                        candidates.insert(0, Candidate::new("qualified", "qualified "));
                    }
                }
                return Some(candidates);
            }
        }

        None
    }

    /// Next path segments of all known module names starting with
    /// `prefix`: `Control.Con` against `Control.Concurrent.MVar` yields
    /// `Concurrent`.
    pub fn module_completions_for(&self, prefix: &str) -> Vec<Candidate> {
        let segment_index = prefix.split('.').count() - 1;
        let mut candidates = Vec::new();
        for module in self.lexicon.modules() {
            if module.starts_with(prefix) {
                if let Some(segment) = module.split('.').nth(segment_index) {
                    candidates.push(Candidate::literal(segment));
                }
            }
        }
        candidates
    }

    /// The general expression fallback: identifiers declared by in-scope
    /// modules, plus exports of in-scope standard modules, plus module
    /// segments when a qualifier is being typed.
    fn expression_completions(&self, file: &Path, line: &str) -> Vec<Candidate> {
        let (qualifier, qualified_prefix) = qualifier_of_line(line);
        let has_qualifier = !qualifier.is_empty();

        let mut candidates = Vec::new();
        if has_qualifier {
            candidates.extend(self.module_completions_for(&qualified_prefix));
        }

        let modules = self.index.modules();

        // Which module names are in scope for this position.
        let mut in_scope: Vec<String> = Vec::new();
        if has_qualifier {
            // The qualifier may be an alias: `import Data.Text as T` puts
            // Data.Text in scope for `T.`. The literal qualifier is kept
            // too, covering a written-out real module name.
            if let Some(current) = modules.get(file) {
                in_scope.extend(
                    current
                        .imports
                        .iter()
                        .filter(|import| import.alias.as_deref() == Some(qualifier.as_str()))
                        .map(|import| import.name.clone()),
                );
            }
            in_scope.push(qualifier);
        } else if let Some(current) = modules.get(file) {
            in_scope.extend(
                current
                    .imports
                    .iter()
                    .filter(|import| !import.qualified)
                    .map(|import| import.name.clone()),
            );
        }

        for info in modules.values() {
            if !info.is_reliable() {
                continue;
            }
            if in_scope.iter().any(|name| *name == info.module_name) {
                for declaration in &info.declarations {
                    candidates.push(Candidate::new(
                        ellipsize(&declaration.identifier),
                        declaration.identifier.clone(),
                    ));
                }
            }
        }

        let std_modules = self.index.std_modules();
        for name in &in_scope {
            if let Some(exports) = std_modules.get(name) {
                for symbol in exports {
                    candidates.push(Candidate::new(ellipsize(symbol), symbol.clone()));
                }
            }
        }

        candidates
    }
}

/// Split the token before the cursor into (qualifier, full dotted prefix):
/// `bla bla Data.List.fo` -> `("Data.List", "Data.List.fo")`. Segments are
/// reduced to their alphabetic characters.
fn qualifier_of_line(line: &str) -> (String, String) {
    let Some(token) = line.split_whitespace().last() else {
        return (String::new(), String::new());
    };
    let segments: Vec<String> = token
        .split('.')
        .map(|segment| segment.chars().filter(|c| c.is_alphabetic()).collect())
        .collect();
    let prefix = segments.join(".");
    let qualifier = segments[..segments.len() - 1].join(".");
    (qualifier, prefix)
}

fn ellipsize(text: &str) -> String {
    if text.chars().count() <= MAX_COMPLETION_LENGTH {
        text.to_string()
    } else {
        let mut shortened: String = text.chars().take(MAX_COMPLETION_LENGTH).collect();
        shortened.push('…');
        shortened
    }
}

/// Order-preserving dedup over (display, insertion) pairs.
fn dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}
