use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// A single import in a module, as reported by the module inspector.
///
/// `import qualified Data.Text as T` yields
/// `{ name: "Data.Text", qualified: true, alias: Some("T") }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    #[serde(rename = "importName")]
    pub name: String,
    #[serde(default)]
    pub qualified: bool,
    #[serde(rename = "as", default)]
    pub alias: Option<String>,
}

impl ImportInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualified: false,
            alias: None,
        }
    }

    pub fn qualified(mut self) -> Self {
        self.qualified = true;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Kind of a top-level declaration. Unknown kinds from newer inspector
/// versions decode as `Other` rather than failing the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Data,
    Type,
    Class,
    Function,
    #[serde(other)]
    Other,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeclarationKind::Data => "data",
            DeclarationKind::Type => "type",
            DeclarationKind::Class => "class",
            DeclarationKind::Function => "function",
            DeclarationKind::Other => "other",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub identifier: String,
    pub kind: DeclarationKind,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl Declaration {
    pub fn new(identifier: impl Into<String>, kind: DeclarationKind) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            line: 0,
            column: 0,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

/// Parsed metadata for one source file, keyed in the index by absolute path.
///
/// This is both the wire shape of the module inspector's JSON output and the
/// stored index entry; the agent stamps `inspected_at` before insertion.
/// When `error` is present every other field is unreliable and the entry is
/// excluded from completion and browsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    #[serde(rename = "moduleName", default)]
    pub module_name: String,
    /// `None` means the module exports everything.
    #[serde(rename = "exportList", default)]
    pub export_list: Option<Vec<String>>,
    #[serde(default)]
    pub imports: Vec<ImportInfo>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    /// File modification time at the last successful inspection.
    #[serde(rename = "inspectedAt", default = "epoch")]
    pub inspected_at: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH
}

impl ModuleInfo {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            export_list: None,
            imports: Vec::new(),
            declarations: Vec::new(),
            inspected_at: epoch(),
            error: None,
        }
    }

    pub fn with_imports(mut self, imports: Vec<ImportInfo>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_declarations(mut self, declarations: Vec<Declaration>) -> Self {
        self.declarations = declarations;
        self
    }

    /// An entry whose last inspection reported an error carries stale or
    /// partial data and must not feed completions or navigation.
    pub fn is_reliable(&self) -> bool {
        self.error.is_none()
    }
}
