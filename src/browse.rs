//! Navigation queries over the module index: jump to a declaration by
//! identifier, or list every known declaration for a picker. Plain linear
//! scans under the index's read locks; entries whose last inspection
//! failed are skipped.

use std::path::PathBuf;

use crate::storage::ModuleIndex;

/// Source position of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationSite {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

/// One row for a declaration picker. `site` is absent for standard-module
/// exports, which have no local source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseItem {
    pub label: String,
    pub insertion: String,
    pub site: Option<DeclarationSite>,
}

/// Find where `identifier` is declared. First match wins.
pub fn find_declaration(index: &ModuleIndex, identifier: &str) -> Option<DeclarationSite> {
    let modules = index.modules();
    for (file, info) in modules.iter() {
        if !info.is_reliable() {
            continue;
        }
        for declaration in &info.declarations {
            if declaration.identifier == identifier {
                return Some(DeclarationSite {
                    file: file.clone(),
                    line: declaration.line,
                    column: declaration.column,
                });
            }
        }
    }
    None
}

/// Every known declaration: indexed files first (with locations), then
/// standard-module exports (insertion only).
pub fn all_declarations(index: &ModuleIndex) -> Vec<BrowseItem> {
    let mut items = Vec::new();

    {
        let modules = index.modules();
        for (file, info) in modules.iter() {
            if !info.is_reliable() {
                continue;
            }
            for declaration in &info.declarations {
                items.push(BrowseItem {
                    label: format!(
                        "{}: {} ({})",
                        info.module_name, declaration.identifier, declaration.kind
                    ),
                    insertion: declaration.identifier.clone(),
                    site: Some(DeclarationSite {
                        file: file.clone(),
                        line: declaration.line,
                        column: declaration.column,
                    }),
                });
            }
        }
    }

    let std_modules = index.std_modules();
    for (module, exports) in std_modules.iter() {
        for symbol in exports {
            items.push(BrowseItem {
                label: format!("{module}: {symbol}"),
                insertion: symbol.clone(),
                site: None,
            });
        }
    }

    items
}
