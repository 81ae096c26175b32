use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Build-output subtrees that only contain generated sources.
const EXCLUDED_DIRS: &[&str] = &["dist", "dist-newstyle", ".stack-work"];

/// A project's build descriptor: the project name and the descriptor file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub name: String,
    pub path: PathBuf,
}

pub fn is_haskell_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "hs")
}

fn is_descriptor(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "cabal")
}

/// Every file under `dir`, recursively. Used to seed the dirty set; the
/// agent filters out non-source files itself.
pub fn list_files_recursively(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Haskell sources under a project directory, skipping build-output
/// subtrees.
pub fn haskell_sources_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| EXCLUDED_DIRS.contains(&name)))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_haskell_source(path))
        .collect()
}

/// The build descriptor directly inside `dir`, if any. The project name is
/// the descriptor's file stem. With several descriptors the
/// lexicographically first wins, for determinism.
pub fn project_descriptor_in(dir: &Path) -> Option<ProjectDescriptor> {
    let mut descriptors: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_descriptor(path))
        .collect();
    descriptors.sort();

    let path = descriptors.into_iter().next()?;
    let name = path.file_stem()?.to_str()?.to_string();
    Some(ProjectDescriptor { name, path })
}

/// Nearest ancestor directory of `file` containing a build descriptor.
pub fn find_project_dir(file: &Path) -> Option<PathBuf> {
    file.ancestors()
        .skip(1)
        .find(|dir| project_descriptor_in(dir).is_some())
        .map(|dir| dir.to_path_buf())
}
