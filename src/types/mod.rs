pub mod errors;
pub mod module;
pub mod project;

pub use errors::{Result, ScoutError};
pub use module::{Declaration, DeclarationKind, ImportInfo, ModuleInfo};
pub use project::{ExecutableInfo, ProjectInfo, ProjectInspection};
