pub mod agent;
pub mod browse;
pub mod cache;
pub mod cli;
pub mod completion;
pub mod config;
pub mod invoker;
pub mod lexicon;
pub mod scanner;
pub mod status;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use agent::{AgentHandle, DirtySet, InspectionAgent};
pub use browse::{all_declarations, find_declaration, BrowseItem, DeclarationSite};
pub use completion::{Candidate, CompletionEngine, MAX_COMPLETION_LENGTH};
pub use config::{AgentConfig, CompletionConfig, ScoutConfig, ToolchainConfig};
pub use invoker::{ToolInvoker, ToolOutput};
pub use lexicon::Lexicon;
pub use status::{LogReporter, StatusReporter};
pub use storage::{IndexStats, ModuleIndex};
pub use types::{
    Declaration, DeclarationKind, ExecutableInfo, ImportInfo, ModuleInfo, ProjectInfo, Result,
    ScoutError,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
