use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One build target declared by a project descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableInfo {
    pub name: String,
}

/// Project metadata, keyed in the index by project name. Replaced wholesale
/// whenever the project's build descriptor is re-inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub dir: PathBuf,
    pub build_file_name: String,
    pub executables: Vec<ExecutableInfo>,
}

/// Wire shape of the project inspector's JSON output. Presence of `error`
/// signals failure; `executables` may be absent even on success.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInspection {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub executables: Option<Vec<ExecutableInfo>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_executables() {
        let raw = r#"{"executables": [{"name": "scout"}, {"name": "scout-daemon"}]}"#;
        let parsed: ProjectInspection = serde_json::from_str(raw).unwrap();
        assert!(parsed.error.is_none());
        let execs = parsed.executables.unwrap();
        assert_eq!(execs.len(), 2);
        assert_eq!(execs[0].name, "scout");
    }

    #[test]
    fn error_field_signals_failure() {
        let raw = r#"{"error": "no library section"}"#;
        let parsed: ProjectInspection = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("no library section"));
        assert!(parsed.executables.is_none());
    }

    #[test]
    fn extra_executable_fields_are_ignored() {
        let raw = r#"{"executables": [{"name": "scout", "srcDir": "app"}]}"#;
        let parsed: ProjectInspection = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.executables.unwrap()[0].name, "scout");
    }
}
