//! Multi-root editor workspace descriptor (`workspace.code-workspace`)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::io::FileSystemTrait;
use crate::project::ProjectError;
use crate::project::module::{ModuleNode, selected_modules};

/// Fixed file name of the descriptor, written at the source root
pub const WORKSPACE_DESCRIPTOR_NAME: &str = "workspace.code-workspace";

pub const FILES_EXCLUDE_KEY: &str = "files.exclude";
pub const BUILD_CONFIGURATION_KEY: &str = "java.configuration.updateBuildConfiguration";
const BUILD_CONFIGURATION_MODE: &str = "automatic";

/// One root folder of the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl WorkspaceFolder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }
}

/// Persisted multi-root view: selected modules as roots plus the project root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDescriptor {
    pub folders: Vec<WorkspaceFolder>,
    pub settings: BTreeMap<String, Value>,
}

impl WorkspaceDescriptor {
    /// Descriptor for the explicitly selected nodes of a module tree
    ///
    /// Pass-through ancestors only appear if they are selected themselves.
    pub fn render(modules: &[ModuleNode], root_display_path: &str) -> Self {
        let paths: Vec<&str> = selected_modules(modules)
            .into_iter()
            .map(|module| module.path.as_str())
            .collect();
        Self::from_directories(&paths, root_display_path)
    }

    /// Descriptor whose module roots are exactly `directories`
    pub fn from_directories<S: AsRef<str>>(directories: &[S], root_display_path: &str) -> Self {
        let joined = directories
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");

        let mut exclude = serde_json::Map::new();
        exclude.insert(format!("**/{{{joined}}}"), Value::Bool(true));

        let mut settings = BTreeMap::new();
        settings.insert(FILES_EXCLUDE_KEY.to_string(), Value::Object(exclude));
        settings.insert(
            BUILD_CONFIGURATION_KEY.to_string(),
            Value::String(BUILD_CONFIGURATION_MODE.to_string()),
        );

        let mut folders: Vec<WorkspaceFolder> = directories
            .iter()
            .map(|directory| WorkspaceFolder::new(directory.as_ref()))
            .collect();
        folders.push(WorkspaceFolder::new(root_display_path));
        folders.sort_by(|a, b| a.path.cmp(&b.path));
        folders.dedup_by(|a, b| a.path == b.path);

        Self { folders, settings }
    }

    #[allow(dead_code)]
    pub fn folder_paths(&self) -> Vec<&str> {
        self.folders.iter().map(|f| f.path.as_str()).collect()
    }

    /// Pretty JSON with two-space indentation
    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the descriptor into `directory`, replacing any previous one
    pub fn persist<F: FileSystemTrait>(
        &self,
        filesystem: &F,
        directory: &Path,
    ) -> Result<PathBuf, ProjectError> {
        let path = directory.join(WORKSPACE_DESCRIPTOR_NAME);
        filesystem.write(&path, &self.to_json()?)?;
        info!(
            "Wrote workspace descriptor {} ({} folders)",
            path.display(),
            self.folders.len()
        );
        Ok(path)
    }
}
