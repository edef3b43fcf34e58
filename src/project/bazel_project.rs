use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::io::FileSystemTrait;
use crate::project::descriptor::WorkspaceDescriptor;
use crate::project::membership::{
    ProjectMembershipFile, read_membership_file, write_membership_file,
};
use crate::project::module::{ModuleNode, apply_selection, selected_modules};
use crate::project::{ModuleScanner, ProjectError, ScanOptions};

/// Folder next to the WORKSPACE file that holds the membership file
pub const PROJECT_FOLDER_NAME: &str = ".ijwb";
pub const MEMBERSHIP_FILE_NAME: &str = ".bazelproject";

/// Display path of the source root inside its own descriptor
pub const ROOT_DISPLAY_PATH: &str = ".";

const WORKSPACE_FILES: [&str; 2] = ["WORKSPACE", "WORKSPACE.bazel"];

/// A Bazel source tree together with its membership file and workspace descriptor
///
/// All file access goes through the injected filesystem, so one instance can be
/// reconciled repeatedly against a changing tree.
pub struct BazelProject<F: FileSystemTrait> {
    filesystem: F,
    source_folder: PathBuf,
    options: ScanOptions,
}

impl<F: FileSystemTrait> BazelProject<F> {
    /// Create a project rooted at `source_folder` (the directory holding WORKSPACE)
    pub fn new(filesystem: F, source_folder: PathBuf, options: ScanOptions) -> Self {
        Self {
            filesystem,
            source_folder,
            options,
        }
    }

    pub fn source_folder(&self) -> &Path {
        &self.source_folder
    }

    pub fn project_folder(&self) -> PathBuf {
        self.source_folder.join(PROJECT_FOLDER_NAME)
    }

    pub fn has_project_folder(&self) -> bool {
        self.filesystem.is_dir(&self.project_folder())
    }

    pub fn membership_file(&self) -> PathBuf {
        self.project_folder().join(MEMBERSHIP_FILE_NAME)
    }

    /// The WORKSPACE (or WORKSPACE.bazel) file, if present
    pub fn workspace_file(&self) -> Option<PathBuf> {
        WORKSPACE_FILES
            .iter()
            .map(|name| self.source_folder.join(name))
            .find(|path| self.filesystem.exists(path))
    }

    /// Parse the membership file; absent means no pre-selection
    pub fn read_membership(&self) -> Result<ProjectMembershipFile, ProjectError> {
        read_membership_file(&self.filesystem, &self.membership_file())
    }

    /// Reconcile the source tree with the membership file
    ///
    /// Returns no modules when the source folder does not exist.
    pub fn lookup_modules(&self) -> Result<Vec<ModuleNode>, ProjectError> {
        if !self.filesystem.exists(&self.source_folder) {
            warn!(
                "Source folder {} does not exist",
                self.source_folder.display()
            );
            return Ok(Vec::new());
        }

        let membership = self.read_membership()?;
        let scanner = ModuleScanner::new(self.filesystem.clone(), self.options.clone());
        let modules = scanner.build_modules(&self.source_folder, &membership.directories)?;

        info!(
            "Found {} top-level modules in {} ({} pre-selected)",
            modules.len(),
            self.source_folder.display(),
            selected_modules(&modules).len()
        );
        Ok(modules)
    }

    /// Make `chosen` the selection of the tree, replacing the pre-selection
    ///
    /// Returns how many of the chosen paths were found in the tree.
    pub fn apply_selection(&self, modules: &mut [ModuleNode], chosen: &[String]) -> usize {
        let chosen: HashSet<&str> = chosen.iter().map(String::as_str).collect();
        let matched = apply_selection(modules, &chosen);

        if matched < chosen.len() {
            let known: HashSet<&str> = selected_modules(modules)
                .into_iter()
                .map(|module| module.path.as_str())
                .collect();
            for missing in chosen.difference(&known) {
                warn!("Ignoring unknown module: {}", missing);
            }
        }
        matched
    }

    /// Persist the selection: membership file plus workspace descriptor
    ///
    /// An empty selection is a cancellation and writes nothing, so the
    /// membership file is never deleted from here even though
    /// `write_membership_file` would remove it for an empty selection.
    pub fn open_project(&self, modules: &[ModuleNode]) -> Result<Option<PathBuf>, ProjectError> {
        if selected_modules(modules).is_empty() {
            info!("No modules selected, leaving project files untouched");
            return Ok(None);
        }

        let outcome = write_membership_file(&self.filesystem, &self.membership_file(), modules)?;
        debug!("Membership file update: {:?}", outcome);

        let descriptor = WorkspaceDescriptor::render(modules, ROOT_DISPLAY_PATH);
        let path = descriptor.persist(&self.filesystem, &self.source_folder)?;
        Ok(Some(path))
    }

    /// Regenerate the descriptor from the membership file alone
    ///
    /// Runs on every change of the membership file. Does nothing if it is absent.
    pub fn sync_from_membership(&self) -> Result<Option<PathBuf>, ProjectError> {
        let membership_file = self.membership_file();
        if !self.filesystem.exists(&membership_file) {
            debug!("No membership file at {}", membership_file.display());
            return Ok(None);
        }

        let membership = self.read_membership()?;
        let descriptor =
            WorkspaceDescriptor::from_directories(&membership.directories, ROOT_DISPLAY_PATH);
        let path = descriptor.persist(&self.filesystem, &self.source_folder)?;
        Ok(Some(path))
    }

    /// Alternate layout: expose modules as symlinks in `target_folder`
    ///
    /// Each module directory is linked under its base name, and the workspace
    /// file is linked as `WORKSPACE`.
    pub fn link_modules(
        &self,
        target_folder: &Path,
        module_paths: &[String],
    ) -> Result<Vec<PathBuf>, ProjectError> {
        if module_paths.is_empty() {
            return Ok(Vec::new());
        }

        let workspace_file = self
            .workspace_file()
            .ok_or_else(|| ProjectError::PathNotFound {
                path: self.source_folder.join("WORKSPACE").display().to_string(),
            })?;

        if !self.filesystem.exists(target_folder) {
            self.filesystem.create_dir_all(target_folder)?;
        }

        let mut links = Vec::with_capacity(module_paths.len() + 1);
        for module_path in module_paths {
            let source = self.source_folder.join(module_path);
            if !self.filesystem.is_dir(&source) {
                return Err(ProjectError::PathNotFound {
                    path: source.display().to_string(),
                });
            }

            let name = module_path.rsplit('/').next().unwrap_or(module_path);
            let link = target_folder.join(name);
            self.filesystem.symlink(&source, &link)?;
            debug!("Linked {} -> {}", link.display(), source.display());
            links.push(link);
        }

        let workspace_link = target_folder.join("WORKSPACE");
        self.filesystem.symlink(&workspace_file, &workspace_link)?;
        links.push(workspace_link);

        info!(
            "Linked {} modules into {}",
            module_paths.len(),
            target_folder.display()
        );
        Ok(links)
    }
}
