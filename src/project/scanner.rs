use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, trace};

use crate::io::FileSystemTrait;
use crate::project::{ModuleNode, ProjectError};

/// Options for configuring module scanning behavior
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// File names that mark a directory as a build package
    pub build_markers: Vec<String>,

    /// Directories whose name starts with this prefix hold sources, never modules
    pub reserved_prefix: String,

    /// Skip hidden directories (starting with '.')
    pub skip_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            build_markers: vec!["BUILD".to_string(), "BUILD.bazel".to_string()],
            reserved_prefix: "src".to_string(),
            skip_hidden: true,
        }
    }
}

/// Inputs shared by every step of one scan
struct ScanContext<'a> {
    source_root: &'a Path,
    preselected: HashSet<&'a str>,
}

/// Builds the module tree of a source root
///
/// A directory is build-eligible if it directly contains one of the marker files
/// or its relative path is pre-selected. Only eligible directories and the
/// directories leading to them are kept.
pub struct ModuleScanner<F: FileSystemTrait> {
    filesystem: F,
    options: ScanOptions,
}

impl<F: FileSystemTrait> ModuleScanner<F> {
    /// Create a new module scanner over the given filesystem
    pub fn new(filesystem: F, options: ScanOptions) -> Self {
        Self {
            filesystem,
            options,
        }
    }

    /// Scan the immediate children of `source_root` as top-level module candidates
    ///
    /// # Arguments
    /// * `source_root` - Directory holding the WORKSPACE file
    /// * `preselected` - Relative directory paths from the membership file
    ///
    /// # Returns
    /// The retained top-level modules, in listing order. Fails only when a
    /// directory cannot be listed.
    pub fn build_modules(
        &self,
        source_root: &Path,
        preselected: &[String],
    ) -> Result<Vec<ModuleNode>, ProjectError> {
        let context = ScanContext {
            source_root,
            preselected: preselected.iter().map(String::as_str).collect(),
        };

        let mut modules = Vec::new();
        for candidate in self.read_folders(&context, None)? {
            if let Some(module) = self.scan(&context, candidate)? {
                modules.push(module);
            }
        }

        debug!(
            "Scanned {}: {} top-level modules",
            source_root.display(),
            modules.len()
        );
        Ok(modules)
    }

    /// Decide on one directory after all of its subdirectories have been decided
    fn scan(
        &self,
        context: &ScanContext<'_>,
        path: String,
    ) -> Result<Option<ModuleNode>, ProjectError> {
        let mut children = Vec::new();
        for candidate in self.read_folders(context, Some(&path))? {
            if let Some(child) = self.scan(context, candidate)? {
                children.push(child);
            }
        }

        let has_build_file = self.has_build_marker(context, &path);
        let selected = context.preselected.contains(path.as_str());

        if !has_build_file && !selected && children.is_empty() {
            trace!("Dropping {}: no build file below", path);
            return Ok(None);
        }

        if selected {
            debug!("Pre-selected module: {}", path);
        }

        Ok(Some(
            ModuleNode::new(path)
                .with_build_file(has_build_file)
                .with_selected(selected)
                .with_children(children),
        ))
    }

    /// Relative paths of the candidate subdirectories of `base` (the root if `None`)
    fn read_folders(
        &self,
        context: &ScanContext<'_>,
        base: Option<&str>,
    ) -> Result<Vec<String>, ProjectError> {
        let absolute = match base {
            Some(base) => context.source_root.join(base),
            None => context.source_root.to_path_buf(),
        };

        let candidates = self
            .filesystem
            .list_dir(&absolute)?
            .into_iter()
            .filter(|entry| entry.is_dir())
            .filter(|entry| !(self.options.skip_hidden && entry.name.starts_with('.')))
            .filter(|entry| !self.is_reserved(&entry.name))
            .map(|entry| match base {
                Some(base) => format!("{base}/{}", entry.name),
                None => entry.name,
            })
            .collect();

        Ok(candidates)
    }

    fn is_reserved(&self, name: &str) -> bool {
        let prefix = &self.options.reserved_prefix;
        !prefix.is_empty() && name.starts_with(prefix.as_str())
    }

    fn has_build_marker(&self, context: &ScanContext<'_>, path: &str) -> bool {
        let directory = context.source_root.join(path);
        self.options
            .build_markers
            .iter()
            .any(|marker| self.filesystem.exists(&directory.join(marker)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{RealFileSystem, TestFileSystem};
    use crate::project::module::walk;
    use tempfile::TempDir;

    // Auto-initialize logging for all tests in this module
    #[cfg(feature = "test-logging")]
    #[ctor::ctor]
    fn init_test_logging() {
        crate::test_utils::logging::init();
    }

    fn scanner(fs: &TestFileSystem) -> ModuleScanner<TestFileSystem> {
        ModuleScanner::new(fs.clone(), ScanOptions::default())
    }

    fn paths(modules: &[ModuleNode]) -> Vec<&str> {
        walk(modules).map(|m| m.path.as_str()).collect()
    }

    #[test]
    fn test_nested_build_file_keeps_whole_chain() {
        let fs = TestFileSystem::new();
        fs.add_file("/ws/WORKSPACE", "")
            .add_file("/ws/a/b/c/BUILD", "");

        let modules = scanner(&fs).build_modules(Path::new("/ws"), &[]).unwrap();

        assert_eq!(paths(&modules), vec!["a", "a/b", "a/b/c"]);
        let a = &modules[0];
        let b = &a.children[0];
        let c = &b.children[0];
        assert!(a.is_pass_through());
        assert!(b.is_pass_through());
        assert!(c.is_eligible());
        assert!(c.has_build_file);
        assert!(!c.selected);
        assert_eq!(c.name, "c");
    }

    #[test]
    fn test_branches_without_build_files_are_pruned() {
        let fs = TestFileSystem::new();
        fs.add_dir("/ws/a/b").add_dir("/ws/a/d").add_file("/ws/a/README", "");

        let modules = scanner(&fs).build_modules(Path::new("/ws"), &[]).unwrap();

        assert!(modules.is_empty());
    }

    #[test]
    fn test_preselection_without_build_file_is_retained_and_selected() {
        let fs = TestFileSystem::new();
        fs.add_dir("/ws/docs/guide").add_dir("/ws/other");

        let preselected = vec!["docs/guide".to_string()];
        let modules = scanner(&fs)
            .build_modules(Path::new("/ws"), &preselected)
            .unwrap();

        assert_eq!(paths(&modules), vec!["docs", "docs/guide"]);
        let guide = &modules[0].children[0];
        assert!(guide.selected);
        assert!(!guide.has_build_file);
        assert!(!modules[0].selected);
    }

    #[test]
    fn test_preselection_is_exact_path_match() {
        let fs = TestFileSystem::new();
        fs.add_dir("/ws/lib/core");

        let preselected = vec!["core".to_string(), "lib/core/".to_string()];
        let modules = scanner(&fs)
            .build_modules(Path::new("/ws"), &preselected)
            .unwrap();

        assert!(modules.is_empty());
    }

    #[test]
    fn test_eligible_parent_keeps_eligible_children() {
        let fs = TestFileSystem::new();
        fs.add_file("/ws/app/BUILD.bazel", "")
            .add_file("/ws/app/web/BUILD", "")
            .add_dir("/ws/app/empty");

        let preselected = vec!["app".to_string()];
        let modules = scanner(&fs)
            .build_modules(Path::new("/ws"), &preselected)
            .unwrap();

        assert_eq!(paths(&modules), vec!["app", "app/web"]);
        assert!(modules[0].selected);
        assert!(modules[0].has_build_file);
        assert!(!modules[0].children[0].selected);
    }

    #[test]
    fn test_hidden_and_reserved_directories_are_skipped() {
        let fs = TestFileSystem::new();
        fs.add_file("/ws/.ijwb/BUILD", "")
            .add_file("/ws/src/BUILD", "")
            .add_file("/ws/lib/src/main/BUILD", "")
            .add_file("/ws/lib/srcgen/BUILD", "")
            .add_file("/ws/lib/BUILD", "");

        let modules = scanner(&fs).build_modules(Path::new("/ws"), &[]).unwrap();

        assert_eq!(paths(&modules), vec!["lib"]);
        assert!(modules[0].children.is_empty());
    }

    #[test]
    fn test_custom_markers_and_prefix() {
        let fs = TestFileSystem::new();
        fs.add_file("/ws/src/pkg.mk", "").add_file("/ws/gen/BUILD", "");

        let options = ScanOptions {
            build_markers: vec!["pkg.mk".to_string()],
            reserved_prefix: "gen".to_string(),
            skip_hidden: true,
        };
        let modules = ModuleScanner::new(fs.clone(), options)
            .build_modules(Path::new("/ws"), &[])
            .unwrap();

        assert_eq!(paths(&modules), vec!["src"]);
    }

    #[test]
    fn test_plain_files_are_not_module_candidates() {
        let fs = TestFileSystem::new();
        fs.add_file("/ws/a/BUILD", "").add_file("/ws/a/notes.txt", "");

        let modules = scanner(&fs).build_modules(Path::new("/ws"), &[]).unwrap();

        assert_eq!(paths(&modules), vec!["a"]);
    }

    #[test]
    fn test_repeated_scans_are_identical() {
        let fs = TestFileSystem::new();
        fs.add_file("/ws/x/BUILD", "")
            .add_dir("/ws/y/z")
            .add_file("/ws/y/w/BUILD", "");
        let preselected = vec!["y/z".to_string()];
        let scanner = scanner(&fs);

        let first = scanner
            .build_modules(Path::new("/ws"), &preselected)
            .unwrap();
        let second = scanner
            .build_modules(Path::new("/ws"), &preselected)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(paths(&first), vec!["x", "y", "y/w", "y/z"]);
    }

    #[test]
    fn test_unreadable_root_is_an_io_error() {
        let fs = TestFileSystem::new();
        let result = scanner(&fs).build_modules(Path::new("/missing"), &[]);
        assert!(matches!(result, Err(ProjectError::Io(_))));
    }

    #[test]
    fn test_scan_real_directory_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("WORKSPACE"), "").unwrap();
        std::fs::create_dir_all(root.join("services/api/src/main")).unwrap();
        std::fs::write(root.join("services/api/BUILD"), "").unwrap();
        std::fs::write(root.join("services/api/src/main/BUILD"), "").unwrap();
        std::fs::create_dir_all(root.join("tools/empty")).unwrap();
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();

        let scanner = ModuleScanner::new(RealFileSystem, ScanOptions::default());
        let modules = scanner.build_modules(root, &[]).unwrap();

        assert_eq!(paths(&modules), vec!["services", "services/api"]);
    }
}
