mod io;
mod logging;
mod project;

#[cfg(test)]
mod test_utils;

use clap::{Parser, Subcommand};
use io::{FileSystemTrait, RealFileSystem};
use logging::{LogConfig, init_logging};
use notify::{EventKind, RecursiveMode, Watcher};
use project::membership::read_membership_file;
use project::module::selected_modules;
use project::{BazelProject, ModuleNode, PassScheduler, ProjectError, ScanOptions, TriggerOutcome};

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{debug, error, info, warn};

/// CLI arguments for the Bazel workspace importer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source root holding the WORKSPACE file (overrides BAZEL_IMPORT_ROOT env var, defaults to current directory)
    #[arg(long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log file path (overrides BAZEL_IMPORT_LOG_FILE env var)
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Build marker file name; repeat for several (default: BUILD, BUILD.bazel)
    #[arg(long = "marker", value_name = "NAME", global = true)]
    markers: Vec<String>,

    /// Directory name prefix that is never treated as a module (default: src)
    #[arg(long, value_name = "PREFIX", global = true)]
    reserved_prefix: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Print the module tree reconciled with the membership file
    Modules {
        /// Print JSON instead of an indented tree
        #[arg(long)]
        json: bool,
    },
    /// Parse a membership file and print its directories and targets as JSON
    Parse {
        /// Membership file (defaults to the project's .ijwb/.bazelproject)
        file: Option<PathBuf>,
    },
    /// Select modules and write the membership file and workspace descriptor
    Open {
        /// Module path to select; repeat for several (defaults to the current selection)
        #[arg(long = "select", value_name = "PATH")]
        select: Vec<String>,
    },
    /// Regenerate the workspace descriptor from the membership file
    Sync,
    /// Sync, then sync again on every change of the membership file
    Watch,
    /// Symlink modules and the WORKSPACE file into another folder
    Link {
        /// Folder receiving the links
        #[arg(long, value_name = "DIR")]
        target: PathBuf,

        /// Module path to link; repeat for several (defaults to the current selection)
        #[arg(long = "select", value_name = "PATH")]
        select: Vec<String>,
    },
}

/// Resolve the source root from CLI args and environment
fn resolve_project_root(root_arg: Option<PathBuf>) -> Result<PathBuf, std::io::Error> {
    // Priority: CLI arg > BAZEL_IMPORT_ROOT env var > current directory
    match root_arg.or_else(|| std::env::var_os("BAZEL_IMPORT_ROOT").map(PathBuf::from)) {
        Some(root) => Ok(root),
        None => std::env::current_dir(),
    }
}

/// Scan options with CLI overrides applied
fn scan_options(markers: Vec<String>, reserved_prefix: Option<String>) -> ScanOptions {
    let mut options = ScanOptions::default();
    if !markers.is_empty() {
        options.build_markers = markers;
    }
    if let Some(prefix) = reserved_prefix {
        options.reserved_prefix = prefix;
    }
    options
}

/// Indented tree with `[x]` for selected modules and `*` for pass-through directories
fn render_tree(modules: &[ModuleNode]) -> String {
    fn render_into(out: &mut String, modules: &[ModuleNode], depth: usize) {
        for module in modules {
            let mark = if module.selected { "[x]" } else { "[ ]" };
            let pass_through = if module.is_pass_through() { " *" } else { "" };
            out.push_str(&format!(
                "{}{} {}{}\n",
                "  ".repeat(depth),
                mark,
                module.path,
                pass_through
            ));
            render_into(out, &module.children, depth + 1);
        }
    }

    let mut out = String::new();
    render_into(&mut out, modules, 0);
    out
}

/// Module paths to act on: the explicit choice, or the current selection
fn chosen_paths(modules: &[ModuleNode], select: Vec<String>) -> Vec<String> {
    if !select.is_empty() {
        return select;
    }
    selected_modules(modules)
        .into_iter()
        .map(|module| module.path.clone())
        .collect()
}

fn run_sync<F: FileSystemTrait>(project: &BazelProject<F>) -> Result<(), ProjectError> {
    match project.sync_from_membership()? {
        Some(path) => info!("Workspace descriptor updated: {}", path.display()),
        None => info!(
            "No membership file at {}, nothing to sync",
            project.membership_file().display()
        ),
    }
    Ok(())
}

/// Whether a watcher event touches the membership file
fn is_membership_change(event: &notify::Event, membership_file: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|path| path == membership_file)
}

/// Count membership changes in `first` plus everything already queued behind it
///
/// Draining the channel folds a burst of events into a single sync.
fn drain_membership_changes(
    first: notify::Result<notify::Event>,
    rx: &mpsc::Receiver<notify::Result<notify::Event>>,
    membership_file: &Path,
) -> usize {
    std::iter::once(first)
        .chain(rx.try_iter())
        .filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(e) => {
                error!("Watch error: {}", e);
                None
            }
        })
        .filter(|event| is_membership_change(event, membership_file))
        .count()
}

/// Re-sync on every change of the membership file until the watcher stops
fn watch(project: BazelProject<RealFileSystem>) -> Result<(), ProjectError> {
    let membership_file = project.membership_file();
    let project_folder = project.project_folder();
    if !project.has_project_folder() {
        warn!(
            "No project folder at {}, nothing to watch",
            project_folder.display()
        );
        return Ok(());
    }

    let watch_error = |e: notify::Error| ProjectError::Watch {
        path: project_folder.display().to_string(),
        reason: e.to_string(),
    };

    let scheduler = PassScheduler::new(move || run_sync(&project));
    scheduler.trigger()?;

    let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(tx).map_err(watch_error)?;
    // Watch the folder: editors often replace the file instead of writing in place
    watcher
        .watch(&project_folder, RecursiveMode::NonRecursive)
        .map_err(watch_error)?;
    info!("Watching {}", membership_file.display());

    while let Ok(first) = rx.recv() {
        let changes = drain_membership_changes(first, &rx, &membership_file);
        if changes == 0 {
            continue;
        }

        debug!("Membership file changed ({} events)", changes);
        match scheduler.trigger() {
            Ok(TriggerOutcome::Ran { passes }) => debug!("Sync finished after {} passes", passes),
            Ok(TriggerOutcome::Queued) => debug!("Sync queued"),
            Err(e) => error!("Sync failed: {}", e),
        }
    }

    Ok(())
}

fn run(command: Command, project: BazelProject<RealFileSystem>) -> Result<(), ProjectError> {
    match command {
        Command::Modules { json } => {
            let modules = project.lookup_modules()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&modules)?);
            } else if modules.is_empty() {
                println!("No modules found in {}", project.source_folder().display());
            } else {
                print!("{}", render_tree(&modules));
            }
        }
        Command::Parse { file } => {
            let file = file.unwrap_or_else(|| project.membership_file());
            let membership = read_membership_file(&RealFileSystem, &file)?;
            println!("{}", serde_json::to_string_pretty(&membership)?);
        }
        Command::Open { select } => {
            let mut modules = project.lookup_modules()?;
            if modules.is_empty() {
                println!("No modules found in {}", project.source_folder().display());
                return Ok(());
            }
            let chosen = chosen_paths(&modules, select);
            project.apply_selection(&mut modules, &chosen);
            match project.open_project(&modules)? {
                Some(path) => println!("{}", path.display()),
                None => println!("No modules selected, nothing written"),
            }
        }
        Command::Sync => run_sync(&project)?,
        Command::Watch => watch(project)?,
        Command::Link { target, select } => {
            let modules = project.lookup_modules()?;
            let chosen = chosen_paths(&modules, select);
            for link in project.link_modules(&target, &chosen)? {
                println!("{}", link.display());
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging with configuration from env vars and CLI args
    let log_config = LogConfig::from_env().with_overrides(args.log_level, args.log_file);

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let project_root = resolve_project_root(args.root).unwrap_or_else(|e| {
        eprintln!("Failed to get current directory: {e}");
        std::process::exit(1);
    });
    let options = scan_options(args.markers, args.reserved_prefix);
    debug!("Scan options: {:?}", options);

    let project = BazelProject::new(RealFileSystem, project_root, options);
    info!("Source root: {}", project.source_folder().display());

    if let Err(e) = run(args.command, project) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use tempfile::TempDir;

    #[test]
    fn test_parse_open_with_selection() {
        let args = Args::try_parse_from([
            "bazel-import",
            "--root",
            "/ws",
            "open",
            "--select",
            "app",
            "--select",
            "libs/core",
        ])
        .unwrap();

        assert_eq!(args.root, Some(PathBuf::from("/ws")));
        assert_eq!(
            args.command,
            Command::Open {
                select: vec!["app".to_string(), "libs/core".to_string()]
            }
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "bazel-import",
            "modules",
            "--json",
            "--marker",
            "BUCK",
            "--reserved-prefix",
            "gen",
        ])
        .unwrap();

        assert_eq!(args.command, Command::Modules { json: true });
        let options = scan_options(args.markers, args.reserved_prefix);
        assert_eq!(options.build_markers, vec!["BUCK".to_string()]);
        assert_eq!(options.reserved_prefix, "gen");
    }

    #[test]
    fn test_scan_options_default_without_overrides() {
        let options = scan_options(Vec::new(), None);
        assert_eq!(options.build_markers, vec!["BUILD", "BUILD.bazel"]);
        assert_eq!(options.reserved_prefix, "src");
    }

    #[test]
    fn test_explicit_root_wins() {
        let root = resolve_project_root(Some(PathBuf::from("/explicit"))).unwrap();
        assert_eq!(root, Path::new("/explicit"));
    }

    #[test]
    fn test_render_tree_marks_selection_and_pass_through() {
        let modules = vec![ModuleNode::new("libs").with_children(vec![
            ModuleNode::new("libs/core").with_selected(true),
            ModuleNode::new("libs/util").with_build_file(true),
        ])];

        assert_eq!(
            render_tree(&modules),
            "[ ] libs *\n  [x] libs/core\n  [ ] libs/util\n"
        );
    }

    #[test]
    fn test_chosen_paths_fall_back_to_current_selection() {
        let modules = vec![
            ModuleNode::new("a").with_selected(true),
            ModuleNode::new("b").with_build_file(true),
        ];

        assert_eq!(chosen_paths(&modules, Vec::new()), vec!["a".to_string()]);
        assert_eq!(
            chosen_paths(&modules, vec!["b".to_string()]),
            vec!["b".to_string()]
        );
    }

    fn event(kind: EventKind, path: &Path) -> notify::Result<notify::Event> {
        Ok(notify::Event::new(kind).add_path(path.to_path_buf()))
    }

    #[test]
    fn test_burst_of_changes_drains_into_one_sync() {
        let membership_file = PathBuf::from("/ws/.ijwb/.bazelproject");
        let backup = PathBuf::from("/ws/.ijwb/.bazelproject.1700000000000");
        let (tx, rx) = mpsc::channel();

        // rename aside plus rewrite, as done when opening the project
        tx.send(event(EventKind::Create(CreateKind::File), &backup)).unwrap();
        tx.send(event(EventKind::Remove(RemoveKind::File), &membership_file))
            .unwrap();
        tx.send(event(EventKind::Create(CreateKind::File), &membership_file))
            .unwrap();
        tx.send(event(EventKind::Modify(ModifyKind::Any), &membership_file))
            .unwrap();

        let first = rx.recv().unwrap();
        assert_eq!(drain_membership_changes(first, &rx, &membership_file), 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unrelated_events_are_not_changes() {
        let membership_file = PathBuf::from("/ws/.ijwb/.bazelproject");
        let (tx, rx) = mpsc::channel();
        tx.send(event(
            EventKind::Access(AccessKind::Any),
            &membership_file,
        ))
        .unwrap();
        tx.send(Err(notify::Error::generic("lost event"))).unwrap();

        let first = event(
            EventKind::Modify(ModifyKind::Any),
            Path::new("/ws/.ijwb/other"),
        );
        assert_eq!(drain_membership_changes(first, &rx, &membership_file), 0);
    }

    #[test]
    fn test_watch_without_project_folder_returns() {
        let temp_dir = TempDir::new().unwrap();
        let project = BazelProject::new(
            RealFileSystem,
            temp_dir.path().to_path_buf(),
            ScanOptions::default(),
        );

        watch(project).unwrap();
        assert!(!temp_dir.path().join(".ijwb").exists());
    }
}
