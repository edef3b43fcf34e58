//! `.bazelproject` membership file handling
//!
//! The membership file lists the directories (and build targets) the user opted
//! into. Parsing is a two-pass tokenizer: the first pass locates section header
//! spans, the second slices the body segments between consecutive headers. The
//! parse fails when the two passes disagree on the number of sections.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::io::FileSystemTrait;
use crate::project::ProjectError;
use crate::project::module::{ModuleNode, selected_modules};

pub const DIRECTORIES_SECTION: &str = "directories";
pub const TARGETS_SECTION: &str = "targets";

/// Bare list token that marks an exclusion; carries no path on its own
const EXCLUDED_ENTRY_PREFIX: &str = "-";

/// Parsed view of a membership file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembershipFile {
    /// Included directories, relative to the source root, in document order
    pub directories: Vec<String>,
    /// Included build targets, in document order
    pub targets: Vec<String>,
}

impl ProjectMembershipFile {
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.targets.is_empty()
    }
}

/// A header paired with the raw text that follows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    pub name: String,
    pub body: String,
}

/// Header located by the first tokenizer pass
#[derive(Debug)]
struct HeaderSpan<'a> {
    name: &'a str,
    start: usize,
    end: usize,
    inline: bool,
}

/// Parser for the membership file format
#[derive(Clone)]
pub struct MembershipParser {
    comment_regex: Regex,
    header_regex: Regex,
}

impl MembershipParser {
    /// Create a new parser with compiled patterns
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // `# anything` up to (not including) the line break
            comment_regex: Regex::new(r"#[^\n]*")?,

            // line-leading token without colon/hyphen/slash/asterisk/whitespace, then `:` or ` `
            header_regex: Regex::new(r"(?m)^[^:\-/*\s]+[: ]")?,
        })
    }

    /// Parse membership file text into its directory and target lists
    pub fn parse(&self, text: &str) -> Result<ProjectMembershipFile, ProjectError> {
        let sections = self.parse_raw_sections(text)?;

        Ok(ProjectMembershipFile {
            directories: named_section_entries(DIRECTORIES_SECTION, &sections),
            targets: named_section_entries(TARGETS_SECTION, &sections),
        })
    }

    /// Split text into named sections, in document order
    pub fn parse_raw_sections(&self, text: &str) -> Result<Vec<RawSection>, ProjectError> {
        let content = self.strip_comments(text);

        let headers = self.locate_headers(&content);
        let bodies = slice_bodies(&content, &headers);

        if headers.len() != bodies.len() {
            return Err(ProjectError::Syntax {
                headers: headers.len(),
                bodies: bodies.len(),
                names: headers.iter().map(|h| h.name.to_string()).collect(),
            });
        }

        Ok(headers
            .iter()
            .zip(bodies)
            .map(|(header, body)| RawSection {
                name: header.name.to_string(),
                body: body.trim().to_string(),
            })
            .collect())
    }

    /// Replace every `#` comment with nothing, keeping line breaks in place
    fn strip_comments(&self, text: &str) -> String {
        self.comment_regex.replace_all(text, "").into_owned()
    }

    /// First pass: header spans
    fn locate_headers<'a>(&self, content: &'a str) -> Vec<HeaderSpan<'a>> {
        self.header_regex
            .find_iter(content)
            .map(|m| {
                let token = m.as_str();
                let rest_of_line = content[m.end()..].split('\n').next().unwrap_or("");
                HeaderSpan {
                    name: &token[..token.len() - 1],
                    start: m.start(),
                    end: m.end(),
                    inline: !rest_of_line.trim().is_empty(),
                }
            })
            .collect()
    }
}

impl Default for MembershipParser {
    fn default() -> Self {
        Self::new().expect("Failed to compile membership file patterns")
    }
}

/// Second pass: body segments following the preamble
///
/// A body normally runs to the next header. After an inline header
/// (`name: value`) only indented lines continue the body; the first
/// unindented line starts a segment that belongs to no header.
fn slice_bodies<'a>(content: &'a str, headers: &[HeaderSpan<'_>]) -> Vec<&'a str> {
    let mut bodies = Vec::with_capacity(headers.len());

    for (idx, header) in headers.iter().enumerate() {
        let limit = headers
            .get(idx + 1)
            .map_or(content.len(), |next| next.start);
        let segment = &content[header.end..limit];

        match orphan_offset(segment, header.inline) {
            Some(offset) => {
                bodies.push(&segment[..offset]);
                bodies.push(&segment[offset..]);
            }
            None => bodies.push(segment),
        }
    }

    bodies
}

/// Offset of the first unindented, non-blank line after an inline header's own line
fn orphan_offset(segment: &str, inline: bool) -> Option<usize> {
    if !inline {
        return None;
    }

    let mut offset = segment.find('\n')? + 1;
    for line in segment[offset..].split_inclusive('\n') {
        let starts_unindented = line.chars().next().is_some_and(|c| !c.is_whitespace());
        if starts_unindented {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// All whitespace-separated entries of every section called `name`
fn named_section_entries(name: &str, sections: &[RawSection]) -> Vec<String> {
    let mut seen = HashSet::new();
    sections
        .iter()
        .filter(|section| section.name == name)
        .flat_map(|section| section.body.split_whitespace())
        .filter(|entry| *entry != EXCLUDED_ENTRY_PREFIX)
        .filter(|entry| seen.insert(*entry))
        .map(str::to_string)
        .collect()
}

/// Read and parse a membership file; a missing file yields empty lists
pub fn read_membership_file<F: FileSystemTrait>(
    filesystem: &F,
    path: &Path,
) -> Result<ProjectMembershipFile, ProjectError> {
    if !filesystem.exists(path) {
        debug!("No membership file at {}", path.display());
        return Ok(ProjectMembershipFile::default());
    }

    let content = filesystem.read_to_string(path)?;
    let membership = MembershipParser::default().parse(&content)?;
    debug!(
        "Parsed {}: {} directories, {} targets",
        path.display(),
        membership.directories.len(),
        membership.targets.len()
    );
    Ok(membership)
}

/// Membership file text for the selected nodes, or `None` if nothing is selected
pub fn render_membership_file(modules: &[ModuleNode]) -> Option<String> {
    let selected = selected_modules(modules);
    if selected.is_empty() {
        return None;
    }

    let mut content = format!("{DIRECTORIES_SECTION}:\n");
    for module in selected {
        content.push_str("  ");
        content.push_str(&module.path);
        content.push('\n');
    }
    Some(content)
}

/// Outcome of rewriting the membership file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipWrite {
    /// A new file was written; the previous one, if any, was moved to `backup`
    Written { backup: Option<PathBuf> },
    /// Nothing was selected and the existing file was deleted
    Removed,
    /// Nothing was selected and there was no file to delete
    Unchanged,
}

/// Regenerate the membership file from the current selection
pub fn write_membership_file<F: FileSystemTrait>(
    filesystem: &F,
    path: &Path,
    modules: &[ModuleNode],
) -> Result<MembershipWrite, ProjectError> {
    let Some(content) = render_membership_file(modules) else {
        if filesystem.exists(path) {
            filesystem.remove_file(path)?;
            info!("Selection is empty, removed {}", path.display());
            return Ok(MembershipWrite::Removed);
        }
        return Ok(MembershipWrite::Unchanged);
    };

    if let Some(folder) = path.parent()
        && !filesystem.exists(folder)
    {
        filesystem.create_dir_all(folder)?;
    }

    let backup = if filesystem.exists(path) {
        let backup = backup_path(path);
        filesystem.rename(path, &backup)?;
        debug!("Moved previous membership file to {}", backup.display());
        Some(backup)
    } else {
        None
    };

    filesystem.write(path, &content)?;
    info!("Wrote membership file {}", path.display());
    Ok(MembershipWrite::Written { backup })
}

/// `<path>.<unix millis>`
fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", Utc::now().timestamp_millis()));
    PathBuf::from(name)
}
