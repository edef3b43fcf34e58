use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A directory retained by the hierarchy scan
///
/// Nodes are created only for directories that are build-eligible themselves or
/// lead to an eligible descendant. Each node exclusively owns its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    /// Path relative to the source root, `/`-separated
    pub path: String,

    /// Directory base name
    pub name: String,

    /// Whether the directory is a member of the persisted inclusion list
    pub selected: bool,

    /// Whether the directory directly contains a build-definition marker file
    pub has_build_file: bool,

    /// Retained subdirectories, in listing order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ModuleNode>,
}

impl ModuleNode {
    /// Create a leaf node for `path`, taking the name from its last segment
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            path,
            name,
            selected: false,
            has_build_file: false,
            children: Vec::new(),
        }
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_build_file(mut self, has_build_file: bool) -> Self {
        self.has_build_file = has_build_file;
        self
    }

    pub fn with_children(mut self, children: Vec<ModuleNode>) -> Self {
        self.children = children;
        self
    }

    /// A directory qualifies as a module on its own
    pub fn is_eligible(&self) -> bool {
        self.has_build_file || self.selected
    }

    /// Retained only because some descendant is eligible
    pub fn is_pass_through(&self) -> bool {
        !self.is_eligible()
    }

    /// Depth-first, pre-order traversal of this node and all descendants
    pub fn iter(&self) -> ModuleIter<'_> {
        ModuleIter { stack: vec![self] }
    }
}

/// Pre-order iterator over a module subtree
pub struct ModuleIter<'a> {
    stack: Vec<&'a ModuleNode>,
}

impl<'a> Iterator for ModuleIter<'a> {
    type Item = &'a ModuleNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Iterate every node of a forest in pre-order
pub fn walk(modules: &[ModuleNode]) -> impl Iterator<Item = &ModuleNode> {
    modules.iter().flat_map(ModuleNode::iter)
}

/// Nodes whose own `selected` flag is set; ancestors do not count
pub fn selected_modules(modules: &[ModuleNode]) -> Vec<&ModuleNode> {
    walk(modules).filter(|module| module.selected).collect()
}

/// Set `selected` on every node to whether its path is in `chosen`
///
/// Returns the number of nodes that ended up selected.
pub fn apply_selection(modules: &mut [ModuleNode], chosen: &HashSet<&str>) -> usize {
    modules
        .iter_mut()
        .map(|module| {
            module.selected = chosen.contains(module.path.as_str());
            usize::from(module.selected) + apply_selection(&mut module.children, chosen)
        })
        .sum()
}
