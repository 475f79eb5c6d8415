use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};

/// Ordered, deduplicated set of top-level content directories to mirror.
///
/// Built from a comma-separated include list minus a comma-separated exclude
/// list. Entries are whitespace-trimmed; empty and `.` entries are dropped,
/// as are entries that would escape the data directory (absolute paths or
/// paths containing `..`). Included names keep their first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DirectorySelection {
    names: Vec<String>,
}

impl DirectorySelection {
    /// Resolve `include` minus `exclude`
    ///
    /// ```
    /// use mcmgr::domain::value_objects::directory_selection::DirectorySelection;
    ///
    /// let selection = DirectorySelection::resolve("world, plugins ,world,.", "plugins");
    /// assert_eq!(selection.names(), ["world"]);
    /// ```
    pub fn resolve(include: &str, exclude: &str) -> Self {
        let excluded: HashSet<String> = parse_dir_list(exclude).into_iter().collect();
        let names = parse_dir_list(include)
            .into_iter()
            .filter(|name| !excluded.contains(name))
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for DirectorySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(","))
    }
}

/// Split a comma-separated directory list, keeping the first occurrence of each name
pub fn parse_dir_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for part in raw.split(',') {
        let name = part.trim();
        if name.is_empty() || name == "." || !stays_inside(name) {
            continue;
        }
        if seen.insert(name.to_string()) {
            out.push(name.to_string());
        }
    }

    out
}

fn stays_inside(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}
