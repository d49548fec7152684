//! Event-store collaborator contract.
//!
//! An [`EventSource`] opens one file, reads the requested columns of one
//! tree, and releases the file before returning. Nothing it hands back
//! borrows from the underlying storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tnp_core::{Error, Result};

/// Column name → values.
pub type Columns = HashMap<String, Vec<f64>>;

/// Materialised columns of one tree.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    /// Number of events in the tree.
    pub n_entries: usize,
    /// Requested columns, each `n_entries` long.
    pub columns: Columns,
}

/// Read access to event trees stored in files.
pub trait EventSource {
    /// Read `branches` of tree `tree` from `path`.
    ///
    /// Must fail if the file, the tree or any requested branch is missing.
    fn read_branches(&self, path: &Path, tree: &str, branches: &[String]) -> Result<EventBatch>;
}

impl<S: EventSource + ?Sized> EventSource for &S {
    fn read_branches(&self, path: &Path, tree: &str, branches: &[String]) -> Result<EventBatch> {
        (**self).read_branches(path, tree, branches)
    }
}

/// In-memory event store keyed by `(path, tree)`.
///
/// Useful for tests and for callers that already hold their events in RAM.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    trees: HashMap<(PathBuf, String), EventBatch>,
}

impl MemorySource {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tree. All columns must have the same length.
    pub fn insert_tree(
        &mut self,
        path: impl Into<PathBuf>,
        tree: impl Into<String>,
        columns: impl IntoIterator<Item = (String, Vec<f64>)>,
    ) -> Result<()> {
        let path = path.into();
        let tree = tree.into();
        let columns: Columns = columns.into_iter().collect();
        let mut n_entries: Option<usize> = None;
        for (name, col) in &columns {
            match n_entries {
                None => n_entries = Some(col.len()),
                Some(n) if n != col.len() => {
                    return Err(Error::EventStore(format!(
                        "column '{name}' of '{tree}' in {} has {} entries, expected {n}",
                        path.display(),
                        col.len()
                    )));
                }
                Some(_) => {}
            }
        }
        let batch = EventBatch { n_entries: n_entries.unwrap_or(0), columns };
        self.trees.insert((path, tree), batch);
        Ok(())
    }
}

impl EventSource for MemorySource {
    fn read_branches(&self, path: &Path, tree: &str, branches: &[String]) -> Result<EventBatch> {
        let stored = self.trees.get(&(path.to_path_buf(), tree.to_string())).ok_or_else(|| {
            Error::EventStore(format!("tree '{tree}' not found in {}", path.display()))
        })?;
        let mut columns = Columns::with_capacity(branches.len());
        for b in branches {
            let col = stored.columns.get(b).ok_or_else(|| {
                Error::EventStore(format!(
                    "branch '{b}' not found in tree '{tree}' of {}",
                    path.display()
                ))
            })?;
            columns.insert(b.clone(), col.clone());
        }
        Ok(EventBatch { n_entries: stored.n_entries, columns })
    }
}
