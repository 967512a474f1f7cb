//! Resolution path tracking for cycle detection.
//!
//! A [`ResolutionPath`] records the keys currently under construction for
//! one call stack. It is a persistent list: [`ResolutionPath::extend`]
//! returns a new path sharing the parent's nodes and never touches the
//! parent, so sibling branches of a collection resolution each see only
//! their own ancestors.

use std::sync::Arc;

use tracing::warn;

use crate::error::{CyclicDependencyError, Error};
use crate::key::DependencyKey;

#[derive(Debug)]
struct Node {
    key: DependencyKey,
    parent: Option<Arc<Node>>,
    depth: usize,
}

/// Keys in construction, innermost last.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    head: Option<Arc<Node>>,
}

impl ResolutionPath {
    /// An empty path, used by top-level requests.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |node| node.depth)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.iter_rev().any(|k| k == key)
    }

    /// Returns a path with `key` appended, or a [`Error::CyclicDependency`]
    /// if `key` is already on it.
    pub fn extend(&self, key: &DependencyKey) -> Result<Self, Error> {
        if self.contains(key) {
            return Err(self.cycle(key));
        }
        Ok(Self {
            head: Some(Arc::new(Node {
                key: key.clone(),
                parent: self.head.clone(),
                depth: self.len() + 1,
            })),
        })
    }

    /// Builds the cycle error closing this path with `repeated`.
    pub fn cycle(&self, repeated: &DependencyKey) -> Error {
        let err = CyclicDependencyError {
            path: self.to_vec(),
            repeated: repeated.clone(),
        };
        warn!(cycle = %err.render_path(), "Cyclic dependency detected");
        Error::CyclicDependency(err)
    }

    /// Builds the cycle error for a binding entered twice on one thread:
    /// the innermost key closes the loop over its ancestors.
    ///
    /// `fallback` stands in for the innermost key on an empty path.
    pub fn reentered(&self, fallback: DependencyKey) -> Error {
        match &self.head {
            Some(node) => Self {
                head: node.parent.clone(),
            }
            .cycle(&node.key),
            None => self.cycle(&fallback),
        }
    }

    /// Keys outermost first.
    pub fn to_vec(&self) -> Vec<DependencyKey> {
        let mut keys: Vec<DependencyKey> = self.iter_rev().cloned().collect();
        keys.reverse();
        keys
    }

    fn iter_rev(&self) -> impl Iterator<Item = &DependencyKey> {
        std::iter::successors(self.head.as_deref(), |node| node.parent.as_deref()).map(|node| &node.key)
    }
}
