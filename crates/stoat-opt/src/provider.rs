//! Lazy, versioned supply of class trees.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use stoat_identity::Name;
use stoat_ir::ClassDef;

/// Opaque version token. Equality is the only supported operation.
pub type Version = String;

/// Source of class trees, consulted once per container per run.
///
/// Returns `None` when the caller's `last_version` still matches the current
/// tree, letting an unchanged tree skip serialization entirely. A `None` for
/// a container without a stored version means the supplier has no bodies for
/// it, and the container is treated as empty.
pub trait TreeProvider {
    fn class_tree_if_changed(
        &self,
        name: Name,
        last_version: Option<&Version>,
    ) -> Option<(Rc<ClassDef>, Option<Version>)>;
}

/// In-memory tree store with automatic version bumping.
#[derive(Debug, Default)]
pub struct MemoryTrees {
    trees: FxHashMap<Name, (Rc<ClassDef>, Version)>,
    revision: u64,
}

impl MemoryTrees {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a tree under its own name, bumping the version.
    pub fn upsert(&mut self, def: ClassDef) {
        self.revision += 1;
        let version = format!("v{}", self.revision);
        self.trees.insert(def.name, (Rc::new(def), version));
    }

    pub fn remove(&mut self, name: Name) {
        self.trees.remove(&name);
    }
}

impl TreeProvider for MemoryTrees {
    fn class_tree_if_changed(
        &self,
        name: Name,
        last_version: Option<&Version>,
    ) -> Option<(Rc<ClassDef>, Option<Version>)> {
        let (tree, version) = self.trees.get(&name)?;
        if last_version == Some(version) {
            return None;
        }
        Some((Rc::clone(tree), Some(version.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoat_ir::{Expr, MethodDef};

    #[test]
    fn serves_nothing_for_matching_versions() {
        let mut trees = MemoryTrees::new();
        trees.upsert(ClassDef::new(Name(1), vec![]));

        let (_, version) = trees.class_tree_if_changed(Name(1), None).unwrap();
        assert!(trees.class_tree_if_changed(Name(1), version.as_ref()).is_none());
    }

    #[test]
    fn upsert_bumps_the_version() {
        let mut trees = MemoryTrees::new();
        trees.upsert(ClassDef::new(Name(1), vec![]));
        let (_, v1) = trees.class_tree_if_changed(Name(1), None).unwrap();

        trees.upsert(ClassDef::new(
            Name(1),
            vec![MethodDef::new(Name(2), vec![], Expr::int(1))],
        ));
        let (tree, v2) = trees.class_tree_if_changed(Name(1), v1.as_ref()).unwrap();
        assert_ne!(v1, v2);
        assert_eq!(tree.methods.len(), 1);
    }

    #[test]
    fn unknown_names_have_no_tree() {
        let trees = MemoryTrees::new();
        assert!(trees.class_tree_if_changed(Name(9), None).is_none());
    }
}
