//! Per-run snapshot of the reachability analysis.
//!
//! The analyzer runs before the optimizer and reports, for every encoded
//! class name, whether the class is needed at all, how it sits in the
//! hierarchy, and which of its methods are reachable. The optimizer treats
//! a snapshot as read-only for the duration of one `update`.

use rustc_hash::FxHashMap;
use stoat_identity::Name;

/// Hints the analyzer attaches to each method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizerHints {
    /// Consider the body for inlining regardless of its size.
    pub inline: bool,
    /// Never inline the body, regardless of its size.
    pub no_inline: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub class_infos: FxHashMap<Name, ClassInfo>,
}

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: ClassInfo) {
        self.class_infos.insert(info.encoded_name, info);
    }
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub encoded_name: Name,
    pub superclass: Option<Name>,
    /// Ancestor names, the class itself included.
    pub ancestors: Vec<Name>,
    pub is_needed: bool,
    pub has_instantiation: bool,
    pub is_any_subclass_instantiated: bool,
    pub is_instantiated: bool,
    pub is_impl_class: bool,
    pub method_infos: FxHashMap<Name, MethodInfo>,
}

impl ClassInfo {
    /// A needed, instantiated class with no methods yet.
    pub fn new(encoded_name: Name) -> Self {
        Self {
            encoded_name,
            superclass: None,
            ancestors: vec![encoded_name],
            is_needed: true,
            has_instantiation: true,
            is_any_subclass_instantiated: true,
            is_instantiated: true,
            is_impl_class: false,
            method_infos: FxHashMap::default(),
        }
    }

    /// A needed class that is never instantiated itself; it stays in the
    /// hierarchy for its instantiated subclasses.
    pub fn non_instantiated(encoded_name: Name) -> Self {
        Self {
            has_instantiation: false,
            is_instantiated: false,
            ..Self::new(encoded_name)
        }
    }

    /// A needed trait impl. Trait impls are never instantiated.
    pub fn impl_class(encoded_name: Name) -> Self {
        Self {
            is_impl_class: true,
            has_instantiation: false,
            is_any_subclass_instantiated: false,
            is_instantiated: false,
            ..Self::new(encoded_name)
        }
    }

    pub fn ancestor_count(&self) -> usize {
        self.ancestors.len()
    }

    pub fn add_method(&mut self, info: MethodInfo) {
        self.method_infos.insert(info.encoded_name, info);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub encoded_name: Name,
    pub is_reachable: bool,
    pub is_abstract: bool,
    pub hints: OptimizerHints,
}

impl MethodInfo {
    /// A reachable, concrete method with default hints.
    pub fn new(encoded_name: Name) -> Self {
        Self {
            encoded_name,
            is_reachable: true,
            is_abstract: false,
            hints: OptimizerHints::default(),
        }
    }
}
