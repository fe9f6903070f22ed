//! The incremental optimizer driver.
//!
//! One `IncOptimizer` owns the entire program graph and all per-name
//! dependency ledgers, and survives across runs. `update` diffs a fresh
//! analysis against the stored graph in a fixed order (trait impls, class
//! deletions, class changes, class additions), then drains the work queue of
//! tagged methods through the body optimizer and the emitter.

use rustc_hash::{FxHashMap, FxHashSet};
use stoat_identity::Name;
use tracing::debug;

use crate::analysis::{Analysis, ClassInfo};
use crate::class::{ChangeSet, ClassData};
use crate::config::OptimizerConfig;
use crate::emit::{Emitter, MethodArtifact, TextEmitter};
use crate::error::OptimizerError;
use crate::ids::{ClassId, InterfaceId, MethodId, TraitImplId};
use crate::interface::InterfaceData;
use crate::method::{MethodData, MethodOwner};
use crate::provider::TreeProvider;
use crate::trait_impl::TraitImplData;

/// Results of one run, handed back to the orchestrating build tool.
#[derive(Debug, Default)]
pub struct UpdateStats {
    /// Every method re-optimized and re-emitted this run.
    pub artifacts: Vec<MethodArtifact>,
}

impl UpdateStats {
    /// `(owner, method)` name pairs of the processed methods.
    pub fn processed(&self) -> Vec<(Name, Name)> {
        self.artifacts.iter().map(|a| (a.owner, a.method)).collect()
    }
}

pub struct IncOptimizer {
    pub(crate) config: OptimizerConfig,
    pub(crate) emitter: Box<dyn Emitter>,

    pub(crate) interfaces: Vec<InterfaceData>,
    pub(crate) interfaces_by_name: FxHashMap<Name, InterfaceId>,
    pub(crate) methods: Vec<MethodData>,
    pub(crate) class_arena: Vec<ClassData>,
    pub(crate) classes_by_name: FxHashMap<Name, ClassId>,
    pub(crate) trait_impl_arena: Vec<TraitImplData>,
    pub(crate) trait_impls_by_name: FxHashMap<Name, TraitImplId>,
    pub(crate) object_class: Option<ClassId>,
    pub(crate) methods_to_process: FxHashSet<MethodId>,
    pub(crate) batch_mode: bool,
}

impl Default for IncOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl IncOptimizer {
    pub fn new() -> Self {
        Self::with_config(OptimizerConfig::default())
    }

    pub fn with_config(config: OptimizerConfig) -> Self {
        Self::with_emitter(config, Box::new(TextEmitter))
    }

    pub fn with_emitter(config: OptimizerConfig, emitter: Box<dyn Emitter>) -> Self {
        Self {
            config,
            emitter,
            interfaces: Vec::new(),
            interfaces_by_name: FxHashMap::default(),
            methods: Vec::new(),
            class_arena: Vec::new(),
            classes_by_name: FxHashMap::default(),
            trait_impl_arena: Vec::new(),
            trait_impls_by_name: FxHashMap::default(),
            object_class: None,
            methods_to_process: FxHashSet::default(),
            batch_mode: false,
        }
    }

    /// Discard all stored state, forcing the next `update` to run in batch
    /// mode. Required after `update` returns an error: the graph may be
    /// half-mutated.
    pub fn reset(&mut self) {
        self.interfaces.clear();
        self.interfaces_by_name.clear();
        self.methods.clear();
        self.class_arena.clear();
        self.classes_by_name.clear();
        self.trait_impl_arena.clear();
        self.trait_impls_by_name.clear();
        self.object_class = None;
        self.methods_to_process.clear();
    }

    /// Run one incremental update against a fresh analysis snapshot.
    pub fn update(
        &mut self,
        analysis: &Analysis,
        provider: &dyn TreeProvider,
    ) -> Result<UpdateStats, OptimizerError> {
        self.batch_mode = self.object_class.is_none();

        let mut needed_classes: FxHashMap<Name, &ClassInfo> = FxHashMap::default();
        let mut needed_trait_impls: FxHashMap<Name, &ClassInfo> = FxHashMap::default();
        for info in analysis.class_infos.values() {
            if !info.is_needed {
                continue;
            }
            if info.is_impl_class {
                needed_trait_impls.insert(info.encoded_name, info);
            } else if info.is_any_subclass_instantiated {
                // Every ancestor on the path to an instantiated leaf keeps
                // its node in the hierarchy, instantiated itself or not.
                needed_classes.insert(info.encoded_name, info);
            }
        }
        debug!(
            batch_mode = self.batch_mode,
            classes = needed_classes.len(),
            trait_impls = needed_trait_impls.len(),
            "updating program graph"
        );

        self.update_trait_impls(&needed_trait_impls, provider);

        if !self.batch_mode {
            self.walk_classes_for_deletions(&needed_classes);
            let root = self
                .object_class
                .expect("the hierarchy root survives the deletion walk");
            self.walk_for_changes(root, &mut needed_classes, provider, &ChangeSet::default());
        }

        let mut additions: Vec<&ClassInfo> = needed_classes.into_values().collect();
        additions.sort_by_key(|info| info.ancestor_count());
        if !additions.is_empty() {
            debug!(count = additions.len(), "adding classes");
        }
        for info in additions {
            self.add_new_class(info, provider)?;
        }

        Ok(self.process_all_tagged_methods())
    }

    fn process_all_tagged_methods(&mut self) -> UpdateStats {
        let mut stats = UpdateStats::default();
        debug!(
            tagged = self.methods_to_process.len(),
            "processing tagged methods"
        );
        while let Some(&method) = self.methods_to_process.iter().next() {
            self.methods_to_process.remove(&method);
            stats.artifacts.push(self.process_method(method));
        }
        stats
    }

    // ------------------------------------------------------------------
    // Registration hooks, called by the body optimizer during processing
    // ------------------------------------------------------------------

    /// Register `caller` as a dynamic caller of `(interface, method)` and
    /// resolve the call for every currently-instantiated implementor.
    pub fn dynamic_call(
        &mut self,
        caller: MethodId,
        interface_name: Name,
        method_name: Name,
    ) -> Vec<MethodId> {
        let interface = self.interface(interface_name);
        self.register_dynamic_caller(interface, method_name, caller);

        let implementors: Vec<ClassId> = self
            .interface_data(interface)
            .instantiated_subclasses
            .iter()
            .copied()
            .collect();
        let mut targets: Vec<MethodId> = implementors
            .into_iter()
            .filter_map(|class| self.lookup_method(class, method_name))
            .collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Register `caller` as a static caller on the class's own ledger and
    /// resolve up the parent chain.
    pub fn static_call(
        &mut self,
        caller: MethodId,
        class_name: Name,
        method_name: Name,
    ) -> Option<MethodId> {
        let interface = self.interface(class_name);
        self.register_static_caller(interface, method_name, caller);
        let class = self.classes_by_name.get(&class_name).copied()?;
        self.lookup_method(class, method_name)
    }

    /// Register `caller` as a static caller on the trait impl's ledger and
    /// resolve its direct entry.
    pub fn trait_impl_call(
        &mut self,
        caller: MethodId,
        impl_name: Name,
        method_name: Name,
    ) -> Option<MethodId> {
        let interface = self.interface(impl_name);
        self.register_static_caller(interface, method_name, caller);
        let impl_ = self.trait_impls_by_name.get(&impl_name).copied()?;
        self.trait_impl_data(impl_)
            .map
            .methods
            .get(&method_name)
            .copied()
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn has_class(&self, name: Name) -> bool {
        self.classes_by_name.contains_key(&name)
    }

    pub fn class_is_instantiated(&self, name: Name) -> Option<bool> {
        let class = self.classes_by_name.get(&name).copied()?;
        Some(self.class_data(class).is_instantiated)
    }

    /// Names of the instantiated classes implementing `interface`, sorted.
    pub fn instantiated_subclasses_of(&self, interface: Name) -> Vec<Name> {
        let Some(&id) = self.interfaces_by_name.get(&interface) else {
            return Vec::new();
        };
        let mut names: Vec<Name> = self
            .interface_data(id)
            .instantiated_subclasses
            .iter()
            .map(|&class| self.class_data(class).name)
            .collect();
        names.sort_unstable();
        names
    }

    /// All method names visible on a class, its ancestors included, sorted.
    pub fn visible_method_names(&self, class_name: Name) -> Vec<Name> {
        let Some(&class) = self.classes_by_name.get(&class_name) else {
            return Vec::new();
        };
        let mut names: Vec<Name> = self.all_methods(class).into_keys().collect();
        names.sort_unstable();
        names
    }

    /// Emitted output of a method defined directly on the named container.
    pub fn emitted_output(&self, container: Name, method: Name) -> Option<&str> {
        let id = if let Some(&class) = self.classes_by_name.get(&container) {
            self.class_data(class).map.methods.get(&method).copied()?
        } else {
            let impl_ = self.trait_impls_by_name.get(&container).copied()?;
            self.trait_impl_data(impl_).map.methods.get(&method).copied()?
        };
        self.method_data(id).output.as_deref()
    }

    // ------------------------------------------------------------------
    // Consistency audit
    // ------------------------------------------------------------------

    /// Assert every cross-run invariant of the graph. Used by the test
    /// suites after each update; cheap enough to run in debug embedders.
    pub fn check_consistency(&self) {
        // live containers hold live methods that agree with them
        for (&name, &class) in &self.classes_by_name {
            let data = self.class_data(class);
            assert!(!data.deleted, "live class is tombstoned");
            assert_eq!(data.name, name);
            for (&method_name, &method) in &data.map.methods {
                let m = self.method_data(method);
                assert!(!m.deleted, "live class holds a deleted method");
                assert_eq!(m.name, method_name);
                assert_eq!(m.owner, MethodOwner::Class(class));
            }
        }
        for (&name, &impl_) in &self.trait_impls_by_name {
            let data = self.trait_impl_data(impl_);
            assert!(!data.deleted, "live trait impl is tombstoned");
            assert_eq!(data.name, name);
            for (&method_name, &method) in &data.map.methods {
                let m = self.method_data(method);
                assert!(!m.deleted, "live trait impl holds a deleted method");
                assert_eq!(m.name, method_name);
                assert_eq!(m.owner, MethodOwner::TraitImpl(impl_));
            }
        }

        // instantiated-subclass sets agree with the classes, and caller sets
        // agree with the reverse registration index
        for (index, interface) in self.interfaces.iter().enumerate() {
            let id = InterfaceId::new(index as u32);
            for &class in &interface.instantiated_subclasses {
                let data = self.class_data(class);
                assert!(!data.deleted, "instantiated subclass is deleted");
                assert_eq!(self.classes_by_name.get(&data.name), Some(&class));
                assert!(data.is_instantiated, "instantiated subclass is not instantiated");
                assert!(
                    data.interfaces.contains(&id),
                    "instantiated subclass does not implement the interface"
                );
            }
            for callers in interface
                .dynamic_callers
                .values()
                .chain(interface.static_callers.values())
            {
                for &caller in callers {
                    let m = self.method_data(caller);
                    assert!(!m.deleted, "caller set holds a deleted method");
                    assert!(
                        m.registered_to.contains(&id),
                        "caller set entry missing from the reverse index"
                    );
                }
            }
        }
        for (index, method) in self.methods.iter().enumerate() {
            if method.deleted {
                continue;
            }
            let id = MethodId::new(index as u32);
            for &interface in &method.registered_to {
                let data = self.interface_data(interface);
                let present = data.dynamic_callers.values().any(|s| s.contains(&id))
                    || data.static_callers.values().any(|s| s.contains(&id));
                assert!(present, "reverse index entry missing from all caller sets");
            }
        }

        assert!(
            self.methods_to_process.is_empty(),
            "work queue not drained between runs"
        );

        // the subclass tree spans the live classes exactly once
        match self.object_class {
            Some(root) => {
                let mut seen = FxHashSet::default();
                let mut stack = vec![root];
                while let Some(class) = stack.pop() {
                    assert!(seen.insert(class), "class visited twice in the tree walk");
                    let data = self.class_data(class);
                    assert!(!data.deleted, "tree walk reached a deleted class");
                    for &child in &data.subclasses {
                        assert_eq!(self.class_data(child).superclass, Some(class));
                        stack.push(child);
                    }
                }
                assert_eq!(seen.len(), self.classes_by_name.len());
                for &class in self.classes_by_name.values() {
                    assert!(seen.contains(&class), "named class unreachable from the root");
                }
            }
            None => assert!(self.classes_by_name.is_empty()),
        }
    }
}
