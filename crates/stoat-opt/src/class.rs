//! Class hierarchy maintenance.
//!
//! Classes form a tree rooted at the first class ever constructed. The two
//! walks below translate an analysis delta into caller tagging: the deletion
//! walk tears down classes that disappeared or moved (a move is a delete
//! followed by a re-add with the correct parent chain), and the change walk
//! reconciles every retained class top-down, propagating method changes to
//! subclasses so that inherited behavior invalidates correctly.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{SmallVec, smallvec};
use stoat_identity::Name;
use tracing::trace;

use crate::analysis::ClassInfo;
use crate::container::MethodMap;
use crate::error::OptimizerError;
use crate::ids::{ClassId, InterfaceId, MethodId};
use crate::method::MethodOwner;
use crate::optimizer::IncOptimizer;
use crate::provider::TreeProvider;

pub(crate) struct ClassData {
    pub(crate) name: Name,
    pub(crate) map: MethodMap,
    pub(crate) superclass: Option<ClassId>,
    pub(crate) subclasses: Vec<ClassId>,
    /// Ledgers of all ancestors reported by the last analysis, self included.
    pub(crate) interfaces: FxHashSet<InterfaceId>,
    /// The ledger carrying this class's own name.
    pub(crate) my_interface: InterfaceId,
    pub(crate) is_instantiated: bool,
    /// Self first, root last. Fixed for the lifetime of the class: a parent
    /// change deletes and re-creates it.
    pub(crate) parent_chain: SmallVec<[ClassId; 8]>,
    pub(crate) deleted: bool,
}

/// Method-name deltas a class passes down to its subclasses.
///
/// The two sets invalidate different dependencies: `dispatch` names may now
/// resolve to a different implementation (methods appeared or disappeared),
/// while `inline` names additionally cover body changes that inlining
/// consumers observed. Names overridden by a subclass do not propagate past
/// it.
#[derive(Debug, Default, Clone)]
pub(crate) struct ChangeSet {
    pub(crate) dispatch: FxHashSet<Name>,
    pub(crate) inline: FxHashSet<Name>,
}

impl IncOptimizer {
    /// Construct a class. The first class constructed becomes the immortal
    /// root; every later one attaches to a live superclass.
    pub(crate) fn new_class(&mut self, name: Name, superclass: Option<ClassId>) -> ClassId {
        let id = ClassId::new(self.class_arena.len() as u32);
        let my_interface = self.interface(name);
        let mut parent_chain: SmallVec<[ClassId; 8]> = smallvec![id];
        match superclass {
            Some(parent) => {
                parent_chain.extend(self.class_data(parent).parent_chain.iter().copied());
                self.class_data_mut(parent).subclasses.push(id);
            }
            None => {
                assert!(
                    self.object_class.is_none(),
                    "hierarchy root constructed twice"
                );
                self.object_class = Some(id);
            }
        }
        self.class_arena.push(ClassData {
            name,
            map: MethodMap::default(),
            superclass,
            subclasses: Vec::new(),
            interfaces: FxHashSet::default(),
            my_interface,
            is_instantiated: false,
            parent_chain,
            deleted: false,
        });
        let previous = self.classes_by_name.insert(name, id);
        assert!(previous.is_none(), "two live classes share a name");
        id
    }

    pub(crate) fn class_data(&self, id: ClassId) -> &ClassData {
        &self.class_arena[id.index() as usize]
    }

    pub(crate) fn class_data_mut(&mut self, id: ClassId) -> &mut ClassData {
        &mut self.class_arena[id.index() as usize]
    }

    /// First concrete definition of `name` on the parent chain, starting at
    /// `class` itself.
    pub(crate) fn lookup_method(&self, class: ClassId, name: Name) -> Option<MethodId> {
        self.class_data(class)
            .parent_chain
            .iter()
            .find_map(|&c| self.class_data(c).map.methods.get(&name).copied())
    }

    /// All methods visible on `class`, subclass definitions overriding
    /// ancestors. Recomputed per call.
    pub(crate) fn all_methods(&self, class: ClassId) -> FxHashMap<Name, MethodId> {
        let mut result = FxHashMap::default();
        for &c in self.class_data(class).parent_chain.iter().rev() {
            for (&name, &method) in &self.class_data(c).map.methods {
                result.insert(name, method);
            }
        }
        result
    }

    fn all_method_names(&self, class: ClassId) -> Vec<Name> {
        self.all_methods(class).into_keys().collect()
    }

    // ------------------------------------------------------------------
    // Deletion walk
    // ------------------------------------------------------------------

    /// Top-down removal of classes that are no longer needed or whose
    /// superclass changed. Lookups into `needed` are non-consuming; the
    /// change walk still needs the infos of every retained class.
    pub(crate) fn walk_classes_for_deletions(&mut self, needed: &FxHashMap<Name, &ClassInfo>) {
        let root = self
            .object_class
            .expect("deletion walk outside batch mode requires a root");
        let retained = self.walk_deletions(root, needed);
        assert!(retained, "the hierarchy root was deleted");
    }

    fn walk_deletions(&mut self, class: ClassId, needed: &FxHashMap<Name, &ClassInfo>) -> bool {
        let name = self.class_data(class).name;
        match needed.get(&name) {
            Some(info) if self.same_superclass(class, info) => {
                let children = self.class_data(class).subclasses.clone();
                let mut retained = Vec::with_capacity(children.len());
                for child in children {
                    if self.walk_deletions(child, needed) {
                        retained.push(child);
                    }
                }
                self.class_data_mut(class).subclasses = retained;

                if self.class_data(class).is_instantiated && !info.is_instantiated {
                    self.not_instantiated_anymore(class);
                }
                true
            }
            // absent, or moved under a different parent
            _ => {
                self.delete_subtree(class);
                false
            }
        }
    }

    fn same_superclass(&self, class: ClassId, info: &ClassInfo) -> bool {
        match (self.class_data(class).superclass, info.superclass) {
            (None, None) => true,
            (Some(parent), Some(name)) => self.class_data(parent).name == name,
            _ => false,
        }
    }

    /// Depth-first delete of a class and every descendant.
    pub(crate) fn delete_subtree(&mut self, class: ClassId) {
        self.delete_class(class);
        for child in self.class_data(class).subclasses.clone() {
            self.delete_subtree(child);
        }
    }

    fn delete_class(&mut self, class: ClassId) {
        trace!(class = %self.class_data(class).name, "deleting class");
        if self.class_data(class).is_instantiated {
            self.not_instantiated_anymore(class);
        }
        // The method map is left in place on the tombstone: descendants about
        // to be deleted still read inherited names through it.
        let methods: Vec<MethodId> = self.class_data(class).map.methods.values().copied().collect();
        for method in methods {
            self.delete_method(method);
        }
        let name = self.class_data(class).name;
        self.classes_by_name.remove(&name);
        self.class_data_mut(class).deleted = true;
    }

    /// The class can no longer be the runtime type of any value: dynamic
    /// dispatch that previously resolved here may now resolve elsewhere.
    pub(crate) fn not_instantiated_anymore(&mut self, class: ClassId) {
        assert!(self.class_data(class).is_instantiated);
        self.class_data_mut(class).is_instantiated = false;

        let interfaces: Vec<InterfaceId> =
            self.class_data(class).interfaces.iter().copied().collect();
        let method_names = self.all_method_names(class);
        for interface in interfaces {
            self.interface_data_mut(interface)
                .instantiated_subclasses
                .remove(&class);
            for &name in &method_names {
                self.tag_dynamic_callers_of(interface, name);
            }
        }
    }

    // ------------------------------------------------------------------
    // Change walk
    // ------------------------------------------------------------------

    /// Top-down reconciliation of every retained class. Consumes the class's
    /// entry in `needed`; whatever is left afterwards is a genuinely new
    /// class for the additions phase.
    pub(crate) fn walk_for_changes<'a>(
        &mut self,
        class: ClassId,
        needed: &mut FxHashMap<Name, &'a ClassInfo>,
        provider: &dyn TreeProvider,
        parent_changes: &ChangeSet,
    ) {
        let name = self.class_data(class).name;
        let info = needed
            .remove(&name)
            .expect("retained class missing from the needed set");

        let delta = self.update_methods_with(MethodOwner::Class(class), info, provider);

        let old_interfaces = self.class_data(class).interfaces.clone();
        let new_interfaces: FxHashSet<InterfaceId> = info
            .ancestors
            .iter()
            .map(|&ancestor| self.interface(ancestor))
            .collect();

        // Inherited names stop propagating at an override; local deltas are
        // added on top.
        let own_keys: FxHashSet<Name> =
            self.class_data(class).map.methods.keys().copied().collect();
        let mut changes = ChangeSet::default();
        changes.dispatch = parent_changes
            .dispatch
            .iter()
            .copied()
            .filter(|n| !own_keys.contains(n))
            .collect();
        changes.inline = parent_changes
            .inline
            .iter()
            .copied()
            .filter(|n| !own_keys.contains(n))
            .collect();
        changes.dispatch.extend(delta.added.iter().copied());
        changes.dispatch.extend(delta.removed.iter().copied());
        changes.inline.extend(delta.added.iter().copied());
        changes.inline.extend(delta.changed.iter().copied());
        changes.inline.extend(delta.removed.iter().copied());

        let was_instantiated = self.class_data(class).is_instantiated;
        assert!(
            !(was_instantiated && !info.is_instantiated),
            "deinstantiation must be handled by the deletion walk"
        );
        self.class_data_mut(class).is_instantiated = info.is_instantiated;

        if info.is_instantiated {
            if was_instantiated {
                for &interface in old_interfaces.intersection(&new_interfaces) {
                    for &n in &changes.dispatch {
                        self.tag_dynamic_callers_of(interface, n);
                    }
                }
                if old_interfaces != new_interfaces {
                    // Entering or leaving an interface changes the resolution
                    // set of every visible method name.
                    let all_names = self.all_method_names(class);
                    for &interface in new_interfaces.difference(&old_interfaces) {
                        self.interface_data_mut(interface)
                            .instantiated_subclasses
                            .insert(class);
                        for &n in &all_names {
                            self.tag_dynamic_callers_of(interface, n);
                        }
                    }
                    for &interface in old_interfaces.difference(&new_interfaces) {
                        self.interface_data_mut(interface)
                            .instantiated_subclasses
                            .remove(&class);
                        for &n in &all_names {
                            self.tag_dynamic_callers_of(interface, n);
                        }
                    }
                }
            } else {
                let all_names = self.all_method_names(class);
                for &interface in &new_interfaces {
                    self.interface_data_mut(interface)
                        .instantiated_subclasses
                        .insert(class);
                    for &n in &all_names {
                        self.tag_dynamic_callers_of(interface, n);
                    }
                }
            }
        }

        let my_interface = self.class_data(class).my_interface;
        for &n in &changes.inline {
            self.tag_static_callers_of(my_interface, n);
        }

        self.class_data_mut(class).interfaces = new_interfaces;

        for child in self.class_data(class).subclasses.clone() {
            self.walk_for_changes(child, needed, provider, &changes);
        }
    }

    // ------------------------------------------------------------------
    // Additions
    // ------------------------------------------------------------------

    /// Construct and populate a class the analysis reports but the graph
    /// does not know. Callers must add parents before children (ascending
    /// ancestor count).
    pub(crate) fn add_new_class(
        &mut self,
        info: &ClassInfo,
        provider: &dyn TreeProvider,
    ) -> Result<ClassId, OptimizerError> {
        let superclass = match info.superclass {
            Some(parent_name) => Some(
                self.classes_by_name
                    .get(&parent_name)
                    .copied()
                    .ok_or(OptimizerError::MissingSuperclass {
                        class: info.encoded_name,
                        superclass: parent_name,
                    })?,
            ),
            None => {
                if let Some(root) = self.object_class {
                    return Err(OptimizerError::DuplicateRoot {
                        class: info.encoded_name,
                        root: self.class_data(root).name,
                    });
                }
                None
            }
        };

        let class = self.new_class(info.encoded_name, superclass);
        let interfaces: FxHashSet<InterfaceId> = info
            .ancestors
            .iter()
            .map(|&ancestor| self.interface(ancestor))
            .collect();
        self.class_data_mut(class).interfaces = interfaces.clone();
        self.class_data_mut(class).is_instantiated = info.is_instantiated;

        self.update_methods_with(MethodOwner::Class(class), info, provider);

        if self.batch_mode {
            if info.is_instantiated {
                for &interface in &interfaces {
                    self.interface_data_mut(interface)
                        .instantiated_subclasses
                        .insert(class);
                }
            }
        } else {
            let all_names = self.all_method_names(class);
            if info.is_instantiated {
                for &interface in &interfaces {
                    self.interface_data_mut(interface)
                        .instantiated_subclasses
                        .insert(class);
                    for &n in &all_names {
                        self.tag_dynamic_callers_of(interface, n);
                    }
                }
            }
            // The class may be a move: static callers out there may still
            // reference its name.
            let my_interface = self.class_data(class).my_interface;
            for &n in &all_names {
                self.tag_static_callers_of(my_interface, n);
            }
        }

        Ok(class)
    }
}
