//! Method reconciliation shared by classes and trait impls.

use rustc_hash::{FxHashMap, FxHashSet};
use stoat_identity::Name;
use tracing::trace;

use crate::analysis::ClassInfo;
use crate::ids::MethodId;
use crate::method::MethodOwner;
use crate::optimizer::IncOptimizer;
use crate::provider::{TreeProvider, Version};

/// The fields every method container carries.
#[derive(Default)]
pub(crate) struct MethodMap {
    pub(crate) methods: FxHashMap<Name, MethodId>,
    /// Version token of the last tree ingested for this container.
    pub(crate) last_version: Option<Version>,
}

/// Outcome of one reconciliation.
#[derive(Debug, Default)]
pub(crate) struct MethodDelta {
    pub(crate) added: FxHashSet<Name>,
    /// Names whose ingestion reported an inlining-relevant change.
    pub(crate) changed: FxHashSet<Name>,
    pub(crate) removed: FxHashSet<Name>,
}

impl IncOptimizer {
    pub(crate) fn method_map(&self, owner: MethodOwner) -> &MethodMap {
        match owner {
            MethodOwner::Class(class) => &self.class_data(class).map,
            MethodOwner::TraitImpl(impl_) => &self.trait_impl_data(impl_).map,
        }
    }

    pub(crate) fn method_map_mut(&mut self, owner: MethodOwner) -> &mut MethodMap {
        match owner {
            MethodOwner::Class(class) => &mut self.class_data_mut(class).map,
            MethodOwner::TraitImpl(impl_) => &mut self.trait_impl_data_mut(impl_).map,
        }
    }

    pub(crate) fn owner_name(&self, owner: MethodOwner) -> Name {
        match owner {
            MethodOwner::Class(class) => self.class_data(class).name,
            MethodOwner::TraitImpl(impl_) => self.trait_impl_data(impl_).name,
        }
    }

    /// Reconcile a container's methods against the analysis and the tree
    /// supplier.
    ///
    /// Reachability is reconciled even when no tree is served: methods that
    /// fell out of the reachable set are deleted from the stored state alone.
    /// The stored version is cleared only when a reachable name has never
    /// been seen, since only then must the supplier serve a tree that
    /// contains the new definition; pure removals never force a refetch.
    pub(crate) fn update_methods_with(
        &mut self,
        owner: MethodOwner,
        info: &ClassInfo,
        provider: &dyn TreeProvider,
    ) -> MethodDelta {
        let mut delta = MethodDelta::default();

        let reachable: FxHashSet<Name> = info
            .method_infos
            .values()
            .filter(|m| m.is_reachable && !m.is_abstract)
            .map(|m| m.encoded_name)
            .collect();

        let stored: FxHashSet<Name> = self.method_map(owner).methods.keys().copied().collect();
        if stored != reachable {
            let stale: Vec<(Name, MethodId)> = self
                .method_map(owner)
                .methods
                .iter()
                .filter(|(name, _)| !reachable.contains(*name))
                .map(|(&name, &method)| (name, method))
                .collect();
            for (name, method) in stale {
                self.method_map_mut(owner).methods.remove(&name);
                self.delete_method(method);
                delta.removed.insert(name);
            }

            if reachable
                .iter()
                .any(|name| !self.method_map(owner).methods.contains_key(name))
            {
                self.method_map_mut(owner).last_version = None;
            }
        }

        let container = self.owner_name(owner);
        let last_version = self.method_map(owner).last_version.clone();
        let Some((tree, version)) = provider.class_tree_if_changed(container, last_version.as_ref())
        else {
            return delta;
        };
        trace!(container = %container, "ingesting class tree");
        self.method_map_mut(owner).last_version = version;

        for def in &tree.methods {
            let name = def.name;
            if !reachable.contains(&name) {
                continue;
            }
            let Some(method_info) = info.method_infos.get(&name) else {
                continue;
            };
            match self.method_map(owner).methods.get(&name).copied() {
                None => {
                    let method = self.new_method(owner, name);
                    self.method_map_mut(owner).methods.insert(name, method);
                    self.update_method_with(method, method_info, def);
                    delta.added.insert(name);
                }
                Some(method) => {
                    if self.update_method_with(method, method_info, def) {
                        delta.changed.insert(name);
                    }
                }
            }
        }

        delta
    }
}
