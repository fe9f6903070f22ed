//! Trait impls: flat bags of static methods bound to one interface.
//!
//! Unlike classes they carry no hierarchy and are never dispatched
//! dynamically; invalidation only flows through static callers registered
//! against the impl's own ledger.

use rustc_hash::FxHashMap;
use stoat_identity::Name;
use tracing::{debug, trace};

use crate::analysis::ClassInfo;
use crate::container::MethodMap;
use crate::ids::{InterfaceId, MethodId, TraitImplId};
use crate::method::MethodOwner;
use crate::optimizer::IncOptimizer;
use crate::provider::TreeProvider;

pub(crate) struct TraitImplData {
    pub(crate) name: Name,
    pub(crate) map: MethodMap,
    pub(crate) interface: InterfaceId,
    pub(crate) deleted: bool,
}

impl IncOptimizer {
    pub(crate) fn new_trait_impl(&mut self, name: Name) -> TraitImplId {
        let id = TraitImplId::new(self.trait_impl_arena.len() as u32);
        let interface = self.interface(name);
        self.trait_impl_arena.push(TraitImplData {
            name,
            map: MethodMap::default(),
            interface,
            deleted: false,
        });
        let previous = self.trait_impls_by_name.insert(name, id);
        assert!(previous.is_none(), "two live trait impls share a name");
        id
    }

    pub(crate) fn trait_impl_data(&self, id: TraitImplId) -> &TraitImplData {
        &self.trait_impl_arena[id.index() as usize]
    }

    pub(crate) fn trait_impl_data_mut(&mut self, id: TraitImplId) -> &mut TraitImplData {
        &mut self.trait_impl_arena[id.index() as usize]
    }

    /// Diff the stored trait impls against the needed set: delete stale
    /// impls, reconcile kept ones (tagging static callers of changed
    /// methods), and create new ones without notifications.
    pub(crate) fn update_trait_impls(
        &mut self,
        needed: &FxHashMap<Name, &ClassInfo>,
        provider: &dyn TreeProvider,
    ) {
        if !self.batch_mode {
            let stale: Vec<TraitImplId> = self
                .trait_impls_by_name
                .iter()
                .filter(|(name, _)| !needed.contains_key(*name))
                .map(|(_, &id)| id)
                .collect();
            for id in stale {
                self.delete_trait_impl(id);
            }

            let kept: Vec<TraitImplId> = needed
                .keys()
                .filter_map(|name| self.trait_impls_by_name.get(name).copied())
                .collect();
            for id in kept {
                let name = self.trait_impl_data(id).name;
                let info = needed[&name];
                let delta = self.update_methods_with(MethodOwner::TraitImpl(id), info, provider);
                let interface = self.trait_impl_data(id).interface;
                for &method in &delta.changed {
                    self.tag_static_callers_of(interface, method);
                }
            }
        }

        let new: Vec<Name> = needed
            .keys()
            .filter(|name| !self.trait_impls_by_name.contains_key(name))
            .copied()
            .collect();
        if !new.is_empty() {
            debug!(count = new.len(), "creating trait impls");
        }
        for name in new {
            let id = self.new_trait_impl(name);
            self.update_methods_with(MethodOwner::TraitImpl(id), needed[&name], provider);
        }
    }

    fn delete_trait_impl(&mut self, id: TraitImplId) {
        trace!(trait_impl = %self.trait_impl_data(id).name, "deleting trait impl");
        let methods: Vec<MethodId> = self
            .trait_impl_data(id)
            .map
            .methods
            .values()
            .copied()
            .collect();
        for method in methods {
            self.delete_method(method);
        }
        let name = self.trait_impl_data(id).name;
        self.trait_impls_by_name.remove(&name);
        self.trait_impl_data_mut(id).deleted = true;
    }
}
