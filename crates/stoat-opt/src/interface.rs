//! The dependency ledger.
//!
//! One `InterfaceData` exists per encoded class/interface name ever touched.
//! It records which optimized methods consulted a given method name of that
//! interface during their last optimization, split by call flavor, plus the
//! set of instantiated classes implementing the interface.
//!
//! Ledgers are created lazily and never destroyed: an interface outlives any
//! particular class carrying the name, so callers registered against a name
//! whose class is gone can still be torn down through it. A dangling
//! registration on a no-longer-populated name is harmless; it is simply
//! never tagged.

use rustc_hash::{FxHashMap, FxHashSet};
use stoat_identity::Name;
use tracing::trace;

use crate::ids::{ClassId, InterfaceId, MethodId};
use crate::optimizer::IncOptimizer;

pub(crate) struct InterfaceData {
    pub(crate) name: Name,
    /// Methods that consulted the dynamic resolution set of a method name.
    pub(crate) dynamic_callers: FxHashMap<Name, FxHashSet<MethodId>>,
    /// Methods that consumed one specific implementation of a method name.
    pub(crate) static_callers: FxHashMap<Name, FxHashSet<MethodId>>,
    pub(crate) instantiated_subclasses: FxHashSet<ClassId>,
}

impl InterfaceData {
    fn new(name: Name) -> Self {
        Self {
            name,
            dynamic_callers: FxHashMap::default(),
            static_callers: FxHashMap::default(),
            instantiated_subclasses: FxHashSet::default(),
        }
    }
}

impl IncOptimizer {
    /// Look up the ledger for a name, creating it on first use.
    pub(crate) fn interface(&mut self, name: Name) -> InterfaceId {
        if let Some(&id) = self.interfaces_by_name.get(&name) {
            return id;
        }
        let id = InterfaceId::new(self.interfaces.len() as u32);
        self.interfaces.push(InterfaceData::new(name));
        self.interfaces_by_name.insert(name, id);
        id
    }

    pub(crate) fn interface_data(&self, id: InterfaceId) -> &InterfaceData {
        &self.interfaces[id.index() as usize]
    }

    pub(crate) fn interface_data_mut(&mut self, id: InterfaceId) -> &mut InterfaceData {
        &mut self.interfaces[id.index() as usize]
    }

    /// Record `caller` as depending on the dynamic resolution of
    /// `method_name`. Idempotent.
    pub(crate) fn register_dynamic_caller(
        &mut self,
        interface: InterfaceId,
        method_name: Name,
        caller: MethodId,
    ) {
        self.interface_data_mut(interface)
            .dynamic_callers
            .entry(method_name)
            .or_default()
            .insert(caller);
        self.method_data_mut(caller).registered_to.insert(interface);
    }

    /// Record `caller` as depending on one specific implementation of
    /// `method_name`. Idempotent.
    pub(crate) fn register_static_caller(
        &mut self,
        interface: InterfaceId,
        method_name: Name,
        caller: MethodId,
    ) {
        self.interface_data_mut(interface)
            .static_callers
            .entry(method_name)
            .or_default()
            .insert(caller);
        self.method_data_mut(caller).registered_to.insert(interface);
    }

    /// Drop `caller` from every caller set of `interface`.
    pub(crate) fn unregister_caller(&mut self, interface: InterfaceId, caller: MethodId) {
        let data = self.interface_data_mut(interface);
        data.dynamic_callers.retain(|_, callers| {
            callers.remove(&caller);
            !callers.is_empty()
        });
        data.static_callers.retain(|_, callers| {
            callers.remove(&caller);
            !callers.is_empty()
        });
    }

    /// Tag every dynamic caller of `method_name` and drop the set.
    ///
    /// The set must be removed, not just iterated: tagged callers
    /// re-register themselves during re-optimization, so whatever was
    /// recorded before is stale.
    pub(crate) fn tag_dynamic_callers_of(&mut self, interface: InterfaceId, method_name: Name) {
        if let Some(callers) = self
            .interface_data_mut(interface)
            .dynamic_callers
            .remove(&method_name)
        {
            trace!(
                interface = %self.interface_data(interface).name,
                method = %method_name,
                callers = callers.len(),
                "tagging dynamic callers"
            );
            for caller in callers {
                self.tag_method(caller);
            }
        }
    }

    /// Tag every static caller of `method_name` and drop the set.
    pub(crate) fn tag_static_callers_of(&mut self, interface: InterfaceId, method_name: Name) {
        if let Some(callers) = self
            .interface_data_mut(interface)
            .static_callers
            .remove(&method_name)
        {
            trace!(
                interface = %self.interface_data(interface).name,
                method = %method_name,
                callers = callers.len(),
                "tagging static callers"
            );
            for caller in callers {
                self.tag_method(caller);
            }
        }
    }
}
