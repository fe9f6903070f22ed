//! Method implementations: the unit of optimization.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use stoat_identity::Name;
use stoat_ir::MethodDef;
use tracing::trace;

use crate::analysis::{MethodInfo, OptimizerHints};
use crate::emit::{MethodArtifact, OwnerKind};
use crate::ids::{ClassId, InterfaceId, MethodId, TraitImplId};
use crate::optimizer::IncOptimizer;

/// The container a method lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MethodOwner {
    Class(ClassId),
    TraitImpl(TraitImplId),
}

pub(crate) struct MethodData {
    pub(crate) owner: MethodOwner,
    pub(crate) name: Name,
    pub(crate) hints: OptimizerHints,
    /// Body as last served by the tree supplier.
    pub(crate) original_def: Option<Rc<MethodDef>>,
    /// Body after the last optimization pass; cleared whenever the original
    /// changes.
    pub(crate) optimized_def: Option<Rc<MethodDef>>,
    /// Emitted target output for the optimized body.
    pub(crate) output: Option<String>,
    pub(crate) inlineable: bool,
    /// Interfaces holding this method in a caller set. Kept as a reverse
    /// index so unregistration is proportional to the method's own
    /// registrations.
    pub(crate) registered_to: FxHashSet<InterfaceId>,
    pub(crate) deleted: bool,
}

impl IncOptimizer {
    pub(crate) fn new_method(&mut self, owner: MethodOwner, name: Name) -> MethodId {
        let id = MethodId::new(self.methods.len() as u32);
        self.methods.push(MethodData {
            owner,
            name,
            hints: OptimizerHints::default(),
            original_def: None,
            optimized_def: None,
            output: None,
            inlineable: false,
            registered_to: FxHashSet::default(),
            deleted: false,
        });
        id
    }

    pub(crate) fn method_data(&self, id: MethodId) -> &MethodData {
        &self.methods[id.index() as usize]
    }

    pub(crate) fn method_data_mut(&mut self, id: MethodId) -> &mut MethodData {
        &mut self.methods[id.index() as usize]
    }

    /// Ingest a possibly-new body for this method.
    ///
    /// If neither the hints nor the definition differ this is a no-op
    /// returning false. Otherwise the stored body is replaced, inlineability
    /// recomputed, and the method tagged; the return value says whether the
    /// method was inlineable before or is now, which is what decides whether
    /// inlining consumers must be notified.
    pub(crate) fn update_method_with(
        &mut self,
        id: MethodId,
        info: &MethodInfo,
        def: &MethodDef,
    ) -> bool {
        let data = self.method_data(id);
        assert!(!data.deleted, "ingested a body for a deleted method");

        let unchanged = data.hints == info.hints
            && data.original_def.as_deref().is_some_and(|stored| stored == def);
        if unchanged {
            return false;
        }

        let was_inlineable = data.inlineable;
        let inlineable = self.config.is_inlineable(info.hints, def);
        let data = self.method_data_mut(id);
        data.hints = info.hints;
        data.original_def = Some(Rc::new(def.clone()));
        data.optimized_def = None;
        data.output = None;
        data.inlineable = inlineable;
        self.tag_method(id);
        was_inlineable || inlineable
    }

    /// Mark the method for re-optimization and drop its current dependency
    /// registrations; it re-registers fresh ones when it is processed.
    pub(crate) fn tag_method(&mut self, id: MethodId) {
        assert!(!self.method_data(id).deleted, "tagged a deleted method");
        self.methods_to_process.insert(id);
        self.unregister_method(id);
    }

    pub(crate) fn unregister_method(&mut self, id: MethodId) {
        let registered: Vec<InterfaceId> =
            self.method_data_mut(id).registered_to.drain().collect();
        for interface in registered {
            self.unregister_caller(interface, id);
        }
    }

    pub(crate) fn delete_method(&mut self, id: MethodId) {
        let data = self.method_data(id);
        assert!(!data.deleted, "method deleted twice");
        trace!(method = %data.name, "deleting method");
        self.method_data_mut(id).deleted = true;
        self.unregister_method(id);
        self.methods_to_process.remove(&id);
    }

    /// Run the body optimizer and the emitter on the stored body.
    pub(crate) fn process_method(&mut self, id: MethodId) -> MethodArtifact {
        let data = self.method_data(id);
        assert!(!data.deleted, "processed a deleted method");
        let def = data
            .original_def
            .clone()
            .expect("processed a method with no ingested body");

        let optimized = self.optimize_body(id, &def);
        let (kind, owner) = self.owner_info(id);
        let output = self.emitter.emit(kind, owner, &optimized);

        let data = self.method_data_mut(id);
        let method = data.name;
        data.optimized_def = Some(Rc::new(optimized));
        data.output = Some(output.clone());
        MethodArtifact {
            owner,
            kind,
            method,
            output,
        }
    }

    pub(crate) fn owner_info(&self, id: MethodId) -> (OwnerKind, Name) {
        match self.method_data(id).owner {
            MethodOwner::Class(class) => (OwnerKind::Class, self.class_data(class).name),
            MethodOwner::TraitImpl(impl_) => {
                (OwnerKind::TraitImpl, self.trait_impl_data(impl_).name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoat_ir::Expr;

    fn optimizer_with_method() -> (IncOptimizer, MethodId) {
        let mut opt = IncOptimizer::new();
        let impl_ = opt.new_trait_impl(Name(1));
        let method = opt.new_method(MethodOwner::TraitImpl(impl_), Name(2));
        (opt, method)
    }

    #[test]
    fn first_ingestion_tags_and_reports_inlineable() {
        let (mut opt, method) = optimizer_with_method();
        let info = MethodInfo::new(Name(2));
        let def = MethodDef::new(Name(2), vec![], Expr::int(1));

        assert!(opt.update_method_with(method, &info, &def));
        assert!(opt.methods_to_process.contains(&method));
        assert!(opt.method_data(method).inlineable);
    }

    #[test]
    fn unchanged_bodies_are_a_no_op() {
        let (mut opt, method) = optimizer_with_method();
        let info = MethodInfo::new(Name(2));
        let def = MethodDef::new(Name(2), vec![], Expr::int(1));

        opt.update_method_with(method, &info, &def);
        opt.methods_to_process.clear();
        assert!(!opt.update_method_with(method, &info, &def));
        assert!(opt.methods_to_process.is_empty());
    }

    #[test]
    fn changed_uninlineable_bodies_tag_but_return_false() {
        let (mut opt, method) = optimizer_with_method();
        let mut info = MethodInfo::new(Name(2));
        info.hints.no_inline = true;

        let def = MethodDef::new(Name(2), vec![], Expr::int(1));
        assert!(!opt.update_method_with(method, &info, &def));
        assert!(opt.methods_to_process.contains(&method));

        opt.methods_to_process.clear();
        let def = MethodDef::new(Name(2), vec![], Expr::int(2));
        assert!(!opt.update_method_with(method, &info, &def));
        assert!(opt.methods_to_process.contains(&method));
    }

    #[test]
    fn losing_inlineability_still_notifies_consumers() {
        let (mut opt, method) = optimizer_with_method();
        let info = MethodInfo::new(Name(2));
        let def = MethodDef::new(Name(2), vec![], Expr::int(1));
        opt.update_method_with(method, &info, &def);

        let mut info = MethodInfo::new(Name(2));
        info.hints.no_inline = true;
        let def = MethodDef::new(Name(2), vec![], Expr::int(2));
        assert!(opt.update_method_with(method, &info, &def));
        assert!(!opt.method_data(method).inlineable);
    }

    #[test]
    fn delete_removes_from_the_work_queue() {
        let (mut opt, method) = optimizer_with_method();
        let info = MethodInfo::new(Name(2));
        let def = MethodDef::new(Name(2), vec![], Expr::int(1));
        opt.update_method_with(method, &info, &def);

        opt.delete_method(method);
        assert!(opt.methods_to_process.is_empty());
        assert!(opt.method_data(method).deleted);
    }

    #[test]
    #[should_panic(expected = "method deleted twice")]
    fn double_delete_panics() {
        let (mut opt, method) = optimizer_with_method();
        opt.delete_method(method);
        opt.delete_method(method);
    }

    #[test]
    #[should_panic(expected = "tagged a deleted method")]
    fn tagging_a_deleted_method_panics() {
        let (mut opt, method) = optimizer_with_method();
        opt.delete_method(method);
        opt.tag_method(method);
    }
}
