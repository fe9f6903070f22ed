//! Hand-off of optimized methods to the embedder.

use stoat_identity::Name;
use stoat_ir::MethodDef;

/// Which kind of container a method lives in. Drives the lowering choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Class,
    TraitImpl,
}

/// Lowers an optimized method definition to target output.
///
/// The engine stores the output on the method and forwards it through
/// [`crate::UpdateStats`]; it never reads it back.
pub trait Emitter {
    fn emit(&mut self, kind: OwnerKind, owner: Name, def: &MethodDef) -> String;
}

/// One re-emitted method of the current run.
#[derive(Debug, Clone)]
pub struct MethodArtifact {
    pub owner: Name,
    pub kind: OwnerKind,
    pub method: Name,
    pub output: String,
}

/// Default emitter: renders the IR as text.
#[derive(Debug, Default)]
pub struct TextEmitter;

impl Emitter for TextEmitter {
    fn emit(&mut self, kind: OwnerKind, owner: Name, def: &MethodDef) -> String {
        match kind {
            OwnerKind::Class => format!("{owner} :: {def}"),
            OwnerKind::TraitImpl => format!("{owner} :: static {def}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoat_ir::Expr;

    #[test]
    fn trait_impl_methods_lower_as_statics() {
        let mut emitter = TextEmitter;
        let def = MethodDef::new(Name(2), vec![], Expr::int(7));
        let class = emitter.emit(OwnerKind::Class, Name(1), &def);
        let impl_ = emitter.emit(OwnerKind::TraitImpl, Name(1), &def);
        assert_eq!(class, "name#1 :: def name#2() = 7");
        assert_eq!(impl_, "name#1 :: static def name#2() = 7");
    }
}
