//! Stoat IR: class trees, method definitions, and the expression language
//! the optimizer rewrites.

pub mod display;
pub mod tree;

pub use tree::{BinOp, ClassDef, Expr, MethodDef};
