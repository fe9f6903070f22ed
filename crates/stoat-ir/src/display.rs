//! Text rendering of IR trees.
//!
//! Names print in their raw handle form (`name#3`); resolving handles back to
//! encoded strings is the embedder's concern.

use std::fmt;

use crate::tree::{BinOp, ClassDef, Expr, MethodDef};

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Eq => "==",
        };
        f.write_str(s)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    write!(f, "(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntLit(v) => write!(f, "{v}"),
            Expr::BoolLit(v) => write!(f, "{v}"),
            Expr::Param(name) => write!(f, "{name}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "if {cond} then {then_branch} else {else_branch}"),
            Expr::DynamicCall {
                interface,
                method,
                args,
            } => {
                write!(f, "dyn {interface}.{method}")?;
                write_args(f, args)
            }
            Expr::StaticCall {
                class,
                method,
                args,
            } => {
                write!(f, "static {class}.{method}")?;
                write_args(f, args)
            }
            Expr::TraitImplCall {
                impl_name,
                method,
                args,
            } => {
                write!(f, "traitimpl {impl_name}.{method}")?;
                write_args(f, args)
            }
        }
    }
}

impl fmt::Display for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def {}", self.name)?;
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") = {}", self.body)
    }
}

impl fmt::Display for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {} {{", self.name)?;
        for method in &self.methods {
            writeln!(f, "  {method}")?;
        }
        write!(f, "}}")
    }
}
