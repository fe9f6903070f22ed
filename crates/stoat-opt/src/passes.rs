//! The method-body optimizer.
//!
//! One pass over a stored body: constant folding, devirtualization of
//! single-target dynamic calls, and inlining of inlineable targets. Every
//! call site reports itself through the registration hooks as it is
//! resolved, so the dependency ledgers always describe exactly what the
//! last optimization of a method consumed. Inlined bodies are re-optimized
//! in the caller's context and register their own call sites as the
//! caller's dependencies.

use smallvec::SmallVec;
use stoat_ir::{BinOp, Expr, MethodDef};
use tracing::trace;

use crate::ids::MethodId;
use crate::method::MethodOwner;
use crate::optimizer::IncOptimizer;

impl IncOptimizer {
    pub(crate) fn optimize_body(&mut self, caller: MethodId, def: &MethodDef) -> MethodDef {
        let mut pass = BodyOptimizer {
            caller,
            inline_stack: SmallVec::from_slice(&[caller]),
            opt: self,
        };
        let body = pass.rewrite(&def.body);
        MethodDef::new(def.name, def.params.clone(), body)
    }
}

struct BodyOptimizer<'a> {
    opt: &'a mut IncOptimizer,
    caller: MethodId,
    /// Methods currently being expanded, the caller included. Guards
    /// against inlining cycles.
    inline_stack: SmallVec<[MethodId; 8]>,
}

impl BodyOptimizer<'_> {
    fn rewrite(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::IntLit(_) | Expr::BoolLit(_) | Expr::Param(_) => expr.clone(),

            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.rewrite(lhs);
                let rhs = self.rewrite(rhs);
                fold_binary(*op, lhs, rhs)
            }

            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => match self.rewrite(cond) {
                // only the taken branch is optimized; dead code registers
                // no dependencies
                Expr::BoolLit(true) => self.rewrite(then_branch),
                Expr::BoolLit(false) => self.rewrite(else_branch),
                cond => Expr::If {
                    cond: Box::new(cond),
                    then_branch: Box::new(self.rewrite(then_branch)),
                    else_branch: Box::new(self.rewrite(else_branch)),
                },
            },

            Expr::DynamicCall {
                interface,
                method,
                args,
            } => {
                let args = self.rewrite_args(args);
                let targets = self.opt.dynamic_call(self.caller, *interface, *method);
                if let [target] = targets[..] {
                    // A unique target pins the call to one implementation:
                    // record the static dependency alongside the dynamic one.
                    let MethodOwner::Class(owner) = self.opt.method_data(target).owner else {
                        unreachable!("dynamic resolution produced a trait impl method");
                    };
                    let class_name = self.opt.class_data(owner).name;
                    if let Some(resolved) = self.opt.static_call(self.caller, class_name, *method)
                        && let Some(inlined) = self.try_inline(resolved, &args)
                    {
                        return inlined;
                    }
                    trace!(class = %class_name, method = %method, "devirtualized dynamic call");
                    Expr::StaticCall {
                        class: class_name,
                        method: *method,
                        args,
                    }
                } else {
                    Expr::DynamicCall {
                        interface: *interface,
                        method: *method,
                        args,
                    }
                }
            }

            Expr::StaticCall {
                class,
                method,
                args,
            } => {
                let args = self.rewrite_args(args);
                let target = self.opt.static_call(self.caller, *class, *method);
                if let Some(target) = target
                    && let Some(inlined) = self.try_inline(target, &args)
                {
                    return inlined;
                }
                Expr::StaticCall {
                    class: *class,
                    method: *method,
                    args,
                }
            }

            Expr::TraitImplCall {
                impl_name,
                method,
                args,
            } => {
                let args = self.rewrite_args(args);
                let target = self.opt.trait_impl_call(self.caller, *impl_name, *method);
                if let Some(target) = target
                    && let Some(inlined) = self.try_inline(target, &args)
                {
                    return inlined;
                }
                Expr::TraitImplCall {
                    impl_name: *impl_name,
                    method: *method,
                    args,
                }
            }
        }
    }

    fn rewrite_args(&mut self, args: &[Expr]) -> Vec<Expr> {
        args.iter().map(|arg| self.rewrite(arg)).collect()
    }

    /// Expand the target's original body with the argument expressions
    /// substituted for its parameters, then optimize the result in the
    /// caller's context.
    fn try_inline(&mut self, target: MethodId, args: &[Expr]) -> Option<Expr> {
        if self.inline_stack.len() > self.opt.config.max_inline_depth {
            return None;
        }
        if self.inline_stack.contains(&target) {
            return None;
        }
        let data = self.opt.method_data(target);
        if !data.inlineable {
            return None;
        }
        let def = data.original_def.clone()?;
        if def.params.len() != args.len() {
            return None;
        }

        trace!(target = %def.name, "inlining");
        let body = substitute(&def.body, &def.params, args);
        self.inline_stack.push(target);
        let rewritten = self.rewrite(&body);
        self.inline_stack.pop();
        Some(rewritten)
    }
}

fn fold_binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    if let (Expr::IntLit(a), Expr::IntLit(b)) = (&lhs, &rhs) {
        return match op {
            BinOp::Add => Expr::IntLit(a.wrapping_add(*b)),
            BinOp::Sub => Expr::IntLit(a.wrapping_sub(*b)),
            BinOp::Mul => Expr::IntLit(a.wrapping_mul(*b)),
            BinOp::Eq => Expr::BoolLit(a == b),
        };
    }
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn substitute(expr: &Expr, params: &[stoat_identity::Name], args: &[Expr]) -> Expr {
    match expr {
        Expr::Param(name) => params
            .iter()
            .position(|p| p == name)
            .map(|i| args[i].clone())
            .unwrap_or_else(|| expr.clone()),
        Expr::IntLit(_) | Expr::BoolLit(_) => expr.clone(),
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: Box::new(substitute(lhs, params, args)),
            rhs: Box::new(substitute(rhs, params, args)),
        },
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => Expr::If {
            cond: Box::new(substitute(cond, params, args)),
            then_branch: Box::new(substitute(then_branch, params, args)),
            else_branch: Box::new(substitute(else_branch, params, args)),
        },
        Expr::DynamicCall {
            interface,
            method,
            args: call_args,
        } => Expr::DynamicCall {
            interface: *interface,
            method: *method,
            args: call_args.iter().map(|a| substitute(a, params, args)).collect(),
        },
        Expr::StaticCall {
            class,
            method,
            args: call_args,
        } => Expr::StaticCall {
            class: *class,
            method: *method,
            args: call_args.iter().map(|a| substitute(a, params, args)).collect(),
        },
        Expr::TraitImplCall {
            impl_name,
            method,
            args: call_args,
        } => Expr::TraitImplCall {
            impl_name: *impl_name,
            method: *method,
            args: call_args.iter().map(|a| substitute(a, params, args)).collect(),
        },
    }
}
