use stoat_identity::Name;

/// A class tree as served by the tree supplier: one class together with the
/// method bodies the optimizer may rewrite.
///
/// Trees are immutable once served. Structural equality on the contained
/// `MethodDef`s is what the engine uses to decide whether a body changed
/// between two versions of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: Name,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    pub fn new(name: Name, methods: Vec<MethodDef>) -> Self {
        Self { name, methods }
    }

    pub fn method(&self, name: Name) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// One concrete method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: Name,
    pub params: Vec<Name>,
    pub body: Expr,
}

impl MethodDef {
    pub fn new(name: Name, params: Vec<Name>, body: Expr) -> Self {
        Self { name, params, body }
    }
}

/// Binary operators. `Eq` compares integers and yields a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Eq,
}

/// Expression tree.
///
/// All expressions are pure: evaluation order never matters and any
/// subexpression can be duplicated or dropped by a rewrite. Call sites come
/// in the three resolution flavors the engine tracks separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    IntLit(i64),
    BoolLit(bool),
    /// Reference to one of the enclosing method's parameters.
    Param(Name),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// Dispatched through an interface: may resolve to any instantiated
    /// implementor.
    DynamicCall {
        interface: Name,
        method: Name,
        args: Vec<Expr>,
    },
    /// Targets one class's implementation, resolved up its parent chain.
    StaticCall {
        class: Name,
        method: Name,
        args: Vec<Expr>,
    },
    /// Direct entry into a trait impl's bag of static methods.
    TraitImplCall {
        impl_name: Name,
        method: Name,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::IntLit(value)
    }

    pub fn param(name: Name) -> Self {
        Expr::Param(name)
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn dynamic_call(interface: Name, method: Name, args: Vec<Expr>) -> Self {
        Expr::DynamicCall {
            interface,
            method,
            args,
        }
    }

    pub fn static_call(class: Name, method: Name, args: Vec<Expr>) -> Self {
        Expr::StaticCall {
            class,
            method,
            args,
        }
    }

    pub fn trait_impl_call(impl_name: Name, method: Name, args: Vec<Expr>) -> Self {
        Expr::TraitImplCall {
            impl_name,
            method,
            args,
        }
    }

    /// Number of nodes in this expression, counting itself.
    pub fn size(&self) -> usize {
        match self {
            Expr::IntLit(_) | Expr::BoolLit(_) | Expr::Param(_) => 1,
            Expr::Binary { lhs, rhs, .. } => 1 + lhs.size() + rhs.size(),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => 1 + cond.size() + then_branch.size() + else_branch.size(),
            Expr::DynamicCall { args, .. }
            | Expr::StaticCall { args, .. }
            | Expr::TraitImplCall { args, .. } => {
                1 + args.iter().map(Expr::size).sum::<usize>()
            }
        }
    }
}
