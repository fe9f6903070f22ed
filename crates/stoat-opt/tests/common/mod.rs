//! Shared fixture for the integration suites.
//!
//! Keeps an interner, a versioned tree store, and the analysis state of a
//! small program, so tests mutate the program between runs the way a build
//! tool would and then assert on what one `update` re-processed.

#![allow(dead_code)] // not every suite uses every helper

use stoat_identity::{Interner, Name};
use stoat_ir::{ClassDef, Expr, MethodDef};
use stoat_opt::{Analysis, ClassInfo, IncOptimizer, MemoryTrees, MethodInfo, UpdateStats};

pub struct Fixture {
    pub interner: Interner,
    pub trees: MemoryTrees,
    pub infos: Vec<ClassInfo>,
    pub opt: IncOptimizer,
}

impl Fixture {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self {
            interner: Interner::new(),
            trees: MemoryTrees::new(),
            infos: Vec::new(),
            opt: IncOptimizer::new(),
        }
    }

    pub fn name(&mut self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Declare (or redeclare) a class in the analysis.
    pub fn declare_class(&mut self, name: &str, superclass: Option<&str>, ancestors: &[&str]) {
        let encoded = self.name(name);
        let mut info = ClassInfo::new(encoded);
        info.superclass = superclass.map(|s| self.name(s));
        info.ancestors = ancestors.iter().map(|s| self.name(s)).collect();
        self.put_info(info);
    }

    /// Declare a class that is never instantiated itself but stays in the
    /// hierarchy for its instantiated subclasses.
    pub fn declare_abstract_class(
        &mut self,
        name: &str,
        superclass: Option<&str>,
        ancestors: &[&str],
    ) {
        let encoded = self.name(name);
        let mut info = ClassInfo::non_instantiated(encoded);
        info.superclass = superclass.map(|s| self.name(s));
        info.ancestors = ancestors.iter().map(|s| self.name(s)).collect();
        self.put_info(info);
    }

    pub fn declare_trait_impl(&mut self, name: &str) {
        let encoded = self.name(name);
        let info = ClassInfo::impl_class(encoded);
        self.put_info(info);
    }

    pub fn undeclare(&mut self, name: &str) {
        let encoded = self.name(name);
        self.infos.retain(|i| i.encoded_name != encoded);
    }

    fn put_info(&mut self, info: ClassInfo) {
        if let Some(existing) = self
            .infos
            .iter_mut()
            .find(|i| i.encoded_name == info.encoded_name)
        {
            *existing = info;
        } else {
            self.infos.push(info);
        }
    }

    pub fn info_mut(&mut self, name: &str) -> &mut ClassInfo {
        let encoded = self.name(name);
        self.infos
            .iter_mut()
            .find(|i| i.encoded_name == encoded)
            .expect("class not declared")
    }

    pub fn declare_method(&mut self, class: &str, method: &str) {
        let encoded = self.name(method);
        self.info_mut(class).add_method(MethodInfo::new(encoded));
    }

    pub fn remove_method(&mut self, class: &str, method: &str) {
        let encoded = self.name(method);
        self.info_mut(class).method_infos.remove(&encoded);
    }

    /// Install the class tree for `class`, bumping its version.
    pub fn set_tree(&mut self, class: &str, methods: Vec<MethodDef>) {
        let encoded = self.name(class);
        self.trees.upsert(ClassDef::new(encoded, methods));
    }

    pub fn method_def(&mut self, name: &str, params: &[&str], body: Expr) -> MethodDef {
        let encoded = self.name(name);
        let params = params.iter().map(|p| self.name(p)).collect();
        MethodDef::new(encoded, params, body)
    }

    pub fn dyn_call(&mut self, interface: &str, method: &str) -> Expr {
        Expr::dynamic_call(self.name(interface), self.name(method), vec![])
    }

    pub fn static_call(&mut self, class: &str, method: &str) -> Expr {
        Expr::static_call(self.name(class), self.name(method), vec![])
    }

    pub fn impl_call(&mut self, impl_name: &str, method: &str) -> Expr {
        Expr::trait_impl_call(self.name(impl_name), self.name(method), vec![])
    }

    pub fn analysis(&self) -> Analysis {
        let mut analysis = Analysis::new();
        for info in &self.infos {
            analysis.insert(info.clone());
        }
        analysis
    }

    /// Run one update and audit the graph afterwards.
    pub fn run(&mut self) -> UpdateStats {
        let analysis = self.analysis();
        let stats = self
            .opt
            .update(&analysis, &self.trees)
            .expect("update must succeed");
        self.opt.check_consistency();
        stats
    }

    /// `(owner, method)` pairs processed by a run, resolved and sorted.
    pub fn processed(&self, stats: &UpdateStats) -> Vec<(String, String)> {
        let mut processed: Vec<(String, String)> = stats
            .processed()
            .into_iter()
            .map(|(owner, method)| {
                (
                    self.interner.resolve(owner).to_string(),
                    self.interner.resolve(method).to_string(),
                )
            })
            .collect();
        processed.sort();
        processed
    }

    pub fn resolved(&self, names: &[Name]) -> Vec<String> {
        let mut resolved: Vec<String> = names
            .iter()
            .map(|&n| self.interner.resolve(n).to_string())
            .collect();
        resolved.sort();
        resolved
    }
}

pub fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = expected
        .iter()
        .map(|(owner, method)| (owner.to_string(), method.to_string()))
        .collect();
    pairs.sort();
    pairs
}
