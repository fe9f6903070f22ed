//! Global laws: idempotence of `update` and equivalence of any incremental
//! history with one batch run over the final inputs.

mod common;

use common::Fixture;
use stoat_ir::Expr;
use stoat_opt::IncOptimizer;

/// A program exercising every container kind: a three-deep class chain, a
/// class holding one static and one dynamic call, and a trait impl.
fn program() -> Fixture {
    let mut fix = Fixture::new();
    fix.declare_class("Object", None, &["Object"]);
    fix.declare_method("Object", "foo");
    let foo = fix.method_def("foo", &[], Expr::int(1));
    fix.set_tree("Object", vec![foo]);

    fix.declare_class("A", Some("Object"), &["A", "Object"]);
    fix.declare_method("A", "foo");
    let foo = fix.method_def("foo", &[], Expr::int(2));
    fix.set_tree("A", vec![foo]);

    fix.declare_class("B", Some("A"), &["B", "A", "Object"]);
    fix.declare_method("B", "foo");
    let foo = fix.method_def("foo", &[], Expr::int(3));
    fix.set_tree("B", vec![foo]);

    fix.declare_class("C", Some("Object"), &["C", "Object"]);
    fix.declare_method("C", "stat");
    fix.declare_method("C", "dynm");
    let stat_body = fix.static_call("B", "foo");
    let dynm_body = fix.dyn_call("Object", "foo");
    let stat = fix.method_def("stat", &[], stat_body);
    let dynm = fix.method_def("dynm", &[], dynm_body);
    fix.set_tree("C", vec![stat, dynm]);

    fix.declare_class("D", Some("Object"), &["D", "Object"]);
    fix.declare_method("D", "dynb");
    let dynb_body = fix.dyn_call("A", "bar");
    let dynb = fix.method_def("dynb", &[], dynb_body);
    fix.set_tree("D", vec![dynb]);

    fix.declare_abstract_class("Base", Some("Object"), &["Base", "Object"]);
    fix.declare_method("Base", "area");
    let area = fix.method_def("area", &[], Expr::int(7));
    fix.set_tree("Base", vec![area]);
    fix.declare_class("Leaf", Some("Base"), &["Leaf", "Base", "Object"]);

    fix.declare_trait_impl("I$impl");
    fix.declare_method("I$impl", "m");
    let m = fix.method_def("m", &[], Expr::int(5));
    fix.set_tree("I$impl", vec![m]);
    fix
}

/// Drive the program through every kind of delta, one run each.
fn eventful_history(fix: &mut Fixture) {
    fix.run();

    // body change
    let foo = fix.method_def("foo", &[], Expr::int(4));
    fix.set_tree("B", vec![foo]);
    fix.run();

    // method addition, resolving D's probe for A.bar
    fix.declare_method("A", "bar");
    let foo = fix.method_def("foo", &[], Expr::int(2));
    let bar = fix.method_def("bar", &[], Expr::int(9));
    fix.set_tree("A", vec![foo, bar]);
    fix.run();

    // trait impl body change
    let m = fix.method_def("m", &[], Expr::int(6));
    fix.set_tree("I$impl", vec![m]);
    fix.run();

    // class move: B leaves A for Object
    fix.declare_class("B", Some("Object"), &["B", "Object"]);
    fix.declare_method("B", "foo");
    fix.run();

    // class deletion
    fix.undeclare("C");
    fix.run();
}

fn assert_batch_equivalent(fix: &Fixture) {
    let mut fresh = IncOptimizer::new();
    fresh
        .update(&fix.analysis(), &fix.trees)
        .expect("batch run must succeed");
    fresh.check_consistency();

    for info in &fix.infos {
        let name = info.encoded_name;
        assert_eq!(fix.opt.has_class(name), fresh.has_class(name));
        assert_eq!(
            fix.opt.visible_method_names(name),
            fresh.visible_method_names(name),
            "visible methods diverge on {name}"
        );
        assert_eq!(
            fix.opt.instantiated_subclasses_of(name),
            fresh.instantiated_subclasses_of(name),
            "instantiated subclasses diverge on {name}"
        );
        for &method in info.method_infos.keys() {
            assert_eq!(
                fix.opt.emitted_output(name, method),
                fresh.emitted_output(name, method),
                "outputs diverge on {name}.{method}"
            );
        }
    }
}

#[test]
fn update_is_idempotent() {
    let mut fix = program();
    fix.run();
    let stats = fix.run();
    assert!(stats.artifacts.is_empty());
}

#[test]
fn update_is_idempotent_after_every_kind_of_delta() {
    let mut fix = program();
    eventful_history(&mut fix);
    let stats = fix.run();
    assert!(stats.artifacts.is_empty());
}

#[test]
fn a_fresh_batch_run_matches_the_incremental_state() {
    let mut fix = program();
    eventful_history(&mut fix);
    assert_batch_equivalent(&fix);
}

#[test]
fn batch_equivalence_holds_with_a_non_instantiated_ancestor() {
    let mut fix = program();
    fix.run();
    assert_batch_equivalent(&fix);

    // body change on the abstract base's only concrete method
    let area = fix.method_def("area", &[], Expr::int(8));
    fix.set_tree("Base", vec![area]);
    fix.run();
    assert_batch_equivalent(&fix);

    // the leaf stops being instantiated; the base must survive unchanged
    fix.info_mut("Leaf").is_instantiated = false;
    fix.run();
    assert_batch_equivalent(&fix);

    let base = fix.name("Base");
    assert!(fix.opt.has_class(base));
    assert_eq!(fix.opt.instantiated_subclasses_of(base), vec![]);
}

#[test]
fn batch_equivalence_holds_at_every_step() {
    let mut fix = program();
    fix.run();
    assert_batch_equivalent(&fix);

    let foo = fix.method_def("foo", &[], Expr::int(4));
    fix.set_tree("B", vec![foo]);
    fix.run();
    assert_batch_equivalent(&fix);

    fix.info_mut("B").is_instantiated = false;
    fix.declare_class("E", Some("B"), &["E", "B", "A", "Object"]);
    fix.run();
    assert_batch_equivalent(&fix);
}
