use hierdb::*;

mod common;
use common::*;

fn small_tree() -> (NetlistDB, DesignId, DesignId, DesignId) {
    let mut db = cells_db();
    let work = db.create_library("work", LibraryKind::Designs).unwrap();
    let leaf = db.create_hierarchical(work, "leaf", [
        PortDecl::bus("d", Direction::Input, BusRange::new(3, 0)),
        PortDecl::scalar("en", Direction::Input),
        PortDecl::bus("q", Direction::Output, BusRange::new(1, 0)),
    ]).unwrap();
    let mid = db.create_hierarchical(work, "mid", [
        PortDecl::scalar("x", Direction::Input),
    ]).unwrap();
    let top = db.create_hierarchical(work, "top", [
        PortDecl::scalar("x", Direction::Input),
    ]).unwrap();
    db.create_instance(mid, leaf, "l1").unwrap();
    db.create_instance(top, mid, "m1").unwrap();
    (db, top, mid, leaf)
}

#[test]
fn child_instance_lookup_and_delete() {
    clilog::init_stdout_simple_trace();
    let (mut db, top, _mid, leaf) = small_tree();
    let inst = db.create_instance(top, leaf, "l2").unwrap();
    assert_eq!(db.child_instance(top, "l2").unwrap(), inst);
    assert_eq!(db.instance_parent(inst).unwrap(), top);
    assert!(matches!(db.create_instance(top, leaf, "l2"),
                     Err(HierError::DuplicateName { .. })));

    let n = db.create_net(top, "n").unwrap();
    let pin = db.inst_port_bit(inst, "en", None).unwrap();
    db.connect(pin, n).unwrap();
    db.delete_instance(inst).unwrap();
    assert!(matches!(db.child_instance(top, "l2"), Err(HierError::NotFound { .. })));
    assert!(matches!(db.instance_name(inst), Err(HierError::NotFound { .. })));
    assert_eq!(db.net_terms(n).unwrap().count(), 0);
    assert!(db.delete_instance(inst).is_err());
}

#[test]
fn recursive_instantiation_fails() {
    clilog::init_stdout_simple_trace();
    let (mut db, top, mid, leaf) = small_tree();
    let before = db.child_instances(leaf).unwrap().count();
    assert!(matches!(db.create_instance(leaf, top, "t"), Err(HierError::TypeMismatch(_))));
    assert!(matches!(db.create_instance(leaf, mid, "m"), Err(HierError::TypeMismatch(_))));
    assert!(matches!(db.create_instance(mid, mid, "m"), Err(HierError::TypeMismatch(_))));
    assert_eq!(db.child_instances(leaf).unwrap().count(), before);
    assert!(db.child_instance(leaf, "t").is_err());

    let inv = db.find_model("INV").unwrap();
    assert!(matches!(db.create_instance(inv, leaf, "x"), Err(HierError::TypeMismatch(_))));
}

#[test]
fn bit_terms_are_stable() {
    clilog::init_stdout_simple_trace();
    let (db, top, mid, leaf) = small_tree();
    let l1 = db.child_instance(mid, "l1").unwrap();

    let outputs = db.output_bit_terms(l1).unwrap();
    let first = outputs.clone().map(|t| db.term_name(t).unwrap()).collect::<Vec<_>>();
    assert_eq!(first, vec!["l1:q[1]", "l1:q[0]"]);
    assert_eq!(outputs.map(|t| db.term_name(t).unwrap()).collect::<Vec<_>>(), first);

    let inputs = db.input_bit_terms(leaf).unwrap();
    let names = inputs.clone().map(|t| db.term_name(t).unwrap()).collect::<Vec<_>>();
    assert_eq!(names, vec!["d[3]", "d[2]", "d[1]", "d[0]", "en"]);
    assert_eq!(inputs.count(), 5);

    let children = db.child_instances(top).unwrap();
    assert_eq!(children.clone().count(), 1);
    assert_eq!(children.collect::<Vec<_>>(),
               db.child_instances(top).unwrap().collect::<Vec<_>>());
    assert_eq!(db.leaf_instances(top).unwrap().len(), 0);
}

#[test]
fn disconnect_is_idempotent() {
    clilog::init_stdout_simple_trace();
    let (mut db, _top, mid, _leaf) = small_tree();
    let l1 = db.child_instance(mid, "l1").unwrap();
    let en = db.inst_port_bit(l1, "en", None).unwrap();
    let x = db.create_net(mid, "x").unwrap();
    db.connect(db.port_bit(mid, "x", None).unwrap(), x).unwrap();
    db.connect(en, x).unwrap();

    assert_eq!(db.disconnect(en).unwrap(), Some(x));
    assert_eq!(db.get_net(en).unwrap(), None);
    assert_eq!(db.disconnect(en).unwrap(), None);
    assert_eq!(db.get_net(en).unwrap(), None);
    assert_eq!(db.net_terms(x).unwrap().count(), 1);
}

#[test]
fn bus_bits_round_trip() {
    clilog::init_stdout_simple_trace();
    let (mut db, _top, mid, leaf) = small_tree();
    let bits = db.port_bits(leaf, "d").unwrap().collect::<Vec<_>>();
    assert_eq!(bits.len(), 4);
    let bus = db.collapse(&bits).unwrap();
    assert_eq!(bus.to_string(), "d[3:0]");
    assert_eq!(db.port_bits(leaf, &bus.name).unwrap().collect::<Vec<_>>(), bits);
    assert_eq!(db.collapse(&bits[1..3]).unwrap().to_string(), "d[2:1]");

    let s = db.create_bus_net(mid, "s", BusRange::new(0, 3)).unwrap();
    let bus = db.collapse_nets(&s).unwrap().unwrap();
    assert_eq!(bus.to_string(), "s[0:3]");
    assert_eq!(db.bus_net_bits(mid, "s").unwrap(), s);
    assert!(matches!(db.bus_net_bit(mid, "s", Some(4)),
                     Err(HierError::IndexOutOfRange { .. })));
}

#[test]
fn unedited_load_has_no_false_multi_drivers() {
    clilog::init_stdout_simple_trace();
    let mut db = cells_db();
    let top = db.load_sverilog_file(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/hier.v"),
        &LoadOptions::default()
    ).unwrap();
    let issues = db.validate_drivers(top).unwrap();
    assert!(issues.iter().all(|i| i.cause != Cause::MultipleDrivers));
    for path in db.leaf_instances(top).unwrap() {
        let inst = path.last().unwrap();
        for term in db.output_bit_terms(inst).unwrap() {
            let (parent, _) = path.parent().unwrap();
            let eq = db.equipotential(&TermOccurrence::new(parent, term)).unwrap();
            assert_eq!(eq.driver_count(), 1, "{}", db.equipotential_name(&eq).unwrap());
        }
    }
}
