use hierdb::*;

mod common;
use common::*;

fn load_hier() -> (NetlistDB, DesignId, DesignId) {
    let mut db = cells_db();
    let top = db.load_sverilog_file(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/hier.v"),
        &LoadOptions::default()
    ).unwrap();
    let child = db.get_model(db.library("work").unwrap(), "child").unwrap();
    (db, top, child)
}

#[test]
fn resolve_through_child() {
    clilog::init_stdout_simple_trace();
    let (db, top, child) = load_hier();
    let root = InstancePath::root(top);
    let c1 = db.path_from_names(top, ["c1"]).unwrap();
    assert_eq!(db.path_design(&c1).unwrap(), child);

    // downward: `m` is driven inside c1.
    let m = db.find_net(top, "m").unwrap();
    let eq = db.net_equipotential(&root, m).unwrap();
    assert_eq!(names(&db, &eq.leaf_drivers), vec!["c1/k:Y"]);
    assert_eq!(names(&db, &eq.leaf_readers), vec!["t:A"]);
    assert!(eq.top_drivers.is_empty() && eq.top_readers.is_empty());

    // upward: `q` inside c1 is the top output `y`, and nothing of c2.
    let q = db.find_net(child, "q").unwrap();
    let eq = db.net_equipotential(&c1, q).unwrap();
    assert_eq!(names(&db, &eq.leaf_drivers), vec!["c1/i:Y"]);
    assert_eq!(names(&db, &eq.top_readers), vec!["y"]);
    assert!(eq.contains_net(&NetOccurrence { path: root.clone(),
                                             net: db.find_net(top, "y").unwrap() }));
    assert!(eq.nets.iter().all(|n| n.path.depth() <= 1 &&
                               db.hier_name(&n.path).unwrap().to_string() != "c2"));

    // `a` enters c1 as d[1] and c2 as d[0].
    let a = db.find_net(top, "a").unwrap();
    let eq = db.net_equipotential(&root, a).unwrap();
    assert_eq!(names(&db, &eq.leaf_readers), vec!["c1/g:B", "c1/k:A", "c2/g:A"]);
    assert!(db.validate_drivers(top).unwrap().is_empty());
}

#[test]
fn edit_constant_in_child() {
    clilog::init_stdout_simple_trace();
    let (mut db, top, child) = load_hier();
    let root = InstancePath::root(top);
    let c1 = db.child_instance(top, "c1").unwrap();
    let c1_path = root.child(c1);

    let c1_d1 = db.inst_port_bit(c1, "d", Some(1)).unwrap();
    let upper = db.upper_net(c1_d1).unwrap().unwrap();
    assert_eq!(db.net_name(upper).unwrap(), Some(&NetName::scalar("a")));
    let lower = db.lower_net(c1_d1).unwrap().unwrap();
    assert_eq!(db.net_design(lower).unwrap(), child);

    assert_eq!(db.disconnect_lower_net(c1_d1).unwrap(), Some(lower));
    assert_eq!(db.lower_net(c1_d1).unwrap(), None);
    assert_eq!(db.get_net(db.port_bit(child, "d", Some(1)).unwrap()).unwrap(), None);
    assert_eq!(db.upper_net(c1_d1).unwrap(), Some(upper));

    let logic1 = db.find_model("LOGIC1").unwrap();
    let tie = db.create_instance(child, logic1, "logic_1_inst").unwrap();
    db.connect_upper_net(db.inst_port_bit(tie, "Y", None).unwrap(), lower).unwrap();
    db.set_net_name(lower, "edit").unwrap();

    // the edited net seen through c1.
    let eq = db.net_equipotential(&c1_path, lower).unwrap();
    assert_eq!(names(&db, &eq.leaf_drivers), vec!["c1/logic_1_inst:Y"]);
    assert_eq!(names(&db, &eq.leaf_readers), vec!["c1/g:B", "c1/k:A"]);
    assert!(eq.top_drivers.is_empty());
    db.check_single_driver(&eq).unwrap();

    // the model is shared, so c2 sees the same edit.
    let c2_path = db.path_from_names(top, ["c2"]).unwrap();
    let eq = db.net_equipotential(&c2_path, lower).unwrap();
    assert_eq!(names(&db, &eq.leaf_drivers), vec!["c2/logic_1_inst:Y"]);

    // from the top, `a` no longer reaches into c1.
    let a = db.find_net(top, "a").unwrap();
    let eq = db.net_equipotential(&root, a).unwrap();
    assert_eq!(names(&db, &eq.leaf_readers), vec!["c2/g:A"]);
    assert_eq!(names(&db, &eq.top_drivers), vec!["a"]);

    // `m` still crosses down into c1 through k.
    let m = db.find_net(top, "m").unwrap();
    let eq = db.net_equipotential(&root, m).unwrap();
    assert_eq!(names(&db, &eq.leaf_drivers), vec!["c1/k:Y"]);
    assert!(db.validate_drivers(top).unwrap().is_empty());

    let text = db.dump_verilog(top).unwrap();
    println!("{}", text);
    assert!(text.find("module child").unwrap() < text.find("module top").unwrap());
    assert!(text.contains("LOGIC1 logic_1_inst(.Y(edit));"));
    assert!(text.contains("INV k(.A(edit), .Y(o));"));
}

#[test]
fn dump_unreachable_designs() {
    clilog::init_stdout_simple_trace();
    let (mut db, top, child) = load_hier();
    let work = db.library("work").unwrap();
    let spare = db.create_hierarchical(work, "spare", [
        PortDecl::scalar("x", Direction::Input),
    ]).unwrap();
    db.create_instance(spare, child, "s1").unwrap();

    let text = db.dump_verilog(top).unwrap();
    assert!(!text.contains("module spare"));
    let text = db.dump_verilog_with(top, &DumpOptions { all_designs: true }).unwrap();
    assert!(text.contains("module spare"));
    assert_eq!(text.matches("module child").count(), 1);

    // a design never instantiated is its own root.
    let x = db.port_bit(spare, "x", None).unwrap();
    let eq = db.equipotential(&TermOccurrence::new(InstancePath::root(spare), x)).unwrap();
    assert_eq!(names(&db, &eq.top_drivers), vec!["x"]);
    assert!(eq.nets.is_empty());
}
