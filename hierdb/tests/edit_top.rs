use hierdb::*;

mod common;
use common::*;

#[test]
fn edit_constant_in_top() {
    clilog::init_stdout_simple_trace();

    let mut db = cells_db();
    let top = db.load_sverilog_file(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/top.v"),
        &LoadOptions::default()
    ).unwrap();
    let root = InstancePath::root(top);

    let a2 = db.port_bit(top, "a", Some(2)).unwrap();
    let net = db.lower_net(a2).unwrap().unwrap();
    let eq = db.net_equipotential(&root, net).unwrap();
    assert_eq!(names(&db, &eq.top_drivers), vec!["a[2]"]);
    let fanout = names(&db, &eq.leaf_readers);
    assert_eq!(fanout, vec!["u1:B", "u3:A"]);

    assert_eq!(db.disconnect_lower_net(a2).unwrap(), Some(net));
    assert_eq!(db.lower_net(a2).unwrap(), None);
    assert_eq!(db.get_net(a2).unwrap(), None);
    assert_eq!(db.disconnect_lower_net(a2).unwrap(), None);
    let eq = db.net_equipotential(&root, net).unwrap();
    assert!(eq.is_undriven());

    let logic1 = db.find_model("LOGIC1").unwrap();
    let tie = db.create_instance(top, logic1, "logic_1_inst").unwrap();
    let tie_y = db.inst_port_bit(tie, "Y", None).unwrap();
    db.connect_upper_net(tie_y, net).unwrap();

    let eq = db.net_equipotential(&root, net).unwrap();
    assert_eq!(eq.driver_count(), 1);
    assert_eq!(eq.leaf_drivers[0].term, Term::Instance(tie_y));
    assert!(eq.top_drivers.is_empty());
    assert_eq!(names(&db, &eq.leaf_readers), fanout);
    db.check_single_driver(&eq).unwrap();

    db.set_net_name(net, "edit").unwrap();
    assert_eq!(db.find_net(top, "edit").unwrap(), net);
    assert!(db.find_net(top, ("a", 2)).is_err());

    let text = db.dump_verilog(top).unwrap();
    println!("{}", text);
    assert!(text.contains(".B(edit)"));
    assert!(text.contains(".A(edit)"));
    assert!(text.contains("logic_1_inst(.Y(edit))"));

    // the dump describes the same connectivity.
    let mut db2 = cells_db();
    let top2 = db2.load_sverilog_source(&text, &LoadOptions::default()).unwrap();
    let edit = db2.find_net(top2, "edit").unwrap();
    let eq = db2.net_equipotential(&InstancePath::root(top2), edit).unwrap();
    assert_eq!(names(&db2, &eq.leaf_drivers), vec!["logic_1_inst:Y"]);
    assert_eq!(names(&db2, &eq.leaf_readers), fanout);
    assert!(db2.validate_drivers(top2).unwrap().is_empty());
}

#[test]
fn dump_round_trip_keeps_buses() {
    clilog::init_stdout_simple_trace();

    let mut db = cells_db();
    let top = db.load_sverilog_source(r#"
module top(a, y);
  input [3:0] a;
  output y;
  wire [1:0] s;
  wire t;
  AND2 u1(.A(a[3]), .B(a[2]), .Y(s[1]));
  AND2 u2(.A(a[1]), .B(a[0]), .Y(s[0]));
  OR2 u3(.A(s[1]), .B(s[0]), .Y(t));
  assign y = t;
endmodule
"#, &LoadOptions::default()).unwrap();
    let text = db.dump_verilog(top).unwrap();
    println!("{}", text);
    assert!(text.contains("wire [1:0] s;"));
    // `t` is merged into the output port and named after it.
    assert!(!text.contains("wire t;"));
    assert!(text.contains("OR2 u3(.A(s[1]), .B(s[0]), .Y(y));"));

    let mut db2 = cells_db();
    let top2 = db2.load_sverilog_source(&text, &LoadOptions::default()).unwrap();
    assert_eq!(db2.dump_verilog(top2).unwrap(), text);
    let s = db2.bus_net_bits(top2, "s").unwrap();
    assert_eq!(db2.collapse_nets(&s).unwrap().unwrap().to_string(), "s[1:0]");
}

#[test]
fn scalar_and_bus_names_stay_apart() {
    clilog::init_stdout_simple_trace();

    let mut db = cells_db();
    let top = db.load_sverilog_source(r#"
module top(a, y);
  input [3:0] a;
  output y;
  wire [1:0] s;
  wire t;
  AND2 u1(.A(a[3]), .B(a[2]), .Y(s[1]));
  AND2 u2(.A(a[1]), .B(a[0]), .Y(s[0]));
  OR2 u3(.A(s[1]), .B(s[0]), .Y(t));
  INV u4(.A(t), .Y(y));
endmodule
"#, &LoadOptions::default()).unwrap();
    let t = db.find_net(top, "t").unwrap();
    assert!(matches!(db.set_net_name(t, "s"), Err(HierError::DuplicateName { .. })));
    assert!(matches!(db.set_net_name(t, ("s", 1)), Err(HierError::DuplicateName { .. })));
    assert!(matches!(db.set_net_name(t, ("a", 7)), Err(HierError::IndexOutOfRange { .. })));
    assert!(matches!(db.create_net(top, "s"), Err(HierError::DuplicateName { .. })));
    assert!(matches!(db.create_bus_net(top, "t", BusRange::new(1, 0)),
                     Err(HierError::DuplicateName { .. })));
    assert_eq!(db.net_name(t).unwrap(), Some(&NetName::scalar("t")));

    // the dump still reloads with one driver per net.
    let text = db.dump_verilog(top).unwrap();
    let mut db2 = cells_db();
    let top2 = db2.load_sverilog_source(&text, &LoadOptions::default()).unwrap();
    assert!(db2.validate_drivers(top2).unwrap().is_empty());
    assert_eq!(db2.nets(top2).count(), db.nets(top).count());
}
