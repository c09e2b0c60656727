use hierdb::*;
use std::env;

/// A tiny cell library covering the usual test netlists.
fn cells(db: &mut NetlistDB) -> Result<()> {
    let lib = db.create_library("cells", LibraryKind::Primitives)?;
    for (name, inputs) in [
        ("BUF", &["A"][..]), ("INV", &["A"][..]),
        ("AND2", &["A", "B"][..]), ("OR2", &["A", "B"][..]),
        ("NAND2", &["A", "B"][..]), ("NOR2", &["A", "B"][..]),
        ("LOGIC0", &[][..]), ("LOGIC1", &[][..]),
    ] {
        let ports = inputs.iter()
            .map(|p| PortDecl::scalar(*p, Direction::Input))
            .chain([PortDecl::scalar("Y", Direction::Output)]);
        db.create_primitive(lib, name, ports)?;
    }
    Ok(())
}

fn main() {
    clilog::init_stderr_color_debug();
    clilog::enable_timer("hierdb");
    let args: Vec<String> = env::args().collect();
    assert!(args.len() == 4 || args.len() == 5,
            "Usage: {} <verilog_path> <input_port> <bit> [<top_module>]", args[0]);
    let bit: isize = args[3].parse().expect("bit index must be an integer");

    let mut db = NetlistDB::new();
    cells(&mut db).expect("Error creating the cell library");
    let top = db.load_sverilog_file(&args[1], &LoadOptions {
        top: args.get(4).map(|x| x.as_ref()),
        ..Default::default()
    }).expect("Error loading the verilog into the database");

    // tie the port bit's fan-out to constant 1.
    let port = db.port_bit(top, &args[2], Some(bit))
        .or_else(|_| db.port_bit(top, &args[2], None))
        .expect("Port bit not found");
    let net = db.disconnect_lower_net(port).unwrap()
        .expect("The port bit is not connected");
    let logic1 = db.find_model("LOGIC1").unwrap();
    let tie = db.create_instance(top, logic1, "logic_1_inst").unwrap();
    db.connect_upper_net(db.inst_port_bit(tie, "Y", None).unwrap(), net).unwrap();
    db.set_net_name(net, "edit").expect("Net name edit is taken");

    let eq = db.net_equipotential(&InstancePath::root(top), net).unwrap();
    println!("// drivers of edit: {}", eq.drivers()
             .map(|d| db.occurrence_name(d).unwrap())
             .collect::<Vec<_>>().join(", "));
    println!("// readers of edit: {}", eq.readers()
             .map(|d| db.occurrence_name(d).unwrap())
             .collect::<Vec<_>>().join(", "));
    for issue in db.validate_drivers(top).unwrap() {
        println!("// {}", issue);
    }
    print!("{}", db.dump_verilog(top).unwrap());
}
