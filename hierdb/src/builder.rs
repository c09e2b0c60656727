//! Building hierarchical designs from structural verilog.

use std::path::Path;
use std::collections::HashSet;
use sverilogparse::*;
use crate::*;
use crate::utils::*;
use crate::disjoint_set::DisjointSet;

/// Options of the verilog loader.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions<'a> {
    /// The top module. If not given, it is guessed as the only
    /// module not instantiated by any other.
    pub top: Option<&'a str>,
    /// The design library the modules are built into. It is
    /// created if it does not exist yet.
    pub library: &'a str,
}

impl Default for LoadOptions<'_> {
    fn default() -> Self {
        LoadOptions { top: None, library: "work" }
    }
}

/// Loader nodes of one module: one per named bit, plus one per
/// literal bit.
struct Nodes<'i> {
    named: HashMap<(&'i CompactString, Option<isize>), usize>,
    names: Vec<Option<(&'i CompactString, Option<isize>)>>,
    sets: DisjointSet,
}

impl<'i> Nodes<'i> {
    fn get(&mut self, name: &'i CompactString, idx: Option<isize>) -> usize {
        if let Some(&id) = self.named.get(&(name, idx)) {
            return id
        }
        let id = self.names.len();
        self.named.insert((name, idx), id);
        self.names.push(Some((name, idx)));
        id
    }

    /// A node tied to a literal bit, or `None` for `z`.
    fn literal(&mut self, c: u8) -> Option<usize> {
        let v = match c {
            0 => false,
            1 => true,
            2 => {
                clilog::warn!(HD_SV_LIT, "X literal unsupported, treating as 0");
                false
            }
            _ => return None
        };
        let id = self.names.len();
        self.names.push(None);
        self.sets.set_value(id, v);
        Some(id)
    }

    fn of_bit(&mut self, bit: ExprBit<'i>) -> Option<usize> {
        match bit {
            ExprBit::Const(c) => self.literal(c),
            ExprBit::Var(name, idx) => Some(self.get(name, idx)),
        }
    }
}

fn def_direction(mm: &ModuleMap, def: &CompactString) -> Option<Direction> {
    match mm.def_types.get(def)? {
        WireDefType::Input => Some(Direction::Input),
        WireDefType::Output => Some(Direction::Output),
        WireDefType::InOut => Some(Direction::InOut),
        WireDefType::Wire => None,
    }
}

/// Direction of a port declared as `.p(expr)`, taken from the io
/// defs it refers to. They must all agree.
fn conn_direction(
    module: &CompactString, pname: &CompactString, expr: &Wirexpr, mm: &ModuleMap
) -> Result<Option<Direction>> {
    let mut direction = None;
    for eb in mm.eval_expr(expr) {
        let ExprBit::Var(def, _) = eb else {
            clilog::error!(HD_SV_PORT, "literal in named port .{}() of {}", pname, module);
            return Err(HierError::Parse(format!(
                "literal in named port {} of module {}", pname, module)))
        };
        let Some(dir) = def_direction(mm, def) else { return Ok(None) };
        match direction {
            Some(d) if d != dir => {
                clilog::error!(HD_SV_PORT, "named port .{}() of {} mixes {:?} and {:?} bits",
                               pname, module, d, dir);
                return Err(HierError::Parse(format!(
                    "named port {} of module {} mixes directions", pname, module)))
            }
            _ => direction = Some(dir),
        }
    }
    Ok(direction)
}

impl NetlistDB {
    /// Build one hierarchical design from a parsed module.
    /// All modules it instantiates must be built already.
    fn build_design(
        &mut self, lib: LibraryId, name: &CompactString,
        (m, mm): &(SVerilogModule, ModuleMap),
        modules: &Modules
    ) -> Result<DesignId> {
        // ports are declared by name, with directions from defs.
        let mut decls = Vec::with_capacity(m.ports.len());
        for port in &m.ports {
            let (pname, direction) = match port {
                SVerilogPortDef::Basic(pname) => (pname, def_direction(mm, pname)),
                SVerilogPortDef::Conn(pname, expr) =>
                    (pname, conn_direction(name, pname, expr, mm)?),
            };
            let Some(direction) = direction else {
                clilog::error!(HD_SV_PORT, "port {} of {} has no direction", pname, name);
                return Err(HierError::Parse(format!(
                    "port {} of module {} has no direction", pname, name)))
            };
            decls.push(PortDecl {
                name: pname.clone(),
                direction,
                range: mm.port_widths.get(pname).map(|r| BusRange::from(*r)),
            });
        }
        let design = self.create_hierarchical(lib, name.clone(), decls)?;

        let mut nodes = Nodes {
            named: HashMap::new(),
            names: Vec::new(),
            sets: DisjointSet::with_capacity(m.defs.len()),
        };
        for def in &m.defs {
            for w in enum_in_width(def.width) {
                nodes.get(&def.name, w);
            }
        }

        let mut design_terms = Vec::new();
        for port in &m.ports {
            match port {
                SVerilogPortDef::Basic(pname) => {
                    let w = mm.def_widths.get(pname).copied();
                    let bits = self.port(design, pname)?.bits();
                    for (bit, idx) in bits.zip(enum_in_width(w)) {
                        design_terms.push((DesignTerm { design, bit }, nodes.get(pname, idx)));
                    }
                }
                // the port bits sit on the wires of the expression.
                SVerilogPortDef::Conn(pname, expr) => {
                    let bits = self.port(design, pname)?.bits();
                    for (bit, eb) in bits.zip(mm.eval_expr(expr)) {
                        if let Some(node) = nodes.of_bit(eb) {
                            design_terms.push((DesignTerm { design, bit }, node));
                        }
                    }
                }
            }
        }

        // instances, with their pin bits connected to nodes.
        let mut inst_terms = Vec::new();
        for cell in &m.cells {
            let model = match modules.contains_key(&cell.macro_name) {
                true => self.get_model(lib, &cell.macro_name)?,
                false => self.find_model(&cell.macro_name).map_err(|e| {
                    clilog::error!(HD_SV_MODEL, "model {} of {}/{} not found",
                                   cell.macro_name, name, cell.cell_name);
                    e
                })?,
            };
            let inst = self.create_instance(design, model, cell.cell_name.clone())?;
            for (pin, expr) in &cell.ioports {
                let bits = self.port(model, pin)?.bits();
                let len = mm.eval_expr_len(expr);
                if len != bits.len() {
                    clilog::warn!(HD_SV_WIDTH,
                                  "width mismatch on {}/{}.{}: port has {} bits, connected to {}",
                                  name, cell.cell_name, pin, bits.len(), len);
                }
                for (bit, eb) in bits.zip(mm.eval_expr(expr)) {
                    if let Some(node) = nodes.of_bit(eb) {
                        inst_terms.push((InstTerm { inst, bit }, node));
                    }
                }
            }
        }

        for assign in &m.assigns {
            let len_lhs = mm.eval_expr_len(&assign.lhs);
            let len_rhs = mm.eval_expr_len(&assign.rhs);
            if len_lhs != len_rhs {
                clilog::error!(HD_SV_ASSIGN,
                               "incompatible assign width for `{}`: \
                                len(LHS) = {}, len(RHS) = {}",
                               assign, len_lhs, len_rhs);
                return Err(HierError::Parse(format!(
                    "incompatible assign width in module {}: {}", name, assign)))
            }
            for (lb, rb) in mm.eval_expr(&assign.lhs).zip(mm.eval_expr(&assign.rhs)) {
                // a `z` on either side leaves the other side alone.
                if let (Some(l), Some(r)) = (nodes.of_bit(lb), nodes.of_bit(rb)) {
                    nodes.sets.merge(l, r);
                }
            }
        }

        let num_nodes = nodes.names.len();
        let Nodes { names, sets, .. } = nodes;
        let sets = sets.finalize(num_nodes)?;

        // name each set: port names first, then the smallest name.
        let port_names = m.ports.iter()
            .filter_map(|p| match p {
                SVerilogPortDef::Basic(n) => Some(n),
                SVerilogPortDef::Conn(..) => None,
            })
            .collect::<HashSet<_>>();
        let mut set_names: Vec<Option<(bool, &CompactString, Option<isize>)>> =
            vec![None; sets.num_sets];
        for (node, name) in names.iter().enumerate() {
            let Some((n, idx)) = *name else { continue };
            let cand = (!port_names.contains(n), n, idx);
            let best = &mut set_names[sets.set_of[node]];
            if best.map_or(true, |b| cand < b) {
                *best = Some(cand);
            }
        }
        let mut set_nets = Vec::with_capacity(sets.num_sets);
        for (set, best) in set_names.iter().enumerate() {
            let net = match best {
                Some((_, n, idx)) => self.create_net(
                    design, NetName { name: (*n).clone(), bit: *idx })?,
                None => self.create_anonymous_net(design)?,
            };
            self.set_net_type(net, sets.net_type(set))?;
            set_nets.push(net);
        }
        // declared ranges of the buses that kept bit nets.
        for def in &m.defs {
            let Some(r) = def.width else { continue };
            let d = self.design_mut(design);
            if d.net_bases.get(&def.name).map_or(false, |b| b.bus) {
                d.bus_ranges.insert(def.name.clone(), r.into());
            }
        }

        for (dt, node) in design_terms {
            self.connect(dt, set_nets[sets.set_of[node]])?;
        }
        for (it, node) in inst_terms {
            self.connect(it, set_nets[sets.set_of[node]])?;
        }
        clilog::debug!(HD_SV_DESIGN, "built design {} with {} nets and {} instances",
                       name, set_nets.len(), m.cells.len());
        Ok(design)
    }

    fn build_designs(&mut self, sverilog: SVerilog, options: &LoadOptions) -> Result<DesignId> {
        let SVerilog { modules } = sverilog;
        let modules = modules.into_iter()
            .map(|(name, m)| -> Result<_> {
                let mm = ModuleMap::from(&name, &m)?;
                Ok((name, (m, mm)))
            })
            .collect::<Result<Modules>>()?;
        let top = find_top_module(&modules, options.top)?;
        let order = module_order(&modules)?;

        let lib = match self.library(options.library) {
            Ok(lib) if self.library_kind(lib) == LibraryKind::Designs => lib,
            Ok(_) => return Err(HierError::TypeMismatch(format!(
                "library {} does not hold hierarchical designs", options.library))),
            Err(_) => self.create_library(options.library, LibraryKind::Designs)?,
        };
        let time_build_designs = clilog::stimer!("build_designs");
        for name in order {
            self.build_design(lib, name, &modules[name], &modules)?;
        }
        clilog::finish!(time_build_designs);

        let top = self.get_model(lib, top)?;
        self.set_top_design(top);
        clilog::info!(HD_SV_LOADED, "loaded {} modules into {}, top is {}",
                      modules.len(), options.library, self.design_name(top));
        Ok(top)
    }

    /// Build designs from a parsed structural verilog object, and
    /// set the top design.
    ///
    /// Cells whose name is not a module of the source must name an
    /// existing primitive design. If anything fails, the database
    /// is left as it was.
    pub fn load_sverilog(
        &mut self, sverilog: SVerilog, options: &LoadOptions
    ) -> Result<DesignId> {
        let mut staged = self.clone();
        let top = staged.build_designs(sverilog, options)?;
        *self = staged;
        Ok(top)
    }

    /// Parse structural verilog source code and load it.
    pub fn load_sverilog_source(
        &mut self, source: &str, options: &LoadOptions
    ) -> Result<DesignId> {
        let sverilog = SVerilog::parse_str(source).map_err(|e| {
            clilog::error!(HD_SV_PARSE, "verilog parse error: {}", e);
            HierError::Parse(e)
        })?;
        self.load_sverilog(sverilog, options)
    }

    /// Read, parse and load a structural verilog file.
    pub fn load_sverilog_file(
        &mut self, path: impl AsRef<Path>, options: &LoadOptions
    ) -> Result<DesignId> {
        let source = std::fs::read_to_string(path)?;
        self.load_sverilog_source(&source, options)
    }
}

#[cfg(test)]
fn cells_db() -> NetlistDB {
    let mut db = NetlistDB::new();
    let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
    for (name, inputs) in [("INV", &["A"][..]), ("AND2", &["A", "B"][..])] {
        let ports = inputs.iter()
            .map(|p| PortDecl::scalar(*p, Direction::Input))
            .chain([PortDecl::scalar("Y", Direction::Output)]);
        db.create_primitive(cells, name, ports).unwrap();
    }
    db
}

#[test]
fn test_load_assigns_and_literals() {
    clilog::init_stdout_simple_trace();
    let mut db = cells_db();
    let top = db.load_sverilog_source(r#"
module top(a, y, z);
  input [1:0] a;
  output y;
  output [1:0] z;
  wire n, m;
  assign m = n;
  AND2 u1(.A(a[1]), .B(1'b1), .Y(n));
  INV u2(.A(m), .Y(y));
  assign z = {1'b0, a[0]};
endmodule
"#, &LoadOptions::default()).unwrap();
    assert_eq!(db.top_design().unwrap(), top);
    assert_eq!(db.design_library(top), db.library("work").unwrap());

    // m and n are merged, named by the smaller name.
    let m = db.find_net(top, "m").unwrap();
    assert!(db.find_net(top, "n").is_err());
    assert_eq!(db.net_inst_terms(m).unwrap().count(), 2);

    // port names win over other names.
    let a0 = db.find_net(top, ("a", 0)).unwrap();
    let z0 = db.port_bit(top, "z", Some(0)).unwrap();
    assert_eq!(db.get_net(z0).unwrap(), Some(a0));

    let z1 = db.get_net(db.port_bit(top, "z", Some(1)).unwrap()).unwrap().unwrap();
    assert_eq!(db.net_type(z1).unwrap(), NetType::Assign0);
    let u1 = db.child_instance(top, "u1").unwrap();
    let b = db.get_net(db.inst_port_bit(u1, "B", None).unwrap()).unwrap().unwrap();
    assert_eq!(db.net_type(b).unwrap(), NetType::Assign1);
    assert_eq!(db.net_name(b).unwrap(), None);
}

#[test]
fn test_load_failures_leave_db_unchanged() {
    let mut db = cells_db();
    let err = db.load_sverilog_source(r#"
module top(a, y);
  input a;
  output y;
  NAND9 u1(.A(a), .Y(y));
endmodule
"#, &LoadOptions::default());
    assert!(matches!(err, Err(HierError::NotFound { .. })));
    assert!(db.library("work").is_err());
    assert!(db.top_design().is_err());

    assert!(matches!(db.load_sverilog_source("module broken(", &LoadOptions::default()),
                     Err(HierError::Parse(_))));
    assert!(matches!(db.load_sverilog_source(r#"
module top(a);
  wire a;
endmodule
"#, &LoadOptions::default()), Err(HierError::Parse(_))));
    assert!(matches!(db.load_sverilog_source(r#"
module top(a);
  input a;
  top t(.a(a));
endmodule
"#, &LoadOptions { top: Some("top"), ..Default::default() }),
                     Err(HierError::TypeMismatch(_))));
}

#[test]
fn test_load_named_ports() {
    clilog::init_stdout_simple_trace();
    let mut db = cells_db();
    let top = db.load_sverilog_source(r#"
module top(.d({p, q}), y);
  input p, q;
  output y;
  AND2 u1(.A(p), .B(q), .Y(y));
endmodule
"#, &LoadOptions::default()).unwrap();
    let d1 = db.port_bit(top, "d", Some(1)).unwrap();
    let d0 = db.port_bit(top, "d", Some(0)).unwrap();
    assert_eq!(db.port_bits(top, "d").unwrap().count(), 2);
    assert_eq!(db.term_direction(d1).unwrap(), Direction::Input);
    let p = db.find_net(top, "p").unwrap();
    assert_eq!(db.get_net(d1).unwrap(), Some(p));
    assert_eq!(db.get_net(d0).unwrap(), Some(db.find_net(top, "q").unwrap()));
    let u1 = db.child_instance(top, "u1").unwrap();
    assert_eq!(db.get_net(db.inst_port_bit(u1, "A", None).unwrap()).unwrap(), Some(p));

    // dumped as a plain vector port feeding the inner wires.
    let text = db.dump_verilog(top).unwrap();
    assert!(text.contains("input [1:0] d;"));
    assert!(text.contains("assign p = d[1];"));
    let mut db2 = cells_db();
    let top2 = db2.load_sverilog_source(&text, &LoadOptions::default()).unwrap();
    let u1 = db2.child_instance(top2, "u1").unwrap();
    let a = db2.get_net(db2.inst_port_bit(u1, "A", None).unwrap()).unwrap();
    assert_eq!(db2.get_net(db2.port_bit(top2, "d", Some(1)).unwrap()).unwrap(), a);
    assert_eq!(db2.net_name(a.unwrap()).unwrap(), Some(&NetName::bit("d", 1)));

    let mut db = cells_db();
    assert!(matches!(db.load_sverilog_source(r#"
module top(.d({p, y}), y);
  input p;
  output y;
endmodule
"#, &LoadOptions::default()), Err(HierError::Parse(_))));
    assert!(matches!(db.load_sverilog_source(r#"
module top(.d({p, 1'b0}));
  input p;
endmodule
"#, &LoadOptions::default()), Err(HierError::Parse(_))));
    assert!(matches!(db.load_sverilog_source(r#"
module top(.d(w));
  wire w;
endmodule
"#, &LoadOptions::default()), Err(HierError::Parse(_))));
}
