//! Dumping hierarchical designs back to structural verilog.
//!
//! The dump is built as a [`SVerilog`] object and printed through
//! its `Display` implementation, so it can be parsed again by
//! [`NetlistDB::load_sverilog_source`].

use std::path::Path;
use std::collections::HashSet;
use indexmap::IndexMap;
use compact_str::format_compact;
use sverilogparse::*;
use crate::*;

/// Options of the verilog writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOptions {
    /// Also dump hierarchical designs that are not reachable from
    /// the top design, after the reachable ones.
    pub all_designs: bool,
}

#[inline]
fn sv_range(r: BusRange) -> SVerilogRange {
    SVerilogRange(r.left, r.right)
}

#[inline]
fn sv_literal(v: bool) -> WirexprBasic {
    WirexprBasic::Literal(1, v as u128, 0)
}

/// The `1'bz` literal.
#[inline]
fn sv_floating() -> WirexprBasic {
    WirexprBasic::Literal(1, 1, 1)
}

fn sv_concat(mut bits: Vec<WirexprBasic>) -> Wirexpr {
    match bits.len() {
        1 => Wirexpr::Basic(bits.swap_remove(0)),
        _ => Wirexpr::Concat(bits),
    }
}

impl NetlistDB {
    /// Hierarchical designs below (and including) `top`, every one
    /// after all the designs it instantiates.
    fn designs_postorder(&self, top: DesignId) -> Result<Vec<DesignId>> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut stack = vec![(top, false)];
        while let Some((d, expanded)) = stack.pop() {
            if expanded {
                if done.insert(d) {
                    order.push(d);
                }
                continue
            }
            if done.contains(&d) || self.is_primitive(d) {
                continue
            }
            stack.push((d, true));
            for inst in self.child_instances(d)?.collect::<Vec<_>>().into_iter().rev() {
                let model = self.instance_model(inst)?;
                if !done.contains(&model) {
                    stack.push((model, false));
                }
            }
        }
        Ok(order)
    }

    /// Name of a net in dumps, or `None` if it is dumped anonymous.
    ///
    /// A net named after a port bit it is not attached to would be
    /// merged with that port on reload, so it loses its name.
    fn dump_name(&self, net: NetId) -> Result<Option<&NetName>> {
        let n = self.net(net)?;
        let Some(name) = n.name.as_ref() else { return Ok(None) };
        if self.design(n.design).port_names.contains_key(&name.name) {
            let attached = self.port_bit(n.design, &name.name, name.bit)
                .map(|t| self.design(n.design).bit_nets[t.bit] == Some(net))
                .unwrap_or(false);
            if !attached {
                return Ok(None)
            }
        }
        Ok(Some(name))
    }

    /// Name used for an anonymous net in dumps, `$net<id>` with a
    /// `_<k>` suffix if a net or port of the design already has it.
    fn anonymous_name(&self, net: NetId) -> Result<CompactString> {
        let d = self.design(self.net(net)?.design);
        let taken = |name: &CompactString| {
            d.net_bases.contains_key(name) || d.port_names.contains_key(name)
        };
        let mut name = format_compact!("$net{}", net.0);
        let mut k = 0;
        while taken(&name) {
            k += 1;
            name = format_compact!("$net{}_{}", net.0, k);
        }
        Ok(name)
    }

    /// The expression referring to one bit net.
    fn net_wirexpr(&self, net: NetId) -> Result<WirexprBasic> {
        Ok(match (self.dump_name(net)?, self.net(net)?.typ.constant_value()) {
            (Some(NetName { name, bit: None }), _) => WirexprBasic::Full(name.clone()),
            (Some(NetName { name, bit: Some(i) }), _) => WirexprBasic::SingleBit(name.clone(), *i),
            (None, Some(v)) => sv_literal(v),
            (None, None) => WirexprBasic::Full(self.anonymous_name(net)?),
        })
    }

    /// Wire declarations of all nets not named after a port.
    fn wire_defs(&self, design: DesignId) -> Result<Vec<SVerilogWireDef>> {
        let d = self.design(design);
        // base name to the (min, max) bus index, `None` for scalars.
        let mut bases = IndexMap::<CompactString, Option<(isize, isize)>>::new();
        for net in self.nets(design) {
            let (name, bit) = match self.dump_name(net)? {
                Some(NetName { name, bit }) => (name.clone(), *bit),
                None if self.net(net)?.typ.is_constant() => continue,
                None => (self.anonymous_name(net)?, None),
            };
            if d.port_names.contains_key(&name) {
                continue
            }
            let entry = bases.entry(name).or_insert(None);
            if let Some(b) = bit {
                *entry = Some(match *entry {
                    None => (b, b),
                    Some((lo, hi)) => (lo.min(b), hi.max(b)),
                });
            }
        }
        Ok(bases.into_iter().map(|(name, span)| {
            let width = span.map(|(lo, hi)| match d.bus_ranges.get(&name) {
                Some(r) if r.contains(lo) && r.contains(hi) => sv_range(*r),
                _ => SVerilogRange(hi, lo),
            });
            SVerilogWireDef { name, width, typ: WireDefType::Wire }
        }).collect())
    }

    /// The connection expression of one instance port, or `None`
    /// if no bit of it is connected.
    fn pin_wirexpr(&self, inst: InstanceId, port: &Port) -> Result<Option<Wirexpr>> {
        let nets = self.inst_port_bits(inst, &port.name)?
            .map(|t| self.get_net(t))
            .collect::<Result<Vec<_>>>()?;
        if nets.iter().all(Option::is_none) {
            return Ok(None)
        }
        if port.range.is_some() && nets.iter().all(Option::is_some) {
            let nets = nets.iter().flatten().copied().collect::<Vec<_>>();
            let mut named = true;
            for &n in &nets {
                named &= self.dump_name(n)?.is_some();
            }
            if let (true, Some(BusRef { name, range: Some(r) })) =
                (named, self.collapse_nets(&nets)?)
            {
                return Ok(Some(Wirexpr::Basic(match r.len() {
                    1 => WirexprBasic::SingleBit(name, r.left),
                    _ => WirexprBasic::Slice(name, sv_range(r)),
                })))
            }
        }
        let bits = nets.into_iter()
            .map(|n| match n {
                Some(n) => self.net_wirexpr(n),
                None => Ok(sv_floating()),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(sv_concat(bits)))
    }

    fn design_module(&self, design: DesignId) -> Result<SVerilogModule> {
        let d = self.design(design);
        let ports = d.ports.iter()
            .map(|p| SVerilogPortDef::Basic(p.name.clone()))
            .collect();
        let mut defs = d.ports.iter()
            .map(|p| SVerilogWireDef {
                name: p.name.clone(),
                width: p.range.map(sv_range),
                typ: match p.direction {
                    Direction::Input => WireDefType::Input,
                    Direction::Output => WireDefType::Output,
                    Direction::InOut => WireDefType::InOut,
                },
            })
            .collect::<Vec<_>>();
        defs.extend(self.wire_defs(design)?);

        // ports attached to nets of other names.
        let mut assigns = Vec::new();
        for bit in 0..d.num_bits() {
            let Some(net) = d.bit_nets[bit] else { continue };
            let term = self.term_bus_bit(DesignTerm { design, bit })?;
            let constant = self.net(net)?.typ.is_constant();
            if self.dump_name(net)?.map_or(false, |nn| nn.name == term.name && nn.bit == term.index) {
                continue
            }
            let port_expr = Wirexpr::Basic(match term.index {
                None => WirexprBasic::Full(term.name),
                Some(i) => WirexprBasic::SingleBit(term.name, i),
            });
            let net_expr = Wirexpr::Basic(self.net_wirexpr(net)?);
            let from_outside = d.bit_direction(bit) == Direction::Input && !constant;
            assigns.push(match from_outside {
                true => SVerilogAssign { lhs: net_expr, rhs: port_expr },
                false => SVerilogAssign { lhs: port_expr, rhs: net_expr },
            });
        }
        // named constant nets.
        for net in self.nets(design) {
            let value = self.net(net)?.typ.constant_value();
            if let (Some(_), Some(v)) = (self.dump_name(net)?, value) {
                assigns.push(SVerilogAssign {
                    lhs: Wirexpr::Basic(self.net_wirexpr(net)?),
                    rhs: Wirexpr::Basic(sv_literal(v)),
                });
            }
        }

        let mut cells = Vec::with_capacity(d.instances.len());
        for (name, &inst) in &d.instances {
            let model = self.design(self.instance(inst)?.model);
            let mut ioports = Vec::with_capacity(model.ports.len());
            for port in &model.ports {
                if let Some(expr) = self.pin_wirexpr(inst, port)? {
                    ioports.push((port.name.clone(), expr));
                }
            }
            cells.push(SVerilogCell {
                macro_name: model.name.clone(),
                cell_name: name.clone(),
                ioports,
            });
        }
        Ok(SVerilogModule { ports, defs, assigns, cells })
    }

    /// Dump the top design and every hierarchical design below it as
    /// structural verilog, children first.
    pub fn dump_verilog(&self, top: DesignId) -> Result<String> {
        self.dump_verilog_with(top, &DumpOptions::default())
    }

    pub fn dump_verilog_with(&self, top: DesignId, options: &DumpOptions) -> Result<String> {
        let time_dump = clilog::stimer!("dump_verilog");
        let mut designs = self.designs_postorder(top)?;
        if options.all_designs {
            let reachable = designs.iter().copied().collect::<HashSet<_>>();
            let rest = self.libraries()
                .flat_map(|lib| self.library_designs(lib))
                .filter(|d| !self.is_primitive(*d) && !reachable.contains(d))
                .collect::<Vec<_>>();
            for d in rest {
                for sub in self.designs_postorder(d)? {
                    if !designs.contains(&sub) {
                        designs.push(sub);
                    }
                }
            }
        }
        let modules = designs.iter()
            .map(|&d| Ok((self.design(d).name.clone(), self.design_module(d)?)))
            .collect::<Result<Vec<_>>>()?;
        let text = SVerilog { modules }.to_string();
        clilog::finish!(time_dump);
        clilog::info!(HD_SV_DUMP, "dumped {} modules below {}",
                      designs.len(), self.design(top).name);
        Ok(text)
    }

    /// Dump as in [`NetlistDB::dump_verilog`] into a file.
    pub fn write_verilog(&self, top: DesignId, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.dump_verilog(top)?)?;
        Ok(())
    }
}

#[test]
fn test_anonymous_names_avoid_named_nets() {
    let mut db = NetlistDB::new();
    let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
    let inv = db.create_primitive(cells, "INV", [
        PortDecl::scalar("A", Direction::Input),
        PortDecl::scalar("Y", Direction::Output),
    ]).unwrap();
    let work = db.create_library("work", LibraryKind::Designs).unwrap();
    let top = db.create_hierarchical(work, "top", [
        PortDecl::scalar("a", Direction::Input),
        PortDecl::scalar("y", Direction::Output),
    ]).unwrap();
    let u1 = db.create_instance(top, inv, "u1").unwrap();
    let u2 = db.create_instance(top, inv, "u2").unwrap();
    let a = db.create_net(top, "a").unwrap();
    let anon = db.create_anonymous_net(top).unwrap();
    let named = db.create_net(top, format!("$net{}", anon.0).as_str()).unwrap();
    db.connect(db.port_bit(top, "a", None).unwrap(), a).unwrap();
    db.connect(db.inst_port_bit(u1, "A", None).unwrap(), a).unwrap();
    db.connect(db.inst_port_bit(u1, "Y", None).unwrap(), anon).unwrap();
    db.connect(db.inst_port_bit(u2, "A", None).unwrap(), anon).unwrap();
    db.connect(db.inst_port_bit(u2, "Y", None).unwrap(), named).unwrap();
    db.connect(db.port_bit(top, "y", None).unwrap(), named).unwrap();

    let text = db.dump_verilog(top).unwrap();
    assert!(text.contains(&format!("\\$net{}_1 ", anon.0)));

    let mut db2 = NetlistDB::new();
    let cells = db2.create_library("cells", LibraryKind::Primitives).unwrap();
    db2.create_primitive(cells, "INV", [
        PortDecl::scalar("A", Direction::Input),
        PortDecl::scalar("Y", Direction::Output),
    ]).unwrap();
    let top2 = db2.load_sverilog_source(&text, &LoadOptions::default()).unwrap();
    assert!(db2.validate_drivers(top2).unwrap().is_empty());
    assert_eq!(db2.nets(top2).count(), 3);
}
