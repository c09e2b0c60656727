//! Expansion of bus ports and bus nets into bits, and the reverse.

use std::fmt;
use compact_str::CompactString;
use crate::*;

/// A single bit of a port or net, by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BusBit {
    pub name: CompactString,
    /// `None` for a scalar.
    pub index: Option<isize>,
}

impl fmt::Display for BusBit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.index {
            None => write!(f, "{}", self.name),
            Some(i) => write!(f, "{}[{}]", self.name, i),
        }
    }
}

/// A contiguous run of bits of one port or net, by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BusRef {
    pub name: CompactString,
    /// `None` for a scalar.
    pub range: Option<BusRange>,
}

impl fmt::Display for BusRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.range {
            None => write!(f, "{}", self.name),
            Some(r) if r.len() == 1 => write!(f, "{}[{}]", self.name, r.left),
            Some(r) => write!(f, "{}{}", self.name, r),
        }
    }
}

/// Position of a bus index inside a port, with range checks.
fn port_offset(port: &Port, index: Option<isize>) -> Result<usize> {
    let out_of_range = || HierError::IndexOutOfRange {
        name: port.name.to_string(),
        index,
        range: port.range.map(|r| r.to_string()).unwrap_or_default(),
    };
    match (port.range, index) {
        (None, None) => Ok(0),
        (Some(r), Some(i)) => r.position(i).ok_or_else(out_of_range),
        (None, Some(_)) => Err(out_of_range()),
        (Some(r), None) => Err(HierError::TypeMismatch(format!(
            "port {} is a bus {}, a bit index is required", port.name, r))),
    }
}

impl NetlistDB {
    /// The bit terminal of a port of a design.
    ///
    /// Scalar ports take `None` as index, bus ports take an index
    /// inside the declared range.
    pub fn port_bit(
        &self, design: DesignId, port: &str, index: Option<isize>
    ) -> Result<DesignTerm> {
        let p = self.port(design, port)?;
        Ok(DesignTerm { design, bit: p.first_bit + port_offset(p, index)? })
    }

    /// All bit terminals of a port, in bit order.
    pub fn port_bits(
        &self, design: DesignId, port: &str
    ) -> Result<impl Iterator<Item = DesignTerm> + Clone> {
        let bits = self.port(design, port)?.bits();
        Ok(bits.map(move |bit| DesignTerm { design, bit }))
    }

    /// The bit terminal of an instance for a port of its model.
    pub fn inst_port_bit(
        &self, inst: InstanceId, port: &str, index: Option<isize>
    ) -> Result<InstTerm> {
        let model = self.instance(inst)?.model;
        let DesignTerm { bit, .. } = self.port_bit(model, port, index)?;
        Ok(InstTerm { inst, bit })
    }

    /// All bit terminals of an instance for a port of its model.
    pub fn inst_port_bits(
        &self, inst: InstanceId, port: &str
    ) -> Result<impl Iterator<Item = InstTerm> + Clone> {
        let bits = self.port(self.instance(inst)?.model, port)?.bits();
        Ok(bits.map(move |bit| InstTerm { inst, bit }))
    }

    /// The port name and bus index behind a terminal.
    pub fn term_bus_bit(&self, term: impl Into<Term>) -> Result<BusBit> {
        let term = term.into();
        self.term_scope(term)?;
        let (model, bit) = match term {
            Term::Design(dt) => (dt.design, dt.bit),
            Term::Instance(it) => (self.instance(it.inst)?.model, it.bit),
        };
        let port = self.design(model).bit_port(bit);
        Ok(BusBit {
            name: port.name.clone(),
            index: port.range.and_then(|r| r.index_at(bit - port.first_bit)),
        })
    }

    /// Collapse design terminals back into a port reference.
    ///
    /// The terminals must be consecutive bits of one port in bit
    /// order. Collapsing all of [`NetlistDB::port_bits`] gives the
    /// port itself with its declared range.
    pub fn collapse(&self, bits: &[DesignTerm]) -> Result<BusRef> {
        let Some(first) = bits.first() else {
            return Err(HierError::TypeMismatch("cannot collapse no bits".into()))
        };
        let d = self.design(first.design);
        if first.bit >= d.num_bits() {
            return Err(HierError::IndexOutOfRange {
                name: d.name.to_string(),
                index: Some(first.bit as isize),
                range: format!("0..{}", d.num_bits()),
            })
        }
        let port = d.bit_port(first.bit);
        for (i, t) in bits.iter().enumerate() {
            if t.design != first.design || t.bit != first.bit + i ||
                !port.bits().contains(&t.bit) {
                return Err(HierError::TypeMismatch(format!(
                    "bits are not a consecutive run of port {}", port.name)))
            }
        }
        let range = match port.range {
            None => None,
            Some(r) => {
                let offset = first.bit - port.first_bit;
                match (r.index_at(offset), r.index_at(offset + bits.len() - 1)) {
                    (Some(l), Some(r)) => Some(BusRange::new(l, r)),
                    _ => unreachable!("bits checked inside the port"),
                }
            }
        };
        Ok(BusRef { name: port.name.clone(), range })
    }

    /// The bit net of a bus net (or of a scalar net with `None`).
    pub fn bus_net_bit(
        &self, design: DesignId, name: &str, index: Option<isize>
    ) -> Result<NetId> {
        if let (Some(r), Some(i)) = (self.bus_net_range(design, name), index) {
            if !r.contains(i) {
                return Err(HierError::IndexOutOfRange {
                    name: name.to_string(), index, range: r.to_string()
                })
            }
        }
        self.find_net(design, NetName { name: name.into(), bit: index })
    }

    /// All bit nets of a bus net, in bit order.
    ///
    /// The range is the declared one if the bus was created with
    /// [`NetlistDB::create_bus_net`], otherwise it spans the bits
    /// of that name currently present, from high to low.
    pub fn bus_net_bits(&self, design: DesignId, name: &str) -> Result<Vec<NetId>> {
        let range = self.bus_net_range(design, name).ok_or_else(|| {
            HierError::not_found("bus net", format!("{}/{}", self.design(design).name, name))
        })?;
        range.indices().map(|i| self.bus_net_bit(design, name, Some(i))).collect()
    }

    /// Declared or inferred range of a bus net name.
    pub(crate) fn bus_net_range(&self, design: DesignId, name: &str) -> Option<BusRange> {
        let d = self.design(design);
        if let Some(r) = d.bus_ranges.get(name) {
            return Some(*r)
        }
        let (lo, hi) = d.net_names.keys()
            .filter(|n| n.name == name)
            .filter_map(|n| n.bit)
            .fold((None, None), |(lo, hi): (Option<isize>, Option<isize>), b| (
                Some(lo.map_or(b, |l| l.min(b))),
                Some(hi.map_or(b, |h| h.max(b))),
            ));
        Some(BusRange::new(hi?, lo?))
    }

    /// Collapse bit nets into a single name reference, if they are
    /// the consecutive bits of one bus name (or one scalar net).
    pub fn collapse_nets(&self, nets: &[NetId]) -> Result<Option<BusRef>> {
        let mut names = Vec::with_capacity(nets.len());
        for &n in nets {
            match self.net(n)?.name.as_ref() {
                Some(name) => names.push(name),
                None => return Ok(None),
            }
        }
        let Some(first) = names.first() else { return Ok(None) };
        let Some(left) = first.bit else {
            return Ok(match names.len() {
                1 => Some(BusRef { name: first.name.clone(), range: None }),
                _ => None,
            })
        };
        let right = names.last().and_then(|n| n.bit).unwrap_or(left);
        let range = BusRange::new(left, right);
        let consecutive = names.len() == range.len() &&
            names.iter().zip(range.indices())
            .all(|(n, i)| n.name == first.name && n.bit == Some(i));
        Ok(consecutive.then(|| BusRef { name: first.name.clone(), range: Some(range) }))
    }

    fn bit_terms(
        &self, scope: Scope, pick: fn(Direction) -> bool
    ) -> Result<impl Iterator<Item = Term> + Clone + '_> {
        let model = self.scope_design(scope)?;
        let d = self.design(model);
        let bits = (0..d.num_bits()).filter(move |&bit| pick(d.bit_direction(bit)));
        Ok(bits.map(move |bit| match scope {
            Scope::Design(design) => Term::Design(DesignTerm { design, bit }),
            Scope::Instance(inst) => Term::Instance(InstTerm { inst, bit }),
        }))
    }

    /// Input (and inout) bit terminals of a design or an instance,
    /// in port declaration order.
    pub fn input_bit_terms(
        &self, scope: impl Into<Scope>
    ) -> Result<impl Iterator<Item = Term> + Clone + '_> {
        self.bit_terms(scope.into(), Direction::is_input)
    }

    /// Output (and inout) bit terminals of a design or an instance,
    /// in port declaration order.
    pub fn output_bit_terms(
        &self, scope: impl Into<Scope>
    ) -> Result<impl Iterator<Item = Term> + Clone + '_> {
        self.bit_terms(scope.into(), Direction::is_output)
    }
}

#[cfg(test)]
fn bus_db() -> (NetlistDB, DesignId, InstanceId) {
    let mut db = NetlistDB::new();
    let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
    let buf = db.create_primitive(cells, "BUF4", [
        PortDecl::bus("A", Direction::Input, BusRange::new(0, 3)),
        PortDecl::scalar("OE", Direction::Input),
        PortDecl::bus("Y", Direction::Output, BusRange::new(3, 0)),
        PortDecl::scalar("IO", Direction::InOut),
    ]).unwrap();
    let work = db.create_library("work", LibraryKind::Designs).unwrap();
    let top = db.create_hierarchical(work, "top", [
        PortDecl::bus("d", Direction::Input, BusRange::new(7, 4)),
        PortDecl::scalar("q", Direction::Output),
    ]).unwrap();
    let u = db.create_instance(top, buf, "u").unwrap();
    (db, top, u)
}

#[test]
fn test_port_bits() {
    let (db, top, u) = bus_db();
    assert_eq!(db.port_bit(top, "d", Some(7)).unwrap().bit, 0);
    assert_eq!(db.port_bit(top, "d", Some(4)).unwrap().bit, 3);
    assert_eq!(db.port_bit(top, "q", None).unwrap().bit, 4);
    assert!(matches!(db.port_bit(top, "d", Some(3)),
                     Err(HierError::IndexOutOfRange { .. })));
    assert!(matches!(db.port_bit(top, "q", Some(0)),
                     Err(HierError::IndexOutOfRange { .. })));
    assert!(matches!(db.port_bit(top, "d", None), Err(HierError::TypeMismatch(_))));
    assert!(matches!(db.port_bit(top, "x", None), Err(HierError::NotFound { .. })));

    let a2 = db.inst_port_bit(u, "A", Some(2)).unwrap();
    assert_eq!(a2.bit, 2);
    assert_eq!(db.term_bus_bit(a2).unwrap().to_string(), "A[2]");
    assert_eq!(db.term_name(a2).unwrap(), "u:A[2]");
    let y = db.inst_port_bits(u, "Y").unwrap()
        .map(|t| db.term_bus_bit(t).unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(y, vec!["Y[3]", "Y[2]", "Y[1]", "Y[0]"]);
}

#[test]
fn test_collapse_round_trip() {
    let (db, top, _) = bus_db();
    let d = db.port_bits(top, "d").unwrap().collect::<Vec<_>>();
    assert_eq!(db.collapse(&d).unwrap(),
               BusRef { name: "d".into(), range: Some(BusRange::new(7, 4)) });
    assert_eq!(db.collapse(&d[1..3]).unwrap().to_string(), "d[6:5]");
    assert_eq!(db.collapse(&d[2..3]).unwrap().to_string(), "d[5]");
    let q = db.port_bits(top, "q").unwrap().collect::<Vec<_>>();
    assert_eq!(db.collapse(&q).unwrap().to_string(), "q");
    assert!(db.collapse(&[d[0], d[2]]).is_err());
    assert!(db.collapse(&[d[3], q[0]]).is_err());
    assert!(db.collapse(&[]).is_err());
}

#[test]
fn test_bus_nets() {
    let (mut db, top, _) = bus_db();
    let w = db.create_bus_net(top, "w", BusRange::new(0, 2)).unwrap();
    assert_eq!(db.bus_net_bits(top, "w").unwrap(), w);
    assert_eq!(db.bus_net_bit(top, "w", Some(1)).unwrap(), w[1]);
    assert!(matches!(db.bus_net_bit(top, "w", Some(3)),
                     Err(HierError::IndexOutOfRange { .. })));
    assert_eq!(db.collapse_nets(&w).unwrap().unwrap().to_string(), "w[0:2]");
    assert_eq!(db.collapse_nets(&[w[2], w[1]]).unwrap().unwrap().to_string(), "w[2:1]");
    assert_eq!(db.collapse_nets(&[w[0], w[2]]).unwrap(), None);

    let v1 = db.create_net(top, ("v", 1)).unwrap();
    let v0 = db.create_net(top, ("v", 0)).unwrap();
    assert_eq!(db.bus_net_bits(top, "v").unwrap(), vec![v1, v0]);
    assert!(matches!(db.bus_net_bit(top, "v", Some(2)),
                     Err(HierError::IndexOutOfRange { .. })));

    // a deleted bus leaves no range behind.
    for n in w {
        db.delete_net(n).unwrap();
    }
    assert!(matches!(db.bus_net_bit(top, "w", Some(1)), Err(HierError::NotFound { .. })));
    assert!(db.bus_net_bits(top, "w").is_err());
    let w5 = db.create_net(top, ("w", 5)).unwrap();
    assert_eq!(db.bus_net_bits(top, "w").unwrap(), vec![w5]);
    let anon = db.create_anonymous_net(top).unwrap();
    assert_eq!(db.collapse_nets(&[anon]).unwrap(), None);
}

#[test]
fn test_direction_bit_terms() {
    let (db, top, u) = bus_db();
    let ins = db.input_bit_terms(u).unwrap()
        .map(|t| db.term_bus_bit(t).unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(ins, vec!["A[0]", "A[1]", "A[2]", "A[3]", "OE", "IO"]);
    let outs = db.output_bit_terms(u).unwrap();
    let first = outs.clone().collect::<Vec<_>>();
    assert_eq!(first.len(), 5);
    assert_eq!(outs.collect::<Vec<_>>(), first);
    assert_eq!(db.output_bit_terms(u).unwrap().collect::<Vec<_>>(), first);
    assert_eq!(db.input_bit_terms(top).unwrap().count(), 4);
    assert_eq!(db.output_bit_terms(top).unwrap().collect::<Vec<_>>(),
               vec![Term::Design(DesignTerm { design: top, bit: 4 })]);
}
