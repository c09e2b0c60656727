//! Bit-level nets and terminal connections inside one design.

use std::fmt;
use std::str::FromStr;
use compact_str::CompactString;
use regex::Regex;
use lazy_static::lazy_static;
use crate::*;

/// An opaque net handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(pub(crate) usize);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "net{}", self.0)
    }
}

/// The name of a bit net: a scalar name, or one bit of a bus name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetName {
    pub name: CompactString,
    pub bit: Option<isize>,
}

impl NetName {
    #[inline]
    pub fn scalar(name: impl Into<CompactString>) -> NetName {
        NetName { name: name.into(), bit: None }
    }

    #[inline]
    pub fn bit(name: impl Into<CompactString>, bit: isize) -> NetName {
        NetName { name: name.into(), bit: Some(bit) }
    }
}

impl From<&str> for NetName {
    #[inline]
    fn from(name: &str) -> NetName {
        NetName::scalar(name)
    }
}

impl From<(&str, isize)> for NetName {
    #[inline]
    fn from((name, bit): (&str, isize)) -> NetName {
        NetName::bit(name, bit)
    }
}

impl fmt::Display for NetName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.bit {
            None => write!(f, "{}", self.name),
            Some(b) => write!(f, "{}[{}]", self.name, b),
        }
    }
}

lazy_static! {
    static ref NET_BIT_RE: Regex = Regex::new(r"^(.+)\[(-?\d+)\]$").unwrap();
}

/// Parses `a` as a scalar name and `a[2]` as a bus bit.
impl FromStr for NetName {
    type Err = HierError;

    fn from_str(s: &str) -> Result<NetName> {
        if s.is_empty() {
            return Err(HierError::Parse("empty net name".into()))
        }
        let Some(caps) = NET_BIT_RE.captures(s) else {
            return Ok(NetName::scalar(s))
        };
        let bit = caps[2].parse::<isize>().map_err(|e| {
            HierError::Parse(format!("bad bit index in net name {}: {}", s, e))
        })?;
        Ok(NetName::bit(&caps[1], bit))
    }
}

/// Net types. Constant nets are tied to a logic value,
/// e.g. by `assign n = 1'b0;`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum NetType {
    #[default]
    Standard,
    Assign0,
    Assign1,
    Supply0,
    Supply1,
}

impl NetType {
    #[inline]
    pub fn is_constant(self) -> bool {
        self != NetType::Standard
    }

    /// The tied logic value of a constant net.
    #[inline]
    pub fn constant_value(self) -> Option<bool> {
        use NetType::*;
        match self {
            Standard => None,
            Assign0 | Supply0 => Some(false),
            Assign1 | Supply1 => Some(true),
        }
    }
}

/// A terminal of a design, seen from inside the design.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DesignTerm {
    pub design: DesignId,
    /// Interface bit number, see [`Port`].
    pub bit: usize,
}

/// A terminal of an instance, seen from the parent design.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstTerm {
    pub inst: InstanceId,
    /// Interface bit number of the instance model.
    pub bit: usize,
}

/// Any bit-level terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Design(DesignTerm),
    Instance(InstTerm),
}

impl From<DesignTerm> for Term {
    #[inline]
    fn from(t: DesignTerm) -> Term {
        Term::Design(t)
    }
}

impl From<InstTerm> for Term {
    #[inline]
    fn from(t: InstTerm) -> Term {
        Term::Instance(t)
    }
}

/// How the nets of a design use one base name. A base name is
/// either one scalar net or the bits of one bus, never both.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NetBase {
    pub(crate) bus: bool,
    pub(crate) count: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Net {
    pub(crate) design: DesignId,
    pub(crate) name: Option<NetName>,
    pub(crate) typ: NetType,
    /// Connected terminals in connection order.
    pub(crate) terms: Vec<Term>,
}

impl NetlistDB {
    pub(crate) fn net(&self, net: NetId) -> Result<&Net> {
        match self.nets.get(net.0) {
            Some(Some(n)) => Ok(n),
            _ => Err(HierError::not_found("net", net))
        }
    }

    fn net_mut(&mut self, net: NetId) -> Result<&mut Net> {
        match self.nets.get_mut(net.0) {
            Some(Some(n)) => Ok(n),
            _ => Err(HierError::not_found("net", net))
        }
    }

    fn check_net_container(&self, design: DesignId) -> Result<()> {
        let d = self.design(design);
        if d.is_primitive() {
            return Err(HierError::TypeMismatch(format!(
                "primitive {} cannot contain nets", d.name)))
        }
        Ok(())
    }

    /// Checks that a name can be given to a new net: it is not
    /// taken, does not mix a scalar with bus bits of the same base
    /// name, and lies within the declared range of its bus.
    pub(crate) fn check_net_name_free(&self, design: DesignId, name: &NetName) -> Result<()> {
        let d = self.design(design);
        let mixed = d.net_bases.get(&name.name)
            .map_or(false, |b| b.bus != name.bit.is_some());
        if mixed || d.net_names.contains_key(name) {
            return Err(HierError::duplicate(
                "net", name, format!("design {}", d.name)))
        }
        if let (Some(r), Some(i)) = (d.bus_ranges.get(&name.name), name.bit) {
            if !r.contains(i) {
                return Err(HierError::IndexOutOfRange {
                    name: name.name.to_string(), index: Some(i), range: r.to_string()
                })
            }
        }
        Ok(())
    }

    pub(crate) fn add_net_name(&mut self, design: DesignId, name: NetName, net: NetId) {
        let d = self.design_mut(design);
        d.net_bases.entry(name.name.clone())
            .or_insert(NetBase { bus: name.bit.is_some(), count: 0 })
            .count += 1;
        d.net_names.insert(name, net);
    }

    /// Releases a net name. The declared bus range goes away with
    /// the last bit of its base name.
    pub(crate) fn remove_net_name(&mut self, design: DesignId, name: &NetName) {
        let d = self.design_mut(design);
        if d.net_names.remove(name).is_none() {
            return
        }
        if let Some(b) = d.net_bases.get_mut(&name.name) {
            b.count -= 1;
            if b.count == 0 {
                d.net_bases.remove(&name.name);
                d.bus_ranges.shift_remove(&name.name);
            }
        }
    }

    fn insert_net(&mut self, design: DesignId, name: Option<NetName>) -> NetId {
        let id = NetId(self.nets.len());
        self.nets.push(Some(Net {
            design, name: name.clone(), typ: NetType::Standard, terms: Vec::new()
        }));
        self.design_mut(design).nets.insert(id);
        if let Some(name) = name {
            self.add_net_name(design, name, id);
        }
        id
    }

    /// Create a named bit net.
    pub fn create_net(
        &mut self, design: DesignId, name: impl Into<NetName>
    ) -> Result<NetId> {
        let name = name.into();
        self.check_net_container(design)?;
        self.check_net_name_free(design, &name)?;
        Ok(self.insert_net(design, Some(name)))
    }

    /// Create a net without a name.
    pub fn create_anonymous_net(&mut self, design: DesignId) -> Result<NetId> {
        self.check_net_container(design)?;
        Ok(self.insert_net(design, None))
    }

    /// Find a net by name, creating it if it does not exist yet.
    pub fn get_or_create_net(
        &mut self, design: DesignId, name: impl Into<NetName>
    ) -> Result<NetId> {
        let name = name.into();
        self.check_net_container(design)?;
        if let Some(&id) = self.design(design).net_names.get(&name) {
            return Ok(id)
        }
        self.check_net_name_free(design, &name)?;
        Ok(self.insert_net(design, Some(name)))
    }

    /// Create all bit nets of a bus net, in bit order.
    pub fn create_bus_net(
        &mut self, design: DesignId, name: impl Into<CompactString>,
        range: BusRange
    ) -> Result<Vec<NetId>> {
        let name = name.into();
        self.check_net_container(design)?;
        let d = self.design(design);
        if d.net_bases.contains_key(&name) || d.bus_ranges.contains_key(&name) {
            return Err(HierError::duplicate(
                "bus net", name, format!("design {}", d.name)))
        }
        self.design_mut(design).bus_ranges.insert(name.clone(), range);
        Ok(range.indices()
           .map(|i| self.insert_net(design, Some(NetName::bit(name.clone(), i))))
           .collect())
    }

    /// Find a net by name.
    pub fn find_net(&self, design: DesignId, name: impl Into<NetName>) -> Result<NetId> {
        let name = name.into();
        let d = self.design(design);
        d.net_names.get(&name).copied().ok_or_else(|| {
            HierError::not_found("net", format!("{}/{}", d.name, name))
        })
    }

    /// Nets of a design in creation order.
    pub fn nets(&self, design: DesignId) -> impl Iterator<Item = NetId> + Clone + '_ {
        self.design(design).nets.iter().copied()
    }

    pub fn net_name(&self, net: NetId) -> Result<Option<&NetName>> {
        Ok(self.net(net)?.name.as_ref())
    }

    /// The net name, or its handle for anonymous nets.
    pub fn net_display_name(&self, net: NetId) -> Result<String> {
        Ok(match &self.net(net)?.name {
            Some(name) => name.to_string(),
            None => format!("<{net}>"),
        })
    }

    pub fn net_design(&self, net: NetId) -> Result<DesignId> {
        Ok(self.net(net)?.design)
    }

    pub fn net_type(&self, net: NetId) -> Result<NetType> {
        Ok(self.net(net)?.typ)
    }

    pub fn set_net_type(&mut self, net: NetId, typ: NetType) -> Result<()> {
        self.net_mut(net)?.typ = typ;
        Ok(())
    }

    /// All terminals on a net, in connection order.
    pub fn net_terms(&self, net: NetId) -> Result<impl Iterator<Item = Term> + Clone + '_> {
        Ok(self.net(net)?.terms.iter().copied())
    }

    /// Ports of the net's own design exposed through the net.
    pub fn net_design_terms(
        &self, net: NetId
    ) -> Result<impl Iterator<Item = DesignTerm> + Clone + '_> {
        Ok(self.net(net)?.terms.iter().filter_map(|t| match t {
            Term::Design(dt) => Some(*dt),
            Term::Instance(_) => None,
        }))
    }

    /// Child instance pins connected to the net.
    pub fn net_inst_terms(
        &self, net: NetId
    ) -> Result<impl Iterator<Item = InstTerm> + Clone + '_> {
        Ok(self.net(net)?.terms.iter().filter_map(|t| match t {
            Term::Instance(it) => Some(*it),
            Term::Design(_) => None,
        }))
    }

    /// The design a terminal connects within: its own design for
    /// design terminals, the parent design for instance terminals.
    ///
    /// This also checks that the terminal exists.
    pub fn term_scope(&self, term: impl Into<Term>) -> Result<DesignId> {
        let (scope, model, bit) = match term.into() {
            Term::Design(dt) => (dt.design, dt.design, dt.bit),
            Term::Instance(it) => {
                let i = self.instance(it.inst)?;
                (i.parent, i.model, it.bit)
            }
        };
        let d = self.design(model);
        if bit >= d.num_bits() {
            return Err(HierError::IndexOutOfRange {
                name: d.name.to_string(),
                index: Some(bit as isize),
                range: format!("0..{}", d.num_bits()),
            })
        }
        Ok(scope)
    }

    /// Declared direction of the port behind a terminal.
    pub fn term_direction(&self, term: impl Into<Term>) -> Result<Direction> {
        let term = term.into();
        self.term_scope(term)?;
        Ok(match term {
            Term::Design(dt) => self.design(dt.design).bit_direction(dt.bit),
            Term::Instance(it) =>
                self.design(self.instance(it.inst)?.model).bit_direction(it.bit),
        })
    }

    /// The net a terminal is connected to in its own scope.
    pub fn get_net(&self, term: impl Into<Term>) -> Result<Option<NetId>> {
        let term = term.into();
        self.term_scope(term)?;
        Ok(match term {
            Term::Design(dt) => self.design(dt.design).bit_nets[dt.bit],
            Term::Instance(it) => self.instance(it.inst)?.bit_nets[it.bit],
        })
    }

    /// Slot of a validated terminal.
    fn term_slot_mut(&mut self, term: Term) -> &mut Option<NetId> {
        match term {
            Term::Design(dt) => &mut self.designs[dt.design.0].bit_nets[dt.bit],
            Term::Instance(it) => match &mut self.instances[it.inst.0] {
                Some(i) => &mut i.bit_nets[it.bit],
                None => unreachable!("terminal of a deleted instance"),
            }
        }
    }

    /// Connect a terminal to a net of its scope.
    ///
    /// Connecting a terminal to the net it is already on is a
    /// no-op. If it is on another net, this fails with
    /// [`HierError::AlreadyConnected`]; use [`NetlistDB::reconnect`]
    /// to move it explicitly.
    pub fn connect(&mut self, term: impl Into<Term>, net: NetId) -> Result<()> {
        let term = term.into();
        let scope = self.term_scope(term)?;
        let net_design = self.net(net)?.design;
        if scope != net_design {
            return Err(HierError::TypeMismatch(format!(
                "terminal {} lives in {} but net {} lives in {}",
                self.term_name(term)?, self.design(scope).name,
                self.net_display_name(net)?, self.design(net_design).name)))
        }
        match self.get_net(term)? {
            Some(cur) if cur == net => return Ok(()),
            Some(cur) => return Err(HierError::AlreadyConnected {
                term: self.term_name(term)?,
                net: self.net_display_name(cur)?,
            }),
            None => {}
        }
        *self.term_slot_mut(term) = Some(net);
        self.net_mut(net)?.terms.push(term);
        Ok(())
    }

    /// Move a terminal to another net, returning the net it was
    /// previously on.
    pub fn reconnect(
        &mut self, term: impl Into<Term>, net: NetId
    ) -> Result<Option<NetId>> {
        let term = term.into();
        let scope = self.term_scope(term)?;
        if scope != self.net(net)?.design {
            // let connect() produce the error before any change.
            self.connect(term, net)?;
        }
        let prev = self.disconnect(term)?;
        self.connect(term, net)?;
        Ok(prev)
    }

    /// Disconnect a terminal from its net.
    ///
    /// Returns the net it was on, or `None` if it was not
    /// connected, in which case nothing happens.
    pub fn disconnect(&mut self, term: impl Into<Term>) -> Result<Option<NetId>> {
        let term = term.into();
        let Some(net) = self.get_net(term)? else {
            return Ok(None)
        };
        *self.term_slot_mut(term) = None;
        let n = self.net_mut(net)?;
        if let Some(pos) = n.terms.iter().position(|t| *t == term) {
            n.terms.remove(pos);
        }
        Ok(Some(net))
    }

    /// Delete a net, disconnecting all its terminals.
    pub fn delete_net(&mut self, net: NetId) -> Result<()> {
        let n = self.net(net)?;
        let design = n.design;
        let name = n.name.clone();
        for term in n.terms.clone() {
            *self.term_slot_mut(term) = None;
        }
        if let Some(name) = &name {
            self.remove_net_name(design, name);
        }
        self.design_mut(design).nets.shift_remove(&net);
        self.nets[net.0] = None;
        Ok(())
    }

    /// Delete all nets of a design without connections.
    /// Returns how many were deleted.
    pub fn remove_dangling_nets(&mut self, design: DesignId) -> Result<usize> {
        let dangling = self.nets(design)
            .filter(|&n| self.net(n).map(|n| n.terms.is_empty()).unwrap_or(false))
            .collect::<Vec<_>>();
        for &net in &dangling {
            self.delete_net(net)?;
        }
        if !dangling.is_empty() {
            clilog::debug!(HD_NET_GC, "removed {} dangling nets in {}",
                           dangling.len(), self.design(design).name);
        }
        Ok(dangling.len())
    }
}

#[cfg(test)]
fn inv_db() -> (NetlistDB, DesignId, InstanceId) {
    let mut db = NetlistDB::new();
    let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
    let inv = db.create_primitive(cells, "INV", [
        PortDecl::scalar("A", Direction::Input),
        PortDecl::scalar("Y", Direction::Output),
    ]).unwrap();
    let work = db.create_library("work", LibraryKind::Designs).unwrap();
    let top = db.create_hierarchical(work, "top", [
        PortDecl::scalar("a", Direction::Input),
    ]).unwrap();
    let u1 = db.create_instance(top, inv, "u1").unwrap();
    (db, top, u1)
}

#[test]
fn test_connect_disconnect() {
    let (mut db, top, u1) = inv_db();
    let a = db.create_net(top, "a").unwrap();
    let n1 = db.create_net(top, "n1").unwrap();
    let port_a = DesignTerm { design: top, bit: 0 };
    let u1_a = InstTerm { inst: u1, bit: 0 };

    db.connect(port_a, a).unwrap();
    db.connect(u1_a, a).unwrap();
    db.connect(u1_a, a).unwrap();
    assert_eq!(db.net_terms(a).unwrap().collect::<Vec<_>>(),
               vec![Term::Design(port_a), Term::Instance(u1_a)]);
    assert!(matches!(db.connect(u1_a, n1), Err(HierError::AlreadyConnected { .. })));

    assert_eq!(db.reconnect(u1_a, n1).unwrap(), Some(a));
    assert_eq!(db.get_net(u1_a).unwrap(), Some(n1));
    assert_eq!(db.net_inst_terms(a).unwrap().count(), 0);
    assert_eq!(db.net_design_terms(a).unwrap().collect::<Vec<_>>(), vec![port_a]);

    assert_eq!(db.disconnect(port_a).unwrap(), Some(a));
    assert_eq!(db.get_net(port_a).unwrap(), None);
    assert_eq!(db.disconnect(port_a).unwrap(), None);
    assert!(db.net(a).is_ok());
    assert_eq!(db.remove_dangling_nets(top).unwrap(), 1);
    assert!(matches!(db.find_net(top, "a"), Err(HierError::NotFound { .. })));
    assert_eq!(db.nets(top).collect::<Vec<_>>(), vec![n1]);
}

#[test]
fn test_net_scope_rules() {
    let (mut db, top, u1) = inv_db();
    let inv = db.instance_model(u1).unwrap();
    assert!(matches!(db.create_net(inv, "x"), Err(HierError::TypeMismatch(_))));
    let x = db.create_net(top, "x").unwrap();
    assert!(matches!(db.create_net(top, "x"), Err(HierError::DuplicateName { .. })));
    assert_eq!(db.get_or_create_net(top, "x").unwrap(), x);
    assert!(matches!(db.connect(DesignTerm { design: inv, bit: 0 }, x),
                     Err(HierError::TypeMismatch(_))));
    assert!(matches!(db.get_net(InstTerm { inst: u1, bit: 2 }),
                     Err(HierError::IndexOutOfRange { .. })));

    let bus = db.create_bus_net(top, "d", BusRange::new(1, 0)).unwrap();
    assert_eq!(db.net_name(bus[0]).unwrap(), Some(&NetName::bit("d", 1)));
    assert!(db.create_bus_net(top, "d", BusRange::new(0, 0)).is_err());

    db.connect(InstTerm { inst: u1, bit: 1 }, x).unwrap();
    db.delete_net(x).unwrap();
    assert_eq!(db.get_net(InstTerm { inst: u1, bit: 1 }).unwrap(), None);
    assert!(db.net_type(x).is_err());
}

#[test]
fn test_base_name_kinds() {
    let (mut db, top, _) = inv_db();
    let d = db.create_bus_net(top, "d", BusRange::new(1, 0)).unwrap();
    assert!(matches!(db.create_net(top, "d"), Err(HierError::DuplicateName { .. })));
    assert!(matches!(db.get_or_create_net(top, "d"), Err(HierError::DuplicateName { .. })));
    assert!(matches!(db.create_net(top, ("d", 2)), Err(HierError::IndexOutOfRange { .. })));
    assert_eq!(db.get_or_create_net(top, ("d", 0)).unwrap(), d[1]);

    db.create_net(top, "s").unwrap();
    assert!(matches!(db.create_net(top, ("s", 0)), Err(HierError::DuplicateName { .. })));
    assert!(matches!(db.create_bus_net(top, "s", BusRange::new(0, 0)),
                     Err(HierError::DuplicateName { .. })));

    // the base name is free again once all its bits are gone.
    db.delete_net(d[0]).unwrap();
    assert!(db.create_net(top, "d").is_err());
    db.delete_net(d[1]).unwrap();
    assert!(db.bus_net_bits(top, "d").is_err());
    let scalar = db.create_net(top, "d").unwrap();
    assert_eq!(db.bus_net_bit(top, "d", None).unwrap(), scalar);
    assert!(db.bus_net_bit(top, "d", Some(0)).is_err());
}

#[test]
fn test_parse_net_name() {
    assert_eq!("n1".parse::<NetName>().unwrap(), NetName::scalar("n1"));
    assert_eq!("a[2]".parse::<NetName>().unwrap(), NetName::bit("a", 2));
    assert_eq!("m[-1]".parse::<NetName>().unwrap(), NetName::bit("m", -1));
    assert_eq!("x[3][1]".parse::<NetName>().unwrap(), NetName::bit("x[3]", 1));
    assert_eq!("[2]".parse::<NetName>().unwrap(), NetName::scalar("[2]"));
    assert!("".parse::<NetName>().is_err());
    let name = NetName::bit("d", 7);
    assert_eq!(name.to_string().parse::<NetName>().unwrap(), name);
}
