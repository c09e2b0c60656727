//! Connectivity edits across one hierarchy boundary.
//!
//! An instance terminal has two sides: the *upper* net it sits on
//! in the parent design, and the *lower* net its port is connected
//! to inside the model. Editing the lower side changes the model,
//! and thus every instantiation of it.

use compact_str::CompactString;
use crate::*;

impl NetlistDB {
    /// The net seen from inside the model of a terminal.
    ///
    /// For a design terminal this is simply its own net. For an
    /// instance terminal it is the net of the corresponding design
    /// terminal of the model, or `None` for primitive models.
    pub fn lower_net(&self, term: impl Into<Term>) -> Result<Option<NetId>> {
        match term.into() {
            Term::Design(dt) => self.get_net(dt),
            Term::Instance(it) => {
                let model = self.instance(it.inst)?.model;
                if self.design(model).is_primitive() {
                    self.term_scope(it)?;
                    return Ok(None)
                }
                self.get_net(DesignTerm { design: model, bit: it.bit })
            }
        }
    }

    /// The net an instance terminal sits on in the parent design.
    pub fn upper_net(&self, term: InstTerm) -> Result<Option<NetId>> {
        self.get_net(term)
    }

    /// Connect an instance terminal to a net of the parent design.
    pub fn connect_upper_net(&mut self, term: InstTerm, net: NetId) -> Result<()> {
        self.connect(term, net)
    }

    pub fn disconnect_upper_net(&mut self, term: InstTerm) -> Result<Option<NetId>> {
        self.disconnect(term)
    }

    /// Connect the lower side of a terminal to a net inside the
    /// model, the same side [`NetlistDB::lower_net`] reads. For a
    /// design terminal this is a plain [`NetlistDB::connect`].
    ///
    /// Fails with [`HierError::TypeMismatch`] when the model is a
    /// primitive, which has no inside.
    pub fn connect_lower_net(&mut self, term: impl Into<Term>, net: NetId) -> Result<()> {
        match term.into() {
            Term::Design(dt) => self.connect(dt, net),
            Term::Instance(it) => {
                let model = self.instance(it.inst)?.model;
                if self.design(model).is_primitive() {
                    return Err(HierError::TypeMismatch(format!(
                        "{} is an instance of primitive {}",
                        self.term_name(it)?, self.design(model).name)))
                }
                self.connect(DesignTerm { design: model, bit: it.bit }, net)
            }
        }
    }

    /// Disconnect the lower side of a terminal.
    /// Nothing happens for primitive models.
    pub fn disconnect_lower_net(&mut self, term: impl Into<Term>) -> Result<Option<NetId>> {
        match term.into() {
            Term::Design(dt) => self.disconnect(dt),
            Term::Instance(it) => {
                let model = self.instance(it.inst)?.model;
                if self.design(model).is_primitive() {
                    self.term_scope(it)?;
                    return Ok(None)
                }
                self.disconnect(DesignTerm { design: model, bit: it.bit })
            }
        }
    }

    /// Rename a net. The name must be free in the net's design,
    /// unless it already is this net's name.
    ///
    /// A scalar name cannot be shared with bus bits of the same base
    /// name, except when this net is the only user of that base.
    pub fn set_net_name(&mut self, net: NetId, name: impl Into<NetName>) -> Result<()> {
        let name = name.into();
        let n = self.net(net)?;
        let design = n.design;
        if n.name.as_ref() == Some(&name) {
            return Ok(())
        }
        let old = n.name.clone();
        let d = self.design(design);
        let sole_user = old.as_ref().map_or(false, |o| {
            o.name == name.name &&
                d.net_bases.get(&o.name).map_or(false, |b| b.count == 1)
        });
        if !sole_user {
            self.check_net_name_free(design, &name)?;
        }
        clilog::debug!(HD_NET_RENAME, "rename net {} to {} in {}",
                       self.net_display_name(net)?, name, d.name);
        if let Some(old) = &old {
            self.remove_net_name(design, old);
        }
        self.add_net_name(design, name.clone(), net);
        if let Some(n) = self.nets[net.0].as_mut() {
            n.name = Some(name);
        }
        Ok(())
    }

    /// Rename a net to a scalar name.
    pub fn set_net_scalar_name(
        &mut self, net: NetId, name: impl Into<CompactString>
    ) -> Result<()> {
        self.set_net_name(net, NetName::scalar(name))
    }
}

#[cfg(test)]
fn two_level_db() -> (NetlistDB, DesignId, DesignId, InstanceId, InstanceId) {
    let mut db = NetlistDB::new();
    let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
    let inv = db.create_primitive(cells, "INV", [
        PortDecl::scalar("A", Direction::Input),
        PortDecl::scalar("Y", Direction::Output),
    ]).unwrap();
    let work = db.create_library("work", LibraryKind::Designs).unwrap();
    let child = db.create_hierarchical(work, "child", [
        PortDecl::scalar("a", Direction::Input),
        PortDecl::scalar("y", Direction::Output),
    ]).unwrap();
    let top = db.create_hierarchical(work, "top", []).unwrap();
    let c1 = db.create_instance(top, child, "c1").unwrap();
    let g = db.create_instance(child, inv, "g").unwrap();
    (db, top, child, c1, g)
}

#[test]
fn test_upper_lower_nets() {
    let (mut db, top, child, c1, g) = two_level_db();
    let inner = db.create_net(child, "inner").unwrap();
    let outer = db.create_net(top, "outer").unwrap();
    let c1_a = db.inst_port_bit(c1, "a", None).unwrap();

    assert_eq!(db.lower_net(c1_a).unwrap(), None);
    db.connect_lower_net(c1_a, inner).unwrap();
    db.connect_upper_net(c1_a, outer).unwrap();
    assert_eq!(db.lower_net(c1_a).unwrap(), Some(inner));
    assert_eq!(db.upper_net(c1_a).unwrap(), Some(outer));
    assert_eq!(db.get_net(db.port_bit(child, "a", None).unwrap()).unwrap(), Some(inner));

    let g_a = db.inst_port_bit(g, "A", None).unwrap();
    assert_eq!(db.lower_net(g_a).unwrap(), None);
    assert!(matches!(db.connect_lower_net(g_a, inner), Err(HierError::TypeMismatch(_))));
    assert_eq!(db.disconnect_lower_net(g_a).unwrap(), None);

    assert_eq!(db.disconnect_lower_net(c1_a).unwrap(), Some(inner));
    assert_eq!(db.disconnect_upper_net(c1_a).unwrap(), Some(outer));
    assert_eq!(db.disconnect_upper_net(c1_a).unwrap(), None);
}

#[test]
fn test_lower_net_of_design_term() {
    let (mut db, _, child, _, _) = two_level_db();
    let a = db.port_bit(child, "a", None).unwrap();
    let n = db.create_net(child, "n").unwrap();
    db.connect_lower_net(a, n).unwrap();
    assert_eq!(db.lower_net(a).unwrap(), Some(n));
    assert_eq!(db.disconnect_lower_net(a).unwrap(), Some(n));
    assert_eq!(db.lower_net(a).unwrap(), None);
    assert_eq!(db.disconnect_lower_net(a).unwrap(), None);
    assert!(db.disconnect_lower_net(DesignTerm { design: child, bit: 5 }).is_err());
}

#[test]
fn test_set_net_name() {
    let (mut db, top, _, _, _) = two_level_db();
    let n1 = db.create_net(top, "n1").unwrap();
    let n2 = db.create_net(top, "n2").unwrap();
    let anon = db.create_anonymous_net(top).unwrap();
    assert!(matches!(db.set_net_name(n1, "n2"), Err(HierError::DuplicateName { .. })));
    db.set_net_name(n1, "n1").unwrap();
    db.set_net_scalar_name(n1, "edit").unwrap();
    assert_eq!(db.find_net(top, "edit").unwrap(), n1);
    assert!(db.find_net(top, "n1").is_err());
    db.set_net_name(anon, ("bus", 3)).unwrap();
    assert_eq!(db.bus_net_bit(top, "bus", Some(3)).unwrap(), anon);
    assert_eq!(db.net_display_name(n2).unwrap(), "n2");

    // scalar and bus bits never share a base name.
    assert!(matches!(db.set_net_name(n2, "bus"), Err(HierError::DuplicateName { .. })));
    assert!(matches!(db.set_net_name(n2, ("edit", 0)), Err(HierError::DuplicateName { .. })));
    assert_eq!(db.find_net(top, "n2").unwrap(), n2);
    // a net alone on its base name may switch kinds.
    db.set_net_name(anon, "bus").unwrap();
    assert_eq!(db.find_net(top, "bus").unwrap(), anon);
    db.set_net_name(n2, ("bus2", 0)).unwrap();
    db.set_net_name(n2, ("bus2", 1)).unwrap();
    assert_eq!(db.bus_net_bits(top, "bus2").unwrap(), vec![n2]);
}
