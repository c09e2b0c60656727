//! Equipotential resolution across hierarchy boundaries.
//!
//! Nets only connect terminals of one design, so the set of all
//! terminals electrically tied to a signal has to be recovered by
//! walking the hierarchy: down into hierarchical child models, and
//! up along the instance path the query was made from.

use std::collections::{HashSet, VecDeque};
use itertools::Itertools;
use crate::*;

/// A terminal seen at one place in the instance tree.
///
/// The path leads to the design the terminal is connected in: the
/// design itself for a design terminal, the parent design for an
/// instance terminal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TermOccurrence {
    pub path: InstancePath,
    pub term: Term,
}

impl TermOccurrence {
    #[inline]
    pub fn new(path: InstancePath, term: impl Into<Term>) -> TermOccurrence {
        TermOccurrence { path, term: term.into() }
    }
}

/// A net seen at one place in the instance tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NetOccurrence {
    pub path: InstancePath,
    pub net: NetId,
}

/// The resolved equipotential set of a signal.
///
/// Drivers and readers are split by where the walk ended:
/// * leaf terminals are pins of primitive instances, at any depth.
///   An output pin drives, an input pin reads.
/// * top terminals are ports of the root design of the query path.
///   An input port drives the signal from the outside, an output
///   port reads it out.
///
/// Inout terminals count on both sides.
/// Nothing here is cached: resolve again after editing.
#[readonly::make]
#[derive(Debug, Clone, Default)]
pub struct Equipotential {
    pub leaf_drivers: Vec<TermOccurrence>,
    pub leaf_readers: Vec<TermOccurrence>,
    pub top_drivers: Vec<TermOccurrence>,
    pub top_readers: Vec<TermOccurrence>,
    /// All net occurrences visited, in visiting order.
    pub nets: Vec<NetOccurrence>,
    /// All terminal occurrences visited, in visiting order.
    pub terms: Vec<TermOccurrence>,
}

impl Equipotential {
    /// Number of drivers, leaf and top.
    #[inline]
    pub fn driver_count(&self) -> usize {
        self.leaf_drivers.len() + self.top_drivers.len()
    }

    #[inline]
    pub fn is_undriven(&self) -> bool {
        self.driver_count() == 0
    }

    /// Leaf drivers followed by top drivers.
    pub fn drivers(&self) -> impl Iterator<Item = &TermOccurrence> + Clone {
        self.leaf_drivers.iter().chain(self.top_drivers.iter())
    }

    /// Leaf readers followed by top readers.
    pub fn readers(&self) -> impl Iterator<Item = &TermOccurrence> + Clone {
        self.leaf_readers.iter().chain(self.top_readers.iter())
    }

    /// Whether a net occurrence belongs to this equipotential.
    pub fn contains_net(&self, occ: &NetOccurrence) -> bool {
        self.nets.contains(occ)
    }
}

/// Breadth-first walk state.
struct Walk<'i> {
    db: &'i NetlistDB,
    frontier: VecDeque<TermOccurrence>,
    visited_terms: HashSet<TermOccurrence>,
    visited_nets: HashSet<NetOccurrence>,
    eq: Equipotential,
}

impl<'i> Walk<'i> {
    fn new(db: &'i NetlistDB) -> Walk<'i> {
        Walk {
            db,
            frontier: VecDeque::new(),
            visited_terms: HashSet::new(),
            visited_nets: HashSet::new(),
            eq: Equipotential::default(),
        }
    }

    fn visit_net(&mut self, path: &InstancePath, net: NetId) -> Result<()> {
        let occ = NetOccurrence { path: path.clone(), net };
        if !self.visited_nets.insert(occ.clone()) {
            return Ok(())
        }
        self.eq.nets.push(occ);
        for term in self.db.net_terms(net)? {
            self.frontier.push_back(TermOccurrence { path: path.clone(), term });
        }
        Ok(())
    }

    fn run(mut self) -> Result<Equipotential> {
        let db = self.db;
        while let Some(occ) = self.frontier.pop_front() {
            if !self.visited_terms.insert(occ.clone()) {
                continue
            }
            self.eq.terms.push(occ.clone());
            if let Some(net) = db.get_net(occ.term)? {
                self.visit_net(&occ.path, net)?;
            }
            match occ.term {
                Term::Instance(it) => {
                    let model = db.instance(it.inst)?.model;
                    let m = db.design(model);
                    if m.is_primitive() {
                        let dir = m.bit_direction(it.bit);
                        if dir.is_output() {
                            self.eq.leaf_drivers.push(occ.clone());
                        }
                        if dir.is_input() {
                            self.eq.leaf_readers.push(occ);
                        }
                    }
                    else {
                        self.frontier.push_back(TermOccurrence {
                            path: occ.path.child(it.inst),
                            term: Term::Design(DesignTerm { design: model, bit: it.bit }),
                        });
                    }
                }
                Term::Design(dt) => match occ.path.parent() {
                    Some((parent, inst)) => {
                        self.frontier.push_back(TermOccurrence {
                            path: parent,
                            term: Term::Instance(InstTerm { inst, bit: dt.bit }),
                        });
                    }
                    None => {
                        let dir = db.design(dt.design).bit_direction(dt.bit);
                        if dir.is_input() {
                            self.eq.top_drivers.push(occ.clone());
                        }
                        if dir.is_output() {
                            self.eq.top_readers.push(occ);
                        }
                    }
                }
            }
        }
        Ok(self.eq)
    }
}

impl NetlistDB {
    fn check_occurrence_scope(
        &self, path: &InstancePath, scope: DesignId
    ) -> Result<()> {
        let at = self.path_design(path)?;
        if at != scope {
            return Err(HierError::TypeMismatch(format!(
                "path {} ends in {}, not in {}",
                self.hier_name(path)?, self.design(at).name,
                self.design(scope).name)))
        }
        Ok(())
    }

    /// Resolve the equipotential set of a terminal occurrence.
    ///
    /// The walk goes up only along `occ.path`, so other
    /// instantiations of the designs on the path are not visited.
    /// A root path can be any design, including one that is never
    /// instantiated: its ports then act as the top boundary.
    pub fn equipotential(&self, occ: &TermOccurrence) -> Result<Equipotential> {
        self.check_occurrence_scope(&occ.path, self.term_scope(occ.term)?)?;
        let mut walk = Walk::new(self);
        walk.frontier.push_back(occ.clone());
        walk.run()
    }

    /// Resolve the equipotential set of a net occurrence.
    ///
    /// A net without any terminal resolves to itself alone.
    pub fn net_equipotential(
        &self, path: &InstancePath, net: NetId
    ) -> Result<Equipotential> {
        self.check_occurrence_scope(path, self.net(net)?.design)?;
        let mut walk = Walk::new(self);
        walk.visit_net(path, net)?;
        walk.run()
    }

    /// A readable name for an equipotential: its first net, or its
    /// first terminal when no net was visited.
    pub fn equipotential_name(&self, eq: &Equipotential) -> Result<String> {
        if let Some(net) = eq.nets.first() {
            return self.net_occurrence_name(net)
        }
        match eq.terms.first() {
            Some(t) => self.occurrence_name(t),
            None => Ok(String::new()),
        }
    }

    /// Fail with [`HierError::MultiDriver`] when the equipotential
    /// has more than one driver. No driver at all is accepted.
    pub fn check_single_driver(&self, eq: &Equipotential) -> Result<()> {
        let count = eq.driver_count();
        if count <= 1 {
            return Ok(())
        }
        let drivers = eq.drivers()
            .map(|d| self.occurrence_name(d))
            .collect::<Result<Vec<_>>>()?;
        Err(HierError::MultiDriver {
            net: self.equipotential_name(eq)?,
            count,
            drivers: drivers.iter().format(", ").to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `top(i, o)` with `child c1(.a(i), .y(w))`, `child c2(.a(w), .y(o))`
    /// where `child(a, y)` is `INV g(.A(a), .Y(y))`.
    fn chain() -> (NetlistDB, DesignId, DesignId, InstanceId, InstanceId, InstanceId) {
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
        let g = db.create_instance(child, inv, "g").unwrap();
        for (port, pin) in [("a", "A"), ("y", "Y")] {
            let n = db.create_net(child, port).unwrap();
            db.connect(db.port_bit(child, port, None).unwrap(), n).unwrap();
            db.connect(db.inst_port_bit(g, pin, None).unwrap(), n).unwrap();
        }
        let top = db.create_hierarchical(work, "top", [
            PortDecl::scalar("i", Direction::Input),
            PortDecl::scalar("o", Direction::Output),
        ]).unwrap();
        db.set_top_design(top);
        let c1 = db.create_instance(top, child, "c1").unwrap();
        let c2 = db.create_instance(top, child, "c2").unwrap();
        let i = db.create_net(top, "i").unwrap();
        let w = db.create_net(top, "w").unwrap();
        let o = db.create_net(top, "o").unwrap();
        db.connect(db.port_bit(top, "i", None).unwrap(), i).unwrap();
        db.connect(db.inst_port_bit(c1, "a", None).unwrap(), i).unwrap();
        db.connect(db.inst_port_bit(c1, "y", None).unwrap(), w).unwrap();
        db.connect(db.inst_port_bit(c2, "a", None).unwrap(), w).unwrap();
        db.connect(db.inst_port_bit(c2, "y", None).unwrap(), o).unwrap();
        db.connect(db.port_bit(top, "o", None).unwrap(), o).unwrap();
        (db, top, child, c1, c2, g)
    }

    fn names(db: &NetlistDB, occs: &[TermOccurrence]) -> Vec<String> {
        occs.iter().map(|o| db.occurrence_name(o).unwrap()).collect()
    }

    #[test]
    fn test_resolve_across_levels() {
        let (db, top, _, _, _, _) = chain();
        let w = db.find_net(top, "w").unwrap();
        let eq = db.net_equipotential(&db.top_path().unwrap(), w).unwrap();
        assert_eq!(names(&db, &eq.leaf_drivers), vec!["c1/g:Y"]);
        assert_eq!(names(&db, &eq.leaf_readers), vec!["c2/g:A"]);
        assert!(eq.top_drivers.is_empty());
        assert!(eq.top_readers.is_empty());
        assert_eq!(eq.nets.len(), 3);
        db.check_single_driver(&eq).unwrap();

        let i = db.find_net(top, "i").unwrap();
        let eq = db.net_equipotential(&db.top_path().unwrap(), i).unwrap();
        assert_eq!(names(&db, &eq.top_drivers), vec!["i"]);
        assert_eq!(names(&db, &eq.leaf_readers), vec!["c1/g:A"]);
        assert_eq!(eq.driver_count(), 1);
    }

    #[test]
    fn test_upward_only_along_path() {
        let (db, top, child, c1, c2, g) = chain();
        // from inside c2, the walk goes up through c2 only.
        let path = db.path_from_names(top, ["c2"]).unwrap();
        assert_eq!(path, InstancePath::root(top).child(c2));
        let occ = TermOccurrence::new(path, db.inst_port_bit(g, "A", None).unwrap());
        let eq = db.equipotential(&occ).unwrap();
        assert_eq!(names(&db, &eq.leaf_drivers), vec!["c1/g:Y"]);
        assert_eq!(eq.leaf_readers.len(), 1);
        let c1_a = NetOccurrence {
            path: db.path_from_names(top, ["c1"]).unwrap(),
            net: db.find_net(child, "a").unwrap(),
        };
        assert!(!eq.contains_net(&c1_a));

        // the same design seen as its own root stops at its ports.
        let occ = TermOccurrence::new(InstancePath::root(child),
                                      db.inst_port_bit(g, "A", None).unwrap());
        let eq = db.equipotential(&occ).unwrap();
        assert!(eq.leaf_drivers.is_empty());
        assert_eq!(names(&db, &eq.top_drivers), vec!["a"]);
        assert!(!eq.is_undriven());

        // mismatched path and terminal.
        let bad = TermOccurrence::new(db.path_from_names(top, ["c2"]).unwrap(),
                                      db.inst_port_bit(c1, "a", None).unwrap());
        assert!(matches!(db.equipotential(&bad), Err(HierError::TypeMismatch(_))));
    }

    #[test]
    fn test_multi_driver() {
        let (mut db, top, _, c1, _, _) = chain();
        let i = db.find_net(top, "i").unwrap();
        // make c1 drive the top input net as well.
        db.reconnect(db.inst_port_bit(c1, "y", None).unwrap(), i).unwrap();
        let eq = db.net_equipotential(&db.top_path().unwrap(), i).unwrap();
        assert_eq!(eq.driver_count(), 2);
        match db.check_single_driver(&eq) {
            Err(HierError::MultiDriver { net, count, drivers }) => {
                assert_eq!(net, "i");
                assert_eq!(count, 2);
                assert_eq!(drivers, "c1/g:Y, i");
            }
            r => panic!("unexpected {:?}", r),
        }

        let w = db.find_net(top, "w").unwrap();
        let eq = db.net_equipotential(&db.top_path().unwrap(), w).unwrap();
        assert!(eq.is_undriven());
        db.check_single_driver(&eq).unwrap();
    }
}
