//! Logic cones: equipotentials reachable through primitive instances.

use std::collections::{HashSet, VecDeque};
use crate::*;

impl NetlistDB {
    fn cone(&self, start: &TermOccurrence, fanin: bool) -> Result<Vec<Equipotential>> {
        let mut cone = Vec::new();
        let mut seen = HashSet::<TermOccurrence>::new();
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(occ) = queue.pop_front() {
            if seen.contains(&occ) {
                continue
            }
            let eq = self.equipotential(&occ)?;
            seen.extend(eq.terms.iter().cloned());
            let ends = match fanin {
                true => &eq.leaf_drivers,
                false => &eq.leaf_readers,
            };
            for end in ends {
                let Term::Instance(it) = end.term else { continue };
                let next = match fanin {
                    true => self.input_bit_terms(it.inst)?.collect::<Vec<_>>(),
                    false => self.output_bit_terms(it.inst)?.collect::<Vec<_>>(),
                };
                for term in next {
                    if term != end.term {
                        queue.push_back(TermOccurrence { path: end.path.clone(), term });
                    }
                }
            }
            cone.push(eq);
        }
        Ok(cone)
    }

    /// The transitive fan-in of a terminal occurrence.
    ///
    /// Starting from its equipotential, the walk continues from each
    /// leaf driver into the inputs of the same primitive instance,
    /// until it reaches top drivers or undriven signals. Each
    /// equipotential appears once, the starting one first.
    pub fn fanin_cone(&self, occ: &TermOccurrence) -> Result<Vec<Equipotential>> {
        self.cone(occ, true)
    }

    /// The transitive fan-out of a terminal occurrence, the mirror
    /// image of [`NetlistDB::fanin_cone`].
    pub fn fanout_cone(&self, occ: &TermOccurrence) -> Result<Vec<Equipotential>> {
        self.cone(occ, false)
    }
}

#[test]
fn test_cones() {
    let mut db = NetlistDB::new();
    let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
    let and2 = db.create_primitive(cells, "AND2", [
        PortDecl::scalar("A", Direction::Input),
        PortDecl::scalar("B", Direction::Input),
        PortDecl::scalar("Y", Direction::Output),
    ]).unwrap();
    let work = db.create_library("work", LibraryKind::Designs).unwrap();
    let top = db.create_hierarchical(work, "top", [
        PortDecl::bus("a", Direction::Input, BusRange::new(2, 0)),
        PortDecl::scalar("y", Direction::Output),
    ]).unwrap();
    // y = (a[0] & a[1]) & a[2]
    let u1 = db.create_instance(top, and2, "u1").unwrap();
    let u2 = db.create_instance(top, and2, "u2").unwrap();
    let n1 = db.create_net(top, "n1").unwrap();
    let y = db.create_net(top, "y").unwrap();
    for (i, pin) in [(0, (u1, "A")), (1, (u1, "B")), (2, (u2, "B"))] {
        let n = db.create_net(top, ("a", i)).unwrap();
        db.connect(db.port_bit(top, "a", Some(i)).unwrap(), n).unwrap();
        db.connect(db.inst_port_bit(pin.0, pin.1, None).unwrap(), n).unwrap();
    }
    db.connect(db.inst_port_bit(u1, "Y", None).unwrap(), n1).unwrap();
    db.connect(db.inst_port_bit(u2, "A", None).unwrap(), n1).unwrap();
    db.connect(db.inst_port_bit(u2, "Y", None).unwrap(), y).unwrap();
    db.connect(db.port_bit(top, "y", None).unwrap(), y).unwrap();

    let start = TermOccurrence::new(InstancePath::root(top),
                                    db.port_bit(top, "y", None).unwrap());
    let fanin = db.fanin_cone(&start).unwrap();
    let roots = fanin.iter()
        .map(|eq| db.equipotential_name(eq).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(roots, vec!["y", "n1", "a[2]", "a[0]", "a[1]"]);

    let start = TermOccurrence::new(InstancePath::root(top),
                                    db.port_bit(top, "a", Some(0)).unwrap());
    let fanout = db.fanout_cone(&start).unwrap();
    assert_eq!(fanout.len(), 3);
    assert_eq!(fanout[2].top_readers.len(), 1);
}
