//! Driver validation over a whole hierarchy.
//!
//! Looks for equipotentials with several drivers, and for ones
//! that are read but never driven.

use std::fmt;
use std::collections::HashSet;
use crate::*;

/// What is wrong with an equipotential.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cause {
    /// More than one driver.
    ///
    /// Example: two inverters drive the same output net.
    MultipleDrivers,
    /// Read somewhere, but without any driver.
    ///
    /// Example: an inverter whose input is connected to a net
    /// nothing else drives.
    NoDrivers,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cause::MultipleDrivers => write!(f, "multiple drivers on the same net"),
            Cause::NoDrivers => write!(f, "net is read but has no drivers"),
        }
    }
}

/// An issue found by [`NetlistDB::validate_drivers`].
#[readonly::make]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverIssue {
    pub cause: Cause,
    /// Name of the first net occurrence of the equipotential.
    pub net: String,
    /// Names of all drivers. A constant net counts as a driver
    /// and appears by its name.
    pub drivers: Vec<String>,
}

impl fmt::Display for DriverIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.cause, self.net)?;
        if !self.drivers.is_empty() {
            write!(f, " ({})", self.drivers.join(", "))?;
        }
        Ok(())
    }
}

impl NetlistDB {
    /// Names of all drivers of an equipotential, counting its
    /// constant nets.
    fn driver_names(&self, eq: &Equipotential) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(eq.driver_count());
        for occ in eq.drivers() {
            names.push(self.occurrence_name(occ)?);
        }
        for occ in &eq.nets {
            if self.net(occ.net)?.typ.is_constant() {
                names.push(self.net_occurrence_name(occ)?);
            }
        }
        Ok(names)
    }

    /// Resolve every equipotential below `root` once, and report the
    /// ones with no driver or more than one driver.
    ///
    /// Every issue is also logged as a warning.
    pub fn validate_drivers(&self, root: DesignId) -> Result<Vec<DriverIssue>> {
        let mut issues = Vec::new();
        let mut covered = HashSet::<NetOccurrence>::new();
        let mut num_eqs = 0;
        let mut stack = vec![InstancePath::root(root)];
        while let Some(path) = stack.pop() {
            let design = self.path_design(&path)?;
            let d = self.design(design);
            if d.is_primitive() {
                continue
            }
            for net in self.nets(design) {
                let occ = NetOccurrence { path: path.clone(), net };
                if covered.contains(&occ) {
                    continue
                }
                let eq = self.net_equipotential(&path, net)?;
                covered.extend(eq.nets.iter().cloned());
                num_eqs += 1;

                let drivers = self.driver_names(&eq)?;
                let cause = match drivers.len() {
                    0 if eq.readers().next().is_some() => Cause::NoDrivers,
                    0 | 1 => continue,
                    _ => Cause::MultipleDrivers,
                };
                let issue = DriverIssue {
                    cause,
                    net: self.equipotential_name(&eq)?,
                    drivers,
                };
                clilog::warn!(HD_DRIVERS, "{}", issue);
                issues.push(issue);
            }
            for &inst in d.instances.values().rev() {
                stack.push(path.child(inst));
            }
        }
        clilog::info!(HD_DRIVERS_SUM, "validated {} equipotentials below {}, {} issues",
                      num_eqs, self.design(root).name, issues.len());
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_drivers() {
        clilog::init_stdout_simple_trace();
        let mut db = NetlistDB::new();
        let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
        let buf = db.create_primitive(cells, "BUF", [
            PortDecl::scalar("A", Direction::Input),
            PortDecl::scalar("Y", Direction::Output),
        ]).unwrap();
        let work = db.create_library("work", LibraryKind::Designs).unwrap();
        let top = db.create_hierarchical(work, "top", [
            PortDecl::scalar("o", Direction::Output),
        ]).unwrap();
        let b1 = db.create_instance(top, buf, "b1").unwrap();
        let b2 = db.create_instance(top, buf, "b2").unwrap();
        let o = db.create_net(top, "o").unwrap();
        let floating = db.create_net(top, "floating").unwrap();
        db.connect(db.port_bit(top, "o", None).unwrap(), o).unwrap();
        db.connect(db.inst_port_bit(b1, "Y", None).unwrap(), o).unwrap();
        db.connect(db.inst_port_bit(b2, "Y", None).unwrap(), o).unwrap();
        db.connect(db.inst_port_bit(b1, "A", None).unwrap(), floating).unwrap();

        let one = db.create_net(top, "one").unwrap();
        db.set_net_type(one, NetType::Assign1).unwrap();
        db.connect(db.inst_port_bit(b2, "A", None).unwrap(), one).unwrap();

        let issues = db.validate_drivers(top).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].cause, Cause::MultipleDrivers);
        assert_eq!(issues[0].net, "o");
        assert_eq!(issues[0].drivers, vec!["b1:Y", "b2:Y"]);
        assert_eq!(issues[1].cause, Cause::NoDrivers);
        assert_eq!(issues[1].to_string(), "net is read but has no drivers: floating");

        db.disconnect(db.inst_port_bit(b2, "Y", None).unwrap()).unwrap();
        db.reconnect(db.inst_port_bit(b1, "A", None).unwrap(), one).unwrap();
        assert!(db.validate_drivers(top).unwrap().is_empty());
    }
}
