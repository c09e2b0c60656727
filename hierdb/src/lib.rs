//! A hierarchical gate-level netlist database.
//!
//! Unlike a flattened netlist, every design keeps its own net graph
//! which only connects its own ports and the pins of its direct child
//! instances. Signals crossing hierarchy boundaries are recovered on
//! demand by [`NetlistDB::equipotential`], which walks up along the
//! instance path given by the caller and down into hierarchical
//! child models.
//!
//! All connectivity is bit-level. Bus ports and bus nets are
//! expanded into single bits following their declared range
//! (see [`BusRange`]).
//!
//! # Usage
//!
//! ```
//! use hierdb::*;
//!
//! let mut db = NetlistDB::new();
//! let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
//! let inv = db.create_primitive(cells, "INV", [
//!     PortDecl::scalar("A", Direction::Input),
//!     PortDecl::scalar("Y", Direction::Output),
//! ]).unwrap();
//! let work = db.create_library("work", LibraryKind::Designs).unwrap();
//! let top = db.create_hierarchical(work, "top", [
//!     PortDecl::scalar("a", Direction::Input),
//!     PortDecl::scalar("y", Direction::Output),
//! ]).unwrap();
//! db.set_top_design(top);
//!
//! let u1 = db.create_instance(top, inv, "u1").unwrap();
//! let y = db.create_net(top, "y").unwrap();
//! db.connect(db.port_bit(top, "y", None).unwrap(), y).unwrap();
//! db.connect(db.inst_port_bit(u1, "Y", None).unwrap(), y).unwrap();
//!
//! let path = db.top_path().unwrap();
//! let eq = db.net_equipotential(&path, y).unwrap();
//! assert_eq!(eq.leaf_drivers.len(), 1);
//! assert_eq!(eq.top_readers.len(), 1);
//! ```

use std::collections::HashMap;
use compact_str::CompactString;

/// Terminal directions, as declared on the design interface.
///
/// The direction always refers to the design the port belongs to.
/// Seen from the outside through an instance terminal, an input is
/// a sink; seen from the inside through the design terminal, the
/// same input is a source.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Direction {
    /// input
    Input,
    /// output
    Output,
    /// bidirectional
    InOut,
}

impl Direction {
    /// Whether data can flow into the design through this port.
    #[inline]
    pub fn is_input(self) -> bool {
        matches!(self, Direction::Input | Direction::InOut)
    }

    /// Whether data can flow out of the design through this port.
    #[inline]
    pub fn is_output(self) -> bool {
        matches!(self, Direction::Output | Direction::InOut)
    }
}

mod error;
pub use error::{HierError, Result};

mod range;
pub use range::BusRange;

mod hier_name;
pub use hier_name::HierName;

mod library;
pub use library::{LibraryId, LibraryKind, DesignId, DesignKind, Port, PortDecl};
use library::{Library, Design};

mod instance;
pub use instance::{InstanceId, InstancePath, Scope};
use instance::Instance;

mod net;
pub use net::{NetId, NetName, NetType, Term, DesignTerm, InstTerm};
use net::{Net, NetBase};

mod bits;
pub use bits::{BusBit, BusRef};

mod edit;

mod equipotential;
pub use equipotential::{Equipotential, TermOccurrence, NetOccurrence};

mod drivers;
pub use drivers::{DriverIssue, Cause};

mod cone;

mod utils;
mod disjoint_set;

mod builder;
pub use builder::LoadOptions;

mod writer;
pub use writer::DumpOptions;

/// The netlist database.
///
/// One database is one independent session: it owns its libraries,
/// designs, instances and nets. Handles ([`DesignId`], [`InstanceId`],
/// [`NetId`], ...) created by one database must *not* be used with
/// another one.
///
/// Every mutating method validates its arguments before touching the
/// database, so a call returning an error leaves the database
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct NetlistDB {
    /// Libraries in creation order.
    libraries: Vec<Library>,
    /// Library name to index.
    library_names: HashMap<CompactString, LibraryId>,
    /// All designs. Designs are never removed.
    designs: Vec<Design>,
    /// All instances. Deleted instances leave a `None` so that
    /// handles are never reused.
    instances: Vec<Option<Instance>>,
    /// All nets, with the same tombstone rule as instances.
    nets: Vec<Option<Net>>,
    /// The top-level design, if set.
    top: Option<DesignId>,
}

impl NetlistDB {
    /// Create an empty database.
    #[inline]
    pub fn new() -> NetlistDB {
        NetlistDB::default()
    }
}
