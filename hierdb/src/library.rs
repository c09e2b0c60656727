//! Design libraries, designs and their bit-level interfaces.

use std::fmt;
use std::ops::Range;
use std::collections::HashMap;
use compact_str::CompactString;
use indexmap::{IndexMap, IndexSet};
use crate::*;

/// An opaque library handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibraryId(pub(crate) usize);

/// An opaque design handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DesignId(pub(crate) usize);

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "lib{}", self.0)
    }
}

impl fmt::Display for DesignId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "design{}", self.0)
    }
}

/// Libraries either hold primitive (black-box) cells, e.g. the
/// cells of a liberty file, or hierarchical designs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    Primitives,
    Designs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DesignKind {
    /// A leaf cell without internal netlist.
    Primitive,
    /// A design composed of nets and child instances.
    Hierarchical,
}

/// A port declaration used to build a design interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDecl {
    pub name: CompactString,
    pub direction: Direction,
    /// `None` for a scalar port.
    pub range: Option<BusRange>,
}

impl PortDecl {
    #[inline]
    pub fn scalar(name: impl Into<CompactString>, direction: Direction) -> PortDecl {
        PortDecl { name: name.into(), direction, range: None }
    }

    #[inline]
    pub fn bus(
        name: impl Into<CompactString>, direction: Direction, range: BusRange
    ) -> PortDecl {
        PortDecl { name: name.into(), direction, range: Some(range) }
    }

    #[inline]
    fn width(&self) -> usize {
        self.range.map(|r| r.len()).unwrap_or(1)
    }
}

/// A port of a design interface.
///
/// The bits of all ports are numbered consecutively in port
/// declaration order, each bus following its [`BusRange`] bit order.
/// That number is the `bit` field of [`DesignTerm`] and [`InstTerm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: CompactString,
    pub direction: Direction,
    pub range: Option<BusRange>,
    /// Interface bit number of the first bit.
    pub first_bit: usize,
}

impl Port {
    #[inline]
    pub fn width(&self) -> usize {
        self.range.map(|r| r.len()).unwrap_or(1)
    }

    /// Interface bit numbers covered by this port.
    #[inline]
    pub fn bits(&self) -> Range<usize> {
        self.first_bit..self.first_bit + self.width()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Library {
    pub(crate) name: CompactString,
    pub(crate) kind: LibraryKind,
    pub(crate) designs: IndexMap<CompactString, DesignId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Design {
    pub(crate) name: CompactString,
    pub(crate) library: LibraryId,
    pub(crate) kind: DesignKind,
    pub(crate) ports: Vec<Port>,
    pub(crate) port_names: HashMap<CompactString, usize>,
    /// Interface bit to port index.
    pub(crate) bit_ports: Vec<usize>,
    /// Interface bit to the internal net, always `None` for primitives.
    pub(crate) bit_nets: Vec<Option<NetId>>,
    /// Internal nets in creation order.
    pub(crate) nets: IndexSet<NetId>,
    pub(crate) net_names: HashMap<NetName, NetId>,
    pub(crate) net_bases: HashMap<CompactString, NetBase>,
    /// Declared ranges of bus nets in use, checked on naming and
    /// used when dumping.
    pub(crate) bus_ranges: IndexMap<CompactString, BusRange>,
    /// Child instances in creation order.
    pub(crate) instances: IndexMap<CompactString, InstanceId>,
}

impl Design {
    #[inline]
    pub(crate) fn num_bits(&self) -> usize {
        self.bit_ports.len()
    }

    #[inline]
    pub(crate) fn bit_port(&self, bit: usize) -> &Port {
        &self.ports[self.bit_ports[bit]]
    }

    #[inline]
    pub(crate) fn bit_direction(&self, bit: usize) -> Direction {
        self.bit_port(bit).direction
    }

    #[inline]
    pub(crate) fn is_primitive(&self) -> bool {
        self.kind == DesignKind::Primitive
    }
}

impl NetlistDB {
    pub fn create_library(
        &mut self, name: impl Into<CompactString>, kind: LibraryKind
    ) -> Result<LibraryId> {
        let name = name.into();
        if self.library_names.contains_key(&name) {
            return Err(HierError::duplicate("library", name, "database"))
        }
        let id = LibraryId(self.libraries.len());
        clilog::debug!(HD_LIB_NEW, "new {:?} library {}", kind, name);
        self.libraries.push(Library {
            name: name.clone(), kind, designs: IndexMap::new()
        });
        self.library_names.insert(name, id);
        Ok(id)
    }

    pub fn library(&self, name: &str) -> Result<LibraryId> {
        self.library_names.get(name).copied()
            .ok_or_else(|| HierError::not_found("library", name))
    }

    #[inline]
    pub fn library_name(&self, lib: LibraryId) -> &str {
        &self.libraries[lib.0].name
    }

    #[inline]
    pub fn library_kind(&self, lib: LibraryId) -> LibraryKind {
        self.libraries[lib.0].kind
    }

    /// Libraries in creation order.
    pub fn libraries(&self) -> impl Iterator<Item = LibraryId> + Clone {
        (0..self.libraries.len()).map(LibraryId)
    }

    /// Designs of a library in creation order.
    pub fn library_designs(
        &self, lib: LibraryId
    ) -> impl Iterator<Item = DesignId> + Clone + '_ {
        self.libraries[lib.0].designs.values().copied()
    }

    /// Create a black-box design in a primitive library.
    pub fn create_primitive(
        &mut self, lib: LibraryId, name: impl Into<CompactString>,
        ports: impl IntoIterator<Item = PortDecl>
    ) -> Result<DesignId> {
        self.create_design(lib, name.into(), DesignKind::Primitive, ports)
    }

    /// Create an (initially empty) hierarchical design.
    pub fn create_hierarchical(
        &mut self, lib: LibraryId, name: impl Into<CompactString>,
        ports: impl IntoIterator<Item = PortDecl>
    ) -> Result<DesignId> {
        self.create_design(lib, name.into(), DesignKind::Hierarchical, ports)
    }

    fn create_design(
        &mut self, lib: LibraryId, name: CompactString, kind: DesignKind,
        decls: impl IntoIterator<Item = PortDecl>
    ) -> Result<DesignId> {
        let library = &self.libraries[lib.0];
        let expected = match kind {
            DesignKind::Primitive => LibraryKind::Primitives,
            DesignKind::Hierarchical => LibraryKind::Designs,
        };
        if library.kind != expected {
            return Err(HierError::TypeMismatch(format!(
                "cannot create {:?} design {} in {:?} library {}",
                kind, name, library.kind, library.name)))
        }
        if library.designs.contains_key(&name) {
            return Err(HierError::duplicate(
                "design", name, format!("library {}", library.name)))
        }

        let mut ports = Vec::new();
        let mut port_names = HashMap::new();
        let mut bit_ports = Vec::new();
        for decl in decls {
            if port_names.contains_key(&decl.name) {
                return Err(HierError::duplicate(
                    "port", decl.name, format!("design {}", name)))
            }
            let idx = ports.len();
            port_names.insert(decl.name.clone(), idx);
            bit_ports.extend(std::iter::repeat(idx).take(decl.width()));
            ports.push(Port {
                first_bit: bit_ports.len() - decl.width(),
                name: decl.name,
                direction: decl.direction,
                range: decl.range,
            });
        }

        let id = DesignId(self.designs.len());
        self.designs.push(Design {
            name: name.clone(),
            library: lib,
            kind,
            ports,
            port_names,
            bit_nets: vec![None; bit_ports.len()],
            bit_ports,
            nets: IndexSet::new(),
            net_names: HashMap::new(),
            net_bases: HashMap::new(),
            bus_ranges: IndexMap::new(),
            instances: IndexMap::new(),
        });
        self.libraries[lib.0].designs.insert(name, id);
        Ok(id)
    }

    /// Find a design by name in one library.
    pub fn get_model(&self, lib: LibraryId, name: &str) -> Result<DesignId> {
        let library = &self.libraries[lib.0];
        library.designs.get(name).copied().ok_or_else(|| {
            HierError::not_found("design", format!("{}.{}", library.name, name))
        })
    }

    /// Find a design by name, looking through all libraries
    /// in creation order.
    pub fn find_model(&self, name: &str) -> Result<DesignId> {
        self.libraries.iter()
            .find_map(|lib| lib.designs.get(name).copied())
            .ok_or_else(|| HierError::not_found("design", name))
    }

    #[inline]
    pub(crate) fn design(&self, d: DesignId) -> &Design {
        &self.designs[d.0]
    }

    #[inline]
    pub(crate) fn design_mut(&mut self, d: DesignId) -> &mut Design {
        &mut self.designs[d.0]
    }

    #[inline]
    pub fn design_name(&self, d: DesignId) -> &str {
        &self.design(d).name
    }

    #[inline]
    pub fn design_kind(&self, d: DesignId) -> DesignKind {
        self.design(d).kind
    }

    #[inline]
    pub fn is_primitive(&self, d: DesignId) -> bool {
        self.design(d).is_primitive()
    }

    #[inline]
    pub fn design_library(&self, d: DesignId) -> LibraryId {
        self.design(d).library
    }

    /// Ports in declaration order.
    #[inline]
    pub fn ports(&self, d: DesignId) -> &[Port] {
        &self.design(d).ports
    }

    pub fn port(&self, d: DesignId, name: &str) -> Result<&Port> {
        let design = self.design(d);
        match design.port_names.get(name) {
            Some(&i) => Ok(&design.ports[i]),
            None => Err(HierError::not_found(
                "port", format!("{}.{}", design.name, name)))
        }
    }

    /// Number of interface bits.
    #[inline]
    pub fn num_bits(&self, d: DesignId) -> usize {
        self.design(d).num_bits()
    }

    #[inline]
    pub fn set_top_design(&mut self, d: DesignId) {
        clilog::debug!(HD_TOP, "top design set to {}", self.design(d).name);
        self.top = Some(d);
    }

    pub fn top_design(&self) -> Result<DesignId> {
        self.top.ok_or_else(|| HierError::not_found("design", "<top>"))
    }
}

#[test]
fn test_create_designs() {
    let mut db = NetlistDB::new();
    let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
    let work = db.create_library("work", LibraryKind::Designs).unwrap();
    assert!(matches!(db.create_library("work", LibraryKind::Designs),
                     Err(HierError::DuplicateName { .. })));

    let nand = db.create_primitive(cells, "NAND2", [
        PortDecl::scalar("A", Direction::Input),
        PortDecl::scalar("B", Direction::Input),
        PortDecl::scalar("Y", Direction::Output),
    ]).unwrap();
    let top = db.create_hierarchical(work, "top", [
        PortDecl::bus("d", Direction::Input, BusRange::new(3, 0)),
        PortDecl::scalar("q", Direction::Output),
    ]).unwrap();

    assert_eq!(db.get_model(cells, "NAND2").unwrap(), nand);
    assert_eq!(db.find_model("top").unwrap(), top);
    assert!(matches!(db.get_model(work, "NAND2"), Err(HierError::NotFound { .. })));
    assert!(matches!(db.create_primitive(work, "X", []),
                     Err(HierError::TypeMismatch(_))));
    assert!(matches!(db.create_primitive(cells, "NAND2", []),
                     Err(HierError::DuplicateName { .. })));
    assert!(matches!(db.create_hierarchical(work, "bad", [
        PortDecl::scalar("a", Direction::Input),
        PortDecl::scalar("a", Direction::Output),
    ]), Err(HierError::DuplicateName { .. })));
    assert!(db.get_model(work, "bad").is_err());

    assert_eq!(db.num_bits(top), 5);
    assert_eq!(db.port(top, "q").unwrap().first_bit, 4);
    assert_eq!(db.port(top, "d").unwrap().bits(), 0..4);
    assert_eq!(db.library_designs(cells).collect::<Vec<_>>(), vec![nand]);
    assert!(db.top_design().is_err());
    db.set_top_design(top);
    assert_eq!(db.top_design().unwrap(), top);
}
