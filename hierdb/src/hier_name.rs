//! Hierarchical instance names and human-readable occurrence names.

use std::fmt;
use std::sync::Arc;
use compact_str::CompactString;
use itertools::Itertools;
use crate::*;

/// Hierarchical name of an instance occurrence, e.g. `c1/u2`.
///
/// The name is a linked list from the bottom-most instance up to
/// the top, so sibling names share their common prefix.
#[derive(PartialEq, Eq, Hash, Clone)]
pub struct HierName {
    /// Name of the current layer.
    pub cur: CompactString,
    /// Name of the parent layers.
    pub prev: Option<Arc<HierName>>,
}

/// Iterator over a [`HierName`], from the bottom to the top.
pub struct HierNameRevIter<'i>(Option<&'i HierName>);

impl<'i> Iterator for HierNameRevIter<'i> {
    type Item = &'i CompactString;

    #[inline]
    fn next(&mut self) -> Option<&'i CompactString> {
        let name = self.0?;
        if name.cur.is_empty() {
            return None
        }
        self.0 = name.prev.as_deref();
        Some(&name.cur)
    }
}

impl HierName {
    /// The name of the root scope (the top design itself).
    #[inline]
    pub const fn empty() -> Self {
        HierName { cur: CompactString::new_inline(""), prev: None }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.prev.is_none() && self.cur.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> HierNameRevIter<'_> {
        HierNameRevIter(Some(self))
    }

    /// Append a child layer.
    #[inline]
    pub fn child(self, cur: impl Into<CompactString>) -> HierName {
        match self.is_empty() {
            true => HierName { cur: cur.into(), prev: None },
            false => HierName { cur: cur.into(), prev: Some(Arc::new(self)) },
        }
    }

    /// Build a name from top-down layers.
    /// ```
    /// # use hierdb::HierName;
    /// assert_eq!(format!("{}", HierName::from_topdown(["c1", "u2"])), "c1/u2");
    /// ```
    #[inline]
    pub fn from_topdown<I: Into<CompactString>>(
        iter: impl IntoIterator<Item = I>
    ) -> HierName {
        iter.into_iter().fold(HierName::empty(), |h, cur| h.child(cur))
    }
}

impl fmt::Display for HierName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut layers: Vec<_> = self.iter().collect();
        layers.reverse();
        write!(f, "{}", layers.iter().format("/"))
    }
}

impl fmt::Debug for HierName {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HierName({})", self)
    }
}

impl NetlistDB {
    /// Hierarchical name of the instance path.
    pub fn hier_name(&self, path: &InstancePath) -> Result<HierName> {
        let mut name = HierName::empty();
        for &inst in path.instances() {
            name = name.child(self.instance(inst)?.name.clone());
        }
        Ok(name)
    }

    /// Short name of a terminal in its own scope:
    /// `port[bit]` for design terminals, `inst:port[bit]` for
    /// instance terminals.
    pub fn term_name(&self, term: impl Into<Term>) -> Result<String> {
        let term = term.into();
        let bit = self.term_bus_bit(term)?;
        Ok(match term {
            Term::Design(_) => format!("{bit}"),
            Term::Instance(it) => format!("{}:{}", self.instance(it.inst)?.name, bit),
        })
    }

    /// Full name of a terminal occurrence, in the style of
    /// `c1/u2:A` (instance pin) or `c1:a[0]` (port of `c1` seen
    /// from inside). Ports of the root design have no prefix.
    pub fn occurrence_name(&self, occ: &TermOccurrence) -> Result<String> {
        let hier = self.hier_name(&occ.path)?;
        let bit = self.term_bus_bit(occ.term)?;
        Ok(match (occ.term, hier.is_empty()) {
            (Term::Design(_), true) => format!("{bit}"),
            (Term::Design(_), false) => format!("{hier}:{bit}"),
            (Term::Instance(it), true) =>
                format!("{}:{}", self.instance(it.inst)?.name, bit),
            (Term::Instance(it), false) =>
                format!("{}/{}:{}", hier, self.instance(it.inst)?.name, bit),
        })
    }

    /// Full name of a net occurrence, e.g. `c1/n1`.
    pub fn net_occurrence_name(&self, occ: &NetOccurrence) -> Result<String> {
        let hier = self.hier_name(&occ.path)?;
        let net = self.net_display_name(occ.net)?;
        Ok(match hier.is_empty() {
            true => net,
            false => format!("{hier}/{net}"),
        })
    }
}

#[test]
fn test_hier_name() {
    let h = HierName::empty().child("top").child("mod1");
    let h1 = h.clone().child("leaf1");
    let h2 = h.child("leaf2");
    assert_eq!(format!("{}", h1), "top/mod1/leaf1");
    assert_eq!(format!("{:?}", h2), "HierName(top/mod1/leaf2)");
    assert_eq!(h1.iter().map(|a| a.as_str()).collect::<Vec<&str>>(),
               vec!["leaf1", "mod1", "top"]);
    assert_eq!(HierName::from_topdown(["top", "mod1", "leaf1"]), h1);
    assert!(HierName::from_topdown(Vec::<&str>::new()).is_empty());
    assert_eq!(format!("{}", HierName::empty()), "");

    let seen = [h1.clone(), h2.clone(), HierName::from_topdown(["top", "mod1", "leaf1"])]
        .into_iter().collect::<std::collections::HashSet<_>>();
    assert_eq!(seen.len(), 2);
}
