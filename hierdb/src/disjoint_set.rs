//! Union-find set used to merge assigned names into bit nets.

use crate::*;

/// A union-find set (disjoint set) over loader nodes, extended
/// with two special sets: the constant 0 and the constant 1.
///
/// Nodes are plain indices and are added on first use.
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    /// Number of nodes under each root, for union by size.
    size: Vec<usize>,
    value_zero: Option<usize>,
    value_one: Option<usize>
}

/// The finalized partition of nodes.
pub(crate) struct NetSets {
    pub(crate) num_sets: usize,
    /// Set index of each node.
    pub(crate) set_of: Vec<usize>,
    /// Set tied to constant 0, if any.
    pub(crate) zero: Option<usize>,
    /// Set tied to constant 1, if any.
    pub(crate) one: Option<usize>,
}

impl NetSets {
    /// Net type implied by the constant ties of a set.
    #[inline]
    pub(crate) fn net_type(&self, set: usize) -> NetType {
        match (self.zero == Some(set), self.one == Some(set)) {
            (true, _) => NetType::Assign0,
            (_, true) => NetType::Assign1,
            _ => NetType::Standard,
        }
    }
}

impl DisjointSet {
    pub(crate) fn with_capacity(c: usize) -> DisjointSet {
        DisjointSet {
            parent: Vec::with_capacity(c),
            size: Vec::with_capacity(c),
            value_zero: None,
            value_one: None
        }
    }

    /// Add singleton nodes up to and including `u`.
    fn grow(&mut self, u: usize) {
        let n = self.parent.len();
        if u >= n {
            self.parent.extend(n..=u);
            self.size.resize(u + 1, 1);
        }
    }

    /// The root of a node's set, halving the path on the way.
    fn find(&mut self, mut u: usize) -> usize {
        self.grow(u);
        while self.parent[u] != u {
            let grand = self.parent[self.parent[u]];
            self.parent[u] = grand;
            u = grand;
        }
        u
    }

    pub(crate) fn merge(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return
        }
        let (big, small) = match self.size[a] >= self.size[b] {
            true => (a, b),
            false => (b, a),
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }

    /// Tie a node to constant zero or one.
    pub(crate) fn set_value(&mut self, a: usize, v: bool) {
        let slot = match v {
            false => &mut self.value_zero,
            true => &mut self.value_one,
        };
        match *slot {
            None => *slot = Some(a),
            Some(b) => self.merge(a, b)
        }
    }

    /// Number the sets of all nodes, of which there are at least
    /// `num_nodes`, in order of their first node.
    ///
    /// Fails if constant zero and one ended up in the same set.
    pub(crate) fn finalize(mut self, num_nodes: usize) -> Result<NetSets> {
        if num_nodes > 0 {
            self.grow(num_nodes - 1);
        }
        let n = self.parent.len();
        let mut root_set = vec![None; n];
        let mut set_of = Vec::with_capacity(n);
        let mut num_sets = 0;
        for i in 0..n {
            let root = self.find(i);
            let set = *root_set[root].get_or_insert_with(|| {
                num_sets += 1;
                num_sets - 1
            });
            set_of.push(set);
        }

        let zero = self.value_zero.map(|i| set_of[i]);
        let one = self.value_one.map(|i| set_of[i]);
        if matches!((zero, one), (Some(a), Some(b)) if a == b) {
            clilog::error!(HD_SV_LIT, "constant zero and one connected");
            return Err(HierError::Parse("constant zero and one connected".into()))
        }
        Ok(NetSets { num_sets, set_of, zero, one })
    }
}

#[test]
fn test_disjoint_set() {
    let mut s = DisjointSet::with_capacity(8);
    s.merge(0, 3);
    s.merge(4, 3);
    s.merge(5, 6);
    s.set_value(6, true);
    s.set_value(1, false);
    let sets = s.finalize(7).unwrap();
    assert_eq!(sets.num_sets, 4);
    assert_eq!(sets.set_of[0], sets.set_of[4]);
    assert_ne!(sets.set_of[0], sets.set_of[5]);
    assert_eq!(sets.net_type(sets.set_of[5]), NetType::Assign1);
    assert_eq!(sets.net_type(sets.set_of[1]), NetType::Assign0);
    assert_eq!(sets.net_type(sets.set_of[2]), NetType::Standard);
    // sets are numbered by their first node.
    assert_eq!(&sets.set_of[..4], &[0, 1, 2, 0]);
    assert_eq!(sets.set_of.len(), 7);

    let mut s = DisjointSet::with_capacity(2);
    s.set_value(0, true);
    s.set_value(1, false);
    s.merge(0, 1);
    assert!(s.finalize(2).is_err());
}
