//! Declared bus ranges and the bit ordering rule.

use std::fmt;
use sverilogparse::SVerilogRange;

/// An inclusive bus range `[left:right]` as declared.
///
/// The declared direction is kept: `[7:0]` is descending and
/// `[0:7]` is ascending. Bits are always ordered from the left
/// bound to the right bound, so position 0 is the left bound.
/// Expansion and collapse of buses both rely on this rule.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BusRange {
    /// The left (first declared) bound.
    pub left: isize,
    /// The right (second declared) bound.
    pub right: isize,
}

impl BusRange {
    #[inline]
    pub fn new(left: isize, right: isize) -> BusRange {
        BusRange { left, right }
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.left.abs_diff(self.right) + 1
    }

    /// Always false: zero-width buses cannot be declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn is_descending(&self) -> bool {
        self.left > self.right
    }

    #[inline]
    pub fn contains(&self, index: isize) -> bool {
        let (l, r) = match self.is_descending() {
            true => (self.right, self.left),
            false => (self.left, self.right),
        };
        l <= index && index <= r
    }

    /// Position of a bus index in bit order, if it is in range.
    #[inline]
    pub fn position(&self, index: isize) -> Option<usize> {
        if !self.contains(index) {
            return None
        }
        Some(index.abs_diff(self.left))
    }

    /// Bus index at a position in bit order.
    #[inline]
    pub fn index_at(&self, position: usize) -> Option<isize> {
        if position >= self.len() {
            return None
        }
        let p = position as isize;
        Some(match self.is_descending() {
            true => self.left - p,
            false => self.left + p,
        })
    }

    /// Enumerate the indices in bit order.
    #[inline]
    pub fn indices(&self) -> impl Iterator<Item = isize> + Clone {
        let r = *self;
        (0..r.len()).map(move |p| match r.is_descending() {
            true => r.left - p as isize,
            false => r.left + p as isize,
        })
    }
}

impl From<SVerilogRange> for BusRange {
    #[inline]
    fn from(SVerilogRange(l, r): SVerilogRange) -> BusRange {
        BusRange::new(l, r)
    }
}

impl fmt::Display for BusRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}:{}]", self.left, self.right)
    }
}

#[test]
fn test_bus_range() {
    assert_eq!(BusRange::new(-2, 99).len(), 102);
    assert_eq!(BusRange::new(99, -2).len(), 102);
    assert_eq!(BusRange::new(0, 0).len(), 1);
    assert_eq!(BusRange::new(1, 6).indices().collect::<Vec<_>>(),
               vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(BusRange::new(4, -3).indices().collect::<Vec<_>>(),
               vec![4, 3, 2, 1, 0, -1, -2, -3]);
    assert_eq!(BusRange::from(SVerilogRange(7, 0)), BusRange::new(7, 0));
}

#[test]
fn test_bus_range_positions() {
    let desc = BusRange::new(7, 4);
    assert_eq!(desc.position(7), Some(0));
    assert_eq!(desc.position(4), Some(3));
    assert_eq!(desc.position(3), None);
    assert_eq!(desc.index_at(1), Some(6));
    assert_eq!(desc.index_at(4), None);

    let asc = BusRange::new(2, 5);
    assert_eq!(asc.position(2), Some(0));
    assert_eq!(asc.position(5), Some(3));
    assert_eq!(asc.index_at(3), Some(5));
    for (p, i) in asc.indices().enumerate() {
        assert_eq!(asc.position(i), Some(p));
        assert_eq!(asc.index_at(p), Some(i));
    }
    assert_eq!(format!("{desc}"), "[7:4]");
}
