use std::cmp::Ordering;
use std::collections::TryReserveError;
use std::fmt;

// LEMMA: an insert-only red-black tree with `n` nodes has height at most `2*log₂(n+1)`,
// so every descent below is O(log n).

/// Three-way comparison strategy for tree items.
///
/// Implemented by [`NaturalOrder`] (delegates to `Ord`) and by any
/// `Fn(&T, &T) -> Ordering` closure.
pub trait Compare<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders items by their own `Ord` implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<T: Ord> Compare<T> for NaturalOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T, F: Fn(&T, &T) -> Ordering> Compare<T> for F {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Why an [`RBTree::insert`] call changed nothing.
#[derive(Debug)]
pub enum InsertError {
    /// An item comparing equal is already in the tree.
    Duplicate,
    /// The node arena could not reserve space for one more node.
    Alloc(TryReserveError),
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::Duplicate => write!(f, "an equal item is already in the tree"),
            InsertError::Alloc(e) => write!(f, "node arena reservation failed: {e}"),
        }
    }
}

impl std::error::Error for InsertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InsertError::Duplicate => None,
            InsertError::Alloc(e) => Some(e),
        }
    }
}

impl From<TryReserveError> for InsertError {
    fn from(e: TryReserveError) -> Self {
        InsertError::Alloc(e)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

// NOTE: nodes are never removed, so arena indices stay valid for the life of the tree
// (cleared wholesale by `clear`). Absent children count as Black.
type NodeId = usize;

struct Node<T> {
    item: T,
    color: Color,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// An insert-only red-black tree over an index arena.
///
/// Items are kept in strictly ascending order under the comparator `C`;
/// inserting an item that compares equal to a present one is a rejected
/// no-op, not an update.
pub struct RBTree<T, C = NaturalOrder> {
    nodes: Vec<Node<T>>,
    root: Option<NodeId>,
    cmp: C,
}

impl<T: Ord> RBTree<T> {
    /// An empty tree ordered by `T`'s own `Ord`.
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder)
    }
}

impl<T: Ord> Default for RBTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for RBTree<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = Self::new();
        for item in iter {
            // duplicates are skipped; arena exhaustion mid-collect is unrecoverable here
            let _ = tree.insert(item);
        }
        tree
    }
}

impl<T, C: Compare<T>> RBTree<T, C> {
    /// An empty tree ordered by an explicit comparison strategy.
    pub fn with_comparator(cmp: C) -> Self {
        Self { nodes: Vec::new(), root: None, cmp }
    }

    /// The amount of items in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds `item` to the tree.
    ///
    /// Fails with [`InsertError::Duplicate`] if an equal item is present and
    /// with [`InsertError::Alloc`] if the arena cannot grow; either way the
    /// tree is left exactly as it was.
    pub fn insert(&mut self, item: T) -> Result<(), InsertError> {
        let mut parent = None;
        let mut went_left = false;
        let mut cur = self.root;
        while let Some(id) = cur {
            match self.cmp.compare(&item, &self.nodes[id].item) {
                Ordering::Less => {
                    parent = Some(id);
                    went_left = true;
                    cur = self.nodes[id].left;
                }
                Ordering::Greater => {
                    parent = Some(id);
                    went_left = false;
                    cur = self.nodes[id].right;
                }
                Ordering::Equal => return Err(InsertError::Duplicate),
            }
        }

        // reserve before linking anything, so a failed insert mutates nothing
        self.nodes.try_reserve(1)?;
        let id = self.nodes.len();
        let color = if parent.is_none() { Color::Black } else { Color::Red };
        self.nodes.push(Node { item, color, parent, left: None, right: None });
        match parent {
            None => self.root = Some(id),
            Some(p) if went_left => self.nodes[p].left = Some(id),
            Some(p) => self.nodes[p].right = Some(id),
        }
        self.fix_up(id);
        Ok(())
    }

    /// Whether an item comparing equal to `item` is in the tree.
    pub fn contains(&self, item: &T) -> bool {
        self.find(item).is_some()
    }

    /// The stored item comparing equal to `item`, if any.
    ///
    /// Distinct from [`contains`](Self::contains) when the comparator only
    /// keys on part of the item.
    pub fn get(&self, item: &T) -> Option<&T> {
        self.find(item).map(|id| &self.nodes[id].item)
    }

    fn find(&self, item: &T) -> Option<NodeId> {
        let mut cur = self.root;
        while let Some(id) = cur {
            cur = match self.cmp.compare(item, &self.nodes[id].item) {
                Ordering::Less => self.nodes[id].left,
                Ordering::Greater => self.nodes[id].right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    /// Calls `f` on every item in ascending comparator order.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.try_for_each(|item| {
            f(item);
            true
        });
    }

    /// Calls `f` on items in ascending order until it returns `false`.
    ///
    /// Returns whether the walk ran to completion.
    pub fn try_for_each(&self, mut f: impl FnMut(&T) -> bool) -> bool {
        for item in self.iter() {
            if !f(item) {
                return false;
            }
        }
        true
    }

    /// Ascending in-order iteration over the items.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            nodes: &self.nodes,
            next: self.root.map(|r| leftmost(&self.nodes, r)),
        }
    }

    /// Drops every item and resets to an empty tree.
    ///
    /// Dropping the tree does the same; this is the explicit entry point for
    /// deterministic teardown while keeping the tree usable afterwards.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Restores the no-red-red invariant starting at a freshly inserted red node.
    fn fix_up(&mut self, mut n: NodeId) {
        loop {
            let Some(p) = self.nodes[n].parent else {
                self.nodes[n].color = Color::Black;
                return;
            };
            if self.nodes[p].color == Color::Black {
                return;
            }
            let Some(g) = self.nodes[p].parent else {
                return;
            };
            let uncle = if self.nodes[g].left == Some(p) {
                self.nodes[g].right
            } else {
                self.nodes[g].left
            };
            match uncle {
                Some(u) if self.nodes[u].color == Color::Red => {
                    // red uncle: push blackness down from the grandparent and retry there
                    self.nodes[p].color = Color::Black;
                    self.nodes[u].color = Color::Black;
                    self.nodes[g].color = Color::Red;
                    n = g;
                }
                _ => {
                    let up = if self.is_inner_grandchild(n, p, g) {
                        self.rotate_inner(n, p, g);
                        n
                    } else {
                        p
                    };
                    self.rotate_outer(up, g);
                    return;
                }
            }
        }
    }

    /// Zig-zag shape: `n` sits on the opposite side of `p` than `p` sits under `g`.
    fn is_inner_grandchild(&self, n: NodeId, p: NodeId, g: NodeId) -> bool {
        (self.nodes[g].left == Some(p) && self.nodes[p].right == Some(n))
            || (self.nodes[g].right == Some(p) && self.nodes[p].left == Some(n))
    }

    /// First rotation: straightens a zig-zag by rotating `n` above its parent `p`,
    /// leaving `n` in `p`'s old place under `g`.
    fn rotate_inner(&mut self, n: NodeId, p: NodeId, g: NodeId) {
        log::trace!("inner rotation at arena index {n}");
        if self.nodes[g].left == Some(p) {
            let moved = self.nodes[n].left;
            self.nodes[p].right = moved;
            if let Some(m) = moved {
                self.nodes[m].parent = Some(p);
            }
            self.nodes[n].left = Some(p);
            self.nodes[g].left = Some(n);
        } else {
            let moved = self.nodes[n].right;
            self.nodes[p].left = moved;
            if let Some(m) = moved {
                self.nodes[m].parent = Some(p);
            }
            self.nodes[n].right = Some(p);
            self.nodes[g].right = Some(n);
        }
        self.nodes[n].parent = Some(g);
        self.nodes[p].parent = Some(n);
    }

    /// Second rotation: rotates `g`'s child `p` up into `g`'s place, relinking the
    /// displaced subtree under `g`, then recolors (`p` black, `g` red).
    fn rotate_outer(&mut self, p: NodeId, g: NodeId) {
        log::trace!("outer rotation at arena index {p}");
        if self.nodes[g].left == Some(p) {
            let moved = self.nodes[p].right;
            self.nodes[g].left = moved;
            if let Some(m) = moved {
                self.nodes[m].parent = Some(g);
            }
            self.nodes[p].right = Some(g);
        } else {
            let moved = self.nodes[p].left;
            self.nodes[g].right = moved;
            if let Some(m) = moved {
                self.nodes[m].parent = Some(g);
            }
            self.nodes[p].left = Some(g);
        }
        let above = self.nodes[g].parent;
        self.nodes[p].parent = above;
        match above {
            None => self.root = Some(p),
            Some(gg) if self.nodes[gg].left == Some(g) => self.nodes[gg].left = Some(p),
            Some(gg) => self.nodes[gg].right = Some(p),
        }
        self.nodes[g].parent = Some(p);
        self.nodes[p].color = Color::Black;
        self.nodes[g].color = Color::Red;
    }
}

fn leftmost<T>(nodes: &[Node<T>], mut id: NodeId) -> NodeId {
    while let Some(l) = nodes[id].left {
        id = l;
    }
    id
}

/// Ascending in-order cursor over a tree, advanced by parent-pointer
/// successor walks (no auxiliary stack).
pub struct Iter<'a, T> {
    nodes: &'a [Node<T>],
    next: Option<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let id = self.next?;
        let node = &self.nodes[id];
        self.next = match node.right {
            Some(r) => Some(leftmost(self.nodes, r)),
            None => {
                // climb while we are a right child; the first left-parent is the successor
                let mut child = id;
                let mut parent = node.parent;
                while let Some(p) = parent {
                    if self.nodes[p].right != Some(child) {
                        break;
                    }
                    child = p;
                    parent = self.nodes[p].parent;
                }
                parent
            }
        };
        Some(&node.item)
    }
}

impl<'a, T, C: Compare<T>> IntoIterator for &'a RBTree<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T: fmt::Debug, C: Compare<T>> fmt::Debug for RBTree<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
impl<T, C: Compare<T>> RBTree<T, C> {
    /// Asserts every red-black invariant plus arena link consistency.
    fn check_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len(), 0);
            return;
        };
        assert_eq!(self.nodes[root].color, Color::Black, "root must be black");
        assert_eq!(self.nodes[root].parent, None);
        self.check_subtree(root);

        let items: Vec<&T> = self.iter().collect();
        assert_eq!(items.len(), self.len());
        for pair in items.windows(2) {
            assert_eq!(self.cmp.compare(pair[0], pair[1]), Ordering::Less);
        }
    }

    /// Returns the black-height of `id`'s subtree, asserting along the way.
    fn check_subtree(&self, id: NodeId) -> usize {
        let node = &self.nodes[id];
        let mut heights = [1, 1];
        for (slot, child) in heights.iter_mut().zip([node.left, node.right]) {
            if let Some(c) = child {
                assert_eq!(self.nodes[c].parent, Some(id), "stale parent link");
                if node.color == Color::Red {
                    assert_eq!(self.nodes[c].color, Color::Black, "red node with red child");
                }
                *slot = self.check_subtree(c);
            }
        }
        assert_eq!(heights[0], heights[1], "unequal black-heights");
        heights[0] + usize::from(node.color == Color::Black)
    }
}

#[test]
fn three_inserts_rebalance_to_a_perfect_root() {
    crate::init_test_logging();
    let mut tree = RBTree::new();
    tree.insert(10).unwrap();
    tree.insert(20).unwrap();
    tree.insert(30).unwrap();

    // straight-line case with an absent uncle: 20 rotates up and turns black
    let root = tree.root.unwrap();
    assert_eq!(tree.nodes[root].item, 20);
    assert_eq!(tree.nodes[root].color, Color::Black);
    let left = tree.nodes[root].left.unwrap();
    let right = tree.nodes[root].right.unwrap();
    assert_eq!(tree.nodes[left].item, 10);
    assert_eq!(tree.nodes[right].item, 30);
    assert_eq!(tree.nodes[left].color, Color::Red);
    assert_eq!(tree.nodes[right].color, Color::Red);
    tree.check_invariants();
}

#[test]
fn duplicate_insert_is_a_rejected_noop() {
    let mut tree = RBTree::new();
    tree.insert("carrot").unwrap();
    tree.insert("apple").unwrap();
    assert!(matches!(tree.insert("carrot"), Err(InsertError::Duplicate)));
    assert_eq!(tree.len(), 2);
    tree.check_invariants();
}

#[test]
fn traversal_is_ascending() {
    let tree: RBTree<i32> = [5, 1, 3, 2, 4].into_iter().collect();
    let mut seen = Vec::new();
    tree.for_each(|&n| seen.push(n));
    assert_eq!(seen, [1, 2, 3, 4, 5]);
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
}

#[test]
fn try_for_each_can_stop_early() {
    let tree: RBTree<i32> = (0..100).collect();
    let mut seen = 0;
    let finished = tree.try_for_each(|&n| {
        seen += 1;
        n < 9
    });
    assert!(!finished);
    assert_eq!(seen, 10); // items 0..=9, stopping on 9
    assert!(tree.try_for_each(|_| true));
}

#[test]
fn contains_hits_and_misses() {
    let tree: RBTree<i32> = (0..50).map(|n| n * 2).collect();
    for n in 0..100 {
        assert_eq!(tree.contains(&n), n % 2 == 0);
    }
    assert_eq!(tree.get(&24), Some(&24));
    assert_eq!(tree.get(&25), None);
}

#[test]
fn invariants_hold_under_scrambled_inserts() {
    let mut tree = RBTree::new();
    let mut x: u64 = 0x9e3779b97f4a7c15;
    let mut inserted = 0;
    for _ in 0..1000 {
        // xorshift64
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        if tree.insert(x % 700).is_ok() {
            inserted += 1;
        }
        tree.check_invariants();
    }
    assert_eq!(tree.len(), inserted);
}

#[test]
fn custom_comparator_reverses_the_order() {
    let mut tree = RBTree::with_comparator(|a: &i32, b: &i32| b.cmp(a));
    for n in [3, 1, 4, 1, 5, 9, 2, 6] {
        let _ = tree.insert(n);
    }
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), [9, 6, 5, 4, 3, 2, 1]);
    assert!(tree.contains(&9));
    tree.check_invariants();
}

#[test]
fn clear_releases_everything() {
    let mut tree: RBTree<String> = ["a", "b", "c"].into_iter().map(String::from).collect();
    assert_eq!(tree.len(), 3);
    tree.clear();
    assert!(tree.is_empty());
    assert!(!tree.contains(&"a".to_string()));
    tree.insert("d".to_string()).unwrap();
    assert_eq!(tree.len(), 1);
    tree.check_invariants();
}
