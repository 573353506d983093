use std::{
    borrow::Borrow,
    cmp::{Ord, Ordering},
    fmt, mem,
};

use rand::Rng;

use crate::depth::Depth;
use crate::error::RbtError;

// Upper bound on the number of steps taken by random().
const RANDOM_DEPTH: u8 = 40;

// Handle into the node arena. Real nodes live at `nodes[link - 1]`,
// handle 0 is reserved for the sentinel.
type Link = usize;

// Shared sentinel, stands for "no child" and "no parent". Always black,
// carries no key and no value, never allocated in the arena.
const SENTINEL: Link = 0;

/// Rbt manage a single instance of in-memory index using classic
/// [red-black][rbt] tree with parent links.
///
/// Nodes are held in an arena and refer to each other by handle, parent
/// link included. Nodes are never removed, hence a handle stays valid
/// for the life of the index.
///
/// [rbt]: https://en.wikipedia.org/wiki/Red%E2%80%93black_tree
#[derive(Clone)]
pub struct Rbt<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    name: String,
    root: Link,
    nodes: Vec<Node<K, V>>,
    n_count: usize, // number of entries in the tree.
}

/// Different ways to construct a new Rbt instance.
impl<K, V> Rbt<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Create an empty instance of Rbt, identified by `name`.
    /// Applications can choose unique names.
    pub fn new<S>(name: S) -> Rbt<K, V>
    where
        S: AsRef<str>,
    {
        log::debug!("{}: new red-black index", name.as_ref());
        Rbt {
            name: name.as_ref().to_string(),
            root: SENTINEL,
            nodes: Default::default(),
            n_count: Default::default(),
        }
    }
}

/// Maintenance API.
impl<K, V> Rbt<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Identify this instance. Applications can choose unique names while
    /// creating Rbt instances.
    #[inline]
    pub fn id(&self) -> String {
        self.name.clone()
    }

    /// Return number of entries in this instance.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_count
    }

    /// Check whether this index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_count == 0
    }

    /// Return quickly with basic statisics, only entries() and
    /// node_size() methods are valid with this statisics.
    pub fn stats(&self) -> Stats {
        Stats::new(self.n_count, mem::size_of::<Node<K, V>>())
    }
}

// Outcome of a descent looking for key.
enum Locate {
    Found(Link),
    Vacant(Link, Ordering), // (parent, side of parent)
}

/// Write operations on Rbt instance.
impl<K, V> Rbt<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Create a new {key, value} entry in the index. If key is already
    /// present return error and leave the entry untouched.
    pub fn create(&mut self, key: K, value: V) -> Result<(), RbtError<K>> {
        match self.locate(&key) {
            Locate::Found(_) => Err(RbtError::OverwriteKey),
            Locate::Vacant(parent, side) => {
                self.attach(parent, side, key, value);
                Ok(())
            }
        }
    }

    /// Set value for key. If there is an existing entry for key,
    /// overwrite the old value with new value and return the old value.
    /// Overwriting never changes the shape or colors of the tree.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        match self.locate(&key) {
            Locate::Found(link) => {
                let node = self.node_mut(link);
                Some(mem::replace(&mut node.value, value))
            }
            Locate::Vacant(parent, side) => {
                self.attach(parent, side, key, value);
                None
            }
        }
    }

    /// Same as set(), for callers holding nullable key and value. When
    /// either of them is missing, return InvalidArgument and leave the
    /// index as is.
    pub fn try_set(&mut self, key: Option<K>, value: Option<V>) -> Result<Option<V>, RbtError<K>> {
        match (key, value) {
            (Some(key), Some(value)) => Ok(self.set(key, value)),
            _ => Err(RbtError::InvalidArgument),
        }
    }

    /// Validate red-black tree with following rules:
    ///
    /// * Root node is black.
    /// * From root to any leaf, no consecutive reds allowed in its path.
    /// * Number of blacks should be same under left child and right child.
    /// * Make sure keys are in sorted order.
    /// * Every child link is mirrored by the child's parent link.
    /// * Number of reachable nodes match len().
    ///
    /// Additionally return full statistics on the tree. Refer to [`Stats`]
    /// for more information.
    pub fn validate(&self) -> Result<Stats, RbtError<K>> {
        if self.is_red(self.root) {
            return Err(RbtError::RedRoot);
        }
        if self.root != SENTINEL && self.node(self.root).parent != SENTINEL {
            return Err(RbtError::BrokenLink(self.node(self.root).key.clone()));
        }

        let mut stats = Stats::new(self.n_count, mem::size_of::<Node<K, V>>());
        stats.set_depths(Depth::new());
        let mut count = 0;
        let blacks = self.validate_tree(self.root, false, 0, 0, &mut count, &mut stats)?;
        if count != self.n_count {
            return Err(RbtError::SizeMismatch(count, self.n_count));
        }
        stats.set_blacks(blacks);
        Ok(stats)
    }
}

/// Read operations on Rbt instance.
impl<K, V> Rbt<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Get the value for key, None if key is not present.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut link = self.root;
        while link != SENTINEL {
            let node = self.node(link);
            link = match node.key.borrow().cmp(key) {
                Ordering::Less => node.right,
                Ordering::Greater => node.left,
                Ordering::Equal => return Some(&node.value),
            };
        }
        None
    }

    /// Check whether key is present in this index.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Return a random entry from this index.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<(&K, &V)> {
        if self.root == SENTINEL {
            return None;
        }

        let (mut link, mut at_depth) = (self.root, rng.gen::<u8>() % RANDOM_DEPTH);
        loop {
            let node = self.node(link);
            let next = match rng.gen::<u8>() % 2 {
                0 => node.left,
                _ => node.right,
            };
            if at_depth == 0 || next == SENTINEL {
                break Some((&node.key, &node.value));
            }
            at_depth -= 1;
            link = next;
        }
    }

    /// Return an iterator over all entries in this instance, in
    /// ascending order of keys.
    pub fn iter(&self) -> Iter<K, V> {
        Iter {
            rbt: self,
            link: self.leftmost(self.root),
            remaining: self.n_count,
        }
    }

    /// Return an iterator over all values in this instance, in
    /// ascending order of their keys.
    pub fn values(&self) -> Values<K, V> {
        Values { iter: self.iter() }
    }

    /// Return a detached cursor positioned before the smallest entry.
    /// Refer to [`Cursor`] for details.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            pos: Position::Start,
        }
    }

    /// Render every entry as `<C>_<key> `, where `<C>` is `R` for red and
    /// `B` for black nodes, in ascending order of keys. Empty index
    /// renders as empty string.
    pub fn color_dump(&self) -> String
    where
        K: fmt::Display,
    {
        let mut out = String::new();
        let mut link = self.leftmost(self.root);
        while link != SENTINEL {
            let node = self.node(link);
            out.push_str(&format!("{}_{} ", node.color, node.key));
            link = self.successor(link);
        }
        out
    }
}

impl<K, V> Rbt<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    #[inline]
    fn node(&self, link: Link) -> &Node<K, V> {
        &self.nodes[link - 1]
    }

    #[inline]
    fn node_mut(&mut self, link: Link) -> &mut Node<K, V> {
        &mut self.nodes[link - 1]
    }

    #[inline]
    fn is_red(&self, link: Link) -> bool {
        link != SENTINEL && self.node(link).color == Color::Red
    }

    #[inline]
    fn is_black(&self, link: Link) -> bool {
        !self.is_red(link)
    }

    #[inline]
    fn set_color(&mut self, link: Link, color: Color) {
        self.node_mut(link).color = color
    }

    #[inline]
    fn is_left_child(&self, link: Link) -> bool {
        let parent = self.node(link).parent;
        parent != SENTINEL && self.node(parent).left == link
    }

    // Descend from root, less-than steers left, greater-than steers
    // right and an equal key stops the descent.
    fn locate(&self, key: &K) -> Locate {
        let (mut parent, mut side) = (SENTINEL, Ordering::Equal);
        let mut link = self.root;
        while link != SENTINEL {
            let node = self.node(link);
            side = key.cmp(&node.key);
            parent = link;
            link = match side {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Locate::Found(link),
            };
        }
        Locate::Vacant(parent, side)
    }

    fn attach(&mut self, parent: Link, side: Ordering, key: K, value: V) -> Link {
        self.nodes.push(Node::new(key, value, parent));
        let link = self.nodes.len();
        match side {
            _ if parent == SENTINEL => self.root = link,
            Ordering::Less => self.node_mut(parent).left = link,
            _ => self.node_mut(parent).right = link,
        }
        self.n_count += 1;
        self.rebalance(link);
        link
    }

    // Restore red-black rules after `link` was attached as a red node.
    fn rebalance(&mut self, mut link: Link) {
        loop {
            let parent = self.node(link).parent;
            if parent == SENTINEL {
                // reached root.
                self.set_color(link, Color::Black);
                return;
            }
            if self.is_black(parent) {
                return;
            }

            // parent is red, hence not root, hence grand is a real node.
            let grand = self.node(parent).parent;
            let parent_left = self.node(grand).left == parent;
            let uncle = if parent_left {
                self.node(grand).right
            } else {
                self.node(grand).left
            };
            if self.is_red(uncle) {
                log::trace!("{}: recolor, continue from grandparent", self.name);
                self.set_color(parent, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(grand, Color::Red);
                link = grand;
                continue;
            }

            // zig-zag, straighten it by rotating the parent, former parent
            // becomes the bottom of a zig-zig.
            let node_left = self.is_left_child(link);
            let (link, parent) = match (parent_left, node_left) {
                (true, false) => {
                    self.rotate_left(parent);
                    (parent, link)
                }
                (false, true) => {
                    self.rotate_right(parent);
                    (parent, link)
                }
                _ => (link, parent),
            };
            debug_assert_eq!(self.node(link).parent, parent);

            // zig-zig
            self.set_color(parent, Color::Black);
            self.set_color(grand, Color::Red);
            if parent_left {
                self.rotate_right(grand)
            } else {
                self.rotate_left(grand)
            }
            return;
        }
    }

    // Point whichever slot held `old`, under `parent` or root, to `new`.
    fn replace_child(&mut self, parent: Link, old: Link, new: Link) {
        if parent == SENTINEL {
            self.root = new;
        } else if self.node(parent).left == old {
            self.node_mut(parent).left = new;
        } else {
            self.node_mut(parent).right = new;
        }
    }

    //              (p)                       (p)
    //               |                         |
    //              node                       x
    //              /  \                      / \
    //             /    \                    /   \
    //            /      \                  /     \
    //          left      x              node      xr
    //                   / \             /  \
    //                 xl   xr        left   xl
    //
    fn rotate_left(&mut self, node: Link) {
        let x = self.node(node).right;
        if x == SENTINEL {
            panic!("rotate_left(): no right child ? Call the programmer");
        }
        log::trace!("{}: rotate_left", self.name);

        let parent = self.node(node).parent;
        self.node_mut(x).parent = parent;
        self.replace_child(parent, node, x);

        let xl = self.node(x).left;
        self.node_mut(node).right = xl;
        if xl != SENTINEL {
            self.node_mut(xl).parent = node;
        }
        self.node_mut(node).parent = x;
        self.node_mut(x).left = node;
    }

    //              (p)                       (p)
    //               |                         |
    //              node                       x
    //              /  \                      / \
    //             /    \                    /   \
    //            /      \                  /     \
    //           x      right             xl      node
    //          / \                               / \
    //        xl   xr                           xr  right
    //
    fn rotate_right(&mut self, node: Link) {
        let x = self.node(node).left;
        if x == SENTINEL {
            panic!("rotate_right(): no left child ? Call the programmer");
        }
        log::trace!("{}: rotate_right", self.name);

        let parent = self.node(node).parent;
        self.node_mut(x).parent = parent;
        self.replace_child(parent, node, x);

        let xr = self.node(x).right;
        self.node_mut(node).left = xr;
        if xr != SENTINEL {
            self.node_mut(xr).parent = node;
        }
        self.node_mut(node).parent = x;
        self.node_mut(x).right = node;
    }

    fn leftmost(&self, mut link: Link) -> Link {
        if link == SENTINEL {
            return SENTINEL;
        }
        while self.node(link).left != SENTINEL {
            link = self.node(link).left;
        }
        link
    }

    // In-order successor, following live links. SENTINEL when `link` holds
    // the largest key.
    fn successor(&self, mut link: Link) -> Link {
        let right = self.node(link).right;
        if right != SENTINEL {
            return self.leftmost(right);
        }
        let mut parent = self.node(link).parent;
        while parent != SENTINEL && self.node(parent).right == link {
            link = parent;
            parent = self.node(parent).parent;
        }
        parent
    }

    fn validate_tree(
        &self,
        link: Link,
        fromred: bool,
        mut nb: usize,
        depth: usize,
        count: &mut usize,
        stats: &mut Stats,
    ) -> Result<usize, RbtError<K>> {
        if link == SENTINEL {
            if let Some(depths) = stats.depths.as_mut() {
                depths.sample(depth);
            }
            return Ok(nb);
        }
        *count += 1;

        let red = self.is_red(link);
        if fromred && red {
            return Err(RbtError::ConsecutiveReds);
        }
        if !red {
            nb += 1;
        }
        let node = self.node(link);
        let (left, right) = (node.left, node.right);
        let lblacks = self.validate_tree(left, red, nb, depth + 1, count, stats)?;
        let rblacks = self.validate_tree(right, red, nb, depth + 1, count, stats)?;
        if lblacks != rblacks {
            let err = format!("left: {} right: {}", lblacks, rblacks);
            return Err(RbtError::UnbalancedBlacks(err));
        }
        if left != SENTINEL {
            let left = self.node(left);
            if left.parent != link {
                return Err(RbtError::BrokenLink(left.key.clone()));
            }
            if left.key.ge(&node.key) {
                let (lkey, parent) = (left.key.clone(), node.key.clone());
                return Err(RbtError::SortError(lkey, parent));
            }
        }
        if right != SENTINEL {
            let right = self.node(right);
            if right.parent != link {
                return Err(RbtError::BrokenLink(right.key.clone()));
            }
            if right.key.le(&node.key) {
                let (rkey, parent) = (right.key.clone(), node.key.clone());
                return Err(RbtError::SortError(rkey, parent));
            }
        }
        Ok(lblacks)
    }
}

impl<'a, K, V> IntoIterator for &'a Rbt<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// Iterator over entries of [`Rbt`] in ascending order of keys. Holds a
/// shared borrow on the index, so the index cannot be mutated while
/// this iterator is alive.
pub struct Iter<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    rbt: &'a Rbt<K, V>,
    link: Link,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.link == SENTINEL {
            return None;
        }
        let rbt = self.rbt;
        let node = rbt.node(self.link);
        self.link = rbt.successor(self.link);
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
}

/// Iterator over values of [`Rbt`] in ascending order of their keys.
pub struct Values<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    iter: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Position {
    Start,
    At(Link),
    Done,
}

/// Cursor walks over entries of [`Rbt`] in ascending order of keys,
/// without borrowing the index between steps. Any number of cursors can
/// be interleaved on the same index.
///
/// The cursor remembers only the node it is parked on and finds the next
/// one by following live links. If the index is mutated between two
/// steps, the walk continues from the parked node in the current shape
/// of the tree; entries may then be skipped or seen out of the original
/// order, but the cursor never panics. A cursor must be advanced against
/// the index that created it.
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    pos: Position,
}

impl Cursor {
    /// Check whether a call to next_entry() shall yield an entry.
    pub fn has_next<K, V>(&self, rbt: &Rbt<K, V>) -> bool
    where
        K: Clone + Ord,
        V: Clone,
    {
        match self.pos {
            Position::Start => rbt.root != SENTINEL,
            Position::At(link) if link <= rbt.nodes.len() => {
                rbt.successor(link) != SENTINEL
            }
            _ => false,
        }
    }

    /// Move to the next entry and return it. Once the last entry is
    /// passed, this and every later call fail with ExhaustedIterator.
    pub fn next_entry<'a, K, V>(&mut self, rbt: &'a Rbt<K, V>) -> Result<(&'a K, &'a V), RbtError<K>>
    where
        K: Clone + Ord,
        V: Clone,
    {
        let next = match self.pos {
            Position::Start => rbt.leftmost(rbt.root),
            Position::At(link) if link <= rbt.nodes.len() => rbt.successor(link),
            _ => SENTINEL,
        };
        if next == SENTINEL {
            self.pos = Position::Done;
            return Err(RbtError::ExhaustedIterator);
        }
        self.pos = Position::At(next);
        let node = rbt.node(next);
        Ok((&node.key, &node.value))
    }
}

/// Color of a node in [`Rbt`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Color {
    Red,
    Black,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Color::Red => write!(f, "R"),
            Color::Black => write!(f, "B"),
        }
    }
}

/// Node corresponds to a single entry in Rbt instance.
#[derive(Clone)]
struct Node<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    key: K,
    value: V,
    color: Color,
    parent: Link, // back link, SENTINEL for root
    left: Link,
    right: Link,
}

impl<K, V> Node<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    // new nodes are always red and attached as leaf.
    fn new(key: K, value: V, parent: Link) -> Node<K, V> {
        Node {
            key,
            value,
            color: Color::Red,
            parent,
            left: SENTINEL,
            right: SENTINEL,
        }
    }
}

/// Statistics on [`Rbt`] tree. Serves two purpose:
///
/// * To get partial but quick statistics via [`Rbt::stats`] method.
/// * To get full statisics via [`Rbt::validate`] method.
#[derive(Default, Debug)]
pub struct Stats {
    entries: usize, // number of entries in the tree.
    node_size: usize,
    blacks: Option<usize>,
    depths: Option<Depth>,
}

impl Stats {
    fn new(entries: usize, node_size: usize) -> Stats {
        Stats {
            entries,
            node_size,
            blacks: Default::default(),
            depths: Default::default(),
        }
    }

    #[inline]
    fn set_blacks(&mut self, blacks: usize) {
        self.blacks = Some(blacks)
    }

    #[inline]
    fn set_depths(&mut self, depths: Depth) {
        self.depths = Some(depths)
    }

    /// Return number entries in [`Rbt`] instance.
    #[inline]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Return node-size, including over-head for `Rbt<K,V>`. Although
    /// the node overhead is constant, the node size varies based on
    /// key and value types. EG:
    ///
    /// ```
    /// use rbt_index::Rbt;
    /// let rbt: Rbt<u64,u64> = Rbt::new("myinstance");
    ///
    /// // size of key: 8 bytes
    /// // size of value: 8 bytes
    /// // overhead is 32 bytes, three links and color.
    /// assert_eq!(rbt.stats().node_size(), 48);
    /// ```
    #[inline]
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Return number of black nodes from root to leaf, root included.
    /// Same for every path.
    #[inline]
    pub fn blacks(&self) -> Option<usize> {
        self.blacks
    }

    /// Return [`Depth`] statistics.
    pub fn depths(&self) -> Option<Depth> {
        self.depths.as_ref().filter(|d| d.samples() > 0).cloned()
    }
}
