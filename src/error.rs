use std::{error, fmt};

/// RbtError enumerates over all possible errors that this package
/// shall return.
#[derive(Debug, PartialEq)]
pub enum RbtError<K>
where
    K: Clone + Ord,
{
    /// Fatal case, root of a non-empty tree is red.
    RedRoot,
    /// Fatal case, a red node has a red child.
    ConsecutiveReds,
    /// Fatal case, paths under a node carry different number of black
    /// nodes. The String component of this variant can be used for
    /// debugging.
    UnbalancedBlacks(String),
    /// Fatal case, index entries are not in sort-order.
    SortError(K, K),
    /// Fatal case, child's parent link does not point back to its parent.
    /// Carries the child's key.
    BrokenLink(K),
    /// Fatal case, (counted nodes, len()) disagree.
    SizeMismatch(usize, usize),
    /// Returned by create() API when key is already present.
    OverwriteKey,
    /// Returned by try_set() API when key or value is missing.
    InvalidArgument,
    /// Returned by Cursor when there are no more entries to visit.
    ExhaustedIterator,
}

impl<K> fmt::Display for RbtError<K>
where
    K: Clone + Ord + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RbtError::RedRoot => write!(f, "root node is red"),
            RbtError::ConsecutiveReds => write!(f, "consecutive red nodes"),
            RbtError::UnbalancedBlacks(msg) => write!(f, "unbalanced blacks, {}", msg),
            RbtError::SortError(key, parent) => {
                write!(f, "key {:?} out of order under {:?}", key, parent)
            }
            RbtError::BrokenLink(key) => write!(f, "broken parent link at {:?}", key),
            RbtError::SizeMismatch(counted, len) => {
                write!(f, "counted {} nodes, len is {}", counted, len)
            }
            RbtError::OverwriteKey => write!(f, "key already present"),
            RbtError::InvalidArgument => write!(f, "missing key or value"),
            RbtError::ExhaustedIterator => write!(f, "iterator exhausted"),
        }
    }
}

impl<K> error::Error for RbtError<K> where K: Clone + Ord + fmt::Debug {}
