/// Can be used while indexing keys without values, like ``Rbt<K, Empty>``,
/// turning the index into an ordered set.
#[derive(Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
pub struct Empty {}
