//! Ordered key-value index backed by a red-black tree.
//!
//! ```
//! use rbt_index::Rbt;
//!
//! let mut index: Rbt<i64, &str> = Rbt::new("example");
//! index.set(20, "twenty");
//! index.set(10, "ten");
//! index.set(30, "thirty");
//! assert_eq!(index.get(&10), Some(&"ten"));
//! assert_eq!(index.color_dump(), "R_10 B_20 R_30 ");
//! ```

mod depth;
mod empty;
mod error;
mod rbt;

pub use crate::depth::Depth;
pub use crate::empty::Empty;
pub use crate::error::RbtError;
pub use crate::rbt::{Color, Cursor, Iter, Rbt, Stats, Values};
