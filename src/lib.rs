//! A concurrent chained hash table with lock striping.
//!
//! [`HashTable`] maps integer keys to values. It can be shared between threads (for example
//! behind an [`Arc`](std::sync::Arc)) and every operation takes `&self`.
//!
//! # Locking
//!
//! The table is an array of buckets, each holding a singly linked chain of entries. The
//! bucket of a key is `key mod size`, adjusted into `[0, size)` for negative keys (see
//! [`Key`]).
//!
//! Buckets are not individually locked. Instead, a fixed pool of locks (the _stripes_) is
//! allocated when the table is created, and bucket `b` is guarded by stripe
//! `b % stripes`. The number of stripes never changes, no matter how large the table gets,
//! so many buckets share one lock. Operations on keys whose buckets map to different
//! stripes run fully in parallel; operations on the same bucket are serialized.
//!
//! # Resizing behavior
//!
//! When an insert of a new key pushes the load factor (entries divided by buckets) above
//! [`LOAD_FACTOR`], the inserting thread grows the table to the smallest prime at least
//! `2 * size + 1`. It first releases its stripe lock, then takes a dedicated resize lock,
//! and then checks the load factor again, since another thread may have grown the table in
//! the meantime. Only if the table is still overloaded does it resize.
//!
//! A resize takes every stripe lock, in ascending order, before it moves a single entry,
//! and keeps them until the new bucket array is in place. No lookup, insert, or removal can
//! therefore ever observe a table that is half moved. Entries are relinked into their new
//! buckets, never copied.
//!
//! # Counting
//!
//! [`HashTable::len`] is an atomic counter that is read without taking any lock. While
//! other threads are modifying the table it is only a snapshot; once they have all
//! finished, it equals the number of entries in the table.
//!
//! # Examples
//!
//! ```
//! use stripemap::HashTable;
//!
//! let table = HashTable::with_size(19);
//! for key in 0..14 {
//!     table.insert(key, key * 100);
//! }
//! // 14 entries in 19 buckets is past the load factor
//! assert_eq!(table.size(), 41);
//!
//! assert_eq!(table.insert(5, 99), Some(500));
//! assert_eq!(table.get(5), Some(99));
//! assert_eq!(table.len(), 14);
//!
//! table.remove(5);
//! assert_eq!(table.get(5), None);
//! assert_eq!(table.len(), 13);
//! ```
#![deny(
    missing_docs,
    missing_debug_implementations,
    unreachable_pub,
    rustdoc::broken_intra_doc_links
)]
#![warn(rust_2018_idioms)]

mod key;
mod map;
mod node;
mod prime;
mod raw;

#[cfg(feature = "rayon")]
mod rayon_impls;

pub use key::Key;
pub use map::{HashTable, TableError, DEFAULT_SIZE, DEFAULT_STRIPES, LOAD_FACTOR};
