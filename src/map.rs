use crate::key::Key;
use crate::node;
use crate::raw::Table;
use parking_lot::{Mutex, MutexGuard};
use std::collections::TryReserveError;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The number of buckets a table starts out with when no size is given.
pub const DEFAULT_SIZE: usize = 19;

/// The number of stripe locks a table uses when no stripe count is given.
pub const DEFAULT_STRIPES: usize = 64;

/// The load factor above which an insert grows the table.
///
/// The load factor is the number of entries divided by the number of buckets.
pub const LOAD_FACTOR: f64 = 0.7;

#[inline]
fn overloaded(count: usize, size: usize) -> bool {
    count as f64 / size as f64 > LOAD_FACTOR
}

/// A concurrent chained hash table with lock striping.
///
/// Every bucket holds a chain of entries. Buckets are guarded by a fixed pool of stripe
/// locks: bucket `b` is guarded by lock `b % stripes`. Operations on buckets guarded by
/// different locks run in parallel; operations on the same bucket are serialized by its
/// lock, which makes each key linearizable.
///
/// When an insert pushes the load factor above [`LOAD_FACTOR`], the inserting thread
/// grows the table to the smallest prime at least `2 * size + 1`. Growth takes a
/// dedicated resize lock and then every stripe lock, so it is exclusive against all
/// other operations.
///
/// # Examples
///
/// ```
/// use stripemap::HashTable;
/// use std::sync::Arc;
/// use std::thread;
///
/// let table = Arc::new(HashTable::with_size(19));
/// let writers: Vec<_> = (0..4)
///     .map(|t| {
///         let table = Arc::clone(&table);
///         thread::spawn(move || {
///             for key in t * 1000..(t + 1) * 1000 {
///                 table.insert(key, key * 100);
///             }
///         })
///     })
///     .collect();
/// for writer in writers {
///     writer.join().unwrap();
/// }
///
/// assert_eq!(table.len(), 4000);
/// assert_eq!(table.get(1234), Some(123400));
/// ```
pub struct HashTable<K, V> {
    table: Table<K, V>,

    /// Number of live entries.
    ///
    /// Changed only by the thread holding the stripe lock of the bucket it mutates, in the
    /// same critical section. Read without any lock.
    count: AtomicUsize,

    /// Serializes resizes against each other.
    resize_lock: Mutex<()>,
}

/// The error type for fallible [`HashTable`] constructors and [`HashTable::resize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableError {
    /// A table must have at least one bucket.
    ZeroSize,
    /// A table must have at least one stripe lock.
    ZeroStripes,
    /// The bucket array could not be allocated.
    Alloc {
        /// The number of buckets that were asked for.
        buckets: usize,
        /// The underlying allocation failure.
        source: TryReserveError,
    },
}

impl Display for TableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TableError::ZeroSize => write!(f, "a table needs at least one bucket"),
            TableError::ZeroStripes => write!(f, "a table needs at least one stripe lock"),
            TableError::Alloc { buckets, .. } => {
                write!(f, "failed to allocate a table of {} buckets", buckets)
            }
        }
    }
}

impl Error for TableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TableError::Alloc { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl<K, V> HashTable<K, V> {
    /// Creates an empty table with [`DEFAULT_SIZE`] buckets and [`DEFAULT_STRIPES`] locks.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::{HashTable, DEFAULT_SIZE};
    ///
    /// let table: HashTable<i32, i32> = HashTable::new();
    /// assert_eq!(table.size(), DEFAULT_SIZE);
    /// ```
    pub fn new() -> Self {
        Self::with_size(DEFAULT_SIZE)
    }

    /// Creates an empty table with `size` buckets and [`DEFAULT_STRIPES`] locks.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or the bucket array cannot be allocated. See
    /// [`HashTable::try_with_size`] for a fallible version.
    pub fn with_size(size: usize) -> Self {
        Self::with_size_and_stripes(size, DEFAULT_STRIPES)
    }

    /// Creates an empty table with `size` buckets guarded by `stripes` locks.
    ///
    /// # Panics
    ///
    /// Panics if `size` or `stripes` is zero, or if the bucket array cannot be allocated.
    pub fn with_size_and_stripes(size: usize, stripes: usize) -> Self {
        match Self::try_with_size_and_stripes(size, stripes) {
            Ok(table) => table,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates an empty table with `size` buckets and [`DEFAULT_STRIPES`] locks.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::{HashTable, TableError};
    ///
    /// assert!(HashTable::<i32, i32>::try_with_size(19).is_ok());
    /// assert_eq!(
    ///     HashTable::<i32, i32>::try_with_size(0).err(),
    ///     Some(TableError::ZeroSize)
    /// );
    /// ```
    pub fn try_with_size(size: usize) -> Result<Self, TableError> {
        Self::try_with_size_and_stripes(size, DEFAULT_STRIPES)
    }

    /// Creates an empty table with `size` buckets guarded by `stripes` locks.
    ///
    /// On failure nothing is left allocated.
    pub fn try_with_size_and_stripes(size: usize, stripes: usize) -> Result<Self, TableError> {
        if size == 0 {
            return Err(TableError::ZeroSize);
        }
        if stripes == 0 {
            return Err(TableError::ZeroStripes);
        }

        let table = Table::try_new(size, stripes).map_err(|source| TableError::Alloc {
            buckets: size,
            source,
        })?;
        tracing::trace!(size, stripes, "created table");

        Ok(Self {
            table,
            count: AtomicUsize::new(0),
            resize_lock: Mutex::new(()),
        })
    }

    /// Returns the number of entries in the table.
    ///
    /// This is read without taking any lock. While other threads are inserting or removing,
    /// the value may lag behind or run ahead of what a lookup would find; once every
    /// writer has finished (for example, has been joined) it is exact.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::new();
    /// table.insert(1, "a");
    /// table.insert(2, "b");
    /// assert_eq!(table.len(), 2);
    /// ```
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of buckets.
    pub fn size(&self) -> usize {
        self.table.size()
    }

    /// Returns the number of stripe locks. This never changes.
    pub fn stripes(&self) -> usize {
        self.table.stripes()
    }

    /// Returns the current load factor, `len() / size()`.
    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.size() as f64
    }

    /// Removes every entry. The number of buckets is left as it is.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::new();
    /// for i in 0..100 {
    ///     table.insert(i, i);
    /// }
    /// let size = table.size();
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert_eq!(table.get(7), None);
    /// assert_eq!(table.size(), size);
    /// ```
    pub fn clear(&self) {
        let mut all = self.table.lock_all();
        let removed = all.drain();
        self.count.fetch_sub(removed, Ordering::SeqCst);
    }

    /// Calls `f` on every entry.
    ///
    /// Every stripe lock is held for the duration, so `f` sees a consistent snapshot of the
    /// table. `f` must not call back into this table, or it will deadlock.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::new();
    /// for i in -5..5 {
    ///     table.insert(i, i * 10);
    /// }
    /// let mut sum = 0;
    /// table.for_each(|_, v| sum += v);
    /// assert_eq!(sum, -50);
    /// ```
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let all = self.table.lock_all();
        for (_, bucket) in all.buckets() {
            for e in bucket.iter() {
                f(&e.key, &e.value);
            }
        }
    }

    /// Writes a bucket-by-bucket listing of the table to `out`.
    ///
    /// Each bucket is one line of the form `Bucket[i]: -> (k, v) -> NULL`, listing its
    /// chain head first. Every stripe lock is held while the listing is written.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::with_size(3);
    /// table.insert(4, 40);
    /// table.insert(1, 10);
    ///
    /// let mut out = String::new();
    /// table.dump(&mut out).unwrap();
    /// assert_eq!(
    ///     out,
    ///     "Bucket[0]: -> NULL\n\
    ///      Bucket[1]: -> (1, 10) -> (4, 40) -> NULL\n\
    ///      Bucket[2]: -> NULL\n"
    /// );
    /// ```
    pub fn dump<W>(&self, out: &mut W) -> fmt::Result
    where
        W: fmt::Write,
        K: Debug,
        V: Debug,
    {
        let all = self.table.lock_all();
        for (i, bucket) in all.buckets() {
            write!(out, "Bucket[{}]: ", i)?;
            for e in bucket.iter() {
                write!(out, "-> ({:?}, {:?}) ", e.key, e.value)?;
            }
            writeln!(out, "-> NULL")?;
        }
        Ok(())
    }

    /// Resizes with the resize lock already held, logging the outcome.
    fn resize_locked(
        &self,
        resizing: &MutexGuard<'_, ()>,
        new_size: usize,
    ) -> Result<bool, TableError>
    where
        K: Key,
    {
        let old_size = self.table.size();
        if new_size <= old_size {
            return Ok(false);
        }

        let new_size = match Table::<K, V>::prime_size(new_size) {
            Ok(prime) => prime,
            Err(source) => return Err(Self::resize_failed(old_size, new_size, source)),
        };
        let grew = self
            .table
            .transfer(resizing, new_size)
            .map_err(|source| Self::resize_failed(old_size, new_size, source))?;
        if grew {
            tracing::debug!(
                from = old_size,
                to = new_size,
                entries = self.len(),
                load_factor = self.len() as f64 / old_size as f64,
                "resized table"
            );
        }
        Ok(grew)
    }

    fn resize_failed(old_size: usize, new_size: usize, source: TryReserveError) -> TableError {
        tracing::warn!(
            from = old_size,
            to = new_size,
            error = %source,
            "failed to allocate buckets for resize"
        );
        TableError::Alloc {
            buckets: new_size,
            source,
        }
    }
}

impl<K, V> HashTable<K, V>
where
    K: Key,
{
    /// Returns a copy of the value for `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::new();
    /// table.insert(-3, 30);
    /// assert_eq!(table.get(-3), Some(30));
    /// assert_eq!(table.get(3), None);
    /// ```
    pub fn get(&self, key: K) -> Option<V>
    where
        V: Clone,
    {
        let locked = self.table.lock_bucket(key);
        locked.bucket().find(&key).map(|e| e.value.clone())
    }

    /// Returns `true` if the table holds an entry for `key`.
    pub fn contains_key(&self, key: K) -> bool {
        let locked = self.table.lock_bucket(key);
        locked.bucket().find(&key).is_some()
    }

    /// Inserts a key-value pair.
    ///
    /// If the key was already present, its value is replaced in place and the old value is
    /// returned; the number of entries does not change and the table never grows.
    ///
    /// Otherwise a new entry is added. If that pushes the load factor above
    /// [`LOAD_FACTOR`], this call grows the table before returning. Should that growth fail
    /// to allocate, the entry is still inserted and the table keeps its current size.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::new();
    /// assert_eq!(table.insert(5, 50), None);
    /// assert_eq!(table.insert(5, 99), Some(50));
    /// assert_eq!(table.get(5), Some(99));
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let mut locked = self.table.lock_bucket(key);
        if let Some(e) = locked.bucket_mut().find_mut(&key) {
            return Some(mem::replace(&mut e.value, value));
        }

        locked.bucket_mut().push(node::entry(key, value));
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if overloaded(count, locked.size()) {
            // a resize needs every stripe lock, so ours must go before we wait for the
            // resize lock
            drop(locked);
            self.grow();
        }
        None
    }

    /// Removes `key`, returning its value if it was present.
    ///
    /// Removing an absent key does nothing. The table never shrinks.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::new();
    /// table.insert(1, "a");
    /// assert_eq!(table.remove(1), Some("a"));
    /// assert_eq!(table.remove(1), None);
    /// assert!(table.is_empty());
    /// ```
    pub fn remove(&self, key: K) -> Option<V> {
        let mut locked = self.table.lock_bucket(key);
        let removed = locked.bucket_mut().remove(&key)?;
        self.count.fetch_sub(1, Ordering::SeqCst);
        Some(removed.value)
    }

    /// Grows the table to at least `new_size` buckets.
    ///
    /// The new size is rounded up to a prime. If `new_size` is not larger than the current
    /// number of buckets, this does nothing. On allocation failure the table is left
    /// exactly as it was.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::with_size(19);
    /// table.insert(7, 70);
    /// table.resize(100).unwrap();
    /// assert_eq!(table.size(), 101);
    /// table.resize(50).unwrap();
    /// assert_eq!(table.size(), 101);
    /// assert_eq!(table.get(7), Some(70));
    /// ```
    pub fn resize(&self, new_size: usize) -> Result<(), TableError> {
        let resizing = self.resize_lock.lock();
        self.resize_locked(&resizing, new_size).map(|_| ())
    }

    /// Grows the table, if needed, so that `additional` more entries fit without pushing
    /// the load factor above [`LOAD_FACTOR`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stripemap::HashTable;
    ///
    /// let table = HashTable::with_size(19);
    /// table.reserve(1000).unwrap();
    /// let size = table.size();
    /// for i in 0..1000 {
    ///     table.insert(i, i);
    /// }
    /// assert_eq!(table.size(), size);
    /// ```
    pub fn reserve(&self, additional: usize) -> Result<(), TableError> {
        let resizing = self.resize_lock.lock();
        let wanted = self.len().saturating_add(additional);
        let needed = (wanted as f64 / LOAD_FACTOR).ceil() as usize;
        self.resize_locked(&resizing, needed).map(|_| ())
    }

    /// Grows the table after an insert pushed it past the load factor.
    fn grow(&self) {
        let resizing = self.resize_lock.lock();

        // another thread may have grown the table while we were waiting
        let size = self.table.size();
        if !overloaded(self.len(), size) {
            return;
        }

        let target = size.saturating_mul(2).saturating_add(1);
        // a failed grow leaves the table valid, just more loaded; it has been logged, and
        // the next insert over the threshold tries again
        let _ = self.resize_locked(&resizing, target);
    }
}

impl<K, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for HashTable<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let all = self.table.lock_all();
        f.debug_map()
            .entries(
                all.buckets()
                    .flat_map(|(_, bucket)| bucket.iter().map(|e| (&e.key, &e.value))),
            )
            .finish()
    }
}

impl<K, V> Extend<(K, V)> for &HashTable<K, V>
where
    K: Key,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        // Keys may already be present or show up several times in the iterator, so
        // only reserve for the whole hint when the table is empty.
        let iter = iter.into_iter();
        let reserve = if self.is_empty() {
            iter.size_hint().0
        } else {
            (iter.size_hint().0 + 1) / 2
        };

        // inserts grow the table on their own if this fails
        let _ = self.reserve(reserve);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V> Extend<(K, V)> for HashTable<K, V>
where
    K: Key,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        <&Self as Extend<(K, V)>>::extend(&mut &*self, iter);
    }
}

impl<K, V> FromIterator<(K, V)> for HashTable<K, V>
where
    K: Key,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = HashTable::new();
        table.extend(iter);
        table
    }
}
