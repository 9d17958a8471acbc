use crate::key::Key;
use crate::node::Bucket;
use crate::prime::next_prime;
use parking_lot::{Mutex, MutexGuard};
use std::collections::TryReserveError;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The buckets guarded by one stripe lock.
///
/// Bucket `b` of a table with `n` stripes lives in stripe `b % n`, at slot `b / n`. The
/// mapping from bucket to stripe depends only on `n`, which never changes, so a table of
/// any size is always guarded by the same locks.
pub(crate) struct Stripe<K, V> {
    buckets: Vec<Bucket<K, V>>,
}

impl<K, V> Stripe<K, V> {
    fn try_new(len: usize) -> Result<Self, TryReserveError> {
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(len)?;
        buckets.resize_with(len, Bucket::default);
        Ok(Self { buckets })
    }

    /// Unlinks every entry of every bucket in this stripe, returning how many there were.
    fn drain(&mut self) -> usize {
        let mut removed = 0;
        for bucket in &mut self.buckets {
            while bucket.pop().is_some() {
                removed += 1;
            }
        }
        removed
    }
}

/// Number of buckets of a table of `size` buckets that stripe `stripe` (out of `stripes`)
/// is responsible for.
fn stripe_len(size: usize, stripes: usize, stripe: usize) -> usize {
    size / stripes + usize::from(stripe < size % stripes)
}

/// The bucket array of a table, partitioned over a fixed pool of stripe locks.
pub(crate) struct Table<K, V> {
    stripes: Box<[Mutex<Stripe<K, V>>]>,

    /// Number of buckets.
    ///
    /// Only ever written by [`Table::transfer`], which holds every stripe lock while it
    /// does so. Holding any one stripe lock is therefore enough to keep it stable.
    size: AtomicUsize,
}

impl<K, V> Table<K, V> {
    pub(crate) fn try_new(size: usize, stripes: usize) -> Result<Self, TryReserveError> {
        debug_assert_ne!(size, 0);
        debug_assert_ne!(stripes, 0);

        let mut locks = Vec::new();
        locks.try_reserve_exact(stripes)?;
        for stripe in 0..stripes {
            locks.push(Mutex::new(Stripe::try_new(stripe_len(size, stripes, stripe))?));
        }

        Ok(Self {
            stripes: locks.into_boxed_slice(),
            size: AtomicUsize::new(size),
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub(crate) fn stripes(&self) -> usize {
        self.stripes.len()
    }

    /// The most buckets any table of this type could hold: a single stripe's buckets
    /// cannot take up more than `isize::MAX` bytes.
    pub(crate) fn max_size() -> usize {
        isize::MAX as usize / mem::size_of::<Bucket<K, V>>()
    }

    /// The prime number of buckets a resize to `requested` buckets goes to.
    ///
    /// Fails without allocating, and without searching for a prime, if no table that
    /// large could ever be allocated.
    pub(crate) fn prime_size(requested: usize) -> Result<usize, TryReserveError> {
        let max = Self::max_size();
        if requested <= max {
            if let Some(prime) = next_prime(requested).filter(|&p| p <= max) {
                return Ok(prime);
            }
        }
        // more than `isize::MAX` bytes is refused before the allocator is asked
        Vec::<Bucket<K, V>>::new()
            .try_reserve_exact(usize::MAX)
            .map(|()| usize::MAX)
    }

    /// Takes every stripe lock.
    ///
    /// Locks are always taken in ascending stripe order. This is the only place that holds
    /// more than one stripe lock, so no two threads can ever wait on each other here.
    pub(crate) fn lock_all(&self) -> AllLocked<'_, K, V> {
        let guards: Vec<_> = self.stripes.iter().map(|stripe| stripe.lock()).collect();
        let size = self.size.load(Ordering::Relaxed);
        AllLocked { guards, size }
    }
}

impl<K, V> Table<K, V>
where
    K: Key,
{
    /// Locks the stripe that guards `key`'s bucket.
    pub(crate) fn lock_bucket(&self, key: K) -> Locked<'_, K, V> {
        let stripes = self.stripes.len();
        loop {
            let size = self.size.load(Ordering::Acquire);
            let bucket = key.bucket(size);
            let stripe = self.stripes[bucket % stripes].lock();

            // the size cannot change while we hold a stripe lock, so if it still matches,
            // `bucket` is where the key lives
            if self.size.load(Ordering::Relaxed) == size {
                return Locked {
                    stripe,
                    slot: bucket / stripes,
                    size,
                };
            }
            // a resize completed between reading the size and taking the lock; the size
            // only ever grows, so retrying cannot observe the old value again
        }
    }

    /// Moves every entry into a new bucket array of `new_size` buckets.
    ///
    /// Does nothing and returns `Ok(false)` unless `new_size` is larger than the current
    /// size. On allocation failure no entry has been moved and the table is unchanged.
    ///
    /// The caller must hold the resize lock, which is what `_resizing` witnesses. With it
    /// held, every stripe lock is taken (ascending) before the first entry moves and
    /// released only once the new array and size are both installed, so no bucket
    /// operation can ever observe a half-moved table.
    pub(crate) fn transfer(
        &self,
        _resizing: &MutexGuard<'_, ()>,
        new_size: usize,
    ) -> Result<bool, TryReserveError> {
        let mut all = self.lock_all();
        if new_size <= all.size {
            return Ok(false);
        }

        let stripes = self.stripes.len();
        let mut fresh = Vec::new();
        fresh.try_reserve_exact(stripes)?;
        for stripe in 0..stripes {
            fresh.push(Stripe::try_new(stripe_len(new_size, stripes, stripe))?);
        }

        for old in &mut all.guards {
            for bucket in &mut old.buckets {
                while let Some(entry) = bucket.pop() {
                    let b = entry.key.bucket(new_size);
                    fresh[b % stripes].buckets[b / stripes].push(entry);
                }
            }
        }

        // every old bucket is empty by now, so replacing them drops no entries
        for (old, new) in all.guards.iter_mut().zip(fresh) {
            debug_assert!(old.buckets.iter().all(Bucket::is_empty));
            **old = new;
        }
        self.size.store(new_size, Ordering::Release);
        drop(all);

        Ok(true)
    }
}

/// A bucket whose stripe lock is held.
pub(crate) struct Locked<'a, K, V> {
    stripe: MutexGuard<'a, Stripe<K, V>>,
    slot: usize,
    size: usize,
}

impl<K, V> Locked<'_, K, V> {
    /// The table size the bucket was resolved against.
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn bucket(&self) -> &Bucket<K, V> {
        &self.stripe.buckets[self.slot]
    }

    pub(crate) fn bucket_mut(&mut self) -> &mut Bucket<K, V> {
        &mut self.stripe.buckets[self.slot]
    }
}

/// The whole table, with every stripe lock held.
pub(crate) struct AllLocked<'a, K, V> {
    guards: Vec<MutexGuard<'a, Stripe<K, V>>>,
    size: usize,
}

impl<K, V> AllLocked<'_, K, V> {
    /// All buckets, in bucket index order.
    pub(crate) fn buckets(&self) -> impl Iterator<Item = (usize, &Bucket<K, V>)> + '_ {
        let stripes: Vec<&Stripe<K, V>> = self.guards.iter().map(|guard| &**guard).collect();
        let n = stripes.len();
        (0..self.size).map(move |b| {
            let stripe: &Stripe<K, V> = stripes[b % n];
            (b, &stripe.buckets[b / n])
        })
    }

    /// Unlinks every entry, returning how many there were.
    pub(crate) fn drain(&mut self) -> usize {
        self.guards.iter_mut().map(|stripe| stripe.drain()).sum()
    }
}
