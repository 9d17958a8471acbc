/// An integer key that can be placed into a bucket of the table.
///
/// The bucket of a key is its remainder modulo the table size, adjusted into the
/// non-negative range so that negative keys land in `[0, size)` as well. The bucket
/// index is a pure function of the key and the size; there is no hasher.
///
/// This is implemented for every primitive integer type.
///
/// # Examples
///
/// ```
/// use stripemap::Key;
///
/// assert_eq!(7i32.bucket(5), 2);
/// assert_eq!((-7i32).bucket(5), 3);
/// assert_eq!(u64::MAX.bucket(19), (u64::MAX % 19) as usize);
/// ```
pub trait Key: Copy + Eq {
    /// Returns the bucket this key belongs to in a table of `size` buckets.
    ///
    /// `size` must be non-zero.
    fn bucket(self, size: usize) -> usize;
}

macro_rules! impl_key {
    ($($t:ty),*) => {
        $(
            impl Key for $t {
                #[inline]
                fn bucket(self, size: usize) -> usize {
                    debug_assert_ne!(size, 0);
                    // i128 holds every primitive key and every usize size without loss
                    let size = size as i128;
                    (((self as i128) % size + size) % size) as usize
                }
            }
        )*
    };
}

impl_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
