//! Prime capacities for table growth.

/// Returns `true` if `n` is prime.
///
/// Trial division by `2`, `3`, and then candidates of the form `6k ± 1` up to `√n`.
pub(crate) fn is_prime(n: usize) -> bool {
    if n <= 1 {
        return false;
    }
    if n <= 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }

    let mut i = 5usize;
    // i <= n / i is i * i <= n without the overflow
    while i <= n / i {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// Returns the smallest prime that is at least `n`.
///
/// Inputs of `2` or less map to `2`. Only odd candidates are tried past that. Returns
/// `None` if no such prime fits in a `usize`.
pub(crate) fn next_prime(n: usize) -> Option<usize> {
    if n <= 2 {
        return Some(2);
    }

    let mut candidate = if n % 2 == 0 { n.checked_add(1)? } else { n };
    while !is_prime(candidate) {
        candidate = candidate.checked_add(2)?;
    }
    Some(candidate)
}
