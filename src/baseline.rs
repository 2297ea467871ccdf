//! Native factorial used as the zero-overhead reference point.
//!
//! The same numbers feed fixture expectations, so every expected value is
//! computed here and never by an engine under test.

use std::fmt;

/// Largest N whose factorial fits in `u64`.
pub const MAX_WORD_N: u64 = 20;

/// Recursive factorial in native `u64` arithmetic. `None` once the result
/// leaves `u64` range (N > 20), decided before descending.
pub fn fact(n: u64) -> Option<u64> {
    if n > MAX_WORD_N {
        return None;
    }
    if n == 0 {
        return Some(1);
    }
    n.checked_mul(fact(n - 1)?)
}

/// Factorial accumulated in `f64`, in the same multiplication order as the
/// floating engines (innermost product first).
pub fn fact_f64(n: u64) -> f64 {
    (2..=n).fold(1.0, |acc, k| k as f64 * acc)
}

/// Exact factorial for any N.
pub fn fact_exact(n: u64) -> Natural {
    let mut acc = Natural::from_u64(1);
    for k in 2..=n {
        acc.mul_small(k);
    }
    acc
}

/// Canonical decimal string of N!, exact.
pub fn exact_decimal(n: u64) -> String {
    match fact(n) {
        Some(v) => v.to_string(),
        None => fact_exact(n).to_string(),
    }
}

const LIMB_BASE: u64 = 1_000_000_000;

/// Unsigned integer stored as little-endian base 10^9 limbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Natural {
    limbs: Vec<u32>,
}

impl Natural {
    pub fn from_u64(mut v: u64) -> Self {
        let mut limbs = Vec::new();
        loop {
            limbs.push((v % LIMB_BASE) as u32);
            v /= LIMB_BASE;
            if v == 0 {
                break;
            }
        }
        Natural { limbs }
    }

    /// Multiply in place by a value below 2^32.
    pub fn mul_small(&mut self, factor: u64) {
        debug_assert!(factor <= u32::MAX as u64);
        let mut carry = 0u64;
        for limb in self.limbs.iter_mut() {
            let cur = *limb as u64 * factor + carry;
            *limb = (cur % LIMB_BASE) as u32;
            carry = cur / LIMB_BASE;
        }
        while carry > 0 {
            self.limbs.push((carry % LIMB_BASE) as u32);
            carry /= LIMB_BASE;
        }
    }
}

impl fmt::Display for Natural {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.limbs.iter().rev();
        if let Some(top) = iter.next() {
            write!(f, "{top}")?;
        }
        for limb in iter {
            write!(f, "{limb:09}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACT_100: &str = "93326215443944152681699238856266700490715968264381621468592963895217599993229915608941463976156518286253697920827223758251185210916864000000000000000000000000";

    #[test]
    fn test_fact_12() {
        assert_eq!(fact(12), Some(479001600));
    }

    #[test]
    fn test_fact_overflows_past_20() {
        assert_eq!(fact(20), Some(2432902008176640000));
        assert_eq!(fact(21), None);
    }

    #[test]
    fn test_large_n_does_not_recurse() {
        assert_eq!(fact(1_000_000), None);
        assert!(fact_f64(1_000_000).is_infinite());
        assert_eq!(fact_exact(3_000).to_string().len(), 9_131);
    }

    #[test]
    fn test_exact_100() {
        let s = exact_decimal(100);
        assert_eq!(s, FACT_100);
        assert_eq!(s.len(), 158);
        assert!(s.starts_with("93326215443944"));
    }

    #[test]
    fn test_exact_matches_native_where_both_fit() {
        for n in 0..=20 {
            assert_eq!(fact_exact(n).to_string(), fact(n).unwrap().to_string());
        }
    }

    #[test]
    fn test_limbs_keep_inner_zeros() {
        let mut v = Natural::from_u64(1_000_000_000);
        assert_eq!(v.to_string(), "1000000000");
        v.mul_small(10);
        assert_eq!(v.to_string(), "10000000000");
    }

    #[test]
    fn test_f64_drifts_from_exact_at_100() {
        let float = format!("{:.6}", fact_f64(100));
        assert_ne!(float, format!("{FACT_100}.000000"));
        assert!(float.starts_with("93326215443944"));
        assert!(float.ends_with("813248.000000"));
        assert_eq!(float.len(), 158 + 7);
        assert_eq!(format!("{:.6}", fact_f64(12)), "479001600.000000");
    }
}
