/// [Szudzik pairing function][szudzik-pairing].
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// [szudzik-pairing]: http://szudzik.com/ElegantPairing.pdf
pub fn pairing_szudzik(a: u64, b: u64) -> u64 {
    if a < b {
        b * b + a
    } else {
        a * a + a + b
    }
}

/// [Pairing function][pairing] for two `u64` values.
///
/// Injective as long as both arguments stay below `2^32`.
///
/// [pairing]: https://en.wikipedia.org/wiki/Pairing_function
pub fn pairing2(a: u64, b: u64) -> u64 {
    pairing_szudzik(a, b)
}

pub trait PerfectHash {
    /// Perfect hash function: distinct keys never share a hash.
    fn hash(&self) -> u64;
}

impl PerfectHash for (u64, u64) {
    fn hash(&self) -> u64 {
        pairing2(self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_szudzik() {
        // a\b  0  1  2  3
        // ---------------
        // 0 |  0  1  4  9
        // 1 |  2  3  5 10
        // 2 |  6  7  8 11
        // 3 | 12 13 14 15
        assert_eq!(pairing_szudzik(0, 0), 0);
        assert_eq!(pairing_szudzik(0, 1), 1);
        assert_eq!(pairing_szudzik(1, 0), 2);
        assert_eq!(pairing_szudzik(1, 1), 3);
        assert_eq!(pairing_szudzik(2, 1), 7);
        assert_eq!(pairing_szudzik(1, 3), 10);
        assert_eq!(pairing_szudzik(3, 3), 15);
    }

    #[test]
    fn test_pairing_is_injective() {
        let mut seen = HashSet::new();
        for a in 0..64 {
            for b in 0..64 {
                assert!(seen.insert((a, b).hash()), "collision at ({}, {})", a, b);
            }
        }
    }
}
