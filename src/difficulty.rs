use super::*;

/// Boundary a proof-of-work result must not exceed to reach `difficulty`,
/// `floor(2^256 / difficulty)`. The division is done in 512 bits so the
/// quotient is exact; difficulty 1 saturates to `U256::MAX` since 2^256
/// itself is not representable (every 256-bit result passes either way).
pub(crate) fn target(difficulty: U256) -> U256 {
    assert!(!difficulty.is_zero(), "difficulty must be > 0");

    let mut wide = [0u8; 64];
    wide[32..].copy_from_slice(&difficulty.to_big_endian());

    let quotient = (U512::one() << 256) / U512::from_big_endian(&wide);

    let bytes = quotient.to_big_endian();
    if bytes[..32] != [0u8; 32] {
        return U256::MAX;
    }

    U256::from_big_endian(&bytes[32..])
}

/// A result reaches a difficulty level when it does not exceed its target.
pub(crate) fn reaches(result: U256, target: U256) -> bool {
    result <= target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widen(value: U256) -> U512 {
        let mut wide = [0u8; 64];
        wide[32..].copy_from_slice(&value.to_big_endian());
        U512::from_big_endian(&wide)
    }

    #[test]
    fn target_of_one_saturates() {
        assert_eq!(target(U256::one()), U256::MAX);
    }

    #[test]
    fn target_of_two_is_half_the_domain() {
        assert_eq!(target(U256::from(2)), U256::one() << 255);
    }

    #[test]
    fn target_is_exact_floor() {
        for difficulty in [3u64, 1000, 1_000_000, u64::MAX] {
            let t = widen(target(U256::from(difficulty)));
            let d = U512::from(difficulty);

            assert!(t * d <= U512::one() << 256);
            assert!((t + U512::one()) * d > U512::one() << 256);
        }
    }

    #[test]
    fn target_is_monotonically_inverse() {
        let mut previous = target(U256::from(2));
        for difficulty in [1000u64, 1_000_000, 1_000_000_000] {
            let current = target(U256::from(difficulty));
            assert!(current < previous, "target must shrink as difficulty grows");
            previous = current;
        }
    }

    #[test]
    fn reaches_compares_inclusively() {
        let boundary = target(U256::from(1000));
        assert!(reaches(boundary, boundary));
        assert!(reaches(boundary - 1, boundary));
        assert!(!reaches(boundary + 1, boundary));
    }

    #[test]
    #[should_panic(expected = "difficulty must be > 0")]
    fn zero_difficulty_panics() {
        target(U256::zero());
    }
}
