use {
    super::*,
    scrypt::Params,
    sha3::{Digest, Keccak256, Keccak512},
};

/// Scrypt cost parameters, fixed by the chain's consensus rules.
const SCRYPT_LOG_N: u8 = 11; // N = 2048
const SCRYPT_R: u32 = 32;
const SCRYPT_P: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Algorithm {
    #[default]
    Ethash,
    Scrypt,
}

/// Proof-of-work verifier, chosen once at startup. The two variants differ in
/// shape: the ethash-family check is parameterized by a difficulty and
/// answers pass/fail for a claimed mix digest, so it runs once per threshold;
/// the scrypt-family check produces a single numeric result that is compared
/// against any number of targets.
#[derive(Debug, Clone)]
pub(crate) enum PowHasher {
    Ethash,
    Scrypt { personalization: Vec<u8> },
    #[cfg(test)]
    Fixed(U256),
}

impl PowHasher {
    pub(crate) fn new(algorithm: Algorithm, personalization: &str) -> Self {
        match algorithm {
            Algorithm::Ethash => Self::Ethash,
            Algorithm::Scrypt => Self::Scrypt {
                personalization: personalization.as_bytes().to_vec(),
            },
        }
    }

    pub(crate) fn requires_mix_digest(&self) -> bool {
        matches!(self, Self::Ethash)
    }

    /// 40-byte hash input: 32-byte header hash followed by the nonce in
    /// little-endian.
    fn seed(header_hash: &[u8; 32], nonce: u64) -> [u8; 40] {
        let mut seed = [0u8; 40];
        seed[..32].copy_from_slice(header_hash);
        seed[32..].copy_from_slice(&nonce.to_le_bytes());
        seed
    }

    /// Finalization value of the mix-digest family: Keccak-256 over the
    /// Keccak-512 seed and the miner's claimed mix digest.
    pub(crate) fn mix_result(header_hash: &[u8; 32], nonce: u64, mix_digest: &[u8; 32]) -> U256 {
        let seed = Keccak512::digest(Self::seed(header_hash, nonce));

        let mut hasher = Keccak256::new();
        hasher.update(seed);
        hasher.update(mix_digest);

        U256::from_big_endian(&hasher.finalize())
    }

    /// Difficulty-parameterized check for the mix-digest family. Callers run
    /// this once per threshold of interest.
    pub(crate) fn verify_mix(
        header_hash: &[u8; 32],
        nonce: u64,
        mix_digest: &[u8; 32],
        difficulty: U256,
    ) -> bool {
        reaches(
            Self::mix_result(header_hash, nonce, mix_digest),
            target(difficulty),
        )
    }

    /// Numeric result for the memory-hard family, interpreted big-endian. One
    /// invocation serves every threshold comparison.
    pub(crate) fn pow_result(&self, header_hash: &[u8; 32], nonce: u64) -> Result<U256> {
        match self {
            Self::Scrypt { personalization } => {
                let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
                    .map_err(|err| anyhow!("invalid scrypt parameters: {err}"))?;

                let mut output = [0u8; 32];
                scrypt::scrypt(
                    &Self::seed(header_hash, nonce),
                    personalization,
                    &params,
                    &mut output,
                )
                .map_err(|err| anyhow!("scrypt output length invalid: {err}"))?;

                Ok(U256::from_big_endian(&output))
            }
            Self::Ethash => bail!("ethash verification requires a mix digest"),
            #[cfg(test)]
            Self::Fixed(result) => Ok(*result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [u8; 32] = [0xab; 32];

    fn scrypt_hasher() -> PowHasher {
        PowHasher::new(Algorithm::Scrypt, "lode-test")
    }

    #[test]
    fn scrypt_result_is_deterministic() {
        let hasher = scrypt_hasher();
        let first = hasher.pow_result(&HEADER, 1).unwrap();
        let second = hasher.pow_result(&HEADER, 1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn scrypt_result_depends_on_nonce() {
        let hasher = scrypt_hasher();
        assert_ne!(
            hasher.pow_result(&HEADER, 1).unwrap(),
            hasher.pow_result(&HEADER, 2).unwrap(),
        );
    }

    #[test]
    fn scrypt_result_depends_on_personalization() {
        let a = PowHasher::new(Algorithm::Scrypt, "chain-a");
        let b = PowHasher::new(Algorithm::Scrypt, "chain-b");
        assert_ne!(
            a.pow_result(&HEADER, 1).unwrap(),
            b.pow_result(&HEADER, 1).unwrap(),
        );
    }

    #[test]
    fn mix_result_is_deterministic() {
        let mix = [0x17; 32];
        assert_eq!(
            PowHasher::mix_result(&HEADER, 7, &mix),
            PowHasher::mix_result(&HEADER, 7, &mix),
        );
        assert_ne!(
            PowHasher::mix_result(&HEADER, 7, &mix),
            PowHasher::mix_result(&HEADER, 8, &mix),
        );
    }

    #[test]
    fn any_mix_reaches_difficulty_one() {
        assert!(PowHasher::verify_mix(&HEADER, 42, &[0x55; 32], U256::one()));
    }

    #[test]
    fn ethash_has_no_standalone_numeric_result() {
        assert!(PowHasher::Ethash.pow_result(&HEADER, 1).is_err());
    }

    #[test]
    fn mix_digest_requirement_follows_variant() {
        assert!(PowHasher::Ethash.requires_mix_digest());
        assert!(!scrypt_hasher().requires_mix_digest());
    }
}
