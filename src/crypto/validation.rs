//! Validation and filtering for crypto providers.

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, SupportedCipherSuite, SupportedKxGroup};
use crate::types::{HashAlgorithm, KeyExchangeAlgorithm, NamedGroup};
use crate::Error;

impl CryptoProvider {
    /// Cipher suites of this provider that the handshake implements.
    pub fn supported_cipher_suites(
        &self,
    ) -> impl Iterator<Item = &'static dyn SupportedCipherSuite> + '_ {
        self.cipher_suites.iter().copied().filter(|cs| cs.suite().is_real())
    }

    /// Key exchange groups of this provider that the handshake implements.
    pub fn supported_kx_groups(&self) -> impl Iterator<Item = &'static dyn SupportedKxGroup> + '_ {
        self.kx_groups.iter().copied().filter(|kx| {
            matches!(
                kx.name(),
                NamedGroup::Secp256r1 | NamedGroup::Secp384r1 | NamedGroup::X25519
            )
        })
    }

    /// Whether any supported suite uses ECDHE.
    pub fn has_ecdh(&self) -> bool {
        self.supported_cipher_suites().any(|cs| {
            cs.suite().key_exchange_algorithm() == KeyExchangeAlgorithm::ECDHE_ECDSA
        })
    }

    /// Validates the provider against known answers.
    ///
    /// - At least one supported cipher suite
    /// - ECDHE suites have at least one key exchange group
    /// - Hash, PRF and HMAC produce the expected output
    ///
    /// Returns `Error::ConfigError` if validation fails.
    pub fn validate(&self) -> Result<(), Error> {
        if self.supported_cipher_suites().next().is_none() {
            return Err(Error::ConfigError(
                "CryptoProvider has no supported cipher suites".to_string(),
            ));
        }

        if self.has_ecdh() && self.supported_kx_groups().next().is_none() {
            return Err(Error::ConfigError(
                "CryptoProvider has ECDHE cipher suites but no key exchange groups".to_string(),
            ));
        }

        let mut hashes: Vec<HashAlgorithm> = self
            .supported_cipher_suites()
            .map(|cs| cs.hash_algorithm())
            .collect();
        hashes.dedup();

        for hash_alg in hashes {
            self.validate_hash(hash_alg)?;
            self.validate_prf(hash_alg)?;
        }

        self.validate_hmac()
    }

    fn validate_hash(&self, hash_alg: HashAlgorithm) -> Result<(), Error> {
        let mut hasher = self
            .hash_provider
            .create_hash(hash_alg)
            .map_err(Error::ConfigError)?;
        hasher.update(&[]);
        let mut result = Buf::new();
        hasher.clone_and_finalize(&mut result);

        let expected = known_answer(HASH_TEST_VECTORS, hash_alg)?;
        if result.as_ref() != expected {
            return Err(Error::ConfigError(format!(
                "Hash provider {:?} produced incorrect result",
                hash_alg
            )));
        }
        Ok(())
    }

    fn validate_prf(&self, hash_alg: HashAlgorithm) -> Result<(), Error> {
        let mut result = Buf::new();
        let mut scratch = Buf::new();
        self.prf_provider
            .prf_tls12(
                b"test_secret",
                "test label",
                b"test_seed",
                &mut result,
                32,
                &mut scratch,
                hash_alg,
            )
            .map_err(|e| {
                Error::ConfigError(format!("PRF provider failed for {:?}: {}", hash_alg, e))
            })?;

        let expected = known_answer(PRF_TEST_VECTORS, hash_alg)?;
        if result.as_ref() != expected {
            return Err(Error::ConfigError(format!(
                "PRF provider {:?} produced incorrect result",
                hash_alg
            )));
        }
        Ok(())
    }

    /// HMAC-SHA256 is needed for HelloVerifyRequest cookies.
    fn validate_hmac(&self) -> Result<(), Error> {
        let result = self
            .hmac_provider
            .hmac_sha256(b"key", b"The quick brown fox jumps over the lazy dog")
            .map_err(|e| Error::ConfigError(format!("HMAC provider failed: {}", e)))?;

        if result.as_slice() != HMAC_SHA256_TEST_VECTOR {
            return Err(Error::ConfigError(
                "HMAC provider produced incorrect result for HMAC-SHA256".to_string(),
            ));
        }
        Ok(())
    }
}

fn known_answer(
    vectors: &'static [(HashAlgorithm, &'static [u8])],
    hash_alg: HashAlgorithm,
) -> Result<&'static [u8], Error> {
    vectors
        .iter()
        .find(|(h, _)| *h == hash_alg)
        .map(|(_, v)| *v)
        .ok_or_else(|| Error::ConfigError(format!("No known answer for {:?}", hash_alg)))
}

// Digest of the empty input.
const HASH_TEST_VECTORS: &[(HashAlgorithm, &[u8])] = &[
    (
        HashAlgorithm::SHA256,
        &[
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ],
    ),
    (
        HashAlgorithm::SHA384,
        &[
            0x38, 0xb0, 0x60, 0xa7, 0x51, 0xac, 0x96, 0x38, 0x4c, 0xd9, 0x32, 0x7e, 0xb1, 0xb1,
            0xe3, 0x6a, 0x21, 0xfd, 0xb7, 0x11, 0x14, 0xbe, 0x07, 0x43, 0x4c, 0x0c, 0xc7, 0xbf,
            0x63, 0xf6, 0xe1, 0xda, 0x27, 0x4e, 0xde, 0xbf, 0xe7, 0x6f, 0x65, 0xfb, 0xd5, 0x1a,
            0xd2, 0xf1, 0x48, 0x98, 0xb9, 0x5b,
        ],
    ),
];

// PRF(secret="test_secret", label="test label", seed="test_seed", output_len=32)
const PRF_TEST_VECTORS: &[(HashAlgorithm, &[u8])] = &[
    (
        HashAlgorithm::SHA256,
        &[
            0xc7, 0x49, 0xce, 0xdf, 0xad, 0xaf, 0x3d, 0xf1, 0x18, 0x2c, 0xa2, 0x25, 0xab, 0xe9,
            0x4e, 0x0c, 0x19, 0xc3, 0x81, 0x49, 0x57, 0xbd, 0xdc, 0x28, 0x55, 0x78, 0x73, 0xdb,
            0xb7, 0x9f, 0xce, 0x29,
        ],
    ),
    (
        HashAlgorithm::SHA384,
        &[
            0x74, 0x9a, 0xf3, 0x03, 0x23, 0x9e, 0x3f, 0x65, 0x4e, 0x9a, 0xd1, 0xb1, 0xd1, 0x22,
            0x31, 0x02, 0x1a, 0xd2, 0x17, 0x26, 0x04, 0x75, 0x21, 0xf4, 0x66, 0xad, 0xcd, 0x37,
            0x2b, 0xe4, 0x7e, 0x8b,
        ],
    ),
];

// HMAC-SHA256(key="key", data="The quick brown fox jumps over the lazy dog")
const HMAC_SHA256_TEST_VECTOR: &[u8] = &[
    0xf7, 0xbc, 0x83, 0xf4, 0x30, 0x53, 0x84, 0x24, 0xb1, 0x32, 0x98, 0xe6, 0xaa, 0x6f, 0xb1, 0x43,
    0xef, 0x4d, 0x59, 0xa1, 0x49, 0x46, 0x17, 0x59, 0x97, 0x47, 0x9d, 0xbc, 0x2d, 0x1a, 0x3c, 0xd8,
];
