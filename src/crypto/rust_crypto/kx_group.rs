//! Key exchange group implementations using RustCrypto.

use p256::{ecdh::EphemeralSecret, PublicKey as P256PublicKey};
use p384::{ecdh::EphemeralSecret as P384EphemeralSecret, PublicKey as P384PublicKey};
use rand_core::OsRng;

use crate::buffer::Buf;
use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedGroup;

/// ECDHE key exchange implementation.
enum EcdhKeyExchange {
    P256 {
        secret: EphemeralSecret,
        public_key: Buf,
    },
    P384 {
        secret: P384EphemeralSecret,
        public_key: Buf,
    },
    X25519 {
        secret: x25519_dalek::EphemeralSecret,
        public_key: Buf,
    },
}

impl std::fmt::Debug for EcdhKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdhKeyExchange")
            .field("group", &self.group())
            .field("public_key_len", &self.pub_key().len())
            .finish_non_exhaustive()
    }
}

impl EcdhKeyExchange {
    fn new(group: NamedGroup, mut buf: Buf) -> Result<Self, String> {
        buf.clear();
        match group {
            NamedGroup::Secp256r1 => {
                let secret = EphemeralSecret::random(&mut OsRng);
                buf.extend_from_slice(&P256PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P256 {
                    secret,
                    public_key: buf,
                })
            }
            NamedGroup::Secp384r1 => {
                let secret = P384EphemeralSecret::random(&mut OsRng);
                buf.extend_from_slice(&P384PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P384 {
                    secret,
                    public_key: buf,
                })
            }
            NamedGroup::X25519 => {
                let secret = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
                buf.extend_from_slice(x25519_dalek::PublicKey::from(&secret).as_bytes());
                Ok(EcdhKeyExchange::X25519 {
                    secret,
                    public_key: buf,
                })
            }
            _ => Err(format!("Unsupported group: {:?}", group)),
        }
    }
}

impl ActiveKeyExchange for EcdhKeyExchange {
    fn pub_key(&self) -> &[u8] {
        match self {
            EcdhKeyExchange::P256 { public_key, .. } => public_key,
            EcdhKeyExchange::P384 { public_key, .. } => public_key,
            EcdhKeyExchange::X25519 { public_key, .. } => public_key,
        }
    }

    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        out.clear();
        match *self {
            EcdhKeyExchange::P256 { secret, .. } => {
                let peer_key = P256PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::P384 { secret, .. } => {
                let peer_key = P384PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::X25519 { secret, .. } => {
                let peer: [u8; 32] = peer_pub
                    .try_into()
                    .map_err(|_| "Invalid X25519 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer));
                if !shared_secret.was_contributory() {
                    return Err("X25519 shared secret is all zeros".to_string());
                }
                out.extend_from_slice(shared_secret.as_bytes());
            }
        }
        Ok(())
    }

    fn group(&self) -> NamedGroup {
        match self {
            EcdhKeyExchange::P256 { .. } => NamedGroup::Secp256r1,
            EcdhKeyExchange::P384 { .. } => NamedGroup::Secp384r1,
            EcdhKeyExchange::X25519 { .. } => NamedGroup::X25519,
        }
    }
}

#[derive(Debug)]
struct KxGroup(NamedGroup);

impl SupportedKxGroup for KxGroup {
    fn name(&self) -> NamedGroup {
        self.0
    }

    fn start_exchange(&self, buf: Buf) -> Result<Box<dyn ActiveKeyExchange>, String> {
        Ok(Box::new(EcdhKeyExchange::new(self.0, buf)?))
    }
}

static KX_GROUP_X25519: KxGroup = KxGroup(NamedGroup::X25519);
static KX_GROUP_P256: KxGroup = KxGroup(NamedGroup::Secp256r1);
static KX_GROUP_P384: KxGroup = KxGroup(NamedGroup::Secp384r1);

/// All supported key exchange groups, in preference order.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] =
    &[&KX_GROUP_X25519, &KX_GROUP_P256, &KX_GROUP_P384];

#[cfg(test)]
mod tests {
    use super::*;

    fn agree(group: NamedGroup) {
        let a = KxGroup(group).start_exchange(Buf::new()).unwrap();
        let b = KxGroup(group).start_exchange(Buf::new()).unwrap();
        let a_pub = a.pub_key().to_vec();
        let b_pub = b.pub_key().to_vec();

        let mut sa = Buf::new();
        let mut sb = Buf::new();
        a.complete(&b_pub, &mut sa).unwrap();
        b.complete(&a_pub, &mut sb).unwrap();
        assert!(!sa.is_empty());
        assert_eq!(sa, sb);
    }

    #[test]
    fn all_groups_agree() {
        agree(NamedGroup::X25519);
        agree(NamedGroup::Secp256r1);
        agree(NamedGroup::Secp384r1);
    }

    #[test]
    fn rejects_garbage_peer_key() {
        let a = KxGroup(NamedGroup::Secp256r1).start_exchange(Buf::new()).unwrap();
        assert!(a.complete(&[4, 1, 2, 3], &mut Buf::new()).is_err());
    }
}
