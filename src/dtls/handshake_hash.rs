use crate::buffer::Buf;
use crate::crypto::CryptoProvider;
use crate::types::HashAlgorithm;
use crate::Error;

/// Running handshake transcript.
///
/// The raw messages are kept because the PRF hash is only known once the
/// ServerHello is processed, and CertificateVerify signs the messages
/// themselves rather than a digest.
#[derive(Debug, Default, Clone)]
pub(crate) struct HandshakeHash {
    transcript: Buf,
}

impl HandshakeHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.transcript.extend_from_slice(data);
    }

    pub fn reset(&mut self) {
        self.transcript.clear();
    }

    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }

    /// Digest of everything seen so far.
    pub fn current_hash(
        &self,
        provider: &CryptoProvider,
        hash: HashAlgorithm,
    ) -> Result<Vec<u8>, Error> {
        let mut ctx = provider
            .hash_provider
            .create_hash(hash)
            .map_err(Error::CryptoError)?;
        ctx.update(&self.transcript);
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        Ok(out.into_vec())
    }
}
