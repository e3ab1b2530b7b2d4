use std::fmt;

use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use crate::buffer::Buf;
use crate::crypto::CryptoProvider;
use crate::util::opaque8;

/// `Random` of the hello messages.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Random(pub [u8; 32]);

impl Random {
    pub const LEN: usize = 32;

    /// Fresh random from the provider's secure source.
    pub fn generate(provider: &CryptoProvider) -> Result<Self, crate::Error> {
        let mut bytes = [0u8; 32];
        provider.fill_random(&mut bytes)?;
        Ok(Random(bytes))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, bytes) = take(Self::LEN)(input)?;
        let mut random = [0u8; 32];
        random.copy_from_slice(bytes);
        Ok((input, Random(random)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.0);
    }
}

impl AsRef<[u8]> for Random {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Random {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Random({:02x?}..)", &self.0[..4])
    }
}

/// `opaque SessionID<0..32>`
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct SessionId(Vec<u8>);

impl SessionId {
    pub const MAX_LEN: usize = 32;

    pub fn try_new(id: &[u8]) -> Option<Self> {
        (id.len() <= Self::MAX_LEN).then(|| SessionId(id.to_vec()))
    }

    pub fn empty() -> Self {
        SessionId(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SessionId> {
        let (rest, id) = opaque8(input)?;
        if id.len() > Self::MAX_LEN {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        Ok((rest, SessionId(id.to_vec())))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.0.len() as u8);
        output.extend_from_slice(&self.0);
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({:02x?})", self.0)
    }
}

/// `opaque cookie<0..2^8-1>`
pub type Cookie = Vec<u8>;
