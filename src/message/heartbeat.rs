use nom::number::complete::{be_u16, be_u8};
use nom::bytes::complete::take;
use nom::IResult;

use crate::buffer::Buf;
use crate::types::HeartbeatMessageType;

/// Minimum padding of a heartbeat message (rfc6520 4).
pub const MIN_PADDING_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatMessage {
    pub message_type: HeartbeatMessageType,
    pub payload: Vec<u8>,
    pub padding_len: usize,
}

impl HeartbeatMessage {
    /// Parse a heartbeat record. Messages whose padding is shorter than
    /// [`MIN_PADDING_LEN`] are rejected.
    pub fn parse(input: &[u8]) -> IResult<&[u8], HeartbeatMessage> {
        let (input, message_type) = be_u8(input)?;
        let (input, payload_len) = be_u16(input)?;
        let (input, payload) = take(payload_len as usize)(input)?;
        if input.len() < MIN_PADDING_LEN {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::LengthValue,
            )));
        }
        let padding_len = input.len();
        Ok((
            &input[padding_len..],
            HeartbeatMessage {
                message_type: HeartbeatMessageType::from_u8(message_type),
                payload: payload.to_vec(),
                padding_len,
            },
        ))
    }

    /// Serialize with the given padding bytes.
    pub fn serialize(&self, padding: &[u8], output: &mut Buf) {
        output.push(self.message_type.as_u8());
        output.push_u16(self.payload.len() as u16);
        output.extend_from_slice(&self.payload);
        output.extend_from_slice(padding);
    }
}
