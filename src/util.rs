use std::ops::RangeFrom;
use std::sync::{Mutex, MutexGuard, PoisonError};

use nom::bytes::complete::take;
use nom::error::{make_error, ErrorKind, ParseError};
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult, InputIter, InputLength, Slice};

/// Lock a mutex, recovering the guard if another thread panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn be_u48<I, E: ParseError<I>>(input: I) -> IResult<I, u64, E>
where
    I: Slice<RangeFrom<usize>> + InputIter<Item = u8> + InputLength,
{
    let bound: usize = 6;

    if input.input_len() < bound {
        Err(Err::Error(make_error(input, ErrorKind::Eof)))
    } else {
        let mut res = 0u64;

        for byte in input.iter_elements().take(bound) {
            res = (res << 8) + byte as u64;
        }

        Ok((input.slice(bound..), res))
    }
}

/// `opaque data<0..2^8-1>`
pub fn opaque8(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u8(input)?;
    take(len as usize)(input)
}

/// `opaque data<0..2^16-1>`
pub fn opaque16(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u16(input)?;
    take(len as usize)(input)
}

/// `opaque data<0..2^24-1>`
pub fn opaque24(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u24(input)?;
    take(len as usize)(input)
}

/// Fails with `Verify` unless the whole input was consumed.
pub fn all_consumed<'a>(rest: &'a [u8]) -> IResult<&'a [u8], ()> {
    if rest.is_empty() {
        Ok((rest, ()))
    } else {
        Err(Err::Error(make_error(rest, ErrorKind::Verify)))
    }
}

pub(crate) fn read_u24(buf: &[u8], offset: usize) -> usize {
    ((buf[offset] as usize) << 16) | ((buf[offset + 1] as usize) << 8) | buf[offset + 2] as usize
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

/// Compare two byte strings without an early exit on the first difference.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
