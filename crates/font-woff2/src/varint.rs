//! Variable-length integer encodings used throughout WOFF2.
//!
//! `UIntBase128` carries table lengths in the directory; `255UInt16` carries
//! point counts, instruction lengths and collection indices.

use crate::{Error, Result};

const BASE128: &str = "UIntBase128";
const UINT16_255: &str = "255UInt16";

/// Largest number of bytes a conformant `UIntBase128` may occupy.
pub const MAX_BASE128_LEN: usize = 5;

const ONE_MORE_BYTE_CODE1: u8 = 255;
const ONE_MORE_BYTE_CODE2: u8 = 254;
const WORD_CODE: u8 = 253;
const LOWEST_U_CODE: u16 = 253;

/// Number of bytes the minimal `UIntBase128` encoding of `value` occupies.
pub fn base128_size(mut value: u32) -> usize {
    let mut size = 1;
    while value >= 128 {
        size += 1;
        value >>= 7;
    }
    size
}

/// Append the minimal `UIntBase128` encoding of `value`.
///
/// With `leading_zero` set an extra `0x80` byte is written first. Decoders are
/// required to reject that form; it exists only to build invalid fixtures.
pub fn write_base128(value: u64, leading_zero: bool, out: &mut Vec<u8>) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| Error::IntegerRangeViolation { value, encoding: BASE128 })?;
    if leading_zero {
        out.push(0x80);
    }
    let size = base128_size(value);
    for i in 0..size {
        let mut byte = ((value >> (7 * (size - i - 1))) & 0x7f) as u8;
        if i < size - 1 {
            byte |= 0x80;
        }
        out.push(byte);
    }
    Ok(())
}

/// Encode `value` as a minimal `UIntBase128`.
pub fn encode_base128(value: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(MAX_BASE128_LEN);
    write_base128(value, false, &mut out)?;
    Ok(out)
}

/// Decode a `UIntBase128` from the front of `data`.
///
/// Returns the value and the number of bytes consumed. Leading zero bytes,
/// encodings longer than five bytes and values above `u32::MAX` are rejected.
pub fn read_base128(data: &[u8]) -> Result<(u32, usize)> {
    let mut accum: u32 = 0;
    for (i, &byte) in data.iter().take(MAX_BASE128_LEN).enumerate() {
        if i == 0 && byte == 0x80 {
            return Err(Error::InvalidContainer("UIntBase128 with leading zero"));
        }
        if accum & 0xFE00_0000 != 0 {
            return Err(Error::InvalidContainer("UIntBase128 overflows 32 bits"));
        }
        accum = (accum << 7) | u32::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok((accum, i + 1));
        }
    }
    if data.len() < MAX_BASE128_LEN {
        Err(Error::Truncated)
    } else {
        Err(Error::InvalidContainer("UIntBase128 longer than 5 bytes"))
    }
}

/// Which of the legal `255UInt16` representations to emit.
///
/// Values from 506 up to 761 have more than one encoding. Decoders must accept
/// all of them, so the non-shortest forms are useful for fixtures.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum U16Repr {
    /// `[254, n - 506]` in the overlap range.
    #[default]
    Shortest,
    /// The literal word escape `[253, hi, lo]`.
    Escape,
    /// `[255, n - 253]`. Only representable up to 508; larger values fall
    /// back to the word escape.
    Offset253,
    /// Rotate through the three forms each time an overlapping value is written.
    Cycle,
}

impl U16Repr {
    const CYCLE: [U16Repr; 3] = [U16Repr::Shortest, U16Repr::Escape, U16Repr::Offset253];

    /// Whether `value` has more than one legal encoding.
    pub const fn is_ambiguous(value: u16) -> bool {
        value >= 506 && value < 762
    }
}

/// Stateful writer that resolves [`U16Repr::Cycle`] to a concrete form.
#[derive(Clone, Debug, Default)]
pub struct U16Writer {
    repr: U16Repr,
    turn: usize,
}

impl U16Writer {
    pub fn new(repr: U16Repr) -> Self {
        Self { repr, turn: 0 }
    }

    pub fn write(&mut self, value: u16, out: &mut Vec<u8>) {
        let repr = match self.repr {
            U16Repr::Cycle if U16Repr::is_ambiguous(value) => {
                let repr = U16Repr::CYCLE[self.turn % U16Repr::CYCLE.len()];
                self.turn += 1;
                repr
            }
            U16Repr::Cycle => U16Repr::Shortest,
            repr => repr,
        };
        write_255_u16(value, repr, out);
    }
}

/// Append `value` in `255UInt16` form using the requested representation.
pub fn write_255_u16(value: u16, repr: U16Repr, out: &mut Vec<u8>) {
    if value < LOWEST_U_CODE {
        out.push(value as u8);
    } else if value < 506 {
        out.extend([ONE_MORE_BYTE_CODE1, (value - LOWEST_U_CODE) as u8]);
    } else if value < 762 {
        match repr {
            U16Repr::Shortest | U16Repr::Cycle => {
                out.extend([ONE_MORE_BYTE_CODE2, (value - 506) as u8]);
            }
            U16Repr::Offset253 if value <= 508 => {
                out.extend([ONE_MORE_BYTE_CODE1, (value - LOWEST_U_CODE) as u8]);
            }
            U16Repr::Escape | U16Repr::Offset253 => {
                out.push(WORD_CODE);
                out.extend(value.to_be_bytes());
            }
        }
    } else {
        out.push(WORD_CODE);
        out.extend(value.to_be_bytes());
    }
}

/// Append a count in shortest `255UInt16` form, rejecting values above `u16::MAX`.
pub fn write_255_count(value: usize, out: &mut Vec<u8>) -> Result<()> {
    let value = u16::try_from(value).map_err(|_| Error::IntegerRangeViolation {
        value: value as u64,
        encoding: UINT16_255,
    })?;
    write_255_u16(value, U16Repr::Shortest, out);
    Ok(())
}

/// Encode `value` in shortest `255UInt16` form.
pub fn encode_255_u16(value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    write_255_u16(value, U16Repr::Shortest, &mut out);
    out
}

/// Decode a `255UInt16` from the front of `data`, accepting every legal form.
pub fn read_255_u16(data: &[u8]) -> Result<(u16, usize)> {
    let (&code, rest) = data.split_first().ok_or(Error::Truncated)?;
    match code {
        WORD_CODE => {
            let bytes = rest.get(..2).ok_or(Error::Truncated)?;
            Ok((u16::from_be_bytes([bytes[0], bytes[1]]), 3))
        }
        ONE_MORE_BYTE_CODE1 => {
            let next = *rest.first().ok_or(Error::Truncated)?;
            Ok((u16::from(next) + LOWEST_U_CODE, 2))
        }
        ONE_MORE_BYTE_CODE2 => {
            let next = *rest.first().ok_or(Error::Truncated)?;
            Ok((u16::from(next) + 506, 2))
        }
        _ => Ok((u16::from(code), 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base128(value: u32) -> Vec<u8> {
        encode_base128(value.into()).unwrap()
    }

    #[test]
    fn test_base128_small_values() {
        assert_eq!(base128(0), [0x00]);
        assert_eq!(base128(127), [0x7f]);
        assert_eq!(base128(128), [0x81, 0x00]);
        assert_eq!(base128(16383), [0xff, 0x7f]);
        assert_eq!(base128(16384), [0x81, 0x80, 0x00]);
    }

    #[test]
    fn test_base128_round_trip() {
        let samples = [
            0u32,
            1,
            63,
            127,
            128,
            300,
            16_383,
            16_384,
            2_097_151,
            2_097_152,
            268_435_455,
            268_435_456,
            0x7fff_ffff,
            u32::MAX,
        ];
        for value in samples {
            let bytes = base128(value);
            assert!(bytes.len() <= MAX_BASE128_LEN, "{value} took {} bytes", bytes.len());
            assert_eq!(bytes.len(), base128_size(value));
            if bytes.len() > 1 {
                assert_ne!(bytes[0], 0x80, "{value} has a leading zero byte");
            }
            assert_eq!(read_base128(&bytes).unwrap(), (value, bytes.len()));
        }
    }

    #[test]
    fn test_base128_power_of_two_boundaries() {
        for shift in 0..32 {
            let value = 1u32 << shift;
            for v in [value - 1, value, value.saturating_add(1)] {
                let bytes = base128(v);
                assert_eq!(read_base128(&bytes).unwrap().0, v);
            }
        }
    }

    #[test]
    fn test_base128_rejects_wide_values() {
        let err = encode_base128(1 << 32).unwrap_err();
        assert!(matches!(err, Error::IntegerRangeViolation { .. }));
        assert!(encode_base128(1 << 35).is_err());
    }

    #[test]
    fn test_base128_leading_zero_is_opt_in() {
        let mut out = Vec::new();
        write_base128(5, true, &mut out).unwrap();
        assert_eq!(out, [0x80, 0x05]);
        assert!(read_base128(&out).is_err());
    }

    #[test]
    fn test_base128_decoder_rejects_bad_forms() {
        // six bytes
        assert!(read_base128(&[0x81, 0x81, 0x81, 0x81, 0x81, 0x01]).is_err());
        // 2^32 needs 33 bits
        assert!(read_base128(&[0x90, 0x80, 0x80, 0x80, 0x00]).is_err());
        assert!(matches!(read_base128(&[0x81]), Err(Error::Truncated)));
    }

    #[test]
    fn test_255_u16_single_byte() {
        assert_eq!(encode_255_u16(0), [0]);
        assert_eq!(encode_255_u16(252), [252]);
    }

    #[test]
    fn test_255_u16_ranges() {
        assert_eq!(encode_255_u16(253), [255, 0]);
        assert_eq!(encode_255_u16(505), [255, 252]);
        assert_eq!(encode_255_u16(506), [254, 0]);
        assert_eq!(encode_255_u16(761), [254, 255]);
        assert_eq!(encode_255_u16(762), [253, 0x02, 0xfa]);
        assert_eq!(encode_255_u16(u16::MAX), [253, 0xff, 0xff]);
    }

    #[test]
    fn test_255_u16_all_forms_of_506_decode() {
        for bytes in [&[254u8, 0][..], &[253, 1, 250], &[255, 253]] {
            assert_eq!(read_255_u16(bytes).unwrap(), (506, bytes.len()));
        }
    }

    #[test]
    fn test_255_u16_alternate_forms() {
        let encode = |value, repr| {
            let mut out = Vec::new();
            write_255_u16(value, repr, &mut out);
            out
        };
        assert_eq!(encode(506, U16Repr::Escape), [253, 1, 250]);
        assert_eq!(encode(506, U16Repr::Offset253), [255, 253]);
        assert_eq!(encode(508, U16Repr::Offset253), [255, 255]);
        // no single-byte offset from 253 can reach 509
        assert_eq!(encode(509, U16Repr::Offset253), [253, 0x01, 0xfd]);
        // below the overlap every form is the same
        assert_eq!(encode(300, U16Repr::Escape), encode(300, U16Repr::Shortest));
    }

    #[test]
    fn test_255_u16_writer_cycles() {
        let mut writer = U16Writer::new(U16Repr::Cycle);
        let mut out = Vec::new();
        for _ in 0..4 {
            writer.write(506, &mut out);
        }
        writer.write(10, &mut out);
        assert_eq!(out, [254, 0, 253, 1, 250, 255, 253, 254, 0, 10]);
    }

    #[test]
    fn test_255_u16_round_trip() {
        for value in (0..=u16::MAX).step_by(7) {
            for repr in [U16Repr::Shortest, U16Repr::Escape, U16Repr::Offset253] {
                let mut out = Vec::new();
                write_255_u16(value, repr, &mut out);
                assert_eq!(read_255_u16(&out).unwrap(), (value, out.len()));
            }
        }
    }

    #[test]
    fn test_255_count_range() {
        let mut out = Vec::new();
        assert!(write_255_count(70_000, &mut out).is_err());
        write_255_count(3, &mut out).unwrap();
        assert_eq!(out, [3]);
    }
}
