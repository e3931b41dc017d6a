//! Point delta triplet encoding for the transformed glyf table.
//!
//! Each point of a simple glyph becomes one flag byte (written to the flag
//! stream) and 1-4 data bytes (written to the glyph stream). The flag selects
//! a magnitude class, carries the sign of each axis and, in bit 7, whether the
//! point is off-curve.

use crate::{Error, Result};

const OFF_CURVE_BIT: u8 = 0x80;

/// An encoded point delta.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Triplet {
    pub flag: u8,
    data: [u8; 4],
    len: u8,
}

impl Triplet {
    fn new(flag: u8, data: &[u8]) -> Self {
        let mut buf = [0; 4];
        buf[..data.len()].copy_from_slice(data);
        Self { flag, data: buf, len: data.len() as u8 }
    }

    /// The bytes destined for the glyph stream.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// Number of data bytes that follow a given flag byte.
pub const fn data_len(flag: u8) -> usize {
    match flag & 0x7f {
        0..=83 => 1,
        84..=119 => 2,
        120..=123 => 3,
        _ => 4,
    }
}

/// Encode the delta from the previous point, picking the smallest class that fits.
pub fn encode_triplet(dx: i32, dy: i32, on_curve: bool) -> Triplet {
    let abs_x = dx.unsigned_abs();
    let abs_y = dy.unsigned_abs();
    let on_curve_bit = if on_curve { 0 } else { OFF_CURVE_BIT };
    let x_sign = u8::from(dx > 0);
    let y_sign = u8::from(dy > 0);
    let xy_signs = x_sign + 2 * y_sign;

    if dx == 0 && abs_y < 1280 {
        let flag = on_curve_bit + ((abs_y & 0xf00) >> 7) as u8 + y_sign;
        Triplet::new(flag, &[(abs_y & 0xff) as u8])
    } else if dy == 0 && abs_x < 1280 {
        let flag = on_curve_bit + 10 + ((abs_x & 0xf00) >> 7) as u8 + x_sign;
        Triplet::new(flag, &[(abs_x & 0xff) as u8])
    } else if abs_x < 65 && abs_y < 65 {
        let (x, y) = (abs_x - 1, abs_y - 1);
        let flag = on_curve_bit + 20 + (x & 0x30) as u8 + ((y & 0x30) >> 2) as u8 + xy_signs;
        Triplet::new(flag, &[(((x & 0xf) << 4) | (y & 0xf)) as u8])
    } else if abs_x < 769 && abs_y < 769 {
        let (x, y) = (abs_x - 1, abs_y - 1);
        let flag =
            on_curve_bit + 84 + 12 * ((x & 0x300) >> 8) as u8 + ((y & 0x300) >> 6) as u8 + xy_signs;
        Triplet::new(flag, &[(x & 0xff) as u8, (y & 0xff) as u8])
    } else if abs_x < 4096 && abs_y < 4096 {
        let flag = on_curve_bit + 120 + xy_signs;
        Triplet::new(
            flag,
            &[(abs_x >> 4) as u8, (((abs_x & 0xf) << 4) | (abs_y >> 8)) as u8, (abs_y & 0xff) as u8],
        )
    } else {
        let flag = on_curve_bit + 124 + xy_signs;
        Triplet::new(
            flag,
            &[(abs_x >> 8) as u8, (abs_x & 0xff) as u8, (abs_y >> 8) as u8, (abs_y & 0xff) as u8],
        )
    }
}

fn with_sign(flag: u8, value: i32) -> i32 {
    if flag & 1 != 0 { value } else { -value }
}

/// Decode a flag byte and its data bytes back into `(dx, dy, on_curve)`.
pub fn decode_triplet(flag: u8, data: &[u8]) -> Result<(i32, i32, bool)> {
    let on_curve = flag & OFF_CURVE_BIT == 0;
    let flag = flag & 0x7f;
    let data = data.get(..data_len(flag)).ok_or(Error::Truncated)?;
    let b = |i: usize| i32::from(data[i]);

    let (dx, dy) = match flag {
        0..=9 => (0, with_sign(flag, (i32::from(flag & 14) << 7) + b(0))),
        10..=19 => (with_sign(flag, (i32::from((flag - 10) & 14) << 7) + b(0)), 0),
        20..=83 => {
            let b0 = i32::from(flag - 20);
            let b1 = b(0);
            (
                with_sign(flag, 1 + (b0 & 0x30) + (b1 >> 4)),
                with_sign(flag >> 1, 1 + ((b0 & 0x0c) << 2) + (b1 & 0x0f)),
            )
        }
        84..=119 => {
            let b0 = i32::from(flag - 84);
            (
                with_sign(flag, 1 + ((b0 / 12) << 8) + b(0)),
                with_sign(flag >> 1, 1 + (((b0 % 12) >> 2) << 8) + b(1)),
            )
        }
        120..=123 => (
            with_sign(flag, (b(0) << 4) + (b(1) >> 4)),
            with_sign(flag >> 1, ((b(1) & 0x0f) << 8) + b(2)),
        ),
        _ => (with_sign(flag, (b(0) << 8) + b(1)), with_sign(flag >> 1, (b(2) << 8) + b(3))),
    };
    Ok((dx, dy, on_curve))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(dx: i32, dy: i32, on_curve: bool) {
        let triplet = encode_triplet(dx, dy, on_curve);
        assert_eq!(triplet.data().len(), data_len(triplet.flag));
        let decoded = decode_triplet(triplet.flag, triplet.data()).unwrap();
        assert_eq!(decoded, (dx, dy, on_curve), "flag {}", triplet.flag);
    }

    #[test]
    fn test_class_selection() {
        assert_eq!(encode_triplet(0, 5, true).flag, 1);
        assert_eq!(encode_triplet(0, -5, true).flag, 0);
        assert_eq!(encode_triplet(5, 0, true).flag, 11);
        assert_eq!(encode_triplet(3, 3, true).data().len(), 1);
        assert_eq!(encode_triplet(300, -2, true).data().len(), 2);
        assert_eq!(encode_triplet(1000, 800, true).data().len(), 3);
        assert_eq!(encode_triplet(5000, 1, true).data().len(), 4);
    }

    #[test]
    fn test_off_curve_bit() {
        let on = encode_triplet(10, 20, true);
        let off = encode_triplet(10, 20, false);
        assert_eq!(off.flag, on.flag | 0x80);
        assert_eq!(on.data(), off.data());
    }

    #[test]
    fn test_zero_delta() {
        let triplet = encode_triplet(0, 0, true);
        assert_eq!(triplet.flag, 0);
        assert_eq!(triplet.data(), [0]);
        round_trip(0, 0, false);
    }

    #[test]
    fn test_round_trip_class_boundaries() {
        let edges = [1, 63, 64, 65, 255, 256, 767, 768, 769, 1279, 1280, 4095];
        for &a in &edges {
            for &b in &edges {
                for (sx, sy) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
                    round_trip(sx * a, sy * b, true);
                    round_trip(sx * a, 0, false);
                    round_trip(0, sy * b, true);
                }
            }
        }
    }

    #[test]
    fn test_round_trip_dense_grid() {
        for dx in (-4095..4096).step_by(37) {
            for dy in (-4095..4096).step_by(41) {
                round_trip(dx, dy, (dx + dy) % 2 == 0);
            }
        }
    }

    #[test]
    fn test_round_trip_wide_deltas() {
        round_trip(65535, -65535, true);
        round_trip(-40000, 4096, false);
        round_trip(4096, 0, true);
    }

    #[test]
    fn test_decode_truncated() {
        assert!(decode_triplet(120, &[1, 2]).is_err());
    }
}
