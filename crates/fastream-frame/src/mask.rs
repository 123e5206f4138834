//! 256-bit channel selection mask.
//!
//! Channel `id` lives in bit `id % 8` of byte `id / 8`. On the wire the mask
//! is 64 uppercase hex digits with the bytes in reverse order, so channel 255
//! is in the first digit pair and channel 0 in the last.

use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};

/// Number of channels a mask can select.
pub const MASK_CHANNELS: usize = 256;

/// Size of the canonical mask in bytes.
pub const MASK_BYTES: usize = MASK_CHANNELS / 8;

/// Length of the hex wire encoding.
pub const WIRE_MASK_LEN: usize = MASK_BYTES * 2;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// A set of channel ids in `[0, 256)`.
///
/// Building a mask is order-independent and idempotent: any permutation of
/// the same ids (duplicates included) produces an identical value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelMask([u8; MASK_BYTES]);

impl ChannelMask {
    /// An empty mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mask from channel ids, rejecting any id outside `[0, 256)`.
    pub fn from_ids<I>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut mask = Self::new();
        for id in ids {
            mask.insert(id)?;
        }
        Ok(mask)
    }

    /// Wrap the canonical 32-byte form.
    pub fn from_bytes(bytes: [u8; MASK_BYTES]) -> Self {
        Self(bytes)
    }

    /// The canonical 32-byte form.
    pub fn as_bytes(&self) -> &[u8; MASK_BYTES] {
        &self.0
    }

    /// Select a channel.
    pub fn insert(&mut self, id: usize) -> Result<()> {
        if id >= MASK_CHANNELS {
            return Err(FrameError::ChannelOutOfRange(id));
        }
        self.0[id / 8] |= 1 << (id % 8);
        Ok(())
    }

    /// Whether a channel is selected. Ids outside the mask are never selected.
    pub fn contains(&self, id: usize) -> bool {
        id < MASK_CHANNELS && self.0[id / 8] & (1 << (id % 8)) != 0
    }

    /// Number of selected channels.
    pub fn count(&self) -> usize {
        self.0.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Selected ids in ascending order, which is also the column order of
    /// decoded sample blocks.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MASK_CHANNELS).filter(move |&id| self.contains(id))
    }

    /// Column of `id` inside a decoded block, if it is selected.
    pub fn position(&self, id: usize) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        let whole = self.0[..id / 8]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum::<usize>();
        let partial = (self.0[id / 8] & ((1u8 << (id % 8)) - 1)).count_ones() as usize;
        Some(whole + partial)
    }

    /// The 64-character wire encoding.
    pub fn format(&self) -> String {
        let mut out = String::with_capacity(WIRE_MASK_LEN);
        for &byte in self.0.iter().rev() {
            out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
        }
        out
    }

    /// Parse the 64-character wire encoding (either case).
    pub fn parse_hex(input: &str) -> Result<Self> {
        let digits = input.as_bytes();
        if digits.len() != WIRE_MASK_LEN {
            return Err(spec_error(
                input,
                digits.len().min(WIRE_MASK_LEN),
                format!("expected {WIRE_MASK_LEN} hex digits, found {}", digits.len()),
            ));
        }

        let mut bytes = [0u8; MASK_BYTES];
        for (i, pair) in digits.chunks_exact(2).enumerate() {
            let hi = hex_value(pair[0]).ok_or_else(|| spec_error(input, 2 * i, "not a hex digit"))?;
            let lo =
                hex_value(pair[1]).ok_or_else(|| spec_error(input, 2 * i + 1, "not a hex digit"))?;
            bytes[MASK_BYTES - 1 - i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl fmt::Debug for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl From<[u8; MASK_BYTES]> for ChannelMask {
    fn from(bytes: [u8; MASK_BYTES]) -> Self {
        Self(bytes)
    }
}

/// Parses a range list: `mask = id [ "-" id ] [ "," mask ]`.
///
/// Ids are decimal or `0x`-prefixed hex; ranges are inclusive.
impl FromStr for ChannelMask {
    type Err = FrameError;

    fn from_str(input: &str) -> Result<Self> {
        let bytes = input.as_bytes();
        let mut mask = Self::new();
        let mut pos = 0usize;

        loop {
            let (start, next) = read_id(input, pos)?;
            pos = next;

            if bytes.get(pos) == Some(&b'-') {
                let (end, next) = read_id(input, pos + 1)?;
                if start > end {
                    return Err(spec_error(
                        input,
                        pos,
                        format!("range {start}-{end} is empty"),
                    ));
                }
                pos = next;
                for id in start..=end {
                    mask.insert(id)?;
                }
            } else {
                mask.insert(start)?;
            }

            if bytes.get(pos) != Some(&b',') {
                break;
            }
            pos += 1;
        }

        if pos != bytes.len() {
            return Err(spec_error(input, pos, "unexpected characters"));
        }
        Ok(mask)
    }
}

fn read_id(input: &str, pos: usize) -> Result<(usize, usize)> {
    let rest = &input.as_bytes()[pos..];
    let (radix, skip) = if rest.len() > 2 && rest[0] == b'0' && matches!(rest[1], b'x' | b'X') {
        (16, 2)
    } else {
        (10, 0)
    };

    let digits = rest[skip..]
        .iter()
        .take_while(|b| (**b as char).is_digit(radix))
        .count();
    if digits == 0 {
        return Err(spec_error(input, pos, "number missing"));
    }

    let end = pos + skip + digits;
    let text = &input[pos + skip..end];
    match usize::from_str_radix(text, radix) {
        Ok(id) if id < MASK_CHANNELS => Ok((id, end)),
        _ => Err(spec_error(
            input,
            pos,
            format!("id {} out of range", &input[pos..end]),
        )),
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|v| v as u8)
}

fn spec_error(input: &str, offset: usize, reason: impl Into<String>) -> FrameError {
    FrameError::InvalidMaskSpec {
        input: input.to_string(),
        offset,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_wire_hex(s: &str) -> bool {
        s.len() == WIRE_MASK_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
    }

    #[test]
    fn known_mask_layout() {
        let mask = ChannelMask::from_ids([0, 5, 255]).unwrap();

        let bytes = mask.as_bytes();
        assert_eq!(bytes[0], 0b0010_0001);
        assert_eq!(bytes[31], 0b1000_0000);
        assert!(bytes[1..31].iter().all(|&b| b == 0));

        let wire = mask.format();
        assert!(wire.starts_with("80"));
        assert!(wire.ends_with("21"));
        assert_eq!(wire, format!("80{}21", "0".repeat(60)));
    }

    #[test]
    fn count_matches_cardinality() {
        let sets: Vec<Vec<usize>> = vec![
            vec![],
            vec![0],
            vec![255],
            vec![0, 5, 255],
            (0..256).collect(),
            (0..256).step_by(3).collect(),
            vec![7, 8, 15, 16, 31, 32, 127, 128],
        ];
        for set in sets {
            let mask = ChannelMask::from_ids(set.iter().copied()).unwrap();
            assert_eq!(mask.count(), set.len(), "set {set:?}");
        }
    }

    #[test]
    fn duplicates_do_not_inflate_count() {
        let mask = ChannelMask::from_ids([3, 3, 9, 3, 9]).unwrap();
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn order_independent_and_idempotent() {
        let ids: Vec<usize> = vec![200, 1, 77, 64, 3, 128, 255, 0];
        let forward = ChannelMask::from_ids(ids.iter().copied()).unwrap();

        let mut reversed = ids.clone();
        reversed.reverse();
        assert_eq!(ChannelMask::from_ids(reversed).unwrap(), forward);

        let mut rotated = ids.clone();
        rotated.rotate_left(3);
        assert_eq!(ChannelMask::from_ids(rotated).unwrap(), forward);

        let again = ChannelMask::from_ids(forward.iter()).unwrap();
        assert_eq!(again, forward);
    }

    #[test]
    fn out_of_range_id_rejected() {
        let err = ChannelMask::from_ids([1, 256]).unwrap_err();
        assert!(matches!(err, FrameError::ChannelOutOfRange(256)));
    }

    #[test]
    fn format_is_always_64_uppercase_hex() {
        let masks = [
            ChannelMask::new(),
            ChannelMask::from_ids(0..256).unwrap(),
            ChannelMask::from_ids([10, 11, 12, 171, 250]).unwrap(),
        ];
        for mask in masks {
            assert!(is_wire_hex(&mask.format()), "{}", mask.format());
            assert_eq!(mask.to_string(), mask.format());
        }
        assert_eq!(ChannelMask::from_ids(0..256).unwrap().format(), "F".repeat(64));
    }

    #[test]
    fn parse_hex_inverts_format() {
        let mask = ChannelMask::from_ids([0, 9, 100, 254]).unwrap();
        assert_eq!(ChannelMask::parse_hex(&mask.format()).unwrap(), mask);
        assert_eq!(
            ChannelMask::parse_hex(&mask.format().to_lowercase()).unwrap(),
            mask
        );
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert!(ChannelMask::parse_hex("00").is_err());
        let mut bad = "0".repeat(63);
        bad.push('G');
        assert!(matches!(
            ChannelMask::parse_hex(&bad),
            Err(FrameError::InvalidMaskSpec { offset: 63, .. })
        ));
    }

    #[test]
    fn iter_and_position_follow_ascending_ids() {
        let mask = ChannelMask::from_ids([40, 2, 17, 9]).unwrap();
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![2, 9, 17, 40]);
        assert_eq!(mask.position(2), Some(0));
        assert_eq!(mask.position(17), Some(2));
        assert_eq!(mask.position(40), Some(3));
        assert_eq!(mask.position(3), None);
        assert!(!mask.contains(999));
    }

    #[test]
    fn parse_range_list() {
        let mask: ChannelMask = "0-3,10".parse().unwrap();
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 10]);

        let mask: ChannelMask = "0x10,255".parse().unwrap();
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![16, 255]);

        let all: ChannelMask = "0-255".parse().unwrap();
        assert_eq!(all.count(), 256);
    }

    #[test]
    fn parse_range_list_rejects_malformed_specs() {
        for spec in ["", "5-3", "256", "1,", "x", "1-", "3;4", "0-300"] {
            let err = spec.parse::<ChannelMask>().unwrap_err();
            assert!(
                matches!(err, FrameError::InvalidMaskSpec { .. }),
                "{spec:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn debug_lists_ids() {
        let mask = ChannelMask::from_ids([1, 4]).unwrap();
        assert_eq!(format!("{mask:?}"), "{1, 4}");
    }
}
