//! Core value types shared by the protocol crates.

use std::fmt;

/// Encoded byte width of a monitor memory location.
///
/// The S4 stores values in 1, 2 or 3 byte slots. On the wire the width is
/// a single letter (`S`, `D`, `T`) and the value field carries two hex
/// digits per byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Width {
    /// One byte, two hex digits.
    Single,
    /// Two bytes, four hex digits.
    Double,
    /// Three bytes, six hex digits.
    Triple,
}

impl Width {
    /// All widths, narrowest first.
    pub const ALL: [Width; 3] = [Width::Single, Width::Double, Width::Triple];

    /// Map a wire letter (`S`, `D`, `T`) to a width.
    pub fn from_letter(letter: char) -> Option<Width> {
        match letter {
            'S' => Some(Width::Single),
            'D' => Some(Width::Double),
            'T' => Some(Width::Triple),
            _ => None,
        }
    }

    /// The wire letter for this width.
    pub fn letter(&self) -> char {
        match self {
            Width::Single => 'S',
            Width::Double => 'D',
            Width::Triple => 'T',
        }
    }

    /// Number of bytes the value occupies in device memory.
    pub fn bytes(&self) -> usize {
        match self {
            Width::Single => 1,
            Width::Double => 2,
            Width::Triple => 3,
        }
    }

    /// Number of hex digits in the encoded value.
    pub fn hex_digits(&self) -> usize {
        self.bytes() * 2
    }

    /// Largest value representable in this width.
    pub fn max_value(&self) -> u32 {
        (1u32 << (8 * self.bytes())) - 1
    }

    /// Encode `value` as zero-padded uppercase hex of exactly
    /// [`hex_digits`](Width::hex_digits) digits.
    ///
    /// Returns `None` if the value does not fit.
    pub fn encode_hex(&self, value: u32) -> Option<String> {
        if value > self.max_value() {
            return None;
        }
        Some(format!("{value:0width$X}", width = self.hex_digits()))
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One decoded data-value frame, resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Semantic field name (e.g. `"distance"`).
    pub name: String,
    /// 3-hex-digit memory address the value was read from.
    pub address: String,
    /// Declared width of the value.
    pub width: Width,
    /// The hex payload exactly as received.
    pub raw_hex: String,
    /// Decoded unsigned value.
    pub value: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_letters_round_trip() {
        for width in Width::ALL {
            assert_eq!(Width::from_letter(width.letter()), Some(width));
        }
        assert_eq!(Width::from_letter('X'), None);
        assert_eq!(Width::from_letter('s'), None);
    }

    #[test]
    fn width_sizes() {
        assert_eq!(Width::Single.hex_digits(), 2);
        assert_eq!(Width::Double.hex_digits(), 4);
        assert_eq!(Width::Triple.hex_digits(), 6);
        assert_eq!(Width::Single.max_value(), 0xFF);
        assert_eq!(Width::Double.max_value(), 0xFFFF);
        assert_eq!(Width::Triple.max_value(), 0xFF_FFFF);
    }

    #[test]
    fn encode_hex_pads_to_width() {
        assert_eq!(Width::Single.encode_hex(0x0A).as_deref(), Some("0A"));
        assert_eq!(Width::Double.encode_hex(100).as_deref(), Some("0064"));
        assert_eq!(Width::Triple.encode_hex(0xABCDE).as_deref(), Some("0ABCDE"));
    }

    #[test]
    fn encode_hex_rejects_overflow() {
        assert_eq!(Width::Single.encode_hex(0x100), None);
        assert_eq!(Width::Double.encode_hex(0x1_0000), None);
        assert_eq!(Width::Triple.encode_hex(0x100_0000), None);
    }

    #[test]
    fn encode_hex_round_trips_boundaries() {
        for width in Width::ALL {
            for value in [0, 1, width.max_value() / 2, width.max_value()] {
                let hex = width.encode_hex(value).unwrap();
                assert_eq!(hex.len(), width.hex_digits());
                assert_eq!(u32::from_str_radix(&hex, 16).unwrap(), value);
            }
        }
    }

    #[test]
    fn width_display() {
        assert_eq!(Width::Double.to_string(), "D");
    }
}
