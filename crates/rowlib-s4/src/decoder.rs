//! Data-value frame decoding.
//!
//! Turns the captured groups of an `ID<w><aaa><value>` frame into a
//! [`Reading`] by resolving the address against the [`Registry`].
//!
//! Width policy: a frame whose width letter disagrees with the registry
//! is rejected with [`Error::WidthMismatch`]. Value digit counts are not
//! enforced; the S4 zero-pads some values beyond their nominal width
//! (`IDD055000064` carries six digits for a two-byte slot). The decoded
//! value must still fit the width, so `IDS1A0FFFFFF` is rejected with
//! [`Error::MalformedHex`].

use rowlib_core::{Error, Reading, Result, Width};

use crate::protocol::Frame;
use crate::registry::Registry;

/// Decode one data-value frame.
pub fn decode_value(
    registry: &Registry,
    width: Width,
    address: &str,
    value: &str,
) -> Result<Reading> {
    let entry = registry
        .by_address(address)
        .ok_or_else(|| Error::UnknownAddress(address.to_string()))?;

    if entry.width != width {
        return Err(Error::WidthMismatch {
            address: entry.address.clone(),
            expected: entry.width,
            actual: width,
        });
    }

    let decoded = parse_hex(value)?;
    if decoded > width.max_value() {
        return Err(Error::MalformedHex(value.to_string()));
    }

    Ok(Reading {
        name: entry.name.clone(),
        address: entry.address.clone(),
        width,
        raw_hex: value.to_string(),
        value: decoded,
    })
}

/// Decode a classified frame, returning `None` for frames that carry no value.
pub fn decode_frame(registry: &Registry, frame: &Frame) -> Option<Result<Reading>> {
    match frame {
        Frame::DataValue {
            width,
            address,
            value,
        } => Some(decode_value(registry, *width, address, value)),
        _ => None,
    }
}

/// Base-16 parse that rejects empty input, signs, and overflow.
fn parse_hex(value: &str) -> Result<u32> {
    // `from_str_radix` accepts a leading `+`, which is not valid on the wire.
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::MalformedHex(value.to_string()));
    }
    u32::from_str_radix(value, 16).map_err(|_| Error::MalformedHex(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::classify;

    #[test]
    fn decode_distance() {
        let registry = Registry::s4();
        let reading = decode_value(&registry, Width::Double, "055", "0064").unwrap();
        assert_eq!(reading.name, "distance");
        assert_eq!(reading.address, "055");
        assert_eq!(reading.width, Width::Double);
        assert_eq!(reading.raw_hex, "0064");
        assert_eq!(reading.value, 100);
    }

    #[test]
    fn decode_padded_value() {
        let registry = Registry::s4();
        let frame = classify("IDD055000064");
        let reading = decode_frame(&registry, &frame).unwrap().unwrap();
        assert_eq!(reading.value, 100);
    }

    #[test]
    fn decode_triple() {
        let registry = Registry::s4();
        let reading = decode_value(&registry, Width::Triple, "08A", "0186A0").unwrap();
        assert_eq!(reading.name, "total_kcal");
        assert_eq!(reading.value, 100_000);
    }

    #[test]
    fn unknown_address() {
        let registry = Registry::s4();
        let err = decode_value(&registry, Width::Double, "3FF", "0001").unwrap_err();
        assert!(matches!(err, Error::UnknownAddress(a) if a == "3FF"));
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let registry = Registry::s4();
        let err = decode_value(&registry, Width::Single, "055", "64").unwrap_err();
        match err {
            Error::WidthMismatch {
                address,
                expected,
                actual,
            } => {
                assert_eq!(address, "055");
                assert_eq!(expected, Width::Double);
                assert_eq!(actual, Width::Single);
            }
            other => panic!("expected WidthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn malformed_hex() {
        let registry = Registry::s4();
        for value in ["", "00G4", "+064", "-1", "12 4", "1FFFFFFFF"] {
            let err = decode_value(&registry, Width::Double, "055", value).unwrap_err();
            assert!(matches!(err, Error::MalformedHex(_)), "accepted {value:?}");
        }
    }

    #[test]
    fn value_wider_than_slot_is_rejected() {
        let registry = Registry::s4();
        let err = decode_value(&registry, Width::Single, "1A0", "FFFFFF").unwrap_err();
        assert!(matches!(err, Error::MalformedHex(v) if v == "FFFFFF"));

        // Zero padding that still fits is fine.
        let reading = decode_value(&registry, Width::Single, "1A0", "00007F").unwrap();
        assert_eq!(reading.value, 0x7F);
    }

    #[test]
    fn lowercase_hex_value_is_accepted() {
        let registry = Registry::s4();
        let reading = decode_value(&registry, Width::Double, "14A", "01ff").unwrap();
        assert_eq!(reading.value, 0x1FF);
    }

    #[test]
    fn non_value_frames_decode_to_none() {
        let registry = Registry::s4();
        assert!(decode_frame(&registry, &Frame::Ping).is_none());
        assert!(decode_frame(&registry, &Frame::Pulse(3)).is_none());
    }

    #[test]
    fn encode_then_decode_every_entry() {
        let registry = Registry::s4();
        for entry in registry.entries() {
            let max = entry.width.max_value();
            for value in [0, 1, max / 3, max] {
                let hex = entry.width.encode_hex(value).unwrap();
                let reading = decode_value(&registry, entry.width, &entry.address, &hex).unwrap();
                assert_eq!(reading.value, value, "{}", entry.name);
                assert_eq!(reading.name, entry.name);
            }
        }
    }
}
