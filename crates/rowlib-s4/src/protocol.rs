//! S4 line framing and frame classification.
//!
//! The S4 speaks newline-terminated ASCII. Outbound commands end in `\r\n`;
//! inbound lines end in `\n`, usually preceded by `\r`.
//!
//! # Inbound frames
//!
//! ```text
//! PING                      heartbeat
//! P<hh>                     pulse count since last pulse frame
//! ERROR                     device rejected the last command
//! SS / SE                   stroke start / stroke end
//! ID<w><aaa><value>         memory value: width S|D|T, 3-hex address, hex value
//! _WR_                      reply to USB
//! OK                        acknowledgement
//! ```
//!
//! [`classify`] assigns exactly one [`Frame`] to a line, testing patterns in
//! the fixed order above so a line like `PING` is never read as a pulse.

use bytes::{BufMut, BytesMut};
use rowlib_core::Width;

/// Line terminator appended to every outbound command.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// One classified inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `PING`
    Ping,
    /// `P` followed by one hex byte.
    Pulse(u8),
    /// `ERROR`
    Error,
    /// `SS`
    StrokeStart,
    /// `SE`
    StrokeEnd,
    /// `ID` + width letter + 3-hex address + value.
    ///
    /// `value` is the raw remainder of the line; the decoder validates it.
    DataValue {
        /// Declared width.
        width: Width,
        /// Three uppercase hex digits.
        address: String,
        /// Unvalidated hex payload.
        value: String,
    },
    /// `_WR_`, the monitor's answer to `USB`.
    Hello,
    /// `OK`
    Ack,
    /// Anything else. The monitor emits many frames this driver ignores.
    Unrecognized(String),
}

/// Result of attempting to split one line off a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete line, without its terminator. May be empty.
    Line {
        /// Line text with `\r\n` / `\n` stripped.
        line: String,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },

    /// A complete line that is not valid UTF-8.
    Invalid(usize),

    /// No newline yet. More data is needed.
    Incomplete,
}

/// Encode a command payload for the wire by appending the line terminator.
///
/// This is the only place the terminator is added.
///
/// ```
/// use rowlib_s4::protocol::encode_line;
///
/// assert_eq!(encode_line("USB"), b"USB\r\n");
/// ```
pub fn encode_line(payload: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(payload.len() + LINE_TERMINATOR.len());
    buf.put_slice(payload.as_bytes());
    buf.put_slice(LINE_TERMINATOR);
    buf.to_vec()
}

/// Split the first newline-terminated line off `buf`.
pub fn decode_line(buf: &[u8]) -> DecodeResult {
    let Some(nl) = buf.iter().position(|&b| b == b'\n') else {
        return DecodeResult::Incomplete;
    };

    let consumed = nl + 1;
    let mut body = &buf[..nl];
    if let Some(stripped) = body.strip_suffix(b"\r") {
        body = stripped;
    }

    match std::str::from_utf8(body) {
        Ok(line) => DecodeResult::Line {
            line: line.to_string(),
            consumed,
        },
        Err(_) => DecodeResult::Invalid(consumed),
    }
}

fn is_upper_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'A'..=b'F').contains(&b)
}

/// Classify one line (terminator already stripped).
pub fn classify(line: &str) -> Frame {
    let bytes = line.as_bytes();

    if line == "PING" {
        return Frame::Ping;
    }

    if bytes.len() == 3 && bytes[0] == b'P' && is_upper_hex(bytes[1]) && is_upper_hex(bytes[2]) {
        // Both digits were checked above, so the parse cannot fail.
        if let Ok(count) = u8::from_str_radix(&line[1..], 16) {
            return Frame::Pulse(count);
        }
    }

    match line {
        "ERROR" => return Frame::Error,
        "SS" => return Frame::StrokeStart,
        "SE" => return Frame::StrokeEnd,
        _ => {}
    }

    if bytes.len() >= 6 && line.starts_with("ID") {
        let width = Width::from_letter(bytes[2] as char);
        let address_ok = bytes[3..6].iter().all(|&b| is_upper_hex(b));
        if let (Some(width), true) = (width, address_ok) {
            return Frame::DataValue {
                width,
                address: line[3..6].to_string(),
                value: line[6..].to_string(),
            };
        }
    }

    match line {
        "_WR_" => Frame::Hello,
        "OK" => Frame::Ack,
        _ => Frame::Unrecognized(line.to_string()),
    }
}
