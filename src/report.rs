//! Decoding of the keyboard's vendor input reports.
//!
//! The analog interface delivers fixed 64-byte reports. Only reports whose
//! first byte is the analog marker carry a key/pressure sample; everything
//! else (heartbeats, status traffic) is valid but irrelevant and is dropped
//! without comment.

/// Size of one vendor report on the analog interface.
pub const REPORT_LEN: usize = 64;

/// First byte of a report that carries analog key data.
pub const ANALOG_REPORT_MARKER: u8 = 0xA0;

/// One decoded analog sample: which key, and how hard it is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPressure {
    pub key_id: u8,
    pub pressure: u16,
}

/// Decode a raw report buffer.
///
/// Layout of an analog report: byte 0 is the marker, byte 3 the key id,
/// bytes 4..=5 the big-endian raw pressure. Returns `None` for any other
/// shape; that is normal traffic, not an error.
pub fn parse_report(buf: &[u8]) -> Option<KeyPressure> {
    if buf.len() <= 6 || buf[0] != ANALOG_REPORT_MARKER {
        return None;
    }
    Some(KeyPressure {
        key_id: buf[3],
        pressure: ((buf[4] as u16) << 8) | buf[5] as u16,
    })
}
