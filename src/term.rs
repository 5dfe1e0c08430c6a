//! Binary payload encoder for handoff tokens.
//!
//! The receiving application decodes the token payload with its native
//! Erlang term decoder, so the bytes produced here must match, bit for bit,
//! the one record shape that decoder expects. This module reproduces exactly
//! that subset of the external term format as fixed templates with named
//! patch offsets. It is deliberately not a general serializer: adding a
//! field means hand-deriving new template bytes against the reference
//! decoder, not extending a schema.

use chrono::{DateTime, Utc};

/// External term format version tag.
const FORMAT_VERSION: u8 = 131;
/// Tuple of up to 255 elements, followed by its arity.
const SMALL_TUPLE_EXT: u8 = 104;
/// 32-bit big-endian signed integer.
const INTEGER_EXT: u8 = 98;
/// Length-prefixed byte sequence.
const BINARY_EXT: u8 = 109;
/// Arbitrary-size integer, here always 6 digits, positive.
const SMALL_BIG_EXT: u8 = 110;

/// Validity window marker, copied verbatim from the reference decoder.
/// Reproduced, never computed.
const VALIDITY_WINDOW: [u8; 4] = [0, 1, 81, 128];

/// Byte length of the patched creation timestamp.
const CREATED_AT_LEN: usize = 6;

/// Exact byte length of every login payload.
pub const LOGIN_PAYLOAD_LEN: usize = 29;
/// Offset of the 4-byte big-endian user id.
pub const USER_ID_OFFSET: usize = 6;
/// Offset of the 4-byte big-endian last-login timestamp (whole seconds).
pub const LAST_LOGIN_OFFSET: usize = 11;
/// Offset of the 6-byte creation timestamp in a login payload.
const LOGIN_CREATED_AT_OFFSET: usize = 18;

/// Login record template. Zeroed slots are patched before signing.
const LOGIN_TEMPLATE: [u8; LOGIN_PAYLOAD_LEN] = [
    FORMAT_VERSION,
    SMALL_TUPLE_EXT, 3, // outer 3-tuple.
    SMALL_TUPLE_EXT, 2, // inner {id, last_login} pair.
    INTEGER_EXT, 0, 0, 0, 0, // user id.
    INTEGER_EXT, 0, 0, 0, 0, // last login, seconds since epoch.
    SMALL_BIG_EXT, CREATED_AT_LEN as u8, 0, // positive 6-digit integer.
    0, 0, 0, 0, 0, 0, // creation time, milliseconds since epoch.
    INTEGER_EXT,
    VALIDITY_WINDOW[0], VALIDITY_WINDOW[1], VALIDITY_WINDOW[2], VALIDITY_WINDOW[3],
];

/// Signup header: outer 3-tuple wrapping a binary term.
const SIGNUP_HEADER: [u8; 4] = [FORMAT_VERSION, SMALL_TUPLE_EXT, 3, BINARY_EXT];

/// Signup footer: creation timestamp followed by the validity marker.
const SIGNUP_FOOTER: [u8; 14] = [
    SMALL_BIG_EXT, CREATED_AT_LEN as u8, 0,
    0, 0, 0, 0, 0, 0, // creation time, patched.
    INTEGER_EXT,
    VALIDITY_WINDOW[0], VALIDITY_WINDOW[1], VALIDITY_WINDOW[2], VALIDITY_WINDOW[3],
];

/// Offset of the creation timestamp inside [`SIGNUP_FOOTER`].
const FOOTER_CREATED_AT_OFFSET: usize = 3;

/// Bytes preceding the email in a signup payload (header + length prefix).
pub const SIGNUP_HEADER_LEN: usize = SIGNUP_HEADER.len() + 4;
/// Bytes following the email in a signup payload.
pub const SIGNUP_FOOTER_LEN: usize = SIGNUP_FOOTER.len();

/// Error raised when a field cannot be represented in the wire format.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("binary field of {0} bytes exceeds the 32-bit length prefix")]
    FieldTooLong(usize),
}

/// Encode a login record for an existing user.
///
/// Pure: identical inputs always yield identical bytes. The caller supplies
/// the creation instant so signing stays deterministic under test.
pub fn encode_login(
    user_id: i32,
    last_login_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
) -> [u8; LOGIN_PAYLOAD_LEN] {
    let mut payload = LOGIN_TEMPLATE;

    payload[USER_ID_OFFSET..USER_ID_OFFSET + 4]
        .copy_from_slice(&user_id.to_be_bytes());
    payload[LAST_LOGIN_OFFSET..LAST_LOGIN_OFFSET + 4]
        .copy_from_slice(&(last_login_at.timestamp() as u32).to_be_bytes());
    write_created_at(&mut payload, LOGIN_CREATED_AT_OFFSET, created_at);

    payload
}

/// Encode a signup record for an email without a matching user row.
///
/// Length is `SIGNUP_HEADER_LEN + email bytes + SIGNUP_FOOTER_LEN`. Fails
/// only when the UTF-8 byte length of the email overflows the 4-byte length
/// prefix; the check exists to rule out silent truncation.
pub fn encode_signup(
    email: &str,
    created_at: DateTime<Utc>,
) -> Result<Vec<u8>, EncodingError> {
    let bytes = email.as_bytes();
    let length = u32::try_from(bytes.len())
        .map_err(|_| EncodingError::FieldTooLong(bytes.len()))?;

    let mut payload =
        Vec::with_capacity(SIGNUP_HEADER_LEN + bytes.len() + SIGNUP_FOOTER_LEN);
    payload.extend_from_slice(&SIGNUP_HEADER);
    payload.extend_from_slice(&length.to_be_bytes());
    payload.extend_from_slice(bytes);

    let created_at_offset = payload.len() + FOOTER_CREATED_AT_OFFSET;
    payload.extend_from_slice(&SIGNUP_FOOTER);
    write_created_at(&mut payload, created_at_offset, created_at);

    Ok(payload)
}

/// Patch the 6-byte big-endian creation timestamp at `offset`.
///
/// Takes the low 48 bits of the millisecond epoch time, matching the remote
/// format's compact timestamp width.
///
/// # Panics
///
/// Panics if the buffer is shorter than `offset + 6`. Offsets are template
/// constants, so reaching the panic means the layout code itself is broken;
/// it is not a recoverable request error.
pub fn write_created_at(buffer: &mut [u8], offset: usize, at: DateTime<Utc>) {
    let millis = at.timestamp_millis() as u64;
    buffer[offset..offset + CREATED_AT_LEN]
        .copy_from_slice(&millis.to_be_bytes()[2..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frozen_clock() -> DateTime<Utc> {
        // 2023-06-01T12:00:00.000Z
        Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn login_layout_is_fixed() {
        let last_login = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let payload = encode_login(2, last_login, frozen_clock());

        assert_eq!(payload.len(), LOGIN_PAYLOAD_LEN);
        // Header and tuple tags.
        assert_eq!(&payload[..6], &[131, 104, 3, 104, 2, 98]);
        // User id slot.
        assert_eq!(&payload[USER_ID_OFFSET..USER_ID_OFFSET + 4], &[0, 0, 0, 2]);
        // Integer tag between the two patched slots.
        assert_eq!(payload[10], 98);
        // 2022-01-01T00:00:00Z = 1640995200 seconds.
        assert_eq!(
            &payload[LAST_LOGIN_OFFSET..LAST_LOGIN_OFFSET + 4],
            &1640995200u32.to_be_bytes(),
        );
        // Small-big header for the creation timestamp.
        assert_eq!(&payload[15..18], &[110, 6, 0]);
        assert_eq!(
            &payload[18..24],
            &1_685_620_800_000u64.to_be_bytes()[2..],
        );
        // Trailing validity marker.
        assert_eq!(&payload[24..], &[98, 0, 1, 81, 128]);
    }

    #[test]
    fn login_template_bytes_do_not_depend_on_inputs() {
        let a = encode_login(i32::MIN, frozen_clock(), frozen_clock());
        let b = encode_login(i32::MAX, Utc::now(), Utc::now());

        for offset in [0usize, 1, 2, 3, 4, 5, 10, 15, 16, 17, 24, 25, 26, 27, 28] {
            assert_eq!(a[offset], b[offset], "template byte {offset} drifted");
        }
    }

    #[test]
    fn signup_layout_matches_email_length() {
        let email = "a@b.com";
        let payload = encode_signup(email, frozen_clock()).unwrap();

        assert_eq!(payload.len(), SIGNUP_HEADER_LEN + email.len() + SIGNUP_FOOTER_LEN);
        assert_eq!(&payload[..4], &[131, 104, 3, 109]);
        assert_eq!(&payload[4..8], &[0, 0, 0, 7]);
        assert_eq!(&payload[8..15], email.as_bytes());
        assert_eq!(&payload[15..18], &[110, 6, 0]);
        assert_eq!(&payload[24..], &[98, 0, 1, 81, 128]);
    }

    #[test]
    fn signup_length_prefix_counts_utf8_bytes() {
        // Two code points, six UTF-8 bytes.
        let email = "é@é";
        let payload = encode_signup(email, frozen_clock()).unwrap();

        let expected = email.len() as u32;
        assert_eq!(&payload[4..8], &expected.to_be_bytes());
        assert_eq!(payload.len(), SIGNUP_HEADER_LEN + email.len() + SIGNUP_FOOTER_LEN);
    }

    #[test]
    fn created_at_keeps_low_48_bits_big_endian() {
        let mut buffer = [0u8; 8];
        let at = Utc.timestamp_millis_opt(0x0123_4567_89AB_CDEF_i64 & 0xFFFF_FFFF_FFFF)
            .unwrap();
        write_created_at(&mut buffer, 1, at);

        assert_eq!(buffer, [0, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0]);
    }

    #[test]
    fn encoding_is_deterministic() {
        let now = frozen_clock();
        assert_eq!(encode_login(42, now, now), encode_login(42, now, now));
        assert_eq!(
            encode_signup("x@y.z", now).unwrap(),
            encode_signup("x@y.z", now).unwrap(),
        );
    }
}
