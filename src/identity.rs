//! Skype identity prefixes and the `pk_id`/`guid` message-id codec.
//!
//! Grounded on `skypedata.py`'s `ID_PREFIX_*` constants and
//! `live.py::make_message_ids`/`id_to_identity`/`identity_to_id`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

pub const ID_PREFIX_SINGLE: &str = "8:";
pub const ID_PREFIX_GROUP: &str = "19:";
pub const ID_PREFIX_BOT: &str = "28:";
pub const ID_PREFIX_SPECIAL: &str = "48:";

const P2P_SUFFIX: &str = "@p2p.thread.skype";
const THREAD_SUFFIX: &str = "@thread.skype";

/// Strips a leading `\d+:` numeric prefix, as Skype identity strings carry.
fn strip_numeric_prefix(s: &str) -> &str {
    let digits_end = s
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, c)| i + c.len_utf8());
    match digits_end {
        Some(end) if s[end..].starts_with(':') => &s[end + 1..],
        _ => s,
    }
}

/// Returns whether `s` begins with an all-digit run followed by `:`.
fn has_numeric_prefix(s: &str) -> bool {
    let mut chars = s.char_indices().peekable();
    let mut saw_digit = false;
    while let Some((i, c)) = chars.peek().copied() {
        if c.is_ascii_digit() {
            saw_digit = true;
            chars.next();
            continue;
        }
        return saw_digit && c == ':' && i > 0;
    }
    false
}

/// Converts a conversation/contact id as used by the live service into the
/// database's `identity` form: `"username"` from `"8:username"`, a decoded
/// legacy p2p form, or a group thread id left as-is.
pub fn id_to_identity(chatid: &str) -> String {
    let mut result = chatid.to_string();
    if !result.ends_with(THREAD_SUFFIX) {
        if !result.starts_with(ID_PREFIX_BOT) && has_numeric_prefix(&result) {
            result = strip_numeric_prefix(&result).to_string();
        }
        if let Some(stripped) = result.strip_suffix(P2P_SUFFIX) {
            if let Ok(decoded) = STANDARD.decode(stripped) {
                if let Ok(text) = String::from_utf8(decoded) {
                    result = text;
                }
            } else {
                result = stripped.to_string();
            }
        }
    }
    result
}

/// Inverse of [`id_to_identity`]: converts a database `identity` back into
/// the form the live service expects.
pub fn identity_to_id(identity: &str) -> String {
    if identity.ends_with(THREAD_SUFFIX) {
        return identity.to_string();
    }
    if let Some(rest) = identity.strip_prefix('#') {
        let encoded = STANDARD.encode(identity);
        let _ = rest;
        return format!("{}{}{}", ID_PREFIX_GROUP, encoded, P2P_SUFFIX);
    }
    if identity.ends_with("thread.skype") || has_numeric_prefix(identity) {
        return identity.to_string();
    }
    format!("{}{}", ID_PREFIX_SINGLE, identity)
}

/// Returns whether a contact identity is a bot, per the `28:` prefix
/// convention canonicalized by [`crate::sync::convert`].
pub fn is_bot(skypename: &str) -> bool {
    skypename.starts_with(ID_PREFIX_BOT)
}

/// Hashes an arbitrary string id into a positive 63-bit integer suitable for
/// a SQLite INTEGER column, the way [`crate::db::links::compute_conversation_id`]
/// truncates a SHA-256 digest rather than inventing a bespoke hash.
pub fn hash_string(s: &str) -> i64 {
    let digest = Sha256::digest(s.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(buf) & 0x7FFF_FFFF_FFFF_FFFF) as i64
}

/// Returns `(pk_id, guid)` for a message id string, mirroring
/// `live.py::make_message_ids`: an integer id that fits in 63 bits is used
/// directly, otherwise the id is hashed; `guid` packs `pk_id` little-endian
/// (4 bytes if it fits in 31 bits, else 8) and replicates the result to
/// fill 32 bytes.
pub fn make_message_ids(msg_id: &str) -> (i64, [u8; 32]) {
    // An id that overflows i64 can't fit a SQLite INTEGER column either;
    // `str::parse` failing (non-numeric or too large) falls back to hashing,
    // same as the `int(msg_id).bit_length() >= 64` branch it mirrors.
    let pk_id = msg_id.parse::<i64>().unwrap_or_else(|_| hash_string(msg_id));
    let packed: Vec<u8> = if bit_length(pk_id) < 32 {
        (pk_id as i32).to_le_bytes().to_vec()
    } else {
        pk_id.to_le_bytes().to_vec()
    };
    let mut guid = [0u8; 32];
    for (i, b) in guid.iter_mut().enumerate() {
        *b = packed[i % packed.len()];
    }
    (pk_id, guid)
}

fn bit_length(n: i64) -> u32 {
    let magnitude = n.unsigned_abs();
    64 - magnitude.leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_message_ids_small_int_round_trips_guid_length() {
        let (pk_id, guid) = make_message_ids("42");
        assert_eq!(pk_id, 42);
        assert_eq!(guid.len(), 32);
        assert_eq!(&guid[0..4], &42i32.to_le_bytes());
        assert_eq!(&guid[4..8], &42i32.to_le_bytes());
    }

    #[test]
    fn make_message_ids_large_int_uses_eight_byte_packing() {
        let big: i64 = 1 << 40;
        let (pk_id, guid) = make_message_ids(&big.to_string());
        assert_eq!(pk_id, big);
        assert_eq!(&guid[0..8], &big.to_le_bytes());
        assert_eq!(&guid[8..16], &big.to_le_bytes());
    }

    #[test]
    fn make_message_ids_non_numeric_hashes() {
        let (pk_id, guid) = make_message_ids("not-a-number");
        assert!(pk_id >= 0);
        assert_eq!(guid.len(), 32);
    }

    #[test]
    fn single_identity_round_trips() {
        let id = identity_to_id("someuser");
        assert_eq!(id, "8:someuser");
        assert_eq!(id_to_identity(&id), "someuser");
    }

    #[test]
    fn group_thread_identity_is_unchanged() {
        let id = "19:abcxyz@thread.skype";
        assert_eq!(id_to_identity(id), id);
        assert_eq!(identity_to_id(id), id);
    }

    #[test]
    fn bot_prefix_is_detected() {
        assert!(is_bot("28:somebot"));
        assert!(!is_bot("8:someuser"));
    }
}
