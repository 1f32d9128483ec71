//! Session identifiers and the `sid` cookie.
//!
//! The host routes traffic to a persistent per-session actor keyed by the
//! `sid` cookie. Session ids are a routing hint, not a secret, so a
//! non-cryptographic PRNG is adequate here; what matters is the exact
//! 40-character layout the host expects.

use rand::Rng;

/// Session identifiers are exactly this long.
pub const SESSION_ID_LEN: usize = 40;

/// Fixed padding appended after the random decimal prefix. The host
/// matches on this byte-for-byte.
const SESSION_SEED: &str = "c04b8f7b594cdeedebc2a8029b82943b0a620815";

/// Generates a fresh session identifier: a random integer in
/// [10000, 1000000) rendered in decimal, right-padded with the fixed seed
/// to exactly [`SESSION_ID_LEN`] characters.
pub fn generate_session_id() -> String {
    let mut id = rand::rng().random_range(10_000u32..1_000_000).to_string();
    id.push_str(&SESSION_SEED[..SESSION_ID_LEN - id.len()]);
    id
}

/// Renders the cookie the host expects on the upgrade request.
pub fn session_cookie(session_id: &str) -> String {
    format!("sid={session_id}")
}

/// Extracts the session identifier from a cookie string: the value of the
/// first `sid=` attribute, up to the next `;`. Returns `None` when absent
/// or empty.
pub fn session_from_cookie(cookie: &str) -> Option<&str> {
    let start = cookie.find("sid=")? + "sid=".len();
    let rest = &cookie[start..];
    let value = match rest.find(';') {
        Some(end) => &rest[..end],
        None => rest,
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_session_id_layout() {
        for _ in 0..1000 {
            let id = generate_session_id();
            assert_eq!(id.len(), SESSION_ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

            // The seed starts with a non-digit, so the decimal prefix is
            // exactly the leading digit run: 5 or 6 digits in range.
            let digits: String = id.chars().take_while(|c| c.is_ascii_digit()).collect();
            let prefix: u32 = digits.parse().unwrap();
            assert!((10_000..1_000_000).contains(&prefix));
            assert_eq!(
                &id[digits.len()..],
                &SESSION_SEED[..SESSION_ID_LEN - digits.len()]
            );
        }
    }

    #[test]
    fn test_successive_ids_differ() {
        let ids: HashSet<String> = (0..100).map(|_| generate_session_id()).collect();
        // A handful of birthday collisions over ~10^6 values would be
        // extraordinary at this sample size.
        assert!(ids.len() > 95, "only {} distinct ids in 100 draws", ids.len());
    }

    #[test]
    fn test_cookie_roundtrip() {
        let id = generate_session_id();
        let cookie = session_cookie(&id);
        assert!(cookie.starts_with("sid="));
        assert_eq!(session_from_cookie(&cookie), Some(id.as_str()));
    }

    #[test]
    fn test_extract_stops_at_semicolon() {
        assert_eq!(
            session_from_cookie("sid=abc123; Path=/; HttpOnly"),
            Some("abc123")
        );
        assert_eq!(
            session_from_cookie("theme=dark; sid=abc123; lang=en"),
            Some("abc123")
        );
    }

    #[test]
    fn test_extract_absent_or_empty() {
        assert_eq!(session_from_cookie(""), None);
        assert_eq!(session_from_cookie("theme=dark"), None);
        assert_eq!(session_from_cookie("sid="), None);
        assert_eq!(session_from_cookie("sid=;other=1"), None);
    }
}
