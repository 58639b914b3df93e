//! Session id generation
//!
//! Ids are 16 characters over a 62-character alphanumeric alphabet, drawn from
//! the operating system's secure random source. Bytes that would bias the
//! modulo reduction are rejected and redrawn.

use rand::TryRngCore;
use rand::rngs::OsRng;
use std::sync::Arc;

pub const SESSION_ID_LENGTH: usize = 16;

pub const SESSION_ID_CHARSET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Largest multiple of the alphabet size that fits in a byte
const ACCEPT_BELOW: u8 = (256 / SESSION_ID_CHARSET.len() * SESSION_ID_CHARSET.len()) as u8;

/// A session id source; `None` means no id could be produced right now
pub type SessionIdGenerator = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Generate a fresh session id, or `None` if the entropy source failed
pub fn new_session_id() -> Option<String> {
    let mut id = String::with_capacity(SESSION_ID_LENGTH);
    let mut buf = [0u8; SESSION_ID_LENGTH];

    while id.len() < SESSION_ID_LENGTH {
        if let Err(e) = OsRng.try_fill_bytes(&mut buf) {
            tracing::error!(error = %e, "OS random source failed while generating session id");
            return None;
        }
        for &byte in &buf {
            if id.len() == SESSION_ID_LENGTH {
                break;
            }
            if byte < ACCEPT_BELOW {
                id.push(SESSION_ID_CHARSET[(byte as usize) % SESSION_ID_CHARSET.len()] as char);
            }
        }
    }

    Some(id)
}

/// The default generator, backed by [`new_session_id`]
pub fn default_generator() -> SessionIdGenerator {
    Arc::new(new_session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id().expect("OS rng should be available");
        assert_eq!(id.len(), SESSION_ID_LENGTH);
        assert!(id.bytes().all(|b| SESSION_ID_CHARSET.contains(&b)));
    }

    #[test]
    fn test_session_ids_are_distinct() {
        let ids: HashSet<String> = (0..1000).filter_map(|_| new_session_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_accept_threshold() {
        assert_eq!(SESSION_ID_CHARSET.len(), 62);
        assert_eq!(ACCEPT_BELOW, 248);
    }

    #[test]
    fn test_default_generator_produces_ids() {
        let generator = default_generator();
        assert_eq!(generator().map(|id| id.len()), Some(SESSION_ID_LENGTH));
    }
}
