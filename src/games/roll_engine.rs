//! Deterministic roll derivation.
//!
//! A roll is derived from `HMAC-SHA256(server_seed, "client_seed:nonce")`
//! rendered as lowercase hex. The digest is scanned in five-character
//! windows; the first window whose value is below one million is reduced
//! to `0..=9999` hundredths. The window at offset 60 is only four
//! characters long, which is how browser-side verifiers slice the digest.

use crate::games::types::Hundredths;
use hmac::{digest::KeyInit, Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const WINDOW: usize = 5;
const ACCEPT_BELOW: u32 = 1_000_000;
const ROLL_SPACE: u32 = 10_000;

/// Roll used when no window is accepted. Unreachable for a well-formed digest.
pub const FALLBACK_ROLL: Hundredths = Hundredths::from_raw(9_999);

/// Roll together with the digest it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollProof {
    pub roll: Hundredths,
    pub hmac: String,
}

/// Hex HMAC-SHA256 keyed by the server seed over `"client_seed:nonce"`
pub fn hmac_hex(server_seed: &str, client_seed: &str, nonce: u64) -> String {
    let mut mac: HmacSha256 =
        KeyInit::new_from_slice(server_seed.as_bytes()).expect("hmac accepts any key length");
    mac.update(client_seed.as_bytes());
    mac.update(b":");
    mac.update(nonce.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Map a hex digest to a roll in `[0.00, 99.99]`
pub fn roll_from_digest(digest: &str) -> Hundredths {
    let mut offset = 0;
    while offset < digest.len() {
        let end = (offset + WINDOW).min(digest.len());
        let accepted = digest
            .get(offset..end)
            .and_then(|window| u32::from_str_radix(window, 16).ok())
            .filter(|value| *value < ACCEPT_BELOW);
        if let Some(value) = accepted {
            return Hundredths::from_raw(value % ROLL_SPACE);
        }
        offset += WINDOW;
    }
    FALLBACK_ROLL
}

/// Derive the roll for one nonce
pub fn roll(server_seed: &str, client_seed: &str, nonce: u64) -> RollProof {
    let hmac = hmac_hex(server_seed, client_seed, nonce);
    let roll = roll_from_digest(&hmac);
    RollProof { roll, hmac }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seed_a() -> String {
        "a".repeat(128)
    }

    #[test]
    fn test_golden_roll_nonce_zero() {
        let proof = roll(&seed_a(), "test", 0);
        assert_eq!(
            proof.hmac,
            "dfe2b44fdc903cb663874f3f00b8247a1acbb5917ca0f2f4c918e549131c2a44"
        );
        assert_eq!(proof.roll, Hundredths::from_raw(7035));
        assert_eq!(proof.roll.to_string(), "70.35");
    }

    #[test]
    fn test_golden_rolls_sequence() {
        let rolls: Vec<u32> = (0..4).map(|n| roll(&seed_a(), "test", n).roll.raw()).collect();
        assert_eq!(rolls, vec![7035, 1618, 5927, 2513]);
    }

    #[test]
    fn test_rejected_first_window_moves_to_next() {
        let proof = roll(&seed_a(), "test", 22);
        assert!(proof.hmac.starts_with("f5d54"));
        assert_eq!(proof.roll, Hundredths::from_raw(9637));
    }

    #[test]
    fn test_other_seed_vectors() {
        let rolls: Vec<u32> = (0..5)
            .map(|n| roll(&"b".repeat(128), "format-test", n).roll.raw())
            .collect();
        assert_eq!(rolls, vec![4854, 7528, 7806, 2254, 3400]);

        let proof = roll(&"0".repeat(64), "client", 1);
        assert!(proof.hmac.starts_with("ab6f5c4b"));
        assert_eq!(proof.roll.to_string(), "21.97");
    }

    #[test]
    fn test_short_tail_window_is_used() {
        // Every five-char window of all-f is rejected; "ffff" = 65535
        assert_eq!(roll_from_digest(&"f".repeat(64)), Hundredths::from_raw(5535));
    }

    #[test]
    fn test_malformed_digest_falls_back() {
        assert_eq!(roll_from_digest(&"z".repeat(64)), FALLBACK_ROLL);
        assert_eq!(roll_from_digest(""), FALLBACK_ROLL);
    }

    #[test]
    fn test_nonce_changes_outcome() {
        let a = roll("seed", "client", 1);
        let b = roll("seed", "client", 2);
        assert_ne!(a.hmac, b.hmac);
        assert_eq!(a, roll("seed", "client", 1));
    }

    proptest! {
        #[test]
        fn prop_roll_is_always_in_range(
            server in "[0-9a-f]{64}",
            client in "[A-Za-z0-9_-]{1,64}",
            nonce in 0u64..1_000_000,
        ) {
            let proof = roll(&server, &client, nonce);
            prop_assert!(proof.roll.raw() <= 9_999);
            prop_assert_eq!(proof.hmac.len(), 64);
        }

        #[test]
        fn prop_roll_is_deterministic(server in ".{1,80}", client in ".{1,64}", nonce: u64) {
            prop_assert_eq!(roll(&server, &client, nonce), roll(&server, &client, nonce));
        }
    }
}
