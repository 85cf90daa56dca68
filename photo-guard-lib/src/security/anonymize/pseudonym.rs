use ahash::AHashMap;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Hex characters of the digest used in a pseudonym
pub const PSEUDONYM_HEX_LEN: usize = 8;

#[derive(Debug, Clone)]
struct Mapping {
    pseudonym: String,
    created_at_ms: u64,
}

/// Bijection between original values and pseudonyms
///
/// Pseudonyms are `prefix_` plus the first 8 hex characters of
/// `sha256(value + salt)`. With 32 bits of digest a collision becomes likely
/// around 65k distinct values per prefix; when one happens the newer value
/// gets a longer suffix so the mapping stays one-to-one.
#[derive(Debug, Default)]
pub struct PseudonymTable {
    forward: AHashMap<String, Mapping>,
    reverse: AHashMap<String, String>,
}

impl PseudonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Existing pseudonym for `value`, or a new one
    pub fn pseudonymize(&mut self, value: &str, prefix: &str, salt: &str, now_ms: u64) -> String {
        let key = format!("{prefix}\u{0}{value}");
        if let Some(existing) = self.forward.get(&key) {
            return existing.pseudonym.clone();
        }

        let digest = hex::encode(Sha256::digest(format!("{value}{salt}").as_bytes()));
        let mut len = PSEUDONYM_HEX_LEN;
        let mut pseudonym = format!("{prefix}_{}", &digest[..len]);
        while self.reverse.contains_key(&pseudonym) && len < digest.len() {
            len += 1;
            pseudonym = format!("{prefix}_{}", &digest[..len]);
        }
        if len > PSEUDONYM_HEX_LEN {
            warn!(prefix, hex_len = len, "pseudonym collision resolved with a longer suffix");
        }

        self.reverse.insert(pseudonym.clone(), value.to_string());
        self.forward.insert(key, Mapping { pseudonym: pseudonym.clone(), created_at_ms: now_ms });
        pseudonym
    }

    /// Original value behind a pseudonym
    pub fn resolve(&self, pseudonym: &str) -> Option<&str> {
        self.reverse.get(pseudonym).map(String::as_str)
    }

    /// Drop mappings created before `cutoff_ms`
    pub fn purge_older_than(&mut self, cutoff_ms: u64) -> usize {
        let before = self.forward.len();
        let reverse = &mut self.reverse;
        self.forward.retain(|_, mapping| {
            let keep = mapping.created_at_ms >= cutoff_ms;
            if !keep {
                reverse.remove(&mapping.pseudonym);
            }
            keep
        });
        before - self.forward.len()
    }
}
