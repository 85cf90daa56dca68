//! Local JSON cache of user-created rules.

use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::rules::StoredRule;
use crate::error::Result;

/// Read the cached rules. A missing file is an empty cache.
pub fn load_rule_cache(path: &Path) -> Result<Vec<StoredRule>> {
    if !path.exists() {
        debug!(path = %path.display(), "no rule cache found");
        return Ok(vec![]);
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(vec![]);
    }
    let rules: Vec<StoredRule> = serde_json::from_str(&content)?;
    info!(path = %path.display(), count = rules.len(), "loaded cached IP rules");
    Ok(rules)
}

/// Replace the cache with `rules`
///
/// Written to a sibling temp file first and renamed into place.
pub fn save_rule_cache(path: &Path, rules: &[StoredRule]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(rules)?)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), count = rules.len(), "saved IP rule cache");
    Ok(())
}
