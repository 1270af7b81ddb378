use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::error::PartsheetError;
use crate::inventory::StockMap;

pub const CACHE_FILE_NAME: &str = "sortly_map_cache.json";
pub const CACHE_LIFETIME: Duration = Duration::from_secs(3600);

/// Load the cached stock map if the file exists and is younger than
/// `max_age`. A cache that cannot be read or parsed is treated as missing.
pub fn load_fresh(path: &Path, max_age: Duration) -> Option<StockMap> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age >= max_age {
        debug!(path = %path.display(), age_secs = age.as_secs(), "stock map cache is stale");
        return None;
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(PartsheetError::from)
        .and_then(|text| serde_json::from_str::<StockMap>(&text).map_err(PartsheetError::from));
    match parsed {
        Ok(map) => Some(map),
        Err(e) => {
            warn!(path = %path.display(), "ignoring unreadable stock map cache: {e}");
            None
        }
    }
}

pub fn save(path: &Path, map: &StockMap) -> Result<(), PartsheetError> {
    let json = serde_json::to_string_pretty(map)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ItemRef;

    fn map() -> StockMap {
        let mut map = StockMap::new();
        map.insert(
            "4711".into(),
            ItemRef {
                id: 12,
                name: "4711 Hydraulic pump".into(),
            },
        );
        map
    }

    #[test]
    fn test_save_then_load_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        save(&path, &map()).unwrap();
        assert_eq!(load_fresh(&path, CACHE_LIFETIME), Some(map()));
    }

    #[test]
    fn test_stale_cache_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        save(&path, &map()).unwrap();
        assert_eq!(load_fresh(&path, Duration::ZERO), None);
    }

    #[test]
    fn test_missing_or_corrupt_cache_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        assert_eq!(load_fresh(&path, CACHE_LIFETIME), None);
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(load_fresh(&path, CACHE_LIFETIME), None);
    }
}
