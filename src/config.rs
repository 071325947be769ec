//! Flat key/value configuration store, mirroring the keys the original
//! Skyperious reads out of its INI/JSON config file (loading the file
//! itself is the GUI shell's job; this crate only defines the contract and
//! the defaults the core falls back on).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

#[derive(Clone)]
pub struct Config {
    values: Arc<HashMap<String, Value>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Config {
    /// Builds a config carrying only the defaults named in the
    /// configuration contract; `merge` overlays values loaded by the
    /// embedding application.
    pub fn with_defaults() -> Self {
        let mut values = HashMap::new();
        values.insert("DBDoBackup".into(), Value::Bool(true));
        values.insert("ShareDirectoryEnabled".into(), Value::Bool(true));
        values.insert(
            "ShareDirectoryTemplate".into(),
            Value::String("{db} files".into()),
        );
        values.insert("LiveSyncRateLimit".into(), Value::from(10));
        values.insert("LiveSyncRateWindow".into(), Value::from(60));
        values.insert("LiveSyncRetryLimit".into(), Value::from(3));
        values.insert("LiveSyncRetryDelay".into(), Value::from(20));
        values.insert("LiveSyncAuthRateLimitDelay".into(), Value::from(120));
        values.insert(
            "SharedContentDownloadMinDate".into(),
            Value::String("2017-04-01T00:00:00Z".into()),
        );
        values.insert("MergeTimeSlackSeconds".into(), Value::from(180));
        values.insert("HistogramDayBins".into(), Value::from(10));
        values.insert("MergeChunkSize".into(), Value::from(20_000));
        values.insert("MergePostbackSize".into(), Value::from(5_000));
        Self {
            values: Arc::new(values),
        }
    }

    /// Returns a new config with `overrides` layered on top of `self`.
    pub fn merge(&self, overrides: HashMap<String, Value>) -> Self {
        let mut merged = (*self.values).clone();
        merged.extend(overrides);
        Self {
            values: Arc::new(merged),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Login-account-scoped key, mirroring `Login[filepath].{store,...}`.
    pub fn login_key(filepath: &str, field: &str) -> String {
        format!("Login[{filepath}].{field}")
    }

    pub fn shared_content_download_min_date(&self) -> DateTime<Utc> {
        self.get_str("SharedContentDownloadMinDate")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.with_ymd_and_hms(2017, 4, 1, 0, 0, 0).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::with_defaults();
        assert_eq!(cfg.get_u32("LiveSyncRateLimit", 0), 10);
        assert_eq!(cfg.get_u32("LiveSyncRateWindow", 0), 60);
        assert_eq!(cfg.get_u32("LiveSyncRetryLimit", 0), 3);
        assert_eq!(cfg.get_u32("MergeTimeSlackSeconds", 0), 180);
    }

    #[test]
    fn merge_overrides_defaults() {
        let cfg = Config::with_defaults();
        let mut overrides = HashMap::new();
        overrides.insert("LiveSyncRateLimit".to_string(), Value::from(5));
        let merged = cfg.merge(overrides);
        assert_eq!(merged.get_u32("LiveSyncRateLimit", 0), 5);
        assert_eq!(merged.get_u32("LiveSyncRateWindow", 0), 60);
    }
}
