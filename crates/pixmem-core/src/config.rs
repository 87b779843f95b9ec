//! Allocator configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocConfig {
    /// Tracked-memory level (bytes) above which the allocator reports pressure.
    /// `None` means the host never gets a pressure signal from us.
    pub tracked_mem_limit: Option<usize>,

    /// Emit a reporter warning in addition to returning `OutOfMemory`.
    pub warn_on_oom: bool,

    /// Panic instead of returning `OutOfMemory`. Debugging aid only.
    pub abort_on_oom: bool,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            tracked_mem_limit: None,
            warn_on_oom: true,
            abort_on_oom: false,
        }
    }
}

impl AllocConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `PIXMEM_TRACKED_MEM_LIMIT`: pressure limit, e.g. `1073741824` or `512m`
    /// - `PIXMEM_WARN_ON_OOM`: `0`/`false` to silence OOM warnings
    /// - `PIXMEM_ABORT_ON_OOM`: `1`/`true` to panic on OOM
    ///
    /// Unparseable values are ignored, as is a zero limit. The result always
    /// passes [`AllocConfig::validate`].
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("PIXMEM_TRACKED_MEM_LIMIT") {
            match parse_size(&s) {
                Ok(0) | Err(_) => {}
                Ok(v) => cfg.tracked_mem_limit = Some(v),
            }
        }

        if let Ok(s) = std::env::var("PIXMEM_WARN_ON_OOM") {
            if let Some(v) = parse_flag(&s) {
                cfg.warn_on_oom = v;
            }
        }

        if let Ok(s) = std::env::var("PIXMEM_ABORT_ON_OOM") {
            if let Some(v) = parse_flag(&s) {
                cfg.abort_on_oom = v;
            }
        }

        cfg
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracked_mem_limit == Some(0) {
            return Err(Error::Config("tracked_mem_limit must be positive".into()));
        }
        Ok(())
    }
}

/// Parse a human-readable byte count.
///
/// Accepts an integer optionally followed by a unit; only the first letter of
/// the unit matters (`k`, `m`, `g`, case-insensitive, binary multiples).
/// Whitespace between number and unit is allowed. Unknown units leave the
/// number as a plain byte count.
///
/// ```
/// use pixmem_core::parse_size;
///
/// assert_eq!(parse_size("512m").unwrap(), 512 * 1024 * 1024);
/// assert_eq!(parse_size("2 GB").unwrap(), 2 * 1024 * 1024 * 1024);
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// ```
pub fn parse_size(s: &str) -> Result<usize> {
    let s = s.trim();
    let digits_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let (number, rest) = s.split_at(digits_end);
    let value: usize = number.parse().map_err(|_| Error::Size(s.to_string()))?;

    let multiplier: usize = match rest.trim_start().chars().next() {
        Some(c) => match c.to_ascii_lowercase() {
            'k' => 1024,
            'm' => 1024 * 1024,
            'g' => 1024 * 1024 * 1024,
            _ => 1,
        },
        None => 1,
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| Error::Size(s.to_string()))
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("10").unwrap(), 10);
        assert_eq!(parse_size("10k").unwrap(), 10 * 1024);
        assert_eq!(parse_size("10K").unwrap(), 10 * 1024);
        assert_eq!(parse_size("3 mb").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_size(" 1G ").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_size_unknown_unit_is_bytes() {
        assert_eq!(parse_size("100 bytes").unwrap(), 100);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-5m").is_err());
        assert!(parse_size(&format!("{}g", usize::MAX)).is_err());
    }

    #[test]
    fn test_default_config() {
        let cfg = AllocConfig::default();
        assert_eq!(cfg.tracked_mem_limit, None);
        assert!(cfg.warn_on_oom);
        assert!(!cfg.abort_on_oom);
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let cfg = AllocConfig::from_json_str(r#"{"tracked_mem_limit": 1048576}"#).unwrap();
        assert_eq!(cfg.tracked_mem_limit, Some(1024 * 1024));
        assert!(cfg.warn_on_oom);

        assert!(AllocConfig::from_json_str(r#"{"tracked_mem_limit": 0}"#).is_err());
        assert!(AllocConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
