//! Container settings.
//!
//! Settings can be built in code or deserialized from configuration; any
//! field left out keeps its default.
//!
//! ```
//! use wiring_container::settings::Settings;
//!
//! let settings = Settings::default();
//! assert!(settings.catch_panics);
//! assert_eq!(settings.max_suggestions, 3);
//! ```

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Turn panics in constructors and lifecycle hooks into errors.
    ///
    /// When off, panics unwind through the resolving call.
    pub catch_panics: bool,

    /// Upper bound on "did you mean" entries in a missing-dependency error.
    pub max_suggestions: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catch_panics: true,
            max_suggestions: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_partial() {
        let settings: Settings = serde_json::from_str(r#"{ "catch_panics": false }"#).unwrap();
        assert!(!settings.catch_panics);
        assert_eq!(settings.max_suggestions, 3);
    }

    #[test]
    fn deserialize_empty_is_default() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }
}
