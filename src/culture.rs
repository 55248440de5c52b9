/*!
 * Culture code handling.
 *
 * Local entries use a canonical BCP-47 style form (`en`, `en-US`,
 * `zh-Hans-CN`). Grid columns use a compact form with the subtags joined
 * (`enUS`). A custom mapping table overrides the automatic conversion in both
 * directions.
 */

use isolang::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::errors::ConfigError;

// language, optional script, optional region
static GRID_CULTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]{2,3})([A-Z][a-z]{3})?([A-Z]{2}|[0-9]{3})?$").unwrap()
});

/// Check that a language subtag is a known ISO 639-1 or 639-3 code
pub fn is_known_language(code: &str) -> bool {
    let code = code.trim().to_lowercase();
    match code.len() {
        2 => Language::from_639_1(&code).is_some(),
        3 => Language::from_639_3(&code).is_some(),
        _ => false,
    }
}

/// Normalize a culture code to its canonical form
///
/// Accepts `-` or `_` separators and any letter case:
/// `EN_us` becomes `en-US`, `zh-hans-cn` becomes `zh-Hans-CN`.
pub fn normalize_culture(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut parts = trimmed.split(['-', '_']);
    let language = parts.next()?.to_lowercase();
    if !is_known_language(&language) {
        return None;
    }

    let mut canonical = language;
    let mut seen_script = false;
    let mut seen_region = false;
    for part in parts {
        let is_alpha = part.chars().all(|c| c.is_ascii_alphabetic());
        let is_digit = part.chars().all(|c| c.is_ascii_digit());
        if part.len() == 4 && is_alpha && !seen_script && !seen_region {
            let mut chars = part.chars();
            let first = chars.next()?.to_ascii_uppercase();
            canonical.push('-');
            canonical.push(first);
            canonical.push_str(&chars.as_str().to_lowercase());
            seen_script = true;
        } else if ((part.len() == 2 && is_alpha) || (part.len() == 3 && is_digit)) && !seen_region {
            canonical.push('-');
            canonical.push_str(&part.to_uppercase());
            seen_region = true;
        } else {
            return None;
        }
    }

    Some(canonical)
}

/// Case-insensitive culture comparison after normalization
pub fn cultures_match(a: &str, b: &str) -> bool {
    match (normalize_culture(a), normalize_culture(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

/// English name of the culture's language, when known
pub fn language_name(culture: &str) -> Option<&'static str> {
    let language = culture.split(['-', '_']).next()?.to_lowercase();
    let lang = match language.len() {
        2 => Language::from_639_1(&language),
        3 => Language::from_639_3(&language),
        _ => None,
    }?;
    Some(lang.to_name())
}

/// Converts between canonical cultures and grid column cultures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CultureConverter {
    to_grid: BTreeMap<String, String>,
    from_grid: BTreeMap<String, String>,
}

impl CultureConverter {
    /// Build a converter from a `canonical -> grid` override table
    pub fn with_mapping(mapping: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut converter = Self::default();
        for (culture, grid) in mapping {
            let canonical = normalize_culture(culture).ok_or_else(|| {
                ConfigError::invalid("columns.culture_mapping", format!("'{}' is not a valid culture", culture))
            })?;
            let grid = grid.trim();
            if grid.is_empty() {
                return Err(ConfigError::invalid(
                    "columns.culture_mapping",
                    format!("grid culture for '{}' is empty", culture),
                ));
            }
            if converter.from_grid.contains_key(grid) {
                return Err(ConfigError::invalid(
                    "columns.culture_mapping",
                    format!("grid culture '{}' is mapped more than once", grid),
                ));
            }
            converter.to_grid.insert(canonical.clone(), grid.to_string());
            converter.from_grid.insert(grid.to_string(), canonical);
        }
        Ok(converter)
    }

    /// Grid column form of a canonical culture (`en-US` -> `enUS`)
    pub fn to_grid(&self, culture: &str) -> Option<String> {
        let canonical = normalize_culture(culture)?;
        if let Some(grid) = self.to_grid.get(&canonical) {
            return Some(grid.clone());
        }
        Some(canonical.replace('-', ""))
    }

    /// Canonical form of a grid column culture (`enUS` -> `en-US`)
    pub fn from_grid(&self, grid: &str) -> Option<String> {
        let grid = grid.trim();
        if let Some(canonical) = self.from_grid.get(grid) {
            return Some(canonical.clone());
        }

        if let Some(caps) = GRID_CULTURE.captures(grid) {
            let joined = [caps.get(1), caps.get(2), caps.get(3)]
                .iter()
                .flatten()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join("-");
            return normalize_culture(&joined);
        }

        // lowercase compact form such as "enus"
        if grid.len() == 4 && grid.chars().all(|c| c.is_ascii_alphabetic()) {
            return normalize_culture(&format!("{}-{}", &grid[..2], &grid[2..]));
        }

        normalize_culture(grid)
    }

    pub fn has_overrides(&self) -> bool {
        !self.to_grid.is_empty()
    }
}
