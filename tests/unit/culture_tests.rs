/*!
 * Tests for culture normalization and grid column forms
 */

use std::collections::BTreeMap;

use gridsync::culture::{cultures_match, is_known_language, language_name, normalize_culture, CultureConverter};

#[test]
fn test_normalize_culture_withRegionalForms_shouldBeCanonical() {
    assert_eq!(normalize_culture("en-us").as_deref(), Some("en-US"));
    assert_eq!(normalize_culture("pt_BR").as_deref(), Some("pt-BR"));
    assert_eq!(normalize_culture("SR-latn-rs").as_deref(), Some("sr-Latn-RS"));
    assert_eq!(normalize_culture(" de ").as_deref(), Some("de"));
}

#[test]
fn test_normalize_culture_withGarbage_shouldReturnNone() {
    assert_eq!(normalize_culture(""), None);
    assert_eq!(normalize_culture("xx-YY"), None);
    assert_eq!(normalize_culture("en-US-extra"), None);
    assert_eq!(normalize_culture("english"), None);
}

#[test]
fn test_is_known_language_withIsoCodes_shouldRecognize() {
    assert!(is_known_language("fr"));
    assert!(is_known_language("fra"));
    assert!(!is_known_language("zz"));
}

#[test]
fn test_cultures_match_withDifferentSpelling_shouldMatch() {
    assert!(cultures_match("fr_fr", "FR-fr"));
    assert!(!cultures_match("fr-FR", "fr-CA"));
}

#[test]
fn test_language_name_withCulture_shouldUseLanguagePart() {
    assert_eq!(language_name("fr-FR"), Some("French"));
    assert_eq!(language_name("de"), Some("German"));
    assert_eq!(language_name("qq-QQ"), None);
}

#[test]
fn test_converter_withoutOverrides_shouldJoinSubtags() {
    let converter = CultureConverter::default();

    assert_eq!(converter.to_grid("en-US").as_deref(), Some("enUS"));
    assert_eq!(converter.to_grid("zh-Hans-CN").as_deref(), Some("zhHansCN"));
    assert_eq!(converter.from_grid("frFR").as_deref(), Some("fr-FR"));
    assert_eq!(converter.from_grid("zhHansCN").as_deref(), Some("zh-Hans-CN"));
    assert_eq!(converter.from_grid("es419").as_deref(), Some("es-419"));
    assert_eq!(converter.from_grid("enus").as_deref(), Some("en-US"));
    assert_eq!(converter.from_grid("notACulture"), None);
    assert!(!converter.has_overrides());
}

#[test]
fn test_converter_withOverrides_shouldPreferMapping() {
    let mut mapping = BTreeMap::new();
    mapping.insert("zh-Hans".to_string(), "zhCN".to_string());
    let converter = CultureConverter::with_mapping(&mapping).unwrap();

    assert_eq!(converter.to_grid("zh-hans").as_deref(), Some("zhCN"));
    assert_eq!(converter.from_grid("zhCN").as_deref(), Some("zh-Hans"));
    assert_eq!(converter.to_grid("fr-FR").as_deref(), Some("frFR"));
    assert!(converter.has_overrides());
}

#[test]
fn test_converter_withDuplicateGridCulture_shouldFail() {
    let mut mapping = BTreeMap::new();
    mapping.insert("zh-Hans".to_string(), "zhCN".to_string());
    mapping.insert("zh-CN".to_string(), "zhCN".to_string());
    assert!(CultureConverter::with_mapping(&mapping).is_err());

    let mut mapping = BTreeMap::new();
    mapping.insert("nope!".to_string(), "x".to_string());
    assert!(CultureConverter::with_mapping(&mapping).is_err());
}
