/*!
 * Tests for Portable Object export
 */

use anyhow::Result;
use std::fs;

use gridsync::model::{EntryStore, LocalizationEntry};
use gridsync::po::{export_from_source, render_po};
use gridsync::text_source::MemoryTextSource;

use crate::common::create_temp_dir;

fn entries() -> Vec<LocalizationEntry> {
    let mut start = LocalizationEntry::source("menu.start", "en-US", "Start").with_namespace("ui");
    start.metadata.comment = Some("Main menu button".to_string());
    vec![
        start,
        LocalizationEntry::new("menu.start", "fr-FR", "Démarrer").with_namespace("ui"),
        LocalizationEntry::source("menu.quit", "en-US", "Quit"),
        LocalizationEntry::new("menu.quit", "fr-FR", "Quitter"),
        LocalizationEntry::new("menu.quit", "de-DE", "Beenden"),
    ]
}

#[test]
fn test_render_po_withTranslations_shouldWriteHeaderAndMessages() {
    let store = EntryStore::from_entries(entries()).unwrap();
    let po = render_po(&store, "fr-FR");

    assert!(po.starts_with("msgid \"\"\nmsgstr \"\"\n"));
    assert!(po.contains("\"Language: fr-FR\\n\""));
    assert!(po.contains("\"Language-Team: French\\n\""));
    assert!(po.contains("#. Main menu button\nmsgctxt \"ui,menu.start\""));
    assert!(po.contains("msgctxt \"menu.quit\"\nmsgid \"Quit\"\nmsgstr \"Quitter\""));
    assert!(!po.contains("Beenden"));
}

#[tokio::test]
async fn test_export_from_source_withLowercaseCulture_shouldNormalize() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let output = temp_dir.path().join("po").join("fr.po");
    let source = MemoryTextSource::new(entries());

    let written = export_from_source(&source, "fr_fr", &output).await?;

    assert_eq!(written, 2);
    let content = fs::read_to_string(&output)?;
    assert!(content.contains("msgstr \"Démarrer\""));
    Ok(())
}

#[tokio::test]
async fn test_export_from_source_withInvalidCulture_shouldFail() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let output = temp_dir.path().join("x.po");
    let source = MemoryTextSource::new(entries());

    assert!(export_from_source(&source, "??", &output).await.is_err());
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_export_from_source_withLowercaseLocalCultures_shouldExportThem() -> Result<()> {
    let temp_dir = create_temp_dir()?;
    let output = temp_dir.path().join("fr.po");
    let source = MemoryTextSource::new(vec![
        LocalizationEntry::source("menu.quit", "en-us", "Quit"),
        LocalizationEntry::new("menu.quit", "fr-fr", "Quitter"),
    ]);

    let written = export_from_source(&source, "fr-FR", &output).await?;

    assert_eq!(written, 1);
    assert!(fs::read_to_string(&output)?.contains("msgstr \"Quitter\""));
    Ok(())
}
