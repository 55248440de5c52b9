/*!
 * Tests for the record mapper
 */

use serde_json::json;

use gridsync::culture::CultureConverter;
use gridsync::errors::MappingError;
use gridsync::mapper::{ColumnLayout, RecordMapper};
use gridsync::model::{EntryRole, EntryStatus, GridCell, GridRecord, LocalizationEntry};

fn mapper_with_metadata() -> RecordMapper {
    let layout = ColumnLayout::default()
        .with_comment_column("notes")
        .with_max_length_column("max_len")
        .with_tags_column("tags");
    RecordMapper::new(layout, CultureConverter::default())
}

/// A record laid out in the order the mapper writes cells back
fn canonical_record() -> GridRecord {
    GridRecord::new("menu.start")
        .with_path("ui/menu")
        .with_cell(GridCell::text("notes", "Main menu button"))
        .with_cell(GridCell {
            column_id: "max_len".to_string(),
            dependency_status: None,
            value: json!(20),
        })
        .with_cell(GridCell::text("tags", "menu, button"))
        .with_cell(GridCell::text("src_enUS", "Start"))
        .with_cell(GridCell::text("tg_frFR", "Démarrer").with_dependency_status("upToDate"))
        .with_cell(GridCell::text("tg_deDE", "").with_dependency_status("outOfDate"))
        .with_cell(GridCell::text("screenshot", "start.png"))
}

#[test]
fn test_to_entries_withMetadataColumns_shouldShareMetadata() {
    let entries = mapper_with_metadata().to_entries(&canonical_record()).unwrap();

    assert_eq!(entries.len(), 3);
    let cultures: Vec<&str> = entries.iter().map(|e| e.culture.as_str()).collect();
    assert_eq!(cultures, vec!["en-US", "fr-FR", "de-DE"]);

    assert_eq!(entries[0].role, EntryRole::Source);
    assert_eq!(entries[1].role, EntryRole::Target);
    assert_eq!(entries[1].status, EntryStatus::Approved);
    assert_eq!(entries[2].status, EntryStatus::Outdated);

    for entry in &entries {
        assert_eq!(entry.key, "menu.start");
        assert_eq!(entry.namespace.as_deref(), Some("ui/menu"));
        assert_eq!(entry.metadata.comment.as_deref(), Some("Main menu button"));
        assert_eq!(entry.metadata.max_length, Some(20));
        assert_eq!(entry.metadata.tags, vec!["menu".to_string(), "button".to_string()]);
        assert_eq!(entry.metadata.extra_columns.len(), 1);
        assert!(entry.synced_hash.is_none());
    }
}

#[test]
fn test_round_trip_withCanonicalRecord_shouldReproduceRecord() {
    let mapper = mapper_with_metadata();
    let record = canonical_record();

    let entries = mapper.to_entries(&record).unwrap();
    let rebuilt = mapper.to_record(&entries).unwrap();

    assert_eq!(rebuilt, record);
}

#[test]
fn test_round_trip_withEntries_shouldPreserveTexts() {
    let mapper = RecordMapper::default();
    let entries = vec![
        LocalizationEntry::source("farewell", "en-US", "Goodbye").with_namespace("dialogs"),
        LocalizationEntry::new("farewell", "ja-JP", "さようなら").with_namespace("dialogs"),
    ];

    let record = mapper.to_record(&entries).unwrap();
    assert_eq!(record.path.as_deref(), Some("dialogs"));
    assert_eq!(record.cell("src_enUS").unwrap().value_as_text(), "Goodbye");
    assert_eq!(record.cell("tg_jaJP").unwrap().value_as_text(), "さようなら");

    let back = mapper.to_entries(&record).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back[0].text, entries[0].text);
    assert_eq!(back[1].text, entries[1].text);
    assert_eq!(back[1].namespace, entries[1].namespace);
}

#[test]
fn test_to_entries_withUnknownCulture_shouldFail() {
    let record = GridRecord::new("k")
        .with_cell(GridCell::text("src_enUS", "Hi"))
        .with_cell(GridCell::text("tg_klingon", "nuqneH"));

    let error = RecordMapper::default().to_entries(&record).unwrap_err();
    assert!(matches!(error, MappingError::UnknownCulture { ref culture, .. } if culture == "klingon"));
    assert_eq!(error.culture(), Some("klingon"));
}

#[test]
fn test_to_entries_withSameCultureTwice_shouldFail() {
    let record = GridRecord::new("k")
        .with_cell(GridCell::text("src_enUS", "Hi"))
        .with_cell(GridCell::text("tg_enUS", "Hello"));

    assert!(matches!(
        RecordMapper::default().to_entries(&record),
        Err(MappingError::DuplicateCulture { .. })
    ));
}

#[test]
fn test_to_entries_withBlankId_shouldFail() {
    let record = GridRecord::new("  ").with_cell(GridCell::text("src_enUS", "Hi"));
    assert_eq!(RecordMapper::default().to_entries(&record), Err(MappingError::EmptyKey));
}

#[test]
fn test_to_entries_withBadMaxLength_shouldFail() {
    let record = GridRecord::new("k")
        .with_cell(GridCell::text("max_len", "twenty"))
        .with_cell(GridCell::text("src_enUS", "Hi"));

    assert!(matches!(
        mapper_with_metadata().to_entries(&record),
        Err(MappingError::InvalidMetadata { .. })
    ));
}

#[test]
fn test_to_entries_withNullCell_shouldGiveEmptyNewEntry() {
    let record = GridRecord::new("k").with_cell(GridCell {
        column_id: "tg_itIT".to_string(),
        dependency_status: None,
        value: serde_json::Value::Null,
    });

    let entries = RecordMapper::default().to_entries(&record).unwrap();
    assert_eq!(entries[0].text, "");
    assert_eq!(entries[0].status, EntryStatus::New);
}

#[test]
fn test_to_record_withInvalidGroups_shouldFail() {
    let mapper = RecordMapper::default();

    assert_eq!(mapper.to_record(&[]), Err(MappingError::EmptyGroup));

    let mixed = vec![
        LocalizationEntry::new("a", "fr-FR", "x"),
        LocalizationEntry::new("b", "fr-FR", "y"),
    ];
    assert!(matches!(mapper.to_record(&mixed), Err(MappingError::MixedKeys { .. })));
}

#[test]
fn test_column_for_withUnmappableCulture_shouldFail() {
    let mapper = RecordMapper::default();

    let entry = LocalizationEntry::new("k", "xx-YY", "text");
    assert!(matches!(
        mapper.column_for(&entry),
        Err(MappingError::UnmappableCulture { .. })
    ));

    let source = LocalizationEntry::source("k", "en-US", "text");
    assert_eq!(mapper.column_for(&source).unwrap(), "src_enUS");
}

#[test]
fn test_namespace_cell_withCustomColumn_shouldKeepRecordPath() {
    let layout = ColumnLayout::default().with_namespace_column(Some("ns".to_string()));
    let mapper = RecordMapper::new(layout, CultureConverter::default());
    let record = GridRecord::new("k")
        .with_path("folder/a")
        .with_cell(GridCell::text("ns", "ui"))
        .with_cell(GridCell::text("src_enUS", "Hi"));

    let entries = mapper.to_entries(&record).unwrap();
    assert_eq!(entries[0].namespace.as_deref(), Some("ui"));
    assert_eq!(entries[0].metadata.path.as_deref(), Some("folder/a"));

    assert_eq!(mapper.to_record(&entries).unwrap(), record);
}

fn raw_cell(column_id: &str, value: serde_json::Value) -> GridCell {
    GridCell {
        column_id: column_id.to_string(),
        dependency_status: None,
        value,
    }
}

fn assert_round_trip(mapper: &RecordMapper, record: &GridRecord) {
    let entries = mapper.to_entries(record).unwrap();
    assert_eq!(&mapper.to_record(&entries).unwrap(), record);
}

#[test]
fn test_round_trip_withTagsArray_shouldKeepArray() {
    let record = GridRecord::new("k")
        .with_cell(raw_cell("tags", json!(["a", "b"])))
        .with_cell(GridCell::text("src_enUS", "Hi"));

    let entries = mapper_with_metadata().to_entries(&record).unwrap();
    assert_eq!(entries[0].metadata.tags, vec!["a".to_string(), "b".to_string()]);
    assert_round_trip(&mapper_with_metadata(), &record);
}

#[test]
fn test_round_trip_withMaxLengthString_shouldKeepString() {
    let record = GridRecord::new("k")
        .with_cell(GridCell::text("max_len", "40"))
        .with_cell(GridCell::text("src_enUS", "Hi"));

    let entries = mapper_with_metadata().to_entries(&record).unwrap();
    assert_eq!(entries[0].metadata.max_length, Some(40));
    assert_round_trip(&mapper_with_metadata(), &record);
}

#[test]
fn test_round_trip_withNullCells_shouldKeepNulls() {
    let record = GridRecord::new("k")
        .with_cell(raw_cell("notes", json!(null)))
        .with_cell(raw_cell("max_len", json!(null)))
        .with_cell(GridCell::text("src_enUS", "Hi"))
        .with_cell(raw_cell("tg_frFR", json!(null)));

    let entries = mapper_with_metadata().to_entries(&record).unwrap();
    assert_eq!(entries[1].text, "");
    assert_round_trip(&mapper_with_metadata(), &record);
}

#[test]
fn test_round_trip_withEmptyTagsCell_shouldKeepCell() {
    let record = GridRecord::new("k")
        .with_cell(GridCell::text("tags", ""))
        .with_cell(GridCell::text("src_enUS", "Hi"));

    assert_round_trip(&mapper_with_metadata(), &record);
}

#[test]
fn test_round_trip_withLowercaseCultureColumn_shouldKeepColumnId() {
    let record = GridRecord::new("k")
        .with_cell(GridCell::text("src_enus", "Hi"))
        .with_cell(GridCell::text("tg_frfr", "Salut"));

    let entries = RecordMapper::default().to_entries(&record).unwrap();
    assert_eq!(entries[0].culture, "en-US");
    assert_eq!(entries[1].culture, "fr-FR");
    assert_round_trip(&RecordMapper::default(), &record);
}

#[test]
fn test_round_trip_withUnusualCellOrder_shouldKeepOrder() {
    let record = GridRecord::new("k")
        .with_cell(GridCell::text("screenshot", "k.png"))
        .with_cell(GridCell::text("tg_frFR", "Salut"))
        .with_cell(GridCell::text("notes", "greeting"))
        .with_cell(GridCell::text("src_enUS", "Hi"));

    assert_round_trip(&mapper_with_metadata(), &record);
}

#[test]
fn test_to_record_withEditedText_shouldKeepReadColumn() {
    let mapper = RecordMapper::default();
    let record = GridRecord::new("k").with_cell(raw_cell("tg_frfr", json!(null)));
    let mut entries = mapper.to_entries(&record).unwrap();
    entries[0].text = "Bonjour".to_string();

    let rebuilt = mapper.to_record(&entries).unwrap();
    assert_eq!(rebuilt.cells, vec![GridCell::text("tg_frfr", "Bonjour")]);
}

#[test]
fn test_to_record_withEditedMetadata_shouldWriteNewValue() {
    let mapper = mapper_with_metadata();
    let record = GridRecord::new("k")
        .with_cell(GridCell::text("max_len", "40"))
        .with_cell(raw_cell("tags", json!(["a"])))
        .with_cell(GridCell::text("src_enUS", "Hi"));
    let mut entries = mapper.to_entries(&record).unwrap();
    entries[0].metadata.max_length = Some(12);
    entries[0].metadata.tags.push("b".to_string());

    let rebuilt = mapper.to_record(&entries).unwrap();
    assert_eq!(rebuilt.cell("max_len").unwrap().value, json!(12));
    assert_eq!(rebuilt.cell("tags").unwrap().value, json!("a, b"));
}

#[test]
fn test_to_entries_withSurroundingSpacesInId_shouldKeepKeyVerbatim() {
    let record = GridRecord::new(" menu.start ").with_cell(GridCell::text("src_enUS", "Start"));
    let mapper = RecordMapper::default();

    let entries = mapper.to_entries(&record).unwrap();
    assert_eq!(entries[0].key, " menu.start ");
    assert_eq!(mapper.to_record(&entries).unwrap().id, " menu.start ");
}

fn combined_mapper() -> RecordMapper {
    RecordMapper::new(
        ColumnLayout::default().with_combined_namespace_key(true),
        CultureConverter::default(),
    )
}

#[test]
fn test_to_entries_withCombinedKey_shouldSplitAtFirstComma() {
    let record = GridRecord::new("ui,menu,start")
        .with_path("folder")
        .with_cell(GridCell::text("src_enUS", "Start"));

    let entries = combined_mapper().to_entries(&record).unwrap();

    assert_eq!(entries[0].key, "menu,start");
    assert_eq!(entries[0].namespace.as_deref(), Some("ui"));
    assert_eq!(entries[0].metadata.path.as_deref(), Some("folder"));
    assert_round_trip(&combined_mapper(), &record);
}

#[test]
fn test_to_entries_withCombinedKeyWithoutComma_shouldHaveNoNamespace() {
    let record = GridRecord::new("start").with_cell(GridCell::text("src_enUS", "Start"));

    let entries = combined_mapper().to_entries(&record).unwrap();

    assert_eq!(entries[0].key, "start");
    assert_eq!(entries[0].namespace, None);
    assert_round_trip(&combined_mapper(), &record);
}

#[test]
fn test_to_record_withCombinedKey_shouldJoinNamespace() {
    let entries = vec![
        LocalizationEntry::source("start", "en-US", "Start").with_namespace("ui"),
        LocalizationEntry::new("start", "fr-FR", "Démarrer").with_namespace("ui"),
    ];

    let record = combined_mapper().to_record(&entries).unwrap();

    assert_eq!(record.id, "ui,start");
    assert_eq!(record.path, None);
    assert_eq!(record.cells.len(), 2);
}

#[test]
fn test_to_entries_withCombinedKeyAndEmptyKey_shouldFail() {
    let record = GridRecord::new("ui,").with_cell(GridCell::text("src_enUS", "Start"));
    assert_eq!(combined_mapper().to_entries(&record), Err(MappingError::EmptyKey));
}
