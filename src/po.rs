/*!
 * Portable Object export of one culture from the local store.
 *
 * Each translated key becomes one message: `msgctxt` carries
 * `namespace,key` (or the bare key), `msgid` the source text and `msgstr`
 * the translation.
 */

use log::debug;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::culture::{cultures_match, language_name, normalize_culture};
use crate::errors::{AppError, ConfigError};
use crate::model::{EntryRole, EntryStore, LocalizationEntry};
use crate::text_source::TextSource;

fn escape_po(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

/// (source, translation) pairs for a culture, sorted by key
fn messages<'a>(store: &'a EntryStore, culture: &str) -> Vec<(&'a LocalizationEntry, &'a LocalizationEntry)> {
    let mut sources: BTreeMap<&str, &LocalizationEntry> = BTreeMap::new();
    let mut targets: BTreeMap<&str, &LocalizationEntry> = BTreeMap::new();
    for entry in store.iter() {
        if entry.role == EntryRole::Source {
            sources.entry(entry.key.as_str()).or_insert(entry);
        }
        if cultures_match(&entry.culture, culture) {
            targets.insert(entry.key.as_str(), entry);
        }
    }

    targets
        .into_iter()
        .filter_map(|(key, target)| match sources.get(key) {
            Some(source) => Some((*source, target)),
            None => {
                debug!("Key '{}' has no source text, not exported", key);
                None
            }
        })
        .collect()
}

/// Write PO content for `culture` to any writer; returns the message count
pub fn write_po<W: Write>(w: &mut W, store: &EntryStore, culture: &str) -> io::Result<usize> {
    writeln!(w, "msgid \"\"")?;
    writeln!(w, "msgstr \"\"")?;
    writeln!(w, "\"Project-Id-Version: gridsync {}\\n\"", env!("CARGO_PKG_VERSION"))?;
    writeln!(w, "\"Language: {}\\n\"", culture)?;
    if let Some(name) = language_name(culture) {
        writeln!(w, "\"Language-Team: {}\\n\"", name)?;
    }
    writeln!(w, "\"MIME-Version: 1.0\\n\"")?;
    writeln!(w, "\"Content-Type: text/plain; charset=UTF-8\\n\"")?;
    writeln!(w, "\"Content-Transfer-Encoding: 8bit\\n\"")?;

    let messages = messages(store, culture);
    for (source, target) in &messages {
        writeln!(w)?;
        if let Some(comment) = source.metadata.comment.as_deref().filter(|c| !c.is_empty()) {
            writeln!(w, "#. {}", comment.replace('\n', " "))?;
        }
        let context = match &target.namespace {
            Some(ns) if !ns.is_empty() => format!("{},{}", ns, target.key),
            _ => target.key.clone(),
        };
        writeln!(w, "msgctxt \"{}\"", escape_po(&context))?;
        writeln!(w, "msgid \"{}\"", escape_po(&source.text))?;
        writeln!(w, "msgstr \"{}\"", escape_po(&target.text))?;
    }
    w.flush()?;

    Ok(messages.len())
}

/// Render PO content to a string
pub fn render_po(store: &EntryStore, culture: &str) -> String {
    let mut buffer = Vec::new();
    // writing to a Vec cannot fail
    let _ = write_po(&mut buffer, store, culture);
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Write a PO file; returns the number of messages written
pub fn write_po_file(store: &EntryStore, culture: &str, path: &Path) -> io::Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    write_po(&mut w, store, culture)
}

/// Read a text source and export one culture to a PO file
pub async fn export_from_source(source: &dyn TextSource, culture: &str, output: &Path) -> Result<usize, AppError> {
    let culture = normalize_culture(culture)
        .ok_or_else(|| ConfigError::invalid("culture", format!("'{}' is not a valid culture", culture)))?;
    let store = EntryStore::from_entries(source.read_local_entries().await?)?;
    Ok(write_po_file(&store, &culture, output)?)
}
