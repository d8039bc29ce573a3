// Record codec and file I/O - YAML blocks, `---` text segments, list files

use crate::error::{FlatRecordError, Result};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

/// Decoded content of a single-entry file
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntry {
    pub data: Mapping,
    pub texts: Vec<Option<String>>,
}

fn delimiter() -> &'static Regex {
    static DELIMITER: OnceLock<Regex> = OnceLock::new();
    DELIMITER.get_or_init(|| Regex::new(r"\n---[\t ]*\n").expect("delimiter regex is valid"))
}

fn decode_error(source: &Path, message: impl Into<String>) -> FlatRecordError {
    FlatRecordError::Decode {
        path: source.display().to_string(),
        message: message.into(),
    }
}

fn parse_block(source: &Path, block: &str) -> Result<Mapping> {
    let value: Value =
        serde_yaml::from_str(block).map_err(|e| decode_error(source, e.to_string()))?;
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        other => Err(decode_error(
            source,
            format!("expected a mapping, found {}", type_name(&other)),
        )),
    }
}

/// Split a single-entry file into its YAML block and up to `text_count`
/// text segments. Segments the file does not have are `None`; the last
/// segment keeps any further delimiters verbatim.
pub fn decode_entry(source: &Path, content: &str, text_count: usize) -> Result<DecodedEntry> {
    let (block, texts) = if text_count == 0 {
        // Anything after a delimiter is not part of the record
        let block = delimiter().splitn(content, 2).next().unwrap_or_default();
        (block, Vec::new())
    } else {
        let mut parts = delimiter().splitn(content, text_count + 1);
        let block = parts.next().unwrap_or_default();
        let mut texts: Vec<Option<String>> = parts.map(|t| Some(t.to_string())).collect();
        texts.resize(text_count, None);
        (block, texts)
    };

    Ok(DecodedEntry {
        data: parse_block(source, block)?,
        texts,
    })
}

/// Serialize the YAML block followed by each text segment behind a `---` line.
/// Absent trailing segments are left out; absent inner ones are written empty.
pub fn encode_entry(data: &Mapping, texts: &[Option<String>]) -> Result<String> {
    let mut out = serde_yaml::to_string(data)?;

    let present = texts
        .iter()
        .rposition(|t| t.is_some())
        .map(|last| last + 1)
        .unwrap_or(0);
    let segments: Vec<String> = texts[..present]
        .iter()
        .map(|t| format!("---\n{}", t.as_deref().unwrap_or_default()))
        .collect();
    out.push_str(&segments.join("\n"));

    Ok(out)
}

/// Decode a list file: a YAML sequence of mappings.
pub fn decode_list(source: &Path, content: &str) -> Result<Vec<Mapping>> {
    let value: Value =
        serde_yaml::from_str(content).map_err(|e| decode_error(source, e.to_string()))?;
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        other => {
            return Err(decode_error(
                source,
                format!("expected a list of entries, found {}", type_name(&other)),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Null => Ok(Mapping::new()),
            Value::Mapping(mapping) => Ok(mapping),
            other => Err(decode_error(
                source,
                format!("list item {i} is a {}, not a mapping", type_name(&other)),
            )),
        })
        .collect()
}

pub fn encode_list<'a, I>(entries: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Mapping>,
{
    let entries: Vec<&Mapping> = entries.into_iter().collect();
    Ok(serde_yaml::to_string(&entries)?)
}

pub fn read_file(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// Write `content` to a temporary file next to `path`, then move it over
/// `path`. The previous content survives a failed write.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        FlatRecordError::Other(format!("Cannot write to {}: no parent directory", path.display()))
    })?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)?;

    log::debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// Delete `path` and every ancestor directory left empty, stopping below
/// `root`. A file that is already gone is not an error.
pub fn delete_file(path: &Path, root: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Deleted {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    prune_empty_dirs(path.parent(), root)
}

fn prune_empty_dirs(mut dir: Option<&Path>, root: &Path) -> Result<()> {
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) || !current.is_dir() {
            break;
        }
        if std::fs::read_dir(current)?.next().is_some() {
            break;
        }
        std::fs::remove_dir(current)?;
        log::debug!("Removed empty directory {}", current.display());
        dir = current.parent();
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
