use crate::error::PartsheetError;
use crate::model::{CanonicalColumn, CANONICAL_SCHEMA};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const BUILTIN_HEADERS_JSON: &str = include_str!("../../../../headers/builtin-headers.json");

/// On-disk form of a header alias table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderAliasFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Vendor spelling to canonical column name.
    pub aliases: BTreeMap<String, String>,
}

/// Lookup from vendor header spellings to canonical columns. Exact matches
/// only, after whitespace normalization.
#[derive(Debug, Clone, Default)]
pub struct HeaderTable {
    aliases: HashMap<String, CanonicalColumn>,
}

/// Lookup key for a header: trimmed, with runs of whitespace and line breaks
/// collapsed to one space.
pub fn header_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl HeaderTable {
    /// The alias table shipped with the crate.
    pub fn builtin() -> Result<HeaderTable, PartsheetError> {
        HeaderTable::from_json_str(BUILTIN_HEADERS_JSON)
    }

    /// Load an alias table from a JSON file.
    pub fn load(path: &Path) -> Result<HeaderTable, PartsheetError> {
        let content = std::fs::read_to_string(path).map_err(|e| PartsheetError::HeaderTableLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let file: HeaderAliasFile =
            serde_json::from_str(&content).map_err(|e| PartsheetError::HeaderTableLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        HeaderTable::from_file(&file)
    }

    pub fn from_json_str(json: &str) -> Result<HeaderTable, PartsheetError> {
        let file: HeaderAliasFile = serde_json::from_str(json)?;
        HeaderTable::from_file(&file)
    }

    /// Build a table from a parsed alias file, rejecting blank spellings and
    /// unknown canonical names.
    pub fn from_file(file: &HeaderAliasFile) -> Result<HeaderTable, PartsheetError> {
        let mut aliases = HashMap::new();
        for (spelling, canonical) in &file.aliases {
            let key = header_key(spelling);
            if key.is_empty() {
                return Err(PartsheetError::HeaderTableInvalid(
                    "header spelling must not be empty".into(),
                ));
            }
            let column = CanonicalColumn::from_name(canonical.trim()).ok_or_else(|| {
                PartsheetError::HeaderTableInvalid(format!(
                    "'{}' maps to unknown column '{}' (expected one of: {})",
                    spelling,
                    canonical,
                    CANONICAL_SCHEMA
                        .iter()
                        .map(|c| c.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;
            aliases.insert(key, column);
        }
        Ok(HeaderTable { aliases })
    }

    /// Add the aliases of `other`, overriding spellings already present.
    pub fn extend(&mut self, other: HeaderTable) {
        self.aliases.extend(other.aliases);
    }

    /// Canonical column for a header. Canonical names map to themselves.
    pub fn lookup(&self, raw: &str) -> Option<CanonicalColumn> {
        let key = header_key(raw);
        CanonicalColumn::from_name(&key).or_else(|| self.aliases.get(&key).copied())
    }

    /// All aliases, sorted by spelling.
    pub fn entries(&self) -> Vec<(&str, CanonicalColumn)> {
        let mut entries: Vec<(&str, CanonicalColumn)> = self
            .aliases
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Header row mapped onto canonical columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHeaders {
    /// One entry per source column; `None` for unmapped or blank headers.
    pub columns: Vec<Option<CanonicalColumn>>,
    /// Non-blank header texts with no alias, in source order.
    pub unmapped: Vec<String>,
}

/// Map a raw header row onto canonical columns.
pub fn normalize_headers(table: &HeaderTable, headers: &[Option<String>]) -> NormalizedHeaders {
    let mut columns = Vec::with_capacity(headers.len());
    let mut unmapped = Vec::new();

    for header in headers {
        let text = header.as_deref().unwrap_or("");
        if text.trim().is_empty() {
            columns.push(None);
            continue;
        }
        let column = table.lookup(text);
        if column.is_none() {
            unmapped.push(header_key(text));
        }
        columns.push(column);
    }

    NormalizedHeaders { columns, unmapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_loads() {
        let table = HeaderTable::builtin().unwrap();
        assert!(!table.is_empty());
        assert_eq!(table.lookup("SeboNr"), Some(CanonicalColumn::IdentificationNumber));
    }

    #[test]
    fn test_line_breaks_collapse() {
        let table = HeaderTable::builtin().unwrap();
        assert_eq!(table.lookup("Pos./\nFig."), Some(CanonicalColumn::Position));
        assert_eq!(table.lookup("  Menge/\n Qty. "), Some(CanonicalColumn::Quantity));
        assert_eq!(
            table.lookup("see page\n s. Seite"),
            Some(CanonicalColumn::PageReference)
        );
    }

    #[test]
    fn test_canonical_names_are_idempotent() {
        let table = HeaderTable::default();
        for column in CANONICAL_SCHEMA {
            assert_eq!(table.lookup(column.name()), Some(column));
        }
    }

    #[test]
    fn test_no_fuzzy_matching() {
        let table = HeaderTable::builtin().unwrap();
        assert_eq!(table.lookup("sebonr"), None);
        assert_eq!(table.lookup("Mpos. No."), None);
    }

    #[test]
    fn test_unknown_canonical_rejected() {
        let json = r#"{ "aliases": { "Teil": "Part" } }"#;
        assert!(matches!(
            HeaderTable::from_json_str(json),
            Err(PartsheetError::HeaderTableInvalid(_))
        ));
    }

    #[test]
    fn test_blank_spelling_rejected() {
        let json = r#"{ "aliases": { "  ": "Remark" } }"#;
        assert!(HeaderTable::from_json_str(json).is_err());
    }

    #[test]
    fn test_extend_overrides() {
        let mut table = HeaderTable::builtin().unwrap();
        let extra = HeaderTable::from_json_str(
            r#"{ "aliases": { "Teilenummer": "Identification Number", "Qty": "Unit" } }"#,
        )
        .unwrap();
        table.extend(extra);
        assert_eq!(
            table.lookup("Teilenummer"),
            Some(CanonicalColumn::IdentificationNumber)
        );
        assert_eq!(table.lookup("Qty"), Some(CanonicalColumn::Unit));
    }

    #[test]
    fn test_normalize_headers_reports_unmapped() {
        let table = HeaderTable::builtin().unwrap();
        let headers = vec![
            Some("Item no.".to_string()),
            Some("Mpos.\nNo.".to_string()),
            None,
            Some(String::new()),
        ];
        let normalized = normalize_headers(&table, &headers);
        assert_eq!(
            normalized.columns,
            vec![Some(CanonicalColumn::Position), None, None, None]
        );
        assert_eq!(normalized.unmapped, vec!["Mpos. No.".to_string()]);
    }
}
