use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::models::{CliAction, CoreError, CoreErrorKind, CoreResult, RawUpdate};

/// Older winget releases wrap packages per source:
/// `{"Sources": [{"Packages": {"<id>": {"Name", "Version", "AvailableVersion"}}}]}`.
#[derive(Debug, Deserialize)]
struct SourcesDocument {
    #[serde(rename = "Sources")]
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    #[serde(rename = "Packages", default)]
    packages: BTreeMap<String, PackageEntry>,
}

#[derive(Debug, Deserialize)]
struct PackageEntry {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Version")]
    version: Option<String>,
    #[serde(rename = "AvailableVersion")]
    available_version: Option<String>,
}

/// Newer releases emit a flat array:
/// `{"Data": [{"Name", "Id", "Version", "AvailableVersion"}]}`.
#[derive(Debug, Deserialize)]
struct DataDocument {
    #[serde(rename = "Data")]
    data: Vec<DataEntry>,
}

#[derive(Debug, Deserialize)]
struct DataEntry {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Version")]
    version: Option<String>,
    #[serde(rename = "AvailableVersion")]
    available_version: Option<String>,
}

/// Decodes structured winget update output.
///
/// Schema A (`Sources`) is tried first, then schema B (`Data`). A document
/// matching neither is a parse failure for the caller to fall back on; no
/// third shape is guessed. Entries missing a version pair are dropped, not
/// errors — winget mixes informational entries into both shapes.
pub fn parse_update_json(output: &str) -> CoreResult<Vec<RawUpdate>> {
    if let Ok(document) = serde_json::from_str::<SourcesDocument>(output) {
        let mut records = Vec::new();
        for source in document.sources {
            for (id, entry) in source.packages {
                let (Some(current_version), Some(available_version)) =
                    (entry.version, entry.available_version)
                else {
                    debug!(id = %id, "structured entry lacks a version pair, dropped");
                    continue;
                };
                records.push(RawUpdate {
                    name: entry.name.unwrap_or_else(|| id.clone()),
                    id,
                    current_version,
                    available_version,
                    source: None,
                });
            }
        }
        return Ok(records);
    }

    if let Ok(document) = serde_json::from_str::<DataDocument>(output) {
        let mut records = Vec::new();
        for entry in document.data {
            let (Some(name), Some(id), Some(current_version), Some(available_version)) = (
                entry.name,
                entry.id,
                entry.version,
                entry.available_version,
            ) else {
                debug!("structured entry lacks required fields, dropped");
                continue;
            };
            records.push(RawUpdate {
                name,
                id,
                current_version,
                available_version,
                source: None,
            });
        }
        return Ok(records);
    }

    Err(
        CoreError::new(
            CoreErrorKind::ParseFailure,
            "structured update output matches neither the Sources nor the Data schema",
        )
        .with_action(CliAction::CheckUpdates),
    )
}

#[cfg(test)]
mod tests {
    use crate::models::CoreErrorKind;

    use super::parse_update_json;

    const SOURCES_FIXTURE: &str = include_str!("../../tests/fixtures/winget/update_sources.json");
    const DATA_FIXTURE: &str = include_str!("../../tests/fixtures/winget/update_data.json");

    #[test]
    fn parses_sources_schema_fixture() {
        let records = parse_update_json(SOURCES_FIXTURE).unwrap();
        assert_eq!(records.len(), 3);

        // The Sources schema keys packages by id; decode order is id order.
        assert_eq!(records[0].id, "Contoso.Mystery");
        assert_eq!(records[0].current_version, "Unknown");
        assert_eq!(records[1].id, "Git.Git");
        assert_eq!(records[1].name, "Git");
        assert_eq!(records[2].id, "Mozilla.Firefox");
        assert_eq!(records[2].available_version, "125.0.2");
    }

    #[test]
    fn sources_entry_without_name_falls_back_to_id() {
        let records = parse_update_json(
            r#"{"Sources": [{"Packages": {"Acme.Tool": {"Version": "1.0", "AvailableVersion": "1.1"}}}]}"#,
        )
        .unwrap();
        assert_eq!(records[0].name, "Acme.Tool");
    }

    #[test]
    fn parses_data_schema_fixture() {
        let records = parse_update_json(DATA_FIXTURE).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, "Mozilla Firefox");
        assert_eq!(records[0].id, "Mozilla.Firefox");
        assert_eq!(records[1].id, "Microsoft.PowerToys");
        assert_eq!(records[2].current_version, records[2].available_version);
    }

    #[test]
    fn entries_without_version_pairs_are_dropped() {
        let records = parse_update_json(
            r#"{"Data": [{"Name": "NoVersions", "Id": "Acme.NoVersions"}]}"#,
        )
        .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn unrecognized_document_is_a_parse_failure() {
        let error = parse_update_json(r#"{"Items": []}"#).unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::ParseFailure);

        let error = parse_update_json("not json at all").unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::ParseFailure);
    }
}
