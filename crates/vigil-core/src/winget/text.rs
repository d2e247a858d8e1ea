use tracing::debug;

use crate::models::RawUpdate;

/// Terminal phrasings winget prints when nothing is upgradable. Either one
/// makes the whole document an explicit zero-result outcome.
const NO_UPDATE_PHRASES: &[&str] = &["No updates found.", "No available upgrades."];

/// Marker phrases that open a trailing section of the update table.
const SECTION_MARKERS: &[&str] = &[
    "have an upgrade available, but require explicit targeting",
    "have version numbers that cannot be determined",
    "have pins that prevent upgrade",
];

/// Header rows winget has been observed to emit verbatim.
const STANDARD_HEADERS: &[&str] = &[
    "Name                   Id                    Version     Available   Source",
    "Name  Id          Version  Available Source",
];

const INFORMATIONAL_PHRASES: &[&str] = &[
    "upgrades available",
    "upgrade available",
    "no updates found",
    "package(s) have",
    "prevent upgrade",
    "explicit targeting",
];

/// Parses winget's tabular update output into raw records.
///
/// The CLI output is not a committed contract: lines that do not decompose
/// into the expected columns are skipped and logged, never treated as an
/// error. A recognized "no updates" message short-circuits to an empty list.
pub fn parse_update_text(output: &str) -> Vec<RawUpdate> {
    let lines: Vec<&str> = output.trim().lines().collect();

    if lines.iter().any(|line| is_no_updates_line(line)) {
        debug!("winget reports no available updates");
        return Vec::new();
    }

    let sections = split_into_sections(&lines);
    debug!(sections = sections.len(), "split winget output into sections");

    let mut records = Vec::new();
    for section in sections {
        for line in section {
            if should_skip_line(line) {
                continue;
            }
            match parse_record_line(line) {
                Some(record) => records.push(record),
                None => debug!(line = line.trim(), "skipping unparsable update line"),
            }
        }
    }

    records
}

fn is_no_updates_line(line: &str) -> bool {
    NO_UPDATE_PHRASES.iter().any(|phrase| line.contains(phrase))
}

/// Splits the output on known section-marker phrases. The first section
/// additionally begins at the first recognized header line, so preamble such
/// as progress spinners never reaches the record parser.
fn split_into_sections<'a>(lines: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut sections = Vec::new();
    let mut current: Vec<&'a str> = Vec::new();
    let mut in_first_section = true;

    for &line in lines {
        let is_marker = SECTION_MARKERS.iter().any(|marker| line.contains(marker));

        if is_marker {
            if !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            current.push(line);
            in_first_section = false;
        } else if in_first_section && is_header_line(line) {
            if !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            current.push(line);
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        sections.push(current);
    }

    sections
}

pub(crate) fn is_header_line(line: &str) -> bool {
    let trimmed = line.trim();
    if STANDARD_HEADERS.contains(&trimmed) {
        return true;
    }

    (trimmed.starts_with("Name")
        && line.contains(" Id ")
        && line.contains(" Version ")
        && line.contains(" Available "))
        || (trimmed.starts_with("Package")
            && line.contains(" ID ")
            && line.contains(" Version ")
            && line.contains(" Available "))
}

fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|ch| ch == '-')
}

pub(crate) fn should_skip_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_rule_line(line) || is_header_line(line) {
        return true;
    }

    let lowered = line.to_lowercase();
    INFORMATIONAL_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Splits a table row on runs of two or more whitespace characters; single
/// spaces stay inside the name column.
pub(crate) fn split_columns(line: &str) -> Vec<&str> {
    let trimmed = line.trim();
    let mut columns = Vec::new();
    let mut field_start: Option<usize> = None;
    let mut run_start: Option<usize> = None;
    let mut run_length = 0usize;

    for (index, ch) in trimmed.char_indices() {
        if ch.is_whitespace() {
            if run_length == 0 {
                run_start = Some(index);
            }
            run_length += 1;
        } else {
            if run_length >= 2
                && let (Some(start), Some(end)) = (field_start, run_start)
            {
                columns.push(trimmed[start..end].trim_end());
                field_start = Some(index);
            } else if field_start.is_none() {
                field_start = Some(index);
            }
            run_length = 0;
        }
    }

    if let Some(start) = field_start {
        columns.push(trimmed[start..].trim_end());
    }

    columns
}

/// Extracts the first dotted-numeric run ("1.2.3" out of "v1.2.3-beta") from
/// a version column; values without one are kept verbatim.
pub(crate) fn extract_dotted_version(value: &str) -> &str {
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index].is_ascii_digit() {
            let start = index;
            while index < bytes.len() && bytes[index].is_ascii_digit() {
                index += 1;
            }

            let mut end = index;
            let mut groups = 0;
            while index < bytes.len() && bytes[index] == b'.' {
                let digits_start = index + 1;
                let mut cursor = digits_start;
                while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
                    cursor += 1;
                }
                if cursor == digits_start {
                    break;
                }
                groups += 1;
                end = cursor;
                index = cursor;
            }

            if groups >= 1 {
                return &value[start..end];
            }
        } else {
            index += 1;
        }
    }

    value
}

/// Strips parenthetical groups ("(x64 en-US)") and one trailing version
/// token winget sometimes folds into the display name.
pub(crate) fn clean_package_name(name: &str) -> String {
    let mut without_parens = String::with_capacity(name.len());
    let mut depth = 0usize;
    for ch in name.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => without_parens.push(ch),
            _ => {}
        }
    }

    let collapsed = without_parens.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_trailing_version(&collapsed).to_string()
}

fn strip_trailing_version(name: &str) -> &str {
    match name.rsplit_once(' ') {
        Some((head, tail)) if is_dotted_version(tail) => head.trim_end(),
        _ => name,
    }
}

fn is_dotted_version(token: &str) -> bool {
    let mut groups = 0;
    let mut chars = token.chars().peekable();

    loop {
        let mut digits = 0;
        while chars.peek().is_some_and(char::is_ascii_digit) {
            chars.next();
            digits += 1;
        }
        if digits == 0 {
            return false;
        }
        groups += 1;
        match chars.next() {
            None => break,
            Some('.') => {}
            Some(_) => return false,
        }
    }

    groups >= 2
}

pub(crate) fn parse_record_line(line: &str) -> Option<RawUpdate> {
    let columns = split_columns(line);
    if columns.len() < 4 {
        return None;
    }

    let name = clean_package_name(columns[0]);
    let id = columns[1].to_string();
    let current_version = extract_dotted_version(columns[2]).to_string();
    let available_version = extract_dotted_version(columns[3]).to_string();
    let source = columns.get(4).map(|column| (*column).to_string());

    if name.is_empty() || id.is_empty() || current_version.is_empty() || available_version.is_empty()
    {
        return None;
    }

    Some(RawUpdate {
        name,
        id,
        current_version,
        available_version,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        clean_package_name, extract_dotted_version, is_header_line, parse_record_line,
        parse_update_text, should_skip_line, split_columns,
    };

    const UPDATE_FIXTURE: &str = include_str!("../../tests/fixtures/winget/update_text.txt");
    const NO_UPDATES_FIXTURE: &str =
        include_str!("../../tests/fixtures/winget/update_no_updates.txt");

    #[test]
    fn parses_canonical_record_line() {
        let record = parse_record_line("Foo Bar (x64)  Foo.Bar  1.2.3  1.2.4  winget").unwrap();
        assert_eq!(record.name, "Foo Bar");
        assert_eq!(record.id, "Foo.Bar");
        assert_eq!(record.current_version, "1.2.3");
        assert_eq!(record.available_version, "1.2.4");
        assert_eq!(record.source.as_deref(), Some("winget"));
    }

    #[test]
    fn header_rows_are_never_records() {
        assert!(is_header_line(
            "Name                   Id                    Version     Available   Source"
        ));
        assert!(is_header_line("Name  Id          Version  Available Source"));
        assert!(should_skip_line(
            "Name            Id                   Version   Available   Source"
        ));
    }

    #[test]
    fn rule_and_informational_lines_are_skipped() {
        assert!(should_skip_line("--------------------------------------"));
        assert!(should_skip_line("3 upgrades available."));
        assert!(should_skip_line(
            "2 package(s) have version numbers that cannot be determined."
        ));
        assert!(should_skip_line(
            "1 package(s) have pins that prevent upgrade."
        ));
        assert!(should_skip_line("   "));
    }

    #[test]
    fn no_updates_message_yields_empty_result() {
        assert!(parse_update_text(NO_UPDATES_FIXTURE).is_empty());
        assert!(parse_update_text("No available upgrades.").is_empty());
    }

    #[test]
    fn short_lines_are_dropped_silently() {
        assert!(parse_record_line("garbage line without columns").is_none());
        assert!(parse_record_line("OnlyName  Only.Id  1.0").is_none());
    }

    #[test]
    fn splits_columns_on_double_spaces_only() {
        let columns = split_columns("Mozilla Firefox (x64 en-US)   Mozilla.Firefox   124.0.1  125.0.2   winget");
        assert_eq!(
            columns,
            vec![
                "Mozilla Firefox (x64 en-US)",
                "Mozilla.Firefox",
                "124.0.1",
                "125.0.2",
                "winget",
            ]
        );
    }

    #[test]
    fn extracts_first_dotted_numeric_run() {
        assert_eq!(extract_dotted_version("v1.2.3-beta"), "1.2.3");
        assert_eq!(extract_dotted_version("1.2.3.4"), "1.2.3.4");
        assert_eq!(extract_dotted_version("> 2.0"), "2.0");
        // No dotted run: kept verbatim.
        assert_eq!(extract_dotted_version("Unknown"), "Unknown");
        assert_eq!(extract_dotted_version("7"), "7");
    }

    #[test]
    fn cleans_parentheticals_and_trailing_versions_from_names() {
        assert_eq!(clean_package_name("7-Zip 23.01 (x64)"), "7-Zip");
        assert_eq!(clean_package_name("Mozilla Firefox (x64 en-US)"), "Mozilla Firefox");
        assert_eq!(clean_package_name("Discord"), "Discord");
        assert_eq!(clean_package_name("Foo (a) Bar (b)"), "Foo Bar");
    }

    #[test]
    fn parses_full_fixture_across_sections() {
        let records = parse_update_text(UPDATE_FIXTURE);
        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();

        // All sections contribute candidate rows; filter policy is applied
        // later, so the unknown-version and pinned rows are still present.
        assert_eq!(
            ids,
            vec![
                "Mozilla.Firefox",
                "7zip.7zip",
                "Microsoft.Edge",
                "Spotify.Spotify",
                "Contoso.LegacyTool",
            ]
        );

        let firefox = &records[0];
        assert_eq!(firefox.name, "Mozilla Firefox");
        assert_eq!(firefox.current_version, "124.0.1");
        assert_eq!(firefox.available_version, "125.0.2");

        let sevenzip = &records[1];
        assert_eq!(sevenzip.name, "7-Zip");
        assert_eq!(sevenzip.current_version, "23.01");

        let edge = &records[2];
        assert_eq!(edge.current_version, "Unknown");
    }
}
