use std::collections::HashSet;

use crate::winget::text::split_columns;

/// Parses `winget pin list` output into the set of pinned package ids.
///
/// The id is the second column of the table. Header and separator rows are
/// recognized loosely; the pin table layout drifts more than the update
/// table does.
pub fn parse_pin_list(output: &str) -> HashSet<String> {
    let mut pins = HashSet::new();

    for line in output.trim().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.contains("---")
            || (trimmed.contains("Name") && trimmed.contains("Id"))
        {
            continue;
        }

        let columns = split_columns(line);
        if columns.len() >= 2 {
            pins.insert(columns[1].to_string());
        }
    }

    pins
}

#[cfg(test)]
mod tests {
    use super::parse_pin_list;

    const PIN_LIST_FIXTURE: &str = include_str!("../../tests/fixtures/winget/pin_list.txt");

    #[test]
    fn parses_pin_ids_from_fixture() {
        let pins = parse_pin_list(PIN_LIST_FIXTURE);
        assert_eq!(pins.len(), 2);
        assert!(pins.contains("Spotify.Spotify"));
        assert!(pins.contains("Docker.DockerDesktop"));
    }

    #[test]
    fn header_and_rule_rows_contribute_nothing() {
        let pins = parse_pin_list(
            "Name     Id               Version\n---------------------------------\n",
        );
        assert!(pins.is_empty());
    }

    #[test]
    fn empty_output_yields_empty_set() {
        assert!(parse_pin_list("").is_empty());
        assert!(parse_pin_list("\n\n").is_empty());
    }

    #[test]
    fn single_column_rows_are_ignored() {
        assert!(parse_pin_list("orphan-line\n").is_empty());
    }
}
