//! Parser for the fixed-width tables printed by `winget search`.
//!
//! ```text
//! Name  Id       Version  Match         Source
//! --------------------------------------------
//! Git   Git.Git  2.43.0   Command: git  winget
//! ```
//!
//! Column boundaries come from the header offsets, measured in terminal
//! display columns: winget pads cells by display width, so a double-width
//! name occupies two columns per character. Progress spinner output written
//! with carriage returns ahead of the table is discarded.

use crate::error::{CnfError, Result};
use crate::types::PackageRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::UnicodeWidthChar;

static HEADER_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("valid header regex"));
static SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-{3,}$").expect("valid separator regex"));

const NO_RESULTS_MARKER: &str = "No package found";

#[derive(Debug)]
struct Column {
    key: String,
    /// Display column the header cell starts at.
    start: usize,
}

/// Parses `winget search` stdout into package records.
///
/// Output without a table is an error unless it carries the "no package
/// found" notice, which parses to an empty list.
pub fn parse_search_table(output: &str) -> Result<Vec<PackageRecord>> {
    let lines: Vec<String> = output.lines().map(clean_line).collect();

    let Some(header_index) = find_header(&lines) else {
        if lines.iter().any(|line| line.contains(NO_RESULTS_MARKER)) || output.trim().is_empty() {
            return Ok(Vec::new());
        }
        return Err(CnfError::MalformedOutput(
            "search output has no table header".to_string(),
        ));
    };

    let columns = header_columns(&lines[header_index]);
    let id_col = column_index(&columns, "id").unwrap_or(1);
    let name_col = column_index(&columns, "name").unwrap_or(0);
    let version_col = column_index(&columns, "version");
    let match_col = column_index(&columns, "match");
    let source_col = column_index(&columns, "source");

    let mut records = Vec::new();
    for line in &lines[header_index + 2..] {
        if line.trim().is_empty() || line.starts_with('<') {
            continue;
        }

        let cells = split_row(line, &columns);
        let Some(id) = cells.get(id_col).filter(|id| !id.is_empty()) else {
            continue;
        };

        let cell = |index: Option<usize>| {
            index
                .and_then(|i| cells.get(i))
                .filter(|value| !value.is_empty())
                .cloned()
        };

        records.push(PackageRecord {
            id: id.clone(),
            name: cells.get(name_col).cloned().unwrap_or_default(),
            version: cell(version_col).unwrap_or_default(),
            matched: cell(match_col).map(|value| strip_match_label(&value)),
            source: cell(source_col),
        });
    }

    Ok(records)
}

/// Keeps only the text after the last carriage return (spinner frames).
fn clean_line(line: &str) -> String {
    let visible = line.rsplit('\r').next().unwrap_or(line);
    visible.trim_start_matches('\u{feff}').trim_end().to_string()
}

fn find_header(lines: &[String]) -> Option<usize> {
    lines.windows(2).position(|pair| {
        !pair[0].trim().is_empty() && SEPARATOR.is_match(pair[1].trim())
    })
}

fn header_columns(header: &str) -> Vec<Column> {
    HEADER_CELL
        .find_iter(header)
        .map(|cell| Column {
            key: cell.as_str().to_lowercase(),
            start: display_width(&header[..cell.start()]),
        })
        .collect()
}

fn column_index(columns: &[Column], key: &str) -> Option<usize> {
    columns.iter().position(|column| column.key == key)
}

fn split_row(line: &str, columns: &[Column]) -> Vec<String> {
    if columns.is_empty() {
        return Vec::new();
    }

    let mut cells = vec![String::new(); columns.len()];
    let mut position = 0;
    for ch in line.chars() {
        let index = columns
            .iter()
            .rposition(|column| column.start <= position)
            .unwrap_or(0);
        cells[index].push(ch);
        position += char_width(ch);
    }
    cells.into_iter().map(|cell| cell.trim().to_string()).collect()
}

fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// `Command: git` becomes `git`.
fn strip_match_label(value: &str) -> String {
    match value.split_once(": ") {
        Some((_, matched)) => matched.trim().to_string(),
        None => value.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIT_SEARCH: &str = "\
Name             Id                     Version Match        Source
-------------------------------------------------------------------
Git              Git.Git                2.43.0  Command: git winget
Git Extensions   GitExtensionsTeam.GitE 4.2.1   Command: git winget
";

    #[test]
    fn parses_rows_by_header_offsets() {
        let records = parse_search_table(GIT_SEARCH).expect("parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "Git.Git");
        assert_eq!(records[0].name, "Git");
        assert_eq!(records[0].version, "2.43.0");
        assert_eq!(records[0].matched.as_deref(), Some("git"));
        assert_eq!(records[0].source.as_deref(), Some("winget"));
        assert_eq!(records[1].name, "Git Extensions");
        assert_eq!(records[1].id, "GitExtensionsTeam.GitE");
    }

    #[test]
    fn table_without_match_column() {
        let output = "\
Name Id      Version Source
---------------------------
Vim  vim.vim 9.1     winget
";
        let records = parse_search_table(output).expect("parse");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "vim.vim");
        assert!(records[0].matched.is_none());
    }

    #[test]
    fn spinner_prefix_is_discarded() {
        let output = format!("   - \r   \\ \r{}", GIT_SEARCH);
        let records = parse_search_table(&output).expect("parse");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn no_package_found_is_empty() {
        let records =
            parse_search_table("No package found matching input criteria.\n").expect("parse");
        assert!(records.is_empty());
    }

    #[test]
    fn truncation_notice_is_skipped() {
        let output = format!("{}<additional entries truncated due to result limit>\n", GIT_SEARCH);
        let records = parse_search_table(&output).expect("parse");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn wide_names_are_sliced_by_display_width() {
        let output = "\
Name Id             Version Source
----------------------------------
微信 Tencent.WeChat 3.9     winget
Vim  vim.vim        9.1     winget
";
        let records = parse_search_table(output).expect("parse");
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["Tencent.WeChat", "vim.vim"]);
        assert_eq!(records[0].name, "微信");
        assert_eq!(records[0].version, "3.9");
        assert_eq!(records[0].source.as_deref(), Some("winget"));
    }

    #[test]
    fn ellipsized_id_is_flagged_truncated() {
        let output = "\
Name            Id                 Version Source
-------------------------------------------------
Some Long Tool  SomePublisher.Som… 1.0     winget
";
        let records = parse_search_table(output).expect("parse");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "SomePublisher.Som…");
        assert!(records[0].is_truncated());
    }

    #[test]
    fn unexpected_output_is_malformed() {
        let err = parse_search_table("Failed in attempting to update the source: winget\n")
            .unwrap_err();
        assert!(matches!(err, CnfError::MalformedOutput(_)));
    }
}
