use serde::{Deserialize, Serialize};

/// A write of one full sheet row, addressed in A1 notation, e.g. `'June 2024'!A3:G3`.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RowUpdate {
    pub range: String,
    pub values: Vec<String>,
}

impl RowUpdate {
    /// Creates an update of sheet row `row_ix` (0-based, header included) of the tab named
    /// `sheet_name`, spanning column A through the last cell in `values`.
    pub fn new(sheet_name: &str, row_ix: usize, values: Vec<String>) -> Self {
        let row_number = row_ix + 1;
        let last_column = column_letters(values.len().saturating_sub(1));
        Self {
            range: format!(
                "{}!A{row_number}:{last_column}{row_number}",
                quote_sheet_name(sheet_name)
            ),
            values,
        }
    }
}

/// Converts a 0-based column index to its spreadsheet letters: 0 -> `A`, 25 -> `Z`, 26 -> `AA`.
pub fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Tab names that are not plain alphanumerics must be single-quoted in A1 ranges.
pub fn quote_sheet_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(5), "F");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(51), "AZ");
        assert_eq!(column_letters(52), "BA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_quote_sheet_name() {
        assert_eq!(quote_sheet_name("Stats"), "Stats");
        assert_eq!(quote_sheet_name("June 2024"), "'June 2024'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_row_update_range() {
        let values = vec!["Jun 5, 2024", "3", "1", "0", "2", "1"]
            .into_iter()
            .map(String::from)
            .collect();
        let update = RowUpdate::new("June 2024", 1, values);
        assert_eq!(update.range, "'June 2024'!A2:F2");
        assert_eq!(update.values.len(), 6);
    }
}
