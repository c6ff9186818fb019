use crate::error::Res;
use anyhow::bail;
use std::collections::{BTreeSet, HashMap};

/// Maps the header row of a sheet to column indices so that columns are found by name on every
/// run instead of being assumed at fixed positions.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Mapping {
    header_map: HashMap<Header, usize>,
    duplicates: BTreeSet<Header>,
}

impl Mapping {
    /// Create a new `Mapping` from the cells of a header row. Header text is trimmed. Blank headers
    /// are kept for positioning but cannot be looked up.
    pub fn new<S, I>(headers: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let mut header_map = HashMap::new();
        let mut duplicates = BTreeSet::new();
        for (ix, s) in headers.into_iter().enumerate() {
            let header = Header::from(s.into().trim());
            if header.is_blank() {
                continue;
            }
            if header_map.contains_key(&header) {
                duplicates.insert(header);
            } else {
                header_map.insert(header, ix);
            }
        }

        Self {
            header_map,
            duplicates,
        }
    }

    pub fn header_index(&self, header: impl Into<Header>) -> Option<usize> {
        let h = header.into();
        self.header_map.get(&h).copied()
    }

    /// Returns the index of `header`, or an error if it is missing or appears more than once.
    pub fn require(&self, header: impl Into<Header>) -> Res<usize> {
        let h = header.into();
        if self.duplicates.contains(&h) {
            bail!("The header '{}' appears more than once", h.as_ref());
        }
        match self.header_index(h.clone()) {
            Some(ix) => Ok(ix),
            None => bail!("The header '{}' was not found", h.as_ref()),
        }
    }
}

/// Represents a header in the Google sheet, for example, `Total Issues`
#[derive(Default, Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Header(String);

impl Header {
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for Header {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Header {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let mapping = Mapping::new(vec!["Date", "Total US", "Notes", "Total Issues"]);
        assert_eq!(mapping.header_index("Date"), Some(0));
        assert_eq!(mapping.header_index("Total Issues"), Some(3));
        assert_eq!(mapping.require("Total US").unwrap(), 1);
        assert!(mapping.header_index("Completed US").is_none());
    }

    #[test]
    fn test_headers_are_trimmed() {
        let mapping = Mapping::new(vec![" Date ", "Total Bugs\n"]);
        assert_eq!(mapping.require("Date").unwrap(), 0);
        assert_eq!(mapping.require("Total Bugs").unwrap(), 1);
    }

    #[test]
    fn test_missing_header_message() {
        let mapping = Mapping::new(vec!["Date"]);
        let message = mapping.require("Total Bugs").unwrap_err().to_string();
        assert!(message.contains("'Total Bugs' was not found"));
    }

    #[test]
    fn test_duplicate_header_only_fails_when_required() {
        let mapping = Mapping::new(vec!["Date", "Notes", "Notes", "", ""]);
        assert_eq!(mapping.require("Date").unwrap(), 0);
        let message = mapping.require("Notes").unwrap_err().to_string();
        assert!(message.contains("more than once"));
        assert!(mapping.header_index("").is_none());
    }
}
