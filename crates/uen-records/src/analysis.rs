//! Shape statistics over UEN identifiers.
//!
//! Business UENs are 9 characters (`nnnnnnnnX`), local companies 10
//! (`yyyynnnnnX`), and other entities 10 with a type prefix (`TyyPQnnnnX`).
//! The counts here are a quick sanity check on a dump.

use crate::aggregate::record_files;
use crate::RecordsError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UenShapeStats {
    /// Identifiers seen, duplicates included.
    pub total: usize,
    pub nine_char: usize,
    pub ten_char: usize,
    /// Any length other than 9 or 10.
    pub other_length: usize,
    pub nine_char_alpha_last: usize,
    pub ten_char_alpha_ninth: usize,
    pub ten_char_alpha_last: usize,
}

impl UenShapeStats {
    pub fn from_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = Self::default();
        for id in identifiers {
            stats.observe(id.as_ref());
        }
        stats
    }

    pub fn observe(&mut self, identifier: &str) {
        self.total += 1;
        let chars: Vec<char> = identifier.chars().collect();
        let alpha_at = |i: usize| chars.get(i).is_some_and(|c| c.is_alphabetic());
        match chars.len() {
            9 => {
                self.nine_char += 1;
                if alpha_at(8) {
                    self.nine_char_alpha_last += 1;
                }
            }
            10 => {
                self.ten_char += 1;
                if alpha_at(8) {
                    self.ten_char_alpha_ninth += 1;
                }
                if alpha_at(9) {
                    self.ten_char_alpha_last += 1;
                }
            }
            _ => self.other_length += 1,
        }
    }
}

impl fmt::Display for UenShapeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "number of uens: {}", self.total)?;
        writeln!(f, "number of 9 char uens: {}", self.nine_char)?;
        writeln!(f, "number of 10 char uens: {}", self.ten_char)?;
        if self.other_length > 0 {
            writeln!(f, "number of uens with unexpected length: {}", self.other_length)?;
        }
        writeln!(
            f,
            "number of 9 char uens with last char being alphabet: {}",
            self.nine_char_alpha_last
        )?;
        writeln!(
            f,
            "number of 10 char uens with 2nd last char being alphabet: {}",
            self.ten_char_alpha_ninth
        )?;
        write!(
            f,
            "number of 10 char uens with last char being alphabet: {}",
            self.ten_char_alpha_last
        )
    }
}

#[derive(Deserialize)]
struct UenOnly {
    uen: String,
}

/// Every identifier in every readable file of `dir`, duplicates kept.
pub fn scan_identifiers(dir: &Path) -> Result<Vec<String>, RecordsError> {
    let mut out = Vec::new();
    for path in record_files(dir)? {
        let parsed = std::fs::read_to_string(&path)
            .map_err(|source| RecordsError::Io {
                path: path.clone(),
                source,
            })
            .and_then(|text| {
                serde_json::from_str::<Vec<UenOnly>>(&text).map_err(|source| RecordsError::Json {
                    path: path.clone(),
                    source,
                })
            });
        match parsed {
            Ok(rows) => out.extend(rows.into_iter().map(|r| r.uen)),
            Err(err) => tracing::warn!(error = %err, "skipping file during scan"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_shape() {
        let stats = UenShapeStats::from_identifiers([
            "53123456A",  // 9, alpha last
            "201912345K", // 10, alpha last
            "T08LL1234A", // 10, alpha last
            "S99FC1234B", // 10, alpha last
            "1234567890", // 10, digits only
            "T08LL123AB", // 10, alpha 9th and last
            "ABC",
        ]);
        assert_eq!(stats.total, 7);
        assert_eq!(stats.nine_char, 1);
        assert_eq!(stats.ten_char, 5);
        assert_eq!(stats.other_length, 1);
        assert_eq!(stats.nine_char_alpha_last, 1);
        assert_eq!(stats.ten_char_alpha_ninth, 1);
        assert_eq!(stats.ten_char_alpha_last, 4);
    }
}
