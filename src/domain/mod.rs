//! Domain primitives shared by the credential and city subsystems.

use chrono::{SecondsFormat, Utc};

/// Current UTC time as a fixed-width RFC 3339 string.
///
/// Fixed precision keeps stored timestamps ordered under plain string comparison.
#[must_use]
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Outcome of a query that expects exactly one row.
///
/// Distinguishes a genuine miss from a broken uniqueness invariant, so a
/// caller cannot mistake a data-layer fault for an ordinary "not found".
///
/// # Examples
///
/// ```rust
/// use geodata::domain::Lookup;
///
/// assert_eq!(Lookup::from_rows(vec![7]), Lookup::Found(7));
/// assert_eq!(Lookup::<i32>::from_rows(vec![]), Lookup::NotFound);
/// assert_eq!(Lookup::from_rows(vec![1, 2]), Lookup::IntegrityViolation(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// More than one row matched; carries the number of rows observed.
    IntegrityViolation(usize),
}

impl<T> Lookup<T> {
    /// Classifies the rows returned by a `LIMIT 2` query.
    #[must_use]
    pub fn from_rows(mut rows: Vec<T>) -> Self {
        match rows.len() {
            0 => Self::NotFound,
            1 => Self::Found(rows.remove(0)),
            n => Self::IntegrityViolation(n),
        }
    }

    #[must_use]
    pub fn from_option(row: Option<T>) -> Self {
        row.map_or(Self::NotFound, Self::Found)
    }

    /// Drops the distinction between a miss and an integrity violation.
    #[must_use]
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound | Self::IntegrityViolation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_classifies_counts() {
        assert_eq!(Lookup::from_rows(vec!["a"]), Lookup::Found("a"));
        assert_eq!(Lookup::<&str>::from_rows(Vec::new()), Lookup::NotFound);
        assert_eq!(
            Lookup::from_rows(vec!["a", "b"]),
            Lookup::IntegrityViolation(2)
        );
    }

    #[test]
    fn integrity_violation_is_not_found() {
        let lookup: Lookup<i32> = Lookup::IntegrityViolation(3);
        assert_eq!(lookup.found(), None);
    }

    #[test]
    fn timestamps_sort_chronologically_as_strings() {
        let earlier = utc_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = utc_timestamp();
        assert!(earlier < later);
        assert!(earlier.ends_with('Z'));
        assert_eq!(earlier.len(), later.len());
    }

    #[test]
    fn from_option_maps_absence_to_not_found() {
        assert_eq!(Lookup::from_option(Some(4)), Lookup::Found(4));
        assert_eq!(Lookup::from_option(None::<i32>), Lookup::NotFound);
    }
}
