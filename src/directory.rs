// 📇 Directory / Search Query
// Browse county identities by first letter or name fragment

use crate::error::{MarketError, MarketResult};
use crate::model::CountyIdentity;
use crate::store::FactStore;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Directory tab: every county, or those whose name starts with one letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryFilter {
    All,
    Letter(char),
}

impl DirectoryFilter {
    pub fn matches(&self, identity: &CountyIdentity) -> bool {
        match self {
            DirectoryFilter::All => true,
            DirectoryFilter::Letter(letter) => identity
                .name
                .chars()
                .next()
                .map(|c| c.to_lowercase().eq(std::iter::once(*letter)))
                .unwrap_or(false),
        }
    }

    /// "all" followed by a..z, in directory tab order.
    pub fn tabs() -> Vec<DirectoryFilter> {
        std::iter::once(DirectoryFilter::All)
            .chain(('a'..='z').map(DirectoryFilter::Letter))
            .collect()
    }
}

impl FromStr for DirectoryFilter {
    type Err = MarketError;

    /// Accepts "all" or a single ASCII letter; case is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(DirectoryFilter::All);
        }

        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                Ok(DirectoryFilter::Letter(c.to_ascii_lowercase()))
            }
            _ => Err(MarketError::validation(format!(
                "'{}' is not a letter or 'all'",
                s
            ))),
        }
    }
}

impl fmt::Display for DirectoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryFilter::All => write!(f, "all"),
            DirectoryFilter::Letter(c) => write!(f, "{}", c),
        }
    }
}

fn sorted(mut identities: Vec<CountyIdentity>) -> Vec<CountyIdentity> {
    identities.sort_by(|a, b| a.directory_cmp(b));
    identities
}

/// Identities matching `filter`, ascending by raw name.
pub fn by_prefix<S: FactStore + ?Sized>(
    store: &S,
    filter: DirectoryFilter,
) -> MarketResult<Vec<CountyIdentity>> {
    let matching: Vec<CountyIdentity> = store
        .all_identities()?
        .into_iter()
        .filter(|identity| filter.matches(identity))
        .collect();

    debug!(%filter, matches = matching.len(), "directory query");
    Ok(sorted(matching))
}

/// Identities whose name contains `fragment`, case-insensitively, ascending by raw name.
pub fn search<S: FactStore + ?Sized>(store: &S, fragment: &str) -> MarketResult<Vec<CountyIdentity>> {
    let needle = fragment.trim().to_lowercase();
    if needle.is_empty() {
        return Err(MarketError::validation("search text must not be empty"));
    }

    let matching: Vec<CountyIdentity> = store
        .all_identities()?
        .into_iter()
        .filter(|identity| identity.name.to_lowercase().contains(&needle))
        .collect();

    debug!(fragment = %needle, matches = matching.len(), "name search");
    Ok(sorted(matching))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFactStore;
    use std::collections::HashSet;

    fn names(identities: &[CountyIdentity]) -> Vec<&str> {
        identities.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_by_prefix_letter() {
        let store = MemoryFactStore::new()
            .with_county(3, "Zavala")
            .with_county(1, "Apache")
            .with_county(2, "Zapata");

        let z = by_prefix(&store, "z".parse().unwrap()).unwrap();
        assert_eq!(names(&z), vec!["Zapata", "Zavala"]);
    }

    #[test]
    fn test_by_prefix_all_is_sorted() {
        let store = MemoryFactStore::new()
            .with_county(3, "zavala, tx")
            .with_county(1, "apache, az")
            .with_county(2, "baldwin, al");

        let all = by_prefix(&store, DirectoryFilter::All).unwrap();
        assert_eq!(names(&all), vec!["apache, az", "baldwin, al", "zavala, tx"]);
    }

    #[test]
    fn test_all_equals_union_of_letters_plus_others() {
        let store = MemoryFactStore::new()
            .with_county(1, "apache, az")
            .with_county(2, "Baldwin, al")
            .with_county(3, "st. clair, al")
            .with_county(4, "1st district")
            .with_county(5, "Éire")
            .with_county(6, "zapata, tx");

        let all: HashSet<i64> = by_prefix(&store, DirectoryFilter::All)
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();

        let mut union = Vec::new();
        for tab in DirectoryFilter::tabs().into_iter().skip(1) {
            union.extend(by_prefix(&store, tab).unwrap().into_iter().map(|i| i.id));
        }
        let lettered: HashSet<i64> = union.iter().copied().collect();
        assert_eq!(lettered.len(), union.len(), "identity listed under two letters");

        let others: HashSet<i64> = store
            .all_identities()
            .unwrap()
            .into_iter()
            .filter(|i| !i.name.chars().next().map_or(false, |c| c.is_ascii_alphabetic()))
            .map(|i| i.id)
            .collect();

        let combined: HashSet<i64> = lettered.union(&others).copied().collect();
        assert_eq!(combined, all);
        assert!(lettered.is_disjoint(&others));
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("all".parse::<DirectoryFilter>().unwrap(), DirectoryFilter::All);
        assert_eq!("ALL".parse::<DirectoryFilter>().unwrap(), DirectoryFilter::All);
        assert_eq!("q".parse::<DirectoryFilter>().unwrap(), DirectoryFilter::Letter('q'));
        assert_eq!("Q".parse::<DirectoryFilter>().unwrap(), DirectoryFilter::Letter('q'));

        for bad in ["", "ab", "1", "é", "*"] {
            assert!(
                matches!(bad.parse::<DirectoryFilter>(), Err(MarketError::Validation(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_search() {
        let store = MemoryFactStore::new()
            .with_county(1, "los angeles, ca")
            .with_county(2, "san bernardino, ca")
            .with_county(3, "angelina, tx");

        let hits = search(&store, "ANGEL").unwrap();
        assert_eq!(names(&hits), vec!["angelina, tx", "los angeles, ca"]);

        assert!(search(&store, "nowhere").unwrap().is_empty());
        assert!(matches!(search(&store, "  "), Err(MarketError::Validation(_))));
    }

    #[test]
    fn test_tabs() {
        let tabs = DirectoryFilter::tabs();
        assert_eq!(tabs.len(), 27);
        assert_eq!(tabs[0], DirectoryFilter::All);
        assert_eq!(tabs[26], DirectoryFilter::Letter('z'));
    }
}
