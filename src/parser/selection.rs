//! Page selection (1-indexed).

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pages to process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = |what: &str| Error::InvalidInput(format!("{} in page selection '{}'", what, s));

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start: u32 = start.trim().parse().map_err(|_| invalid("invalid start page"))?;
                let end: u32 = end.trim().parse().map_err(|_| invalid("invalid end page"))?;
                if start == 0 || end < start {
                    return Err(invalid("empty range"));
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.trim().parse().map_err(|_| invalid("invalid page number"))?;
                let end: u32 = end.trim().parse().map_err(|_| invalid("invalid page number"))?;
                for p in start..=end {
                    if !pages.contains(&p) {
                        pages.push(p);
                    }
                }
            } else {
                let p: u32 = part.parse().map_err(|_| invalid("invalid page number"))?;
                if !pages.contains(&p) {
                    pages.push(p);
                }
            }
        }
        if pages.contains(&0) {
            return Err(invalid("page 0"));
        }

        pages.sort();
        Ok(PageSelection::Pages(pages))
    }

    /// Concrete page numbers for a document with `total` pages.
    ///
    /// An explicit page beyond the end is an error; a range is clipped.
    pub fn resolve(&self, total: u32) -> Result<Vec<u32>> {
        match self {
            PageSelection::All => Ok((1..=total).collect()),
            PageSelection::Range(range) => {
                if *range.start() > total {
                    return Err(Error::PageOutOfRange(*range.start(), total));
                }
                Ok((*range.start()..=(*range.end()).min(total)).collect())
            }
            PageSelection::Pages(pages) => {
                if let Some(&bad) = pages.iter().find(|&&p| p == 0 || p > total) {
                    return Err(Error::PageOutOfRange(bad, total));
                }
                Ok(pages.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(PageSelection::parse("").unwrap(), PageSelection::All);
        assert_eq!(PageSelection::parse("2-4").unwrap(), PageSelection::Range(2..=4));
        assert_eq!(
            PageSelection::parse("1-3,5").unwrap(),
            PageSelection::Pages(vec![1, 2, 3, 5])
        );
        assert!(PageSelection::parse("x").is_err());
        assert!(PageSelection::parse("0,1").is_err());
        assert!(PageSelection::parse("5-2").is_err());
    }

    #[test]
    fn test_resolve_against_page_count() {
        assert_eq!(PageSelection::All.resolve(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(PageSelection::Range(2..=10).resolve(3).unwrap(), vec![2, 3]);
        assert!(matches!(
            PageSelection::Pages(vec![1, 9]).resolve(3),
            Err(Error::PageOutOfRange(9, 3))
        ));
    }
}
