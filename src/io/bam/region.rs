//! Genomic region strings.
//!
//! Accepted forms, 1-based and inclusive like samtools:
//!
//! ```text
//! chr1              whole reference
//! chr1:1000         from 1000 to the end of the reference
//! chr1:1000-        same as above
//! chr1:1,000-2,000  thousands separators are ignored
//! ```
//!
//! Parsed regions are stored 0-based and half-open.

use super::header::Header;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A parsed region, not yet checked against a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Reference name
    pub name: String,
    /// 0-based inclusive start
    pub start: u64,
    /// 0-based exclusive end; `None` runs to the end of the reference
    pub end: Option<u64>,
}

/// A region resolved against a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRegion {
    pub reference_id: usize,
    /// 0-based inclusive start
    pub start: u64,
    /// 0-based exclusive end
    pub end: u64,
}

impl ResolvedRegion {
    /// Whether the 0-based half-open span `[start, end)` overlaps the region.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        start < self.end && end > self.start
    }
}

impl Region {
    /// Parse a region string.
    ///
    /// # Example
    ///
    /// ```
    /// use bamtally::io::bam::Region;
    ///
    /// let region = Region::parse("chr1:1,001-2,000").unwrap();
    /// assert_eq!(region.name, "chr1");
    /// assert_eq!(region.start, 1000);
    /// assert_eq!(region.end, Some(2000));
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::malformed_region(s, "empty region"));
        }

        let (name, interval) = match s.rsplit_once(':') {
            // A suffix that is not an interval belongs to the name (e.g. HLA contigs)
            Some((name, interval)) if looks_like_interval(interval) => (name, Some(interval)),
            _ => (s, None),
        };

        if name.is_empty() {
            return Err(Error::malformed_region(s, "missing reference name"));
        }

        let (start, end) = match interval {
            None => (0, None),
            Some(interval) => parse_interval(s, interval)?,
        };

        Ok(Region {
            name: name.to_string(),
            start,
            end,
        })
    }

    /// A region covering a whole reference.
    pub fn whole(name: impl Into<String>) -> Self {
        Region {
            name: name.into(),
            start: 0,
            end: None,
        }
    }

    /// Look the reference up in `header` and fill in an open end.
    pub fn resolve(&self, header: &Header) -> Result<ResolvedRegion> {
        let reference_id = header
            .reference_id(&self.name)
            .ok_or_else(|| Error::UnknownReference(self.name.clone()))?;

        let end = match self.end {
            Some(end) => end,
            // reference_id came from this header, so the lookup cannot miss
            None => header
                .reference(reference_id)
                .map_or(0, |r| r.length as u64),
        };

        Ok(ResolvedRegion {
            reference_id,
            start: self.start,
            end,
        })
    }

    /// Parse and resolve in one step.
    ///
    /// A string naming a reference exactly is taken as that whole reference,
    /// even if it contains a colon.
    pub fn resolve_str(s: &str, header: &Header) -> Result<ResolvedRegion> {
        let trimmed = s.trim();
        if header.reference_id(trimmed).is_some() {
            return Region::whole(trimmed).resolve(header);
        }

        let region = Region::parse(s)?;
        if header.reference_id(&region.name).is_none() {
            // Known reference followed by something that is not an interval
            if let Some((name, interval)) = trimmed.rsplit_once(':') {
                if header.reference_id(name).is_some() {
                    return Err(Error::malformed_region(
                        trimmed,
                        format!("invalid interval '{}'", interval),
                    ));
                }
            }
        }
        region.resolve(header)
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Region::parse(s)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{}-{}", self.name, self.start + 1, end),
            None if self.start == 0 => write!(f, "{}", self.name),
            None => write!(f, "{}:{}-", self.name, self.start + 1),
        }
    }
}

fn looks_like_interval(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '-')
}

fn parse_position(region: &str, s: &str, what: &str) -> Result<u64> {
    let digits: String = s.chars().filter(|&c| c != ',').collect();
    if digits.is_empty() {
        return Err(Error::malformed_region(region, format!("missing {}", what)));
    }
    digits
        .parse::<u64>()
        .map_err(|e| Error::malformed_region(region, format!("invalid {} '{}': {}", what, s, e)))
}

/// Parse `start`, `start-` or `start-end` into a 0-based half-open interval.
fn parse_interval(region: &str, s: &str) -> Result<(u64, Option<u64>)> {
    let (start, end) = match s.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (s, None),
    };

    let start = parse_position(region, start, "start")?;
    if start == 0 {
        return Err(Error::malformed_region(region, "start must be at least 1"));
    }

    let end = match end {
        None | Some("") => None,
        Some(end) => {
            let end = parse_position(region, end, "end")?;
            if end < start {
                return Err(Error::malformed_region(
                    region,
                    format!("end {} is before start {}", end, start),
                ));
            }
            Some(end)
        }
    };

    Ok((start - 1, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bam::header::Reference;

    fn header() -> Header {
        Header::new(
            "",
            vec![
                Reference::new("chr1", 10_000),
                Reference::new("HLA-A*01:01", 3_000),
            ],
        )
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(Region::parse("chr1").unwrap(), Region::whole("chr1"));

        let r = Region::parse("chr1:100").unwrap();
        assert_eq!((r.start, r.end), (99, None));

        let r = Region::parse("chr1:100-").unwrap();
        assert_eq!((r.start, r.end), (99, None));

        let r = Region::parse("chr1:100-200").unwrap();
        assert_eq!((r.start, r.end), (99, Some(200)));

        let r = Region::parse(" chr2:1,000,000-2,000,000 ").unwrap();
        assert_eq!(r.name, "chr2");
        assert_eq!((r.start, r.end), (999_999, Some(2_000_000)));
    }

    #[test]
    fn test_single_base_region() {
        let r = Region::parse("chr1:5-5").unwrap();
        assert_eq!((r.start, r.end), (4, Some(5)));
    }

    #[test]
    fn test_malformed() {
        for bad in ["", ":100-200", "chr1:", "chr1:0-10", "chr1:200-100", "chr1:-5", "chr1:1-2-3"] {
            assert!(
                matches!(Region::parse(bad), Err(Error::MalformedRegion { .. })),
                "{:?} should be malformed",
                bad
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["chr1", "chr1:100-200", "chr1:100-"] {
            assert_eq!(Region::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_resolve() {
        let header = header();
        let resolved = Region::parse("chr1:100-200").unwrap().resolve(&header).unwrap();
        assert_eq!(
            resolved,
            ResolvedRegion {
                reference_id: 0,
                start: 99,
                end: 200
            }
        );

        let whole = Region::parse("chr1").unwrap().resolve(&header).unwrap();
        assert_eq!((whole.start, whole.end), (0, 10_000));
    }

    #[test]
    fn test_unknown_reference() {
        let err = Region::resolve_str("chr9:1-10", &header()).unwrap_err();
        assert!(matches!(err, Error::UnknownReference(name) if name == "chr9"));
    }

    #[test]
    fn test_known_reference_with_bad_interval() {
        let err = Region::resolve_str("chr1:x-10", &header()).unwrap_err();
        assert!(matches!(err, Error::MalformedRegion { .. }));
        // An unknown prefix stays an unknown reference
        let err = Region::resolve_str("chrZ:x-10", &header()).unwrap_err();
        assert!(matches!(err, Error::UnknownReference(_)));
    }

    #[test]
    fn test_reference_name_with_colon() {
        let header = header();
        let whole = Region::resolve_str("HLA-A*01:01", &header).unwrap();
        assert_eq!(whole.reference_id, 1);
        assert_eq!((whole.start, whole.end), (0, 3_000));

        let part = Region::resolve_str("HLA-A*01:01:10-20", &header).unwrap();
        assert_eq!(part.reference_id, 1);
        assert_eq!((part.start, part.end), (9, 20));
    }

    #[test]
    fn test_overlaps() {
        let region = ResolvedRegion {
            reference_id: 0,
            start: 100,
            end: 200,
        };
        assert!(region.overlaps(150, 160));
        assert!(region.overlaps(50, 101));
        assert!(region.overlaps(199, 300));
        assert!(!region.overlaps(50, 100));
        assert!(!region.overlaps(200, 300));
    }
}
