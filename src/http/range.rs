//! `Range` header parsing (single byte ranges only).

use std::fmt;

/// A resolved, inclusive byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The `Content-Range` value, e.g. `bytes 0-499/1000`.
    #[must_use]
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    InvalidSyntax(String),
    UnsupportedUnit(String),
    NotSatisfiable { size: u64 },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::InvalidSyntax(raw) => write!(f, "invalid range syntax: {raw}"),
            RangeError::UnsupportedUnit(unit) => write!(f, "unsupported range unit: {unit}"),
            RangeError::NotSatisfiable { size } => {
                write!(f, "range not satisfiable for resource of size {size}")
            }
        }
    }
}

impl std::error::Error for RangeError {}

/// A parsed range before it is checked against the resource size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=start-end`
    FromTo { start: u64, end: u64 },
    /// `bytes=start-`
    From { start: u64 },
    /// `bytes=-length`, the last `length` bytes.
    Suffix { length: u64 },
}

impl RangeSpec {
    /// Parse a `Range` header value.
    ///
    /// # Errors
    ///
    /// Returns an error for non-`bytes` units, multiple ranges or bad numbers.
    pub fn parse(header: &str) -> Result<Self, RangeError> {
        let invalid = || RangeError::InvalidSyntax(header.to_string());
        let (unit, spec) = header.trim().split_once('=').ok_or_else(invalid)?;
        if !unit.trim().eq_ignore_ascii_case("bytes") {
            return Err(RangeError::UnsupportedUnit(unit.trim().to_string()));
        }
        if spec.contains(',') {
            return Err(invalid());
        }
        let (start, end) = spec.trim().split_once('-').ok_or_else(invalid)?;
        let number = |raw: &str| raw.trim().parse::<u64>().map_err(|_| invalid());
        match (start.trim().is_empty(), end.trim().is_empty()) {
            (true, false) => Ok(RangeSpec::Suffix {
                length: number(end)?,
            }),
            (false, true) => Ok(RangeSpec::From {
                start: number(start)?,
            }),
            (false, false) => {
                let (start, end) = (number(start)?, number(end)?);
                if start > end {
                    return Err(invalid());
                }
                Ok(RangeSpec::FromTo { start, end })
            }
            (true, true) => Err(invalid()),
        }
    }

    /// Clamp against a resource of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::NotSatisfiable`] when no byte of the resource is selected.
    pub fn resolve(self, size: u64) -> Result<ByteRange, RangeError> {
        let unsatisfiable = RangeError::NotSatisfiable { size };
        if size == 0 {
            return Err(unsatisfiable);
        }
        let last = size - 1;
        match self {
            RangeSpec::FromTo { start, end } if start <= last => Ok(ByteRange {
                start,
                end: end.min(last),
            }),
            RangeSpec::From { start } if start <= last => Ok(ByteRange { start, end: last }),
            RangeSpec::Suffix { length } if length > 0 => Ok(ByteRange {
                start: size.saturating_sub(length),
                end: last,
            }),
            _ => Err(unsatisfiable),
        }
    }
}
