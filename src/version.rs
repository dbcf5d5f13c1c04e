//! Ruby versions and RubyGems-style requirements.
//!
//! Ordering follows RubyGems: numeric segments compare numerically, missing
//! trailing segments count as `0`, and any alphabetic segment marks a
//! pre-release that sorts before the corresponding final release
//! (`2.6.0.preview1 < 2.6.0`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(u64),
    Pre(String),
}

impl Segment {
    fn cmp_segment(&self, other: &Segment) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            (Segment::Pre(a), Segment::Pre(b)) => a.cmp(b),
            (Segment::Pre(_), Segment::Num(_)) => Ordering::Less,
            (Segment::Num(_), Segment::Pre(_)) => Ordering::Greater,
        }
    }
}

/// Release segments every version is padded to (`2.3` is stored as `2.3.0`).
const RELEASE_SEGMENTS: usize = 3;

#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<Segment>,
    /// Release segments as written, before padding. Only `~>` cares.
    precision: usize,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            segments: vec![
                Segment::Num(major),
                Segment::Num(minor),
                Segment::Num(patch),
            ],
            precision: RELEASE_SEGMENTS,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidVersion(raw.to_string()));
        }

        let mut segments = Vec::new();
        for part in trimmed.split(['.', '-']) {
            if part.is_empty() {
                return Err(ConfigError::InvalidVersion(raw.to_string()));
            }
            // "preview1" splits into "preview" and 1, like RubyGems does.
            let mut rest = part;
            while !rest.is_empty() {
                let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
                if digits > 0 {
                    let n = rest[..digits]
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidVersion(raw.to_string()))?;
                    segments.push(Segment::Num(n));
                    rest = &rest[digits..];
                    continue;
                }
                let letters = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
                if letters == 0 {
                    return Err(ConfigError::InvalidVersion(raw.to_string()));
                }
                segments.push(Segment::Pre(rest[..letters].to_string()));
                rest = &rest[letters..];
            }
        }

        if !matches!(segments.first(), Some(Segment::Num(_))) {
            return Err(ConfigError::InvalidVersion(raw.to_string()));
        }

        let precision = release_len(&segments);
        if precision < RELEASE_SEGMENTS {
            let padding = (precision..RELEASE_SEGMENTS).map(|_| Segment::Num(0));
            segments.splice(precision..precision, padding);
        }

        Ok(Self {
            segments,
            precision,
        })
    }

    fn numeric(&self, idx: usize) -> u64 {
        match self.segments.get(idx) {
            Some(Segment::Num(n)) => *n,
            _ => 0,
        }
    }

    /// The version with its patch segment zeroed (`2.5.1` → `2.5.0`).
    ///
    /// The public doc host only publishes one set of pages per minor release.
    pub fn minor(&self) -> Version {
        Version::new(self.numeric(0), self.numeric(1), 0)
    }

    /// Segments joined by `_`, the form used by Ruby's release tags.
    pub fn underscored(&self) -> String {
        self.to_string().replace('.', "_")
    }

    /// Upper bound for `~>`: drop the last release segment and increment
    /// the new last one (`2.5.1` → `2.6`, `2.5` → `3`).
    fn bump(&self) -> Version {
        let mut release: Vec<u64> = (0..self.precision).map(|idx| self.numeric(idx)).collect();
        if release.len() > 1 {
            release.pop();
        }
        if let Some(last) = release.last_mut() {
            *last += 1;
        }
        let precision = release.len();
        let mut segments: Vec<Segment> = release.into_iter().map(Segment::Num).collect();
        segments.resize(RELEASE_SEGMENTS.max(precision), Segment::Num(0));
        Version {
            segments,
            precision,
        }
    }
}

fn release_len(segments: &[Segment]) -> usize {
    segments
        .iter()
        .take_while(|s| matches!(s, Segment::Num(_)))
        .count()
}

impl FromStr for Version {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            let after_word = idx > 0 && matches!(self.segments[idx - 1], Segment::Pre(_));
            if idx > 0 && !(after_word && matches!(segment, Segment::Num(_))) {
                f.write_str(".")?;
            }
            match segment {
                Segment::Num(n) => write!(f, "{n}")?,
                Segment::Pre(s) => f.write_str(s)?,
            }
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        let zero = Segment::Num(0);
        for idx in 0..len {
            let a = self.segments.get(idx).unwrap_or(&zero);
            let b = other.segments.get(idx).unwrap_or(&zero);
            match a.cmp_segment(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Pessimistic,
}

impl Op {
    /// Operators that name a version the requirement itself accepts.
    pub fn is_lower_bound(self) -> bool {
        matches!(self, Op::Eq | Op::GtEq | Op::Pessimistic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub op: Op,
    pub version: Version,
}

impl Constraint {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let s = raw.trim();
        let ops = [
            ("~>", Op::Pessimistic),
            (">=", Op::GtEq),
            ("<=", Op::LtEq),
            ("!=", Op::NotEq),
            ("=", Op::Eq),
            (">", Op::Gt),
            ("<", Op::Lt),
        ];
        for (token, op) in ops {
            if let Some(rest) = s.strip_prefix(token) {
                return Ok(Self {
                    op,
                    version: Version::parse(rest)?,
                });
            }
        }
        Ok(Self {
            op: Op::Eq,
            version: Version::parse(s)?,
        })
    }

    pub fn satisfied_by(&self, v: &Version) -> bool {
        match self.op {
            Op::Eq => v == &self.version,
            Op::NotEq => v != &self.version,
            Op::Gt => v > &self.version,
            Op::Lt => v < &self.version,
            Op::GtEq => v >= &self.version,
            Op::LtEq => v <= &self.version,
            Op::Pessimistic => v >= &self.version && v < &self.version.bump(),
        }
    }
}

/// A conjunction of constraints, as declared by one gemspec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    pub constraints: Vec<Constraint>,
}

impl Requirement {
    pub fn parse<'a>(parts: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let constraints = parts
            .into_iter()
            .map(Constraint::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { constraints })
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn satisfied_by(&self, v: &Version) -> bool {
        self.constraints.iter().all(|c| c.satisfied_by(v))
    }
}
