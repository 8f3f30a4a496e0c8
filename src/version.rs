// src/version.rs

//! Version normalization and requirement predicates
//!
//! Catalog versions are dotted numeric releases with optional qualifiers:
//! `1.0`, `2.0.0.9`, `1.0a1`, `1.2rc2`, `1.0.dev5`, `1.0.post2`. This is
//! not semver, so ordering is implemented here:
//! - segments split on `.` and `-`, and at digit/letter boundaries
//! - numeric segments compare as numbers
//! - qualifiers order `dev < a < b < c < rc < (release) < post`
//! - shorter versions are padded with release semantics (`1.0 == 1.0.0`)

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// A parsed, normalized version with a total ordering
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Segment {
    Numeric(u64),
    Qualifier(Qualifier),
}

/// Well-known version qualifiers with defined ordering
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
enum Qualifier {
    Dev,
    Alpha,
    Beta,
    Candidate,
    Rc,
    Release,
    Post,
}

impl Qualifier {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "dev" => Some(Qualifier::Dev),
            "a" | "alpha" => Some(Qualifier::Alpha),
            "b" | "beta" => Some(Qualifier::Beta),
            "c" => Some(Qualifier::Candidate),
            "rc" => Some(Qualifier::Rc),
            "post" => Some(Qualifier::Post),
            _ => None,
        }
    }
}

impl Version {
    /// Parse and normalize a version string
    ///
    /// Fails with `Error::InvalidVersion` on empty input, non-numeric
    /// release segments, or unknown qualifier words.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidVersion(text.to_string()));
        }

        let mut segments = Vec::new();
        for token in trimmed.split(['.', '-']) {
            if token.is_empty() {
                return Err(Error::InvalidVersion(text.to_string()));
            }
            // Split runs of digits and letters: "0a1" -> 0, a, 1
            let mut rest = token;
            while !rest.is_empty() {
                if rest.starts_with(|c: char| c.is_ascii_digit()) {
                    let end = rest
                        .find(|c: char| !c.is_ascii_digit())
                        .unwrap_or(rest.len());
                    let value = rest[..end]
                        .parse::<u64>()
                        .map_err(|_| Error::InvalidVersion(text.to_string()))?;
                    segments.push(Segment::Numeric(value));
                    rest = &rest[end..];
                } else {
                    let end = rest
                        .find(|c: char| c.is_ascii_digit())
                        .unwrap_or(rest.len());
                    let qualifier = Qualifier::from_token(&rest[..end])
                        .ok_or_else(|| Error::InvalidVersion(text.to_string()))?;
                    segments.push(Segment::Qualifier(qualifier));
                    rest = &rest[end..];
                }
            }
        }

        Ok(Self {
            original: trimmed.to_string(),
            segments,
        })
    }

    /// True when the version carries no pre-release or dev qualifier
    pub fn is_final(&self) -> bool {
        !self.segments.iter().any(
            |s| matches!(s, Segment::Qualifier(q) if *q < Qualifier::Release),
        )
    }

    /// The version string as written
    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.segments.len().max(other.segments.len());
        for i in 0..max_len {
            let ord = compare_segments(self.segments.get(i), other.segments.get(i));
            if ord != Ordering::Equal {
                return ord;
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

fn compare_segments(a: Option<&Segment>, b: Option<&Segment>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(s), None) => compare_segment_to_empty(s),
        (None, Some(s)) => compare_segment_to_empty(s).reverse(),
        (Some(a), Some(b)) => compare_two_segments(a, b),
    }
}

/// A missing segment counts as a release boundary: `1.0` pads to `1.0.0`
fn compare_segment_to_empty(seg: &Segment) -> Ordering {
    match seg {
        Segment::Numeric(0) => Ordering::Equal,
        Segment::Numeric(_) => Ordering::Greater,
        Segment::Qualifier(q) => q.cmp(&Qualifier::Release),
    }
}

fn compare_two_segments(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Numeric(x), Segment::Numeric(y)) => x.cmp(y),
        (Segment::Qualifier(x), Segment::Qualifier(y)) => x.cmp(y),
        // A number against a qualifier: pre-release qualifiers sort below
        // any numeric continuation, post sorts above unless the number is
        // positive at the same position
        (Segment::Numeric(n), Segment::Qualifier(q)) => match q.cmp(&Qualifier::Release) {
            Ordering::Less => Ordering::Greater,
            Ordering::Greater => {
                if *n > 0 {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            Ordering::Equal => Ordering::Equal,
        },
        (Segment::Qualifier(_), Segment::Numeric(_)) => {
            compare_two_segments(b, a).reverse()
        }
    }
}

/// Comparison operator in a predicate clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// One comparison clause: operator plus version
#[derive(Debug, Clone)]
pub struct Clause {
    pub op: Operator,
    pub version: Version,
}

/// Parsed form of a requirement string like `"choxie (>=2.0,<3.0)"`
///
/// A predicate with zero clauses matches any version of `name`. Name
/// comparison is ASCII case-insensitive.
#[derive(Debug, Clone)]
pub struct VersionPredicate {
    pub name: String,
    pub clauses: Vec<Clause>,
}

impl VersionPredicate {
    /// Parse a requirement string into name plus ordered clauses
    ///
    /// Clauses use `==`, `!=`, `<`, `<=`, `>`, `>=`; a clause with no
    /// operator means `==`. Fails with `Error::MalformedRequirement` when
    /// the name cannot be extracted or any clause is unparseable.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let (name_part, clause_part) = match trimmed.find('(') {
            Some(pos) => {
                let rest = trimmed[pos..].trim();
                if !rest.ends_with(')') {
                    return Err(Error::MalformedRequirement(text.to_string()));
                }
                (trimmed[..pos].trim(), Some(rest[1..rest.len() - 1].trim()))
            }
            None => (trimmed, None),
        };

        if !is_valid_name(name_part) {
            return Err(Error::MalformedRequirement(text.to_string()));
        }

        let mut clauses = Vec::new();
        if let Some(inner) = clause_part {
            if inner.is_empty() {
                return Err(Error::MalformedRequirement(text.to_string()));
            }
            for raw in inner.split(',') {
                let clause = parse_clause(raw.trim())
                    .map_err(|_| Error::MalformedRequirement(text.to_string()))?;
                clauses.push(clause);
            }
        }

        Ok(Self {
            name: name_part.to_string(),
            clauses,
        })
    }

    /// Evaluate all clauses conjunctively against a candidate version
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses.iter().all(|clause| {
            let ord = version.cmp(&clause.version);
            match clause.op {
                Operator::Eq => ord == Ordering::Equal,
                Operator::Ne => ord != Ordering::Equal,
                Operator::Lt => ord == Ordering::Less,
                Operator::Le => ord != Ordering::Greater,
                Operator::Gt => ord == Ordering::Greater,
                Operator::Ge => ord != Ordering::Less,
            }
        })
    }

    /// Like `matches`, but an unparseable candidate is a non-match rather
    /// than an error, so one bad version cannot abort a resolution
    pub fn matches_str(&self, version: &str) -> bool {
        match Version::parse(version) {
            Ok(v) => self.matches(&v),
            Err(_) => false,
        }
    }

    /// Case-insensitive name comparison
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for VersionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str(&self.name);
        }
        let clauses = self
            .clauses
            .iter()
            .map(|c| format!("{}{}", c.op, c.version))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{} ({})", self.name, clauses)
    }
}

/// Leading project-name token of a requirement string
///
/// Used to degrade a malformed requirement to name-only matching during
/// graph construction.
pub fn project_name(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    let end = trimmed
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(trimmed.len());
    let name = &trimmed[..end];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn parse_clause(raw: &str) -> Result<Clause> {
    let (op, rest) = if let Some(r) = raw.strip_prefix(">=") {
        (Operator::Ge, r)
    } else if let Some(r) = raw.strip_prefix("<=") {
        (Operator::Le, r)
    } else if let Some(r) = raw.strip_prefix("==") {
        (Operator::Eq, r)
    } else if let Some(r) = raw.strip_prefix("!=") {
        (Operator::Ne, r)
    } else if let Some(r) = raw.strip_prefix('>') {
        (Operator::Gt, r)
    } else if let Some(r) = raw.strip_prefix('<') {
        (Operator::Lt, r)
    } else {
        (Operator::Eq, raw)
    };

    let version = Version::parse(rest.trim())?;
    Ok(Clause { op, version })
}
