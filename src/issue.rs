//! Paths, issues, and the aggregate error surface.
//!
//! Every problem found during a traversal is a [`TypeIssue`]: a path into the
//! value tree plus a message. Issues are collected exhaustively across
//! siblings; only the public operations turn a non-empty list into an
//! [`Error`].

use std::fmt;

/// One step into a value tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// An object property or record entry value.
    Key(String),
    /// An array or tuple index.
    Index(usize),
    /// A guarded-call argument position.
    Arg(usize),
    /// The key of a record entry, as opposed to its value.
    KeyOf(String),
}

/// An ordered path identifying a location inside a value tree.
///
/// Paths are copied, not mutated, when descending: sibling branches never see
/// each other's suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypePath(Vec<Segment>);

impl TypePath {
    pub fn root() -> Self {
        TypePath(Vec::new())
    }

    /// A copy of this path with one more segment appended.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        TypePath(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            match segment {
                Segment::Key(k) => write!(f, "[{k:?}]")?,
                Segment::Index(i) => write!(f, "[{i}]")?,
                Segment::Arg(i) => write!(f, "[args[{i}]]")?,
                Segment::KeyOf(k) => write!(f, "[key:{k:?}]")?,
            }
        }
        Ok(())
    }
}

/// A single reported problem at one location.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeIssue {
    pub path: TypePath,
    pub message: String,
    /// Deferrable issues (unknown keys) do not indicate the value's shape is
    /// wrong, only that extra information was present. They still fail
    /// decode/encode/convert.
    pub deferrable: bool,
}

impl TypeIssue {
    pub fn new(path: TypePath, message: impl Into<String>) -> Self {
        TypeIssue {
            path,
            message: message.into(),
            deferrable: false,
        }
    }

    pub fn deferred(path: TypePath, message: impl Into<String>) -> Self {
        TypeIssue {
            path,
            message: message.into(),
            deferrable: true,
        }
    }
}

impl fmt::Display for TypeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Any non-deferrable issue present?
pub(crate) fn has_fatal(issues: &[TypeIssue]) -> bool {
    issues.iter().any(|issue| !issue.deferrable)
}

/// Ordered issue list with newline-joined rendering, one issue per line.
#[derive(Debug, Clone, Default)]
pub struct IssueList(pub Vec<TypeIssue>);

impl fmt::Display for IssueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Aggregate failure of one public operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Failed to decode from {medium:?} medium:\n{issues}")]
    Decode { medium: String, issues: IssueList },
    #[error("Failed to encode to {medium:?} medium:\n{issues}")]
    Encode { medium: String, issues: IssueList },
    #[error("Failed to convert from {from:?} medium to {to:?} medium:\n{issues}")]
    Convert {
        from: String,
        to: String,
        issues: IssueList,
    },
    #[error("Value does not satisfy the type:\n{issues}")]
    Check { issues: IssueList },
    #[error("Failed to unpack {medium:?} medium payload: {message}")]
    Unpack { medium: String, message: String },
    #[error("Failed to pack {medium:?} medium payload: {message}")]
    Pack { medium: String, message: String },
}

impl Error {
    /// The collected issues, empty for pack/unpack failures.
    pub fn issues(&self) -> &[TypeIssue] {
        match self {
            Error::Decode { issues, .. }
            | Error::Encode { issues, .. }
            | Error::Convert { issues, .. }
            | Error::Check { issues } => &issues.0,
            Error::Unpack { .. } | Error::Pack { .. } => &[],
        }
    }
}
