//! Hierarchical location of notes and folders.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ordered sequence of path segments.
///
/// Segments are never blank and never contain [`Path::SEPARATOR`]. The
/// empty sequence is the root. Equality, ordering and serialization are by
/// segment sequence.
///
/// ```rust
/// use notesync_core::Path;
///
/// let path: Path = "work/projects".parse().unwrap();
/// assert_eq!(path.segments(), ["work", "projects"]);
/// assert_eq!(path.parent().unwrap().to_string(), "work");
/// assert!(Path::root().parent().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Separator used by the textual form.
    pub const SEPARATOR: char = '/';

    /// Returns the root path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from segments.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] if any segment is blank or contains
    /// the separator.
    pub fn new<I, S>(segments: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments
            .into_iter()
            .map(|segment| {
                let segment = segment.into();
                validate_segment(&segment)?;
                Ok(segment)
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Parses the textual form. The empty string is the root.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] for empty or blank segments, such as
    /// `"a//b"` or `"/a"`.
    pub fn parse(text: &str) -> CoreResult<Self> {
        if text.is_empty() {
            return Ok(Self::root());
        }
        Self::new(text.split(Self::SEPARATOR))
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the parent path.
    ///
    /// # Errors
    ///
    /// The root has no parent.
    pub fn parent(&self) -> CoreResult<Path> {
        match self.segments.split_last() {
            Some((_, parent)) => Ok(Self {
                segments: parent.to_vec(),
            }),
            None => Err(CoreError::InvalidPath("root has no parent".into())),
        }
    }

    /// Returns this path extended by one segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] if the segment is invalid.
    pub fn child(&self, segment: impl Into<String>) -> CoreResult<Path> {
        let segment = segment.into();
        validate_segment(&segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Returns true if `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &Path) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

fn validate_segment(segment: &str) -> CoreResult<()> {
    if segment.trim().is_empty() {
        return Err(CoreError::InvalidPath(format!(
            "blank segment {segment:?}"
        )));
    }
    if segment.contains(Path::SEPARATOR) {
        return Err(CoreError::InvalidPath(format!(
            "segment {segment:?} contains '{}'",
            Path::SEPARATOR
        )));
    }
    Ok(())
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                write!(f, "{}", Self::SEPARATOR)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Vec<String>> for Path {
    type Error = CoreError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<Path> for Vec<String> {
    fn from(path: Path) -> Self {
        path.segments
    }
}
