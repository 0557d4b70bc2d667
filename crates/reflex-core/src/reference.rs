//! Hierarchical references naming entities in the context tree

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Reserved trailing segment naming the void counterpart of a reference
pub const VOID_SEGMENT: &str = "void";

/// A dotted hierarchical path, optionally carrying type tags.
///
/// Identity (equality, hashing, ordering) is the path plus the void flag.
/// Type tags are descriptive metadata: two references naming the same path
/// are the same map key regardless of tags; use [`Reference::is_compatible`]
/// for tag-aware matching.
///
/// Textual form: `a.b.c`, `a.b<tag1,tag2>`, and `a.b.void` for the void
/// counterpart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference {
    path: Vec<String>,
    types: BTreeSet<String>,
    void: bool,
}

/// How two references relate within the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degree {
    /// Both name the same node
    Same,
    /// `self` is an ancestor of the other reference, `n` levels above it
    Ancestor(usize),
    /// `self` is a descendant of the other reference, `n` levels below it
    Descendant(usize),
    /// Neither is a prefix of the other
    Unrelated,
}

impl Reference {
    /// Create a reference from a dotted path without tags.
    ///
    /// An empty string names the root.
    pub fn new(path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        Self {
            path: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            types: BTreeSet::new(),
            void: false,
        }
    }

    /// Create a reference from path segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: segments.into_iter().map(Into::into).collect(),
            types: BTreeSet::new(),
            void: false,
        }
    }

    /// The root reference (empty path)
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.path
    }

    /// Number of segments; the root has depth 0
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Last path segment
    pub fn name(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// The parent path (tags and void flag dropped); `None` for the root
    pub fn parent(&self) -> Option<Reference> {
        if self.is_root() {
            return None;
        }
        Some(Self::from_segments(self.path[..self.path.len() - 1].iter().cloned()))
    }

    /// The prefix of this path with `depth` segments
    pub fn ancestor_at(&self, depth: usize) -> Reference {
        Self::from_segments(self.path[..depth.min(self.path.len())].iter().cloned())
    }

    /// A child of this path
    pub fn child(&self, name: impl Into<String>) -> Reference {
        let mut path = self.path.clone();
        path.push(name.into());
        Self {
            path,
            types: BTreeSet::new(),
            void: false,
        }
    }

    pub fn types(&self) -> &BTreeSet<String> {
        &self.types
    }

    pub fn is_typed(&self) -> bool {
        !self.types.is_empty()
    }

    /// Return a copy carrying the given type tags in addition to its own
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Merge the type tags of `other` into this reference
    pub fn merge_types(&mut self, other: &Reference) {
        self.types.extend(other.types.iter().cloned());
    }

    pub fn is_void(&self) -> bool {
        self.void
    }

    /// The void counterpart: "nothing active under this path"
    pub fn void(&self) -> Reference {
        Self {
            path: self.path.clone(),
            types: self.types.clone(),
            void: true,
        }
    }

    /// The non-void form of this reference
    pub fn non_void(&self) -> Reference {
        Self {
            path: self.path.clone(),
            types: self.types.clone(),
            void: false,
        }
    }

    /// Names match and one tag set contains the other (untyped matches anything)
    pub fn is_compatible(&self, other: &Reference) -> bool {
        if self.path != other.path {
            return false;
        }
        if !self.is_typed() || !other.is_typed() {
            return true;
        }
        self.types.is_subset(&other.types) || other.types.is_subset(&self.types)
    }

    /// Length of the common path prefix
    pub fn shared_prefix(&self, other: &Reference) -> usize {
        self.path
            .iter()
            .zip(other.path.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Classify how `other` relates to `self` by path prefix
    pub fn degree(&self, other: &Reference) -> Degree {
        let shared = self.shared_prefix(other);
        let (mine, theirs) = (self.depth(), other.depth());
        if shared == mine && shared == theirs {
            Degree::Same
        } else if shared == mine {
            Degree::Ancestor(theirs - mine)
        } else if shared == theirs {
            Degree::Descendant(mine - theirs)
        } else {
            Degree::Unrelated
        }
    }

    fn validate_segment(segment: &str) -> Result<()> {
        if segment.is_empty() {
            return Err(Error::InvalidReference("empty path segment".to_string()));
        }
        if segment == VOID_SEGMENT {
            return Err(Error::InvalidReference(
                "'void' is only valid as the last segment".to_string(),
            ));
        }
        if !segment
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidReference(format!(
                "invalid character in segment '{}'",
                segment
            )));
        }
        Ok(())
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.void == other.void && self.path == other.path
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.void.hash(state);
    }
}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.void.cmp(&other.void))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("."))?;
        if self.void {
            if self.is_root() {
                write!(f, "{}", VOID_SEGMENT)?;
            } else {
                write!(f, ".{}", VOID_SEGMENT)?;
            }
        }
        if self.is_typed() {
            let tags: Vec<&str> = self.types.iter().map(String::as_str).collect();
            write!(f, "<{}>", tags.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (body, types) = match s.find('<') {
            Some(open) => {
                let tags = s[open + 1..].strip_suffix('>').ok_or_else(|| {
                    Error::InvalidReference(format!("unterminated type tags in '{}'", s))
                })?;
                let types: BTreeSet<String> = tags
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                (&s[..open], types)
            }
            None => (s, BTreeSet::new()),
        };

        let mut segments: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('.').collect()
        };
        let void = segments.last() == Some(&VOID_SEGMENT);
        if void {
            segments.pop();
        }
        for segment in &segments {
            Self::validate_segment(segment)?;
        }

        Ok(Self {
            path: segments.into_iter().map(str::to_string).collect(),
            types,
            void,
        })
    }
}

impl TryFrom<String> for Reference {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.to_string()
    }
}

impl From<&str> for Reference {
    fn from(s: &str) -> Self {
        Reference::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let r: Reference = "door.lock<state,bool>".parse().unwrap();
        assert_eq!(r.segments(), ["door", "lock"]);
        assert!(r.types().contains("state"));
        assert_eq!(r.to_string(), "door.lock<bool,state>");

        let v: Reference = "door.void".parse().unwrap();
        assert!(v.is_void());
        assert_eq!(v.non_void(), Reference::new("door"));
        assert_eq!(v.to_string(), "door.void");

        let root_void: Reference = "void".parse().unwrap();
        assert!(root_void.is_root() && root_void.is_void());
    }

    #[test]
    fn test_parse_errors() {
        assert!("a..b".parse::<Reference>().is_err());
        assert!("a.void.b".parse::<Reference>().is_err());
        assert!("a<b".parse::<Reference>().is_err());
        assert!("a b".parse::<Reference>().is_err());
    }

    #[test]
    fn test_identity_ignores_types() {
        let plain = Reference::new("a.b");
        let typed = Reference::new("a.b").with_types(["state"]);
        assert_eq!(plain, typed);
        assert_ne!(plain, plain.void());
    }

    #[test]
    fn test_compatibility() {
        let a = Reference::new("x").with_types(["t1"]);
        let b = Reference::new("x").with_types(["t1", "t2"]);
        let c = Reference::new("x").with_types(["t3"]);
        assert!(a.is_compatible(&b));
        assert!(b.is_compatible(&a));
        assert!(!a.is_compatible(&c));
        assert!(Reference::new("x").is_compatible(&c));
        assert!(!Reference::new("y").is_compatible(&Reference::new("x")));
    }

    #[test]
    fn test_degree() {
        let a = Reference::new("a");
        let abc = Reference::new("a.b.c");
        assert_eq!(a.degree(&a), Degree::Same);
        assert_eq!(a.degree(&abc), Degree::Ancestor(2));
        assert_eq!(abc.degree(&a), Degree::Descendant(2));
        assert_eq!(abc.degree(&Reference::new("a.x")), Degree::Unrelated);
        assert_eq!(Reference::root().degree(&a), Degree::Ancestor(1));
    }

    #[test]
    fn test_navigation() {
        let abc = Reference::new("a.b.c");
        assert_eq!(abc.parent(), Some(Reference::new("a.b")));
        assert_eq!(abc.ancestor_at(1), Reference::new("a"));
        assert_eq!(abc.name(), Some("c"));
        assert_eq!(Reference::new("a.b").child("c"), abc);
        assert_eq!(Reference::root().parent(), None);
    }

    #[test]
    fn test_serde_as_string() {
        let r = Reference::new("a.b").with_types(["t"]);
        let text = ron::to_string(&r).unwrap();
        assert_eq!(text, "\"a.b<t>\"");
        let back: Reference = ron::from_str(&text).unwrap();
        assert_eq!(back, r);
        assert!(back.types().contains("t"));
    }
}
