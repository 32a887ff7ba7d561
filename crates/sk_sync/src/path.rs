use std::fmt;

// -----------------------------------------------------------------------------
// FieldPath

/// One step of a traversal path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment {
    /// A named field of a composite.
    Field(&'static str),
    /// An element or entry position inside a list or dictionary.
    Index(usize),
}

/// A stack of path segments tracking where a traversal currently is.
///
/// The generic visitor maintains one to label callbacks, and both codec
/// readers maintain one so fatal errors can name the offending location.
/// Rendering follows the usual accessor notation:
///
/// ```
/// use sk_sync::{FieldPath, PathSegment};
///
/// let mut path = FieldPath::new();
/// path.push(PathSegment::Field("inventory"));
/// path.push(PathSegment::Index(3));
/// path.push(PathSegment::Field("name"));
/// assert_eq!(path.to_string(), "inventory[3].name");
/// ```
#[derive(Debug, Default, Clone)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Creates an empty path.
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Pushes a segment onto the path.
    #[inline]
    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Pops the innermost segment, returning it.
    #[inline]
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    /// Whether the path is at the root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Renders the path into an owned string, `(root)` when empty.
    pub fn render(&self) -> String {
        if self.segments.is_empty() {
            return String::from("(root)");
        }
        self.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{FieldPath, PathSegment};

    #[test]
    fn renders_root_when_empty() {
        assert_eq!(FieldPath::new().render(), "(root)");
    }

    #[test]
    fn index_binds_without_separator() {
        let mut path = FieldPath::new();
        path.push(PathSegment::Field("sockets"));
        path.push(PathSegment::Index(0));
        assert_eq!(path.render(), "sockets[0]");
        path.pop();
        path.pop();
        assert!(path.is_empty());
    }
}
