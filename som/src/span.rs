/// Source location tracking.
///
/// The lexer snapshots a [`SourceCoordinate`] at the start of every symbol;
/// the parser turns a start coordinate plus the number of characters consumed
/// since into a [`SourceSection`]. Both are purely diagnostic and never
/// influence evaluation.

/// A single position in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceCoordinate {
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based, in characters).
    pub column: usize,
    /// Character offset from the start of the input (0-based).
    pub char_index: usize,
}

impl SourceCoordinate {
    pub const fn new(line: usize, column: usize, char_index: usize) -> Self {
        Self {
            line,
            column,
            char_index,
        }
    }

    /// The very beginning of a source text.
    pub const fn origin() -> Self {
        Self {
            line: 1,
            column: 1,
            char_index: 0,
        }
    }
}

impl std::fmt::Display for SourceCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A contiguous region of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: SourceCoordinate,
    /// Length in characters.
    pub length: usize,
}

impl Span {
    pub const fn new(start: SourceCoordinate, length: usize) -> Self {
        Self { start, length }
    }

    /// Create a zero-width span at a single position.
    pub const fn point(start: SourceCoordinate) -> Self {
        Self { start, length: 0 }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.start, self.length)
    }
}

/// A span with a human readable qualifier such as `Foo>>bar:`.
///
/// Every assembled method keeps one of these next to its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSection {
    pub qualifier: String,
    pub span: Span,
}

impl SourceSection {
    pub fn new(qualifier: impl Into<String>, span: Span) -> Self {
        Self {
            qualifier: qualifier.into(),
            span,
        }
    }

    pub fn line(&self) -> usize {
        self.span.start.line
    }

    pub fn column(&self) -> usize {
        self.span.start.column
    }
}

impl std::fmt::Display for SourceSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.qualifier, self.span)
    }
}
