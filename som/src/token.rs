/// Lexical symbols produced by the SOM lexer.
use crate::span::SourceCoordinate;

/// The kind of a lexical symbol.
///
/// Single-character operators get their own kind because the grammar treats
/// some of them specially (`|` delimits variable lists, `=` separates a
/// method pattern from its body, `-` may start a negative literal). Runs of
/// two or more operator characters are an [`TokenKind::OperatorSequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of input, or an unrecognised character.
    None,
    Integer,
    Double,
    /// `~`
    Not,
    /// `&`
    And,
    /// `|`
    Or,
    /// `*`
    Star,
    /// `/`
    Div,
    /// `\`
    Mod,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `=`
    Equal,
    /// `>`
    More,
    /// `<`
    Less,
    /// `,`
    Comma,
    /// `@`
    At,
    /// `%`
    Per,
    /// `[`
    NewBlock,
    /// `]`
    EndBlock,
    /// `:`
    Colon,
    /// `.`
    Period,
    /// `^`
    Exit,
    /// `:=`
    Assign,
    /// `(`
    NewTerm,
    /// `)`
    EndTerm,
    /// `#`
    Pound,
    /// The reserved word `primitive`.
    Primitive,
    /// Four or more dashes, starting the class side of a definition.
    Separator,
    /// A single-quoted string literal.
    String,
    Identifier,
    /// `at:`
    Keyword,
    /// `at:put:` written as one word, only valid in symbol literals.
    KeywordSequence,
    /// Two or more operator characters, e.g. `<=` or `->`.
    OperatorSequence,
}

impl TokenKind {
    /// Human-readable name for error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Integer => "Integer",
            Self::Double => "Double",
            Self::Not => "Not",
            Self::And => "And",
            Self::Or => "Or",
            Self::Star => "Star",
            Self::Div => "Div",
            Self::Mod => "Mod",
            Self::Plus => "Plus",
            Self::Minus => "Minus",
            Self::Equal => "Equal",
            Self::More => "More",
            Self::Less => "Less",
            Self::Comma => "Comma",
            Self::At => "At",
            Self::Per => "Per",
            Self::NewBlock => "NewBlock",
            Self::EndBlock => "EndBlock",
            Self::Colon => "Colon",
            Self::Period => "Period",
            Self::Exit => "Exit",
            Self::Assign => "Assign",
            Self::NewTerm => "NewTerm",
            Self::EndTerm => "EndTerm",
            Self::Pound => "Pound",
            Self::Primitive => "Primitive",
            Self::Separator => "Separator",
            Self::String => "STString",
            Self::Identifier => "Identifier",
            Self::Keyword => "Keyword",
            Self::KeywordSequence => "KeywordSequence",
            Self::OperatorSequence => "OperatorSequence",
        }
    }

    /// Kinds whose matched text is worth showing next to the kind name.
    pub fn is_printable(self) -> bool {
        matches!(
            self,
            Self::Integer
                | Self::Double
                | Self::String
                | Self::Identifier
                | Self::Keyword
                | Self::KeywordSequence
                | Self::OperatorSequence
        )
    }

    /// Identifiers include the reserved word `primitive`, which is a legal
    /// selector and variable name outside of method bodies.
    pub fn is_identifier(self) -> bool {
        matches!(self, Self::Identifier | Self::Primitive)
    }

    /// Single-character operators usable as binary selectors.
    pub fn is_single_op(self) -> bool {
        matches!(
            self,
            Self::Not
                | Self::And
                | Self::Or
                | Self::Star
                | Self::Div
                | Self::Mod
                | Self::Plus
                | Self::Equal
                | Self::More
                | Self::Less
                | Self::Comma
                | Self::At
                | Self::Per
                | Self::Minus
        )
    }

    /// Anything that can start a binary message send.
    pub fn is_binary_op(self) -> bool {
        self == Self::OperatorSequence || self.is_single_op()
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A symbol with its matched text and start position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The text matched. For strings this is the unescaped contents.
    pub text: String,
    pub start: SourceCoordinate,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        start: SourceCoordinate,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::None && self.text.is_empty()
    }
}
