/// Line-oriented lexer for SOM class definitions.
///
/// The [`Lexer`] splits the source into lines up front and walks them with a
/// cursor, tracking line, column and absolute character offset for every
/// symbol it issues. The parser drives it one symbol at a time through
/// [`Lexer::next_symbol`] and may look exactly one symbol ahead with
/// [`Lexer::peek`], which is how `x := ...` is told apart from `x foo`.
///
/// # Syntax summary
///
/// | Input            | Symbol                                  |
/// |------------------|-----------------------------------------|
/// | `"…"`            | comment, skipped                        |
/// | `'…'`            | string, `\t \b \n \r \f \0 \' \\` escapes |
/// | `foo`            | identifier                              |
/// | `foo:`           | keyword                                 |
/// | `foo:bar:`       | keyword sequence                        |
/// | `+`, `<=`        | single operator / operator sequence     |
/// | `12`, `1.5`      | integer / double                        |
/// | `----`           | separator (class side follows)          |
///
/// A period is only part of a number when a digit follows it, so `1.` ends
/// a statement.
use crate::span::SourceCoordinate;
use crate::token::{Token, TokenKind};

const SEPARATOR: &str = "----";
const PRIMITIVE: &str = "primitive";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unsupported escape sequence \\{escape} at {at}")]
    UnsupportedEscape { escape: char, at: SourceCoordinate },
    #[error("unterminated string literal starting at {at}")]
    UnterminatedString { at: SourceCoordinate },
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Characters that may appear in binary selectors.
pub fn is_operator(c: char) -> bool {
    matches!(
        c,
        '~' | '&'
            | '|'
            | '*'
            | '/'
            | '@'
            | '+'
            | '-'
            | '='
            | '>'
            | '<'
            | ','
            | '%'
            | '\\'
    )
}

// ═══════════════════════════════════════════════════════════════════
// Cursor state, cloned wholesale for one-symbol lookahead
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct LexerState {
    /// Number of lines read so far; the current line is `line_number - 1`.
    line_number: usize,
    /// Characters in all lines before the current one, newlines included.
    chars_read: usize,
    line_pos: usize,
    sym: TokenKind,
    text: String,
    start: SourceCoordinate,
}

impl LexerState {
    fn new() -> Self {
        Self {
            line_number: 0,
            chars_read: 0,
            line_pos: 0,
            sym: TokenKind::None,
            text: String::new(),
            start: SourceCoordinate::origin(),
        }
    }

    fn set(&mut self, sym: TokenKind, text: impl Into<String>) {
        self.sym = sym;
        self.text = text.into();
    }
}

pub struct Lexer {
    lines: Vec<Vec<char>>,
    state: LexerState,
    state_after_peek: Option<LexerState>,
    finished: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            lines: source.split('\n').map(|l| l.chars().collect()).collect(),
            state: LexerState::new(),
            state_after_peek: None,
            finished: false,
        }
    }

    /// Advance to the next symbol and return its kind.
    ///
    /// At the end of input this keeps returning [`TokenKind::None`] with an
    /// empty text.
    pub fn next_symbol(&mut self) -> Result<TokenKind, LexError> {
        if let Some(state) = self.state_after_peek.take() {
            self.state = state;
            return Ok(self.state.sym);
        }

        loop {
            if !self.has_more_input() {
                self.state.start = self.coordinate();
                self.state.set(TokenKind::None, "");
                return Ok(self.state.sym);
            }
            self.skip_white_space();
            self.skip_comment();
            let c = self.current_char();
            if !(self.end_of_line() || c.is_whitespace() || c == '"') {
                break;
            }
        }

        self.state.start = self.coordinate();
        let c = self.current_char();
        match c {
            '\'' => self.lex_string()?,
            '[' => self.match_char(TokenKind::NewBlock),
            ']' => self.match_char(TokenKind::EndBlock),
            ':' => {
                if self.char_at(self.state.line_pos + 1) == '=' {
                    self.state.line_pos += 2;
                    self.state.set(TokenKind::Assign, ":=");
                } else {
                    self.match_char(TokenKind::Colon);
                }
            }
            '(' => self.match_char(TokenKind::NewTerm),
            ')' => self.match_char(TokenKind::EndTerm),
            '#' => self.match_char(TokenKind::Pound),
            '^' => self.match_char(TokenKind::Exit),
            '.' => self.match_char(TokenKind::Period),
            '-' if self.rest_starts_with(SEPARATOR) => {
                let mut text = String::new();
                while self.current_char() == '-' {
                    text.push('-');
                    self.state.line_pos += 1;
                }
                self.state.set(TokenKind::Separator, text);
            }
            c if is_operator(c) => self.lex_operator(),
            _ if self.next_word_is(PRIMITIVE) => {
                self.state.line_pos += PRIMITIVE.len();
                self.state.set(TokenKind::Primitive, PRIMITIVE);
            }
            c if c.is_ascii_alphabetic() => self.lex_identifier(),
            c if c.is_ascii_digit() => self.lex_number(),
            c => {
                self.state.line_pos += 1;
                self.state.set(TokenKind::None, c.to_string());
            }
        }

        Ok(self.state.sym)
    }

    /// Look at the symbol after the current one without consuming anything.
    ///
    /// # Panics
    ///
    /// Panics if called twice without an intervening
    /// [`next_symbol`](Self::next_symbol); only one symbol of lookahead is
    /// kept.
    pub fn peek(&mut self) -> Result<TokenKind, LexError> {
        assert!(
            self.state_after_peek.is_none(),
            "SOM lexer: cannot peek twice"
        );
        let old = self.state.clone();
        self.next_symbol()?;
        let next = self.state.sym;
        self.state_after_peek = Some(std::mem::replace(&mut self.state, old));
        Ok(next)
    }

    pub fn sym(&self) -> TokenKind {
        self.state.sym
    }

    pub fn text(&self) -> &str {
        &self.state.text
    }

    /// Text of the peeked symbol, if a peek is pending.
    pub fn next_text(&self) -> Option<&str> {
        self.state_after_peek.as_ref().map(|s| s.text.as_str())
    }

    pub fn token(&self) -> Token {
        Token::new(self.state.sym, self.state.text.clone(), self.state.start)
    }

    /// Where the current symbol started.
    pub fn start_coordinate(&self) -> SourceCoordinate {
        self.state.start
    }

    pub fn current_line(&self) -> String {
        self.line().iter().collect()
    }

    pub fn current_line_number(&self) -> usize {
        self.state.line_number
    }

    pub fn current_column(&self) -> usize {
        self.state.line_pos + 1
    }

    /// Characters consumed up to the cursor, across all lines.
    pub fn number_of_characters_read(&self) -> usize {
        self.state.chars_read + self.state.line_pos
    }

    fn coordinate(&self) -> SourceCoordinate {
        SourceCoordinate::new(
            self.state.line_number.max(1),
            self.state.line_pos + 1,
            self.number_of_characters_read(),
        )
    }

    fn line(&self) -> &[char] {
        match self.state.line_number {
            0 => &[],
            n => &self.lines[n - 1],
        }
    }

    fn char_at(&self, pos: usize) -> char {
        self.line().get(pos).copied().unwrap_or('\0')
    }

    fn current_char(&self) -> char {
        self.char_at(self.state.line_pos)
    }

    fn end_of_line(&self) -> bool {
        self.state.line_pos >= self.line().len()
    }

    fn read_next_line(&mut self) -> bool {
        if self.state.line_number >= self.lines.len() {
            return false;
        }
        if self.state.line_number > 0 {
            self.state.chars_read += self.line().len() + 1;
        }
        self.state.line_number += 1;
        self.state.line_pos = 0;
        true
    }

    fn has_more_input(&mut self) -> bool {
        while self.end_of_line() {
            if !self.read_next_line() {
                return false;
            }
        }
        true
    }

    fn skip_white_space(&mut self) {
        while self.current_char().is_whitespace() {
            self.state.line_pos += 1;
            while self.end_of_line() {
                if !self.read_next_line() {
                    return;
                }
            }
        }
    }

    fn skip_comment(&mut self) {
        if self.current_char() != '"' {
            return;
        }
        loop {
            self.state.line_pos += 1;
            while self.end_of_line() {
                if !self.read_next_line() {
                    return;
                }
            }
            if self.current_char() == '"' {
                break;
            }
        }
        self.state.line_pos += 1;
    }

    fn match_char(&mut self, sym: TokenKind) {
        let c = self.current_char();
        self.state.set(sym, c.to_string());
        self.state.line_pos += 1;
    }

    fn rest_starts_with(&self, text: &str) -> bool {
        let line = self.line();
        let pos = self.state.line_pos;
        text.chars()
            .enumerate()
            .all(|(i, c)| line.get(pos + i) == Some(&c))
    }

    fn next_word_is(&self, text: &str) -> bool {
        self.rest_starts_with(text)
            && !is_identifier_char(
                self.char_at(self.state.line_pos + text.chars().count()),
            )
    }

    fn lex_identifier(&mut self) {
        self.state.set(TokenKind::Identifier, "");
        while is_identifier_char(self.current_char()) {
            let c = self.current_char();
            self.state.text.push(c);
            self.state.line_pos += 1;
        }

        // `x:=` is an assignment, not the keyword `x:`
        if self.current_char() == ':'
            && self.char_at(self.state.line_pos + 1) != '='
        {
            self.state.sym = TokenKind::Keyword;
            self.state.line_pos += 1;
            self.state.text.push(':');
            if self.current_char().is_ascii_alphabetic() {
                self.state.sym = TokenKind::KeywordSequence;
                while self.current_char().is_ascii_alphabetic()
                    || self.current_char() == ':'
                {
                    let c = self.current_char();
                    self.state.text.push(c);
                    self.state.line_pos += 1;
                }
            }
        }
    }

    fn lex_number(&mut self) {
        self.state.set(TokenKind::Integer, "");
        let mut saw_decimal_mark = false;
        loop {
            let c = self.current_char();
            self.state.text.push(c);
            self.state.line_pos += 1;

            if !saw_decimal_mark
                && self.current_char() == '.'
                && self.char_at(self.state.line_pos + 1).is_ascii_digit()
            {
                saw_decimal_mark = true;
                self.state.sym = TokenKind::Double;
                self.state.text.push('.');
                self.state.line_pos += 1;
            }

            if !self.current_char().is_ascii_digit() {
                break;
            }
        }
    }

    fn lex_escape_char(&mut self) -> Result<(), LexError> {
        let escaped = match self.current_char() {
            't' => '\t',
            'b' => '\u{8}',
            'n' => '\n',
            'r' => '\r',
            'f' => '\u{c}',
            '\'' => '\'',
            '\\' => '\\',
            '0' => '\0',
            escape => {
                return Err(LexError::UnsupportedEscape {
                    escape,
                    at: self.coordinate(),
                });
            }
        };
        self.state.text.push(escaped);
        self.state.line_pos += 1;
        Ok(())
    }

    fn lex_string(&mut self) -> Result<(), LexError> {
        let start = self.state.start;
        self.state.set(TokenKind::String, "");
        self.state.line_pos += 1;

        while self.current_char() != '\'' {
            while self.end_of_line() {
                if !self.read_next_line() {
                    return Err(LexError::UnterminatedString { at: start });
                }
                self.state.text.push('\n');
            }
            match self.current_char() {
                '\'' => {}
                '\\' => {
                    self.state.line_pos += 1;
                    self.lex_escape_char()?;
                }
                c => {
                    self.state.text.push(c);
                    self.state.line_pos += 1;
                }
            }
        }

        self.state.line_pos += 1;
        Ok(())
    }

    fn lex_operator(&mut self) {
        if is_operator(self.char_at(self.state.line_pos + 1)) {
            self.state.set(TokenKind::OperatorSequence, "");
            while is_operator(self.current_char()) {
                let c = self.current_char();
                self.state.text.push(c);
                self.state.line_pos += 1;
            }
            return;
        }

        let sym = match self.current_char() {
            '~' => TokenKind::Not,
            '&' => TokenKind::And,
            '|' => TokenKind::Or,
            '*' => TokenKind::Star,
            '/' => TokenKind::Div,
            '\\' => TokenKind::Mod,
            '+' => TokenKind::Plus,
            '=' => TokenKind::Equal,
            '>' => TokenKind::More,
            '<' => TokenKind::Less,
            ',' => TokenKind::Comma,
            '@' => TokenKind::At,
            '%' => TokenKind::Per,
            '-' => TokenKind::Minus,
            _ => unreachable!("lex_operator called on a non-operator"),
        };
        self.match_char(sym);
    }
}

/// Yields every symbol up to (not including) the end of input.
impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_symbol() {
            Ok(_) => {
                let token = self.token();
                if token.is_eof() {
                    self.finished = true;
                    None
                } else {
                    Some(Ok(token))
                }
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
