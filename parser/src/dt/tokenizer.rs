//! A total lexer over keymap source bytes.
//!
//! Every input produces a token stream ending in exactly one [`TokenKind::Eof`]
//! token; malformed input yields best-effort tokens plus warning diagnostics,
//! never an abort. Lexemes are slices of the input buffer.

use super::error::{ParseError, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    LAngle,
    RAngle,
    Semi,
    Comma,
    Equal,
    Colon,
    Slash,
    At,
    Amp,
    Star,
    Ident,
    Number,
    Str,
    Reference,
    CommentLine,
    CommentBlock,
    Preprocessor,
    Eof,
}

/// One lexeme with its source position. `line` and `column` are 1-based and
/// refer to the first byte; `offset` is the byte offset into the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub fn end_offset(&self) -> usize {
        self.offset + self.lexeme.len()
    }
}

/// Words after `#` that make a line a preprocessor directive. Anything else
/// (`#binding-cells`) lexes as an identifier.
const DIRECTIVES: &[&str] = &[
    "define", "undef", "include", "if", "ifdef", "ifndef", "else", "elif", "endif", "pragma",
    "error", "warning",
];

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    /// False until the first non-whitespace token on the current line; a `#`
    /// only opens a preprocessor line while this is false.
    line_has_token: bool,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            line_has_token: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
            self.line_has_token = false;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn bump_while(&mut self, f: impl Fn(u8) -> bool) {
        while let Some(b) = self.peek() {
            if f(b) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        self.bump_while(|b| b.is_ascii_whitespace());
    }

    /// True if the bytes at the cursor start a preprocessor directive word.
    fn at_directive(&self) -> bool {
        let rest = &self.bytes[self.pos + 1..];
        let word_len = rest
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if word_len == 0 {
            return false;
        }
        let word = &self.src[self.pos + 1..self.pos + 1 + word_len];
        DIRECTIVES.contains(&word)
    }

    /// Consume to end of line honoring `\` line continuations.
    fn take_preprocessor_line(&mut self) {
        loop {
            match self.peek() {
                None => break,
                Some(b'\n') => break,
                Some(b'\\') => {
                    self.bump();
                    // A continuation swallows the line break.
                    if self.peek() == Some(b'\r') {
                        self.bump();
                    }
                    if self.peek() == Some(b'\n') {
                        self.bump();
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}

/// Lex `src` into tokens. Total over any input; diagnostics carry warnings
/// for unknown bytes and errors for unterminated strings/comments.
pub fn tokenize(src: &str) -> (Vec<Token<'_>>, Vec<ParseError>) {
    let mut lx = Lexer::new(src);
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();

    loop {
        lx.skip_whitespace();
        let start = lx.pos;
        let line = lx.line;
        let col = lx.col;
        let Some(b) = lx.peek() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: "",
                line,
                column: col,
                offset: start,
            });
            break;
        };

        let kind = match b {
            b'{' => {
                lx.bump();
                TokenKind::LBrace
            }
            b'}' => {
                lx.bump();
                TokenKind::RBrace
            }
            b'[' => {
                lx.bump();
                TokenKind::LBracket
            }
            b']' => {
                lx.bump();
                TokenKind::RBracket
            }
            b'(' => {
                lx.bump();
                TokenKind::LParen
            }
            b')' => {
                lx.bump();
                TokenKind::RParen
            }
            b'<' => {
                lx.bump();
                TokenKind::LAngle
            }
            b'>' => {
                lx.bump();
                TokenKind::RAngle
            }
            b';' => {
                lx.bump();
                TokenKind::Semi
            }
            b',' => {
                lx.bump();
                TokenKind::Comma
            }
            b'=' => {
                lx.bump();
                TokenKind::Equal
            }
            b':' => {
                lx.bump();
                TokenKind::Colon
            }
            b'@' => {
                lx.bump();
                TokenKind::At
            }
            b'*' => {
                lx.bump();
                TokenKind::Star
            }
            b'/' => match lx.peek_at(1) {
                Some(b'/') => {
                    lx.bump_while(|b| b != b'\n');
                    TokenKind::CommentLine
                }
                Some(b'*') => {
                    lx.bump();
                    lx.bump();
                    let mut terminated = false;
                    while let Some(b1) = lx.bump() {
                        if b1 == b'*' && lx.peek() == Some(b'/') {
                            lx.bump();
                            terminated = true;
                            break;
                        }
                    }
                    if !terminated {
                        diagnostics.push(ParseError::error(
                            "unterminated block comment",
                            line,
                            col,
                        ));
                    }
                    TokenKind::CommentBlock
                }
                _ => {
                    lx.bump();
                    TokenKind::Slash
                }
            },
            b'"' => {
                lx.bump();
                let mut terminated = false;
                loop {
                    match lx.peek() {
                        None | Some(b'\n') => break,
                        Some(b'\\') => {
                            lx.bump();
                            lx.bump();
                        }
                        Some(b'"') => {
                            lx.bump();
                            terminated = true;
                            break;
                        }
                        Some(_) => {
                            lx.bump();
                        }
                    }
                }
                if !terminated {
                    diagnostics.push(ParseError::error("unterminated string", line, col));
                }
                TokenKind::Str
            }
            b'#' => {
                if !lx.line_has_token && lx.at_directive() {
                    lx.take_preprocessor_line();
                    TokenKind::Preprocessor
                } else {
                    lx.bump();
                    lx.bump_while(is_ident_continue);
                    TokenKind::Ident
                }
            }
            b'&' => {
                if lx.peek_at(1).is_some_and(is_ident_start) {
                    lx.bump();
                    lx.bump_while(is_ident_continue);
                    TokenKind::Reference
                } else {
                    lx.bump();
                    TokenKind::Amp
                }
            }
            b'0' if lx.peek_at(1) == Some(b'x') || lx.peek_at(1) == Some(b'X') => {
                lx.bump();
                lx.bump();
                lx.bump_while(|b| b.is_ascii_hexdigit());
                TokenKind::Number
            }
            b'-' if lx.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                lx.bump();
                lx.bump_while(|b| b.is_ascii_digit());
                TokenKind::Number
            }
            b if b.is_ascii_digit() => {
                lx.bump_while(|b| b.is_ascii_digit());
                TokenKind::Number
            }
            b if is_ident_start(b) => {
                lx.bump_while(is_ident_continue);
                TokenKind::Ident
            }
            _ => {
                // Unknown byte: emit it as a one-character identifier so the
                // stream stays total. Consume a whole UTF-8 scalar to keep
                // lexeme slices on char boundaries.
                let ch_len = lx.src[lx.pos..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
                for _ in 0..ch_len {
                    lx.bump();
                }
                diagnostics.push(ParseError::warning(
                    format!("unexpected character '{}'", &lx.src[start..lx.pos]),
                    line,
                    col,
                ));
                TokenKind::Ident
            }
        };

        lx.line_has_token = true;
        tokens.push(Token {
            kind,
            lexeme: &lx.src[start..lx.pos],
            line,
            column: col,
            offset: start,
        });
    }

    (tokens, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input_is_just_eof() {
        let (tokens, diags) = tokenize("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert!(diags.is_empty());
    }

    #[test]
    fn basic_structure() {
        assert_eq!(
            kinds("/ { };"),
            vec![
                TokenKind::Slash,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Semi,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn references_and_idents() {
        let (tokens, _) = tokenize("&kp Q");
        assert_eq!(tokens[0].kind, TokenKind::Reference);
        assert_eq!(tokens[0].lexeme, "&kp");
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].lexeme, "Q");
    }

    #[test]
    fn hyphen_allowed_in_idents() {
        let (tokens, _) = tokenize("tapping-term-ms");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].lexeme, "tapping-term-ms");
    }

    #[test]
    fn hash_property_name_is_ident() {
        let (tokens, _) = tokenize("#binding-cells = <2>;");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].lexeme, "#binding-cells");
    }

    #[test]
    fn preprocessor_takes_whole_line() {
        let (tokens, _) = tokenize("#define HM_TAP 280\n&kp");
        assert_eq!(tokens[0].kind, TokenKind::Preprocessor);
        assert_eq!(tokens[0].lexeme, "#define HM_TAP 280");
        assert_eq!(tokens[1].kind, TokenKind::Reference);
    }

    #[test]
    fn preprocessor_line_continuation() {
        let (tokens, _) = tokenize("#define WIDE a \\\n  b\nnext");
        assert_eq!(tokens[0].kind, TokenKind::Preprocessor);
        assert!(tokens[0].lexeme.contains('b'));
        assert_eq!(tokens[1].lexeme, "next");
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn numbers_decimal_hex_negative() {
        let (tokens, _) = tokenize("280 0x1E -5");
        assert_eq!(tokens[0].lexeme, "280");
        assert_eq!(tokens[1].lexeme, "0x1E");
        assert_eq!(tokens[2].lexeme, "-5");
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Number));
    }

    #[test]
    fn line_and_column_positions() {
        let (tokens, _) = tokenize("a\n  bb");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
        assert_eq!(tokens[1].offset, 4);
    }

    #[test]
    fn comments_kept_as_trivia() {
        let (tokens, _) = tokenize("// line\n/* block\nstill */ x");
        assert_eq!(tokens[0].kind, TokenKind::CommentLine);
        assert_eq!(tokens[0].lexeme, "// line");
        assert_eq!(tokens[1].kind, TokenKind::CommentBlock);
        assert!(tokens[1].lexeme.ends_with("*/"));
        assert_eq!(tokens[2].lexeme, "x");
    }

    #[test]
    fn unterminated_block_comment_consumes_to_eof() {
        let (tokens, diags) = tokenize("/* never ends");
        assert_eq!(tokens[0].kind, TokenKind::CommentBlock);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn unterminated_string_reports_error() {
        let (tokens, diags) = tokenize("\"oops\nnext");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "\"oops");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn string_escapes_stay_in_lexeme() {
        let (tokens, diags) = tokenize(r#""a\"b""#);
        assert!(diags.is_empty());
        assert_eq!(tokens[0].lexeme, r#""a\"b""#);
    }

    #[test]
    fn unknown_bytes_become_warning_idents() {
        let (tokens, diags) = tokenize("a $ b");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].lexeme, "$");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn totality_over_arbitrary_bytes() {
        let noise = "\u{1F600} \x01\x02 ~`!?^|";
        let (tokens, _) = tokenize(noise);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        assert_eq!(
            tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(),
            1
        );
    }

    #[test]
    fn bare_amp_vs_reference() {
        let (tokens, _) = tokenize("& &x");
        assert_eq!(tokens[0].kind, TokenKind::Amp);
        assert_eq!(tokens[1].kind, TokenKind::Reference);
    }
}
