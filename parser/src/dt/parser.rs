//! Hand-written recursive-descent parser over the token stream.
//!
//! The parser is error tolerant: on an unexpected token it records a
//! diagnostic and resynchronizes to the next `;` or `}` so at most one
//! statement is lost. It never panics on malformed input and always returns
//! whatever roots it managed to build.

use super::ast::{
    DTComment, DTConditional, DTNode, DTProperty, DTValue, Position, Span,
};
use super::error::ParseError;
use super::tokenizer::{tokenize, Token, TokenKind};

pub struct DtParser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    errors: Vec<ParseError>,
    /// Optional cap on accumulated errors; parsing returns early once hit.
    error_limit: Option<usize>,
}

/// Tokenize and parse `source`, returning roots in source order plus all
/// accumulated diagnostics (lexer first, then parser).
pub fn parse_dt(source: &str) -> (Vec<DTNode>, Vec<ParseError>) {
    let (tokens, mut diagnostics) = tokenize(source);
    let (roots, mut errors) = DtParser::new(tokens).parse();
    diagnostics.append(&mut errors);
    (roots, diagnostics)
}

impl<'a> DtParser<'a> {
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            error_limit: None,
        }
    }

    /// Stop parsing once `limit` errors have accumulated. The default is
    /// unbounded accumulation.
    pub fn with_error_limit(mut self, limit: usize) -> Self {
        self.error_limit = Some(limit);
        self
    }

    fn peek(&self) -> Token<'a> {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, n: usize) -> TokenKind {
        self.tokens[(self.pos + n).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token<'a> {
        let tok = self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn at_eof(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    fn error_at(&mut self, tok: Token<'a>, message: impl Into<String>) {
        self.errors
            .push(ParseError::error(message, tok.line, tok.column));
    }

    fn warning_at(&mut self, tok: Token<'a>, message: impl Into<String>) {
        self.errors
            .push(ParseError::warning(message, tok.line, tok.column));
    }

    fn error_limit_reached(&self) -> bool {
        self.error_limit
            .is_some_and(|limit| self.errors.iter().filter(|e| e.is_error()).count() >= limit)
    }

    /// Statement-aware resync inside a node body: consume up to and including
    /// the next `;`, but stop before `}`/EOF and before anything that looks
    /// like the start of the next statement, so at most one statement is lost.
    fn synchronize_statement(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Semi => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace | TokenKind::Eof => return,
                TokenKind::Ident
                    if matches!(
                        self.peek_kind_at(1),
                        TokenKind::Equal
                            | TokenKind::Semi
                            | TokenKind::LBrace
                            | TokenKind::At
                            | TokenKind::Colon
                    ) =>
                {
                    return;
                }
                TokenKind::Reference if self.peek_kind_at(1) == TokenKind::LBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Resync at top level: consume the offending token, then skip until the
    /// next `;` (inclusive) or the start of the next top-level construct.
    fn synchronize_top(&mut self) {
        self.advance();
        loop {
            match self.peek().kind {
                TokenKind::Semi => {
                    self.advance();
                    return;
                }
                TokenKind::Eof | TokenKind::Slash => return,
                TokenKind::Ident if self.peek_kind_at(1) == TokenKind::Colon => return,
                TokenKind::Reference if self.peek_kind_at(1) == TokenKind::LBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn start_position(tok: Token<'a>) -> Position {
        Position {
            line: tok.line,
            column: tok.column,
            offset: tok.offset,
        }
    }

    fn end_position(tok: Token<'a>) -> Position {
        Position {
            line: tok.line,
            column: tok.column + tok.lexeme.len(),
            offset: tok.end_offset(),
        }
    }

    fn prev_end(&self) -> Position {
        if self.pos == 0 {
            Position::default()
        } else {
            Self::end_position(self.tokens[self.pos - 1])
        }
    }

    /// Parse the whole translation unit: multiple roots, labeled fragments
    /// and `&ref { … }` overlay nodes in source order.
    pub fn parse(mut self) -> (Vec<DTNode>, Vec<ParseError>) {
        let mut roots: Vec<DTNode> = Vec::new();
        let mut pending_comments: Vec<DTComment> = Vec::new();
        let mut pending_conditionals: Vec<DTConditional> = Vec::new();

        while !self.at_eof() && !self.error_limit_reached() {
            let tok = self.peek();
            match tok.kind {
                TokenKind::CommentLine | TokenKind::CommentBlock => {
                    pending_comments.push(DTComment::new(tok.lexeme));
                    self.advance();
                }
                TokenKind::Preprocessor => {
                    pending_conditionals.push(DTConditional::from_raw(tok.lexeme));
                    self.advance();
                }
                TokenKind::Semi => {
                    self.advance();
                }
                TokenKind::Slash => {
                    if let Some(node) = self.parse_root_node() {
                        roots.push(Self::with_pending(
                            node,
                            &mut pending_comments,
                            &mut pending_conditionals,
                        ));
                    }
                }
                TokenKind::Ident if self.peek_kind_at(1) == TokenKind::Colon => {
                    if let Some(node) = self.parse_labeled_fragment() {
                        roots.push(Self::with_pending(
                            node,
                            &mut pending_comments,
                            &mut pending_conditionals,
                        ));
                    }
                }
                TokenKind::Reference if self.peek_kind_at(1) == TokenKind::LBrace => {
                    if let Some(node) = self.parse_reference_node() {
                        roots.push(Self::with_pending(
                            node,
                            &mut pending_comments,
                            &mut pending_conditionals,
                        ));
                    }
                }
                _ => {
                    self.error_at(
                        tok,
                        format!("unexpected token '{}' at top level", tok.lexeme),
                    );
                    self.synchronize_top();
                }
            }
        }

        // Trailing trivia attaches to the last root so nothing is dropped.
        if let Some(last) = roots.last_mut() {
            last.comments.append(&mut pending_comments);
            last.conditionals.append(&mut pending_conditionals);
        }
        (roots, self.errors)
    }

    fn with_pending(
        mut node: DTNode,
        comments: &mut Vec<DTComment>,
        conditionals: &mut Vec<DTConditional>,
    ) -> DTNode {
        let mut all_comments = std::mem::take(comments);
        all_comments.append(&mut node.comments);
        node.comments = all_comments;
        let mut all_conditionals = std::mem::take(conditionals);
        all_conditionals.append(&mut node.conditionals);
        node.conditionals = all_conditionals;
        node
    }

    /// `/ { body };`
    fn parse_root_node(&mut self) -> Option<DTNode> {
        let start = self.advance();
        if self.eat(TokenKind::LBrace).is_none() {
            self.error_at(self.peek(), "expected '{' after '/'");
            self.synchronize_top();
            return None;
        }
        let mut node = DTNode::new("/");
        self.parse_body(&mut node);
        if self.eat(TokenKind::Semi).is_none() {
            self.error_at(self.peek(), "expected ';' after '}'");
        }
        node.span = Span {
            start: Self::start_position(start),
            end: self.prev_end(),
        };
        Some(node)
    }

    /// `label: &target { body };`
    fn parse_labeled_fragment(&mut self) -> Option<DTNode> {
        let label_tok = self.advance();
        self.advance(); // ':'
        let target = self.peek();
        if target.kind != TokenKind::Reference {
            self.error_at(target, "expected '&reference' after top-level label");
            self.synchronize_top();
            return None;
        }
        self.advance();
        let mut node = self.parse_node_with_name(target.lexeme, Self::start_position(label_tok))?;
        node.label = Some(label_tok.lexeme.to_owned());
        Some(node)
    }

    /// `&target { body };`
    fn parse_reference_node(&mut self) -> Option<DTNode> {
        let name_tok = self.advance();
        self.parse_node_with_name(name_tok.lexeme, Self::start_position(name_tok))
    }

    fn parse_node_with_name(&mut self, name: &str, start: Position) -> Option<DTNode> {
        if self.eat(TokenKind::LBrace).is_none() {
            self.error_at(self.peek(), format!("expected '{{' after '{name}'"));
            self.synchronize_top();
            return None;
        }
        let mut node = DTNode::new(name);
        self.parse_body(&mut node);
        if self.eat(TokenKind::Semi).is_none() {
            self.error_at(self.peek(), "expected ';' after '}'");
        }
        node.span = Span {
            start,
            end: self.prev_end(),
        };
        Some(node)
    }

    /// Parse statements until the closing `}` (consumed) or EOF.
    fn parse_body(&mut self, node: &mut DTNode) {
        let mut pending: Vec<DTComment> = Vec::new();
        loop {
            if self.error_limit_reached() {
                return;
            }
            let tok = self.peek();
            match tok.kind {
                TokenKind::CommentLine | TokenKind::CommentBlock => {
                    pending.push(DTComment::new(tok.lexeme));
                    self.advance();
                }
                TokenKind::Preprocessor => {
                    node.conditionals.push(DTConditional::from_raw(tok.lexeme));
                    self.advance();
                }
                TokenKind::RBrace => {
                    self.advance();
                    node.comments.append(&mut pending);
                    return;
                }
                TokenKind::Eof => {
                    self.error_at(tok, format!("unexpected end of input in '{}'", node.name));
                    node.comments.append(&mut pending);
                    return;
                }
                TokenKind::Ident => match self.peek_kind_at(1) {
                    TokenKind::Colon => {
                        self.parse_labeled_child(node, std::mem::take(&mut pending));
                    }
                    TokenKind::LBrace | TokenKind::At => {
                        self.parse_child(node, None, std::mem::take(&mut pending));
                    }
                    _ => {
                        self.parse_property(node, std::mem::take(&mut pending));
                    }
                },
                TokenKind::Reference if self.peek_kind_at(1) == TokenKind::LBrace => {
                    self.parse_child(node, None, std::mem::take(&mut pending));
                }
                _ => {
                    self.error_at(
                        tok,
                        format!("unexpected token '{}' in node body", tok.lexeme),
                    );
                    self.advance();
                    self.synchronize_statement();
                }
            }
        }
    }

    fn parse_labeled_child(&mut self, parent: &mut DTNode, comments: Vec<DTComment>) {
        let label_tok = self.advance();
        self.advance(); // ':'
        let name = self.peek();
        if !matches!(name.kind, TokenKind::Ident | TokenKind::Reference) {
            self.error_at(name, "expected node name after label");
            self.synchronize_statement();
            return;
        }
        self.parse_child_at(
            parent,
            Some(label_tok.lexeme.to_owned()),
            Self::start_position(label_tok),
            comments,
        );
    }

    fn parse_child(&mut self, parent: &mut DTNode, label: Option<String>, comments: Vec<DTComment>) {
        let start = Self::start_position(self.peek());
        self.parse_child_at(parent, label, start, comments);
    }

    /// `(label:)? name(@addr)? { body };` — the label, if any, was already
    /// consumed by the caller; `start` points at it so spans cover the whole
    /// statement.
    fn parse_child_at(
        &mut self,
        parent: &mut DTNode,
        label: Option<String>,
        start: Position,
        comments: Vec<DTComment>,
    ) {
        let name_tok = self.advance();
        let mut child = DTNode::new(name_tok.lexeme);
        child.label = label;
        child.comments = comments;

        if self.eat(TokenKind::At).is_some() {
            let addr = self.peek();
            if matches!(addr.kind, TokenKind::Number | TokenKind::Ident) {
                child.unit_address = Some(addr.lexeme.to_owned());
                self.advance();
            } else {
                self.error_at(addr, "expected unit address after '@'");
            }
        }

        if self.eat(TokenKind::LBrace).is_none() {
            self.error_at(
                self.peek(),
                format!("expected '{{' after node name '{}'", child.name),
            );
            self.synchronize_statement();
            return;
        }
        self.parse_body(&mut child);
        let semi = self.eat(TokenKind::Semi);
        if semi.is_none() {
            self.error_at(self.peek(), "expected ';' after '}'");
        }
        child.span = Span {
            start,
            end: self.prev_end(),
        };
        if let Some(semi) = semi {
            self.attach_inline_comment(&mut child.comments, semi);
        }

        if parent.children.contains_key(&child.full_name()) {
            self.warning_at(
                name_tok,
                format!(
                    "duplicate node '{}' replaces earlier definition",
                    child.full_name()
                ),
            );
        }
        parent.add_child(child);
    }

    fn parse_property(&mut self, node: &mut DTNode, comments: Vec<DTComment>) {
        let name_tok = self.advance();
        let mut prop = DTProperty::new(name_tok.lexeme, None);
        prop.comments_before = comments;

        if self.eat(TokenKind::Equal).is_some() {
            prop.value = self.parse_value_list();
        }

        match self.eat(TokenKind::Semi) {
            Some(semi) => self.attach_inline_comment(&mut prop.comments_inline, semi),
            None => {
                self.error_at(
                    self.peek(),
                    format!("expected ';' after property '{}'", prop.name),
                );
                self.synchronize_statement();
            }
        }
        node.add_property(prop);
    }

    /// A comment token directly after `;` on the same line attaches inline.
    fn attach_inline_comment(&mut self, out: &mut Vec<DTComment>, semi: Token<'a>) {
        let next = self.peek();
        if matches!(
            next.kind,
            TokenKind::CommentLine | TokenKind::CommentBlock
        ) && next.line == semi.line
        {
            out.push(DTComment::new(next.lexeme));
            self.advance();
        }
    }

    /// `value (',' value)*` — a single value stays bare, several become an
    /// array of values.
    fn parse_value_list(&mut self) -> Option<DTValue> {
        let first = self.parse_value()?;
        if !self.check(TokenKind::Comma) {
            return Some(first);
        }
        let mut values = vec![first];
        while self.eat(TokenKind::Comma).is_some() {
            match self.parse_value() {
                Some(v) => values.push(v),
                None => break,
            }
        }
        Some(DTValue::Array(values))
    }

    fn parse_value(&mut self) -> Option<DTValue> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Str => {
                self.advance();
                Some(DTValue::String(unescape_string(tok.lexeme)))
            }
            TokenKind::LAngle => {
                self.advance();
                Some(DTValue::Array(self.parse_cells()))
            }
            TokenKind::LBracket => {
                self.advance();
                Some(self.parse_bytes())
            }
            TokenKind::Reference => {
                self.advance();
                Some(DTValue::Reference(tok.lexeme[1..].to_owned()))
            }
            TokenKind::Ident => {
                self.advance();
                Some(DTValue::String(tok.lexeme.to_owned()))
            }
            TokenKind::Number => {
                self.advance();
                Some(parse_number(tok.lexeme))
            }
            _ => {
                self.error_at(
                    tok,
                    format!("expected property value, found '{}'", tok.lexeme),
                );
                None
            }
        }
    }

    /// Elements between `<` and `>`. Comments inside are discarded; a call
    /// form `NAME(args)` collapses into a single string element.
    fn parse_cells(&mut self) -> Vec<DTValue> {
        let mut items = Vec::new();
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::RAngle => {
                    self.advance();
                    return items;
                }
                TokenKind::Eof | TokenKind::RBrace => {
                    self.error_at(tok, "unterminated cell list");
                    return items;
                }
                TokenKind::Number => {
                    self.advance();
                    items.push(parse_number(tok.lexeme));
                }
                TokenKind::Reference => {
                    self.advance();
                    items.push(DTValue::Reference(tok.lexeme[1..].to_owned()));
                }
                TokenKind::Ident => {
                    if self.peek_kind_at(1) == TokenKind::LParen {
                        let text = self.parse_call_text();
                        items.push(DTValue::String(text));
                    } else {
                        self.advance();
                        items.push(DTValue::String(tok.lexeme.to_owned()));
                    }
                }
                TokenKind::LParen => {
                    self.advance();
                    items.push(DTValue::Array(self.parse_paren_group()));
                }
                TokenKind::CommentLine | TokenKind::CommentBlock => {
                    self.advance();
                }
                _ => {
                    self.error_at(
                        tok,
                        format!("unexpected token '{}' in cell list", tok.lexeme),
                    );
                    self.resync_cells();
                    return items;
                }
            }
        }
    }

    /// Skip to the closing `>` (consumed); stop before `}`/EOF.
    fn resync_cells(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::RAngle => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace | TokenKind::Eof => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Parenthesized expression inside a cell list, e.g. `(1)` or nested
    /// arithmetic; captured as an array of its elements.
    fn parse_paren_group(&mut self) -> Vec<DTValue> {
        let mut items = Vec::new();
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::RParen => {
                    self.advance();
                    return items;
                }
                TokenKind::Eof | TokenKind::RAngle | TokenKind::RBrace => {
                    self.error_at(tok, "unterminated '(' group in cell list");
                    return items;
                }
                TokenKind::LParen => {
                    self.advance();
                    items.push(DTValue::Array(self.parse_paren_group()));
                }
                TokenKind::Number => {
                    self.advance();
                    items.push(parse_number(tok.lexeme));
                }
                TokenKind::Reference => {
                    self.advance();
                    items.push(DTValue::Reference(tok.lexeme[1..].to_owned()));
                }
                _ => {
                    self.advance();
                    items.push(DTValue::String(tok.lexeme.to_owned()));
                }
            }
        }
    }

    /// Collapse `NAME ( … )` back into its source spelling with balanced
    /// parentheses, e.g. `LC(LS(A))`.
    fn parse_call_text(&mut self) -> String {
        let mut text = String::from(self.advance().lexeme);
        let mut depth = 0usize;
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::LParen => {
                    depth += 1;
                    text.push('(');
                    self.advance();
                }
                TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    text.push(')');
                    self.advance();
                    if depth == 0 {
                        return text;
                    }
                }
                TokenKind::RAngle | TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof => {
                    self.error_at(tok, format!("unbalanced parentheses in '{text}'"));
                    return text;
                }
                _ => {
                    text.push_str(tok.lexeme);
                    self.advance();
                }
            }
        }
    }

    /// `[ hex bytes ]`; whitespace between digits is free-form, so lexemes
    /// are joined and split into pairs.
    fn parse_bytes(&mut self) -> DTValue {
        let mut hex = String::new();
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::RBracket => {
                    self.advance();
                    break;
                }
                TokenKind::Eof | TokenKind::RBrace => {
                    self.error_at(tok, "unterminated byte array");
                    break;
                }
                TokenKind::Number | TokenKind::Ident => {
                    hex.push_str(tok.lexeme);
                    self.advance();
                }
                _ => {
                    self.error_at(
                        tok,
                        format!("unexpected token '{}' in byte array", tok.lexeme),
                    );
                    self.advance();
                }
            }
        }
        let mut bytes = Vec::new();
        let digits = hex.as_bytes();
        for pair in digits.chunks(2) {
            if pair.len() == 2 {
                if let Ok(b) = u8::from_str_radix(std::str::from_utf8(pair).unwrap_or("zz"), 16) {
                    bytes.push(b);
                }
            }
        }
        DTValue::Bytes(bytes)
    }
}

fn parse_number(lexeme: &str) -> DTValue {
    let parsed = if let Some(hex) = lexeme
        .strip_prefix("0x")
        .or_else(|| lexeme.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else {
        lexeme.parse::<i64>()
    };
    match parsed {
        Ok(n) => DTValue::Integer(n),
        Err(_) => DTValue::String(lexeme.to_owned()),
    }
}

/// Strip quotes and decode the C-style escapes the tokenizer accepted.
fn unescape_string(lexeme: &str) -> String {
    let inner = lexeme
        .strip_prefix('"')
        .unwrap_or(lexeme)
        .strip_suffix('"')
        .unwrap_or_else(|| lexeme.strip_prefix('"').unwrap_or(lexeme));
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                let hex: String = [hi, lo].into_iter().flatten().collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(b) => out.push(b as char),
                    Err(_) => {
                        out.push_str("\\x");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
