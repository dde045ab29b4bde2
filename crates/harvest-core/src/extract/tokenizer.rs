//! Lexical tokenizer for Java source text.
//!
//! Produces the `code_tokens` column. Whitespace and comments are dropped;
//! every other character ends up in exactly one token, so the tokenizer never
//! fails. Characters it has no class for become one-character `Unknown` tokens.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Keyword,
    Number,
    String,
    Operator,
    Punctuation,
    Unknown,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Keyword => "keyword",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Multi-character operators, longest first.
const OPERATORS: &[&str] = &[
    ">>>=", "<<=", ">>=", ">>>", "->", "::", "++", "--", "==", "!=", "<=", ">=", "&&", "||",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>",
];

const SINGLE_OPERATORS: &[char] = &[
    '+', '-', '*', '/', '%', '=', '<', '>', '!', '~', '?', ':', '&', '|', '^',
];

const PUNCTUATION: &[char] = &['(', ')', '{', '}', '[', ']', ';', ',', '.', '@'];

pub fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "abstract"
            | "assert"
            | "boolean"
            | "break"
            | "byte"
            | "case"
            | "catch"
            | "char"
            | "class"
            | "const"
            | "continue"
            | "default"
            | "do"
            | "double"
            | "else"
            | "enum"
            | "extends"
            | "final"
            | "finally"
            | "float"
            | "for"
            | "goto"
            | "if"
            | "implements"
            | "import"
            | "instanceof"
            | "int"
            | "interface"
            | "long"
            | "native"
            | "new"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "return"
            | "short"
            | "static"
            | "strictfp"
            | "super"
            | "switch"
            | "synchronized"
            | "this"
            | "throw"
            | "throws"
            | "transient"
            | "try"
            | "void"
            | "volatile"
            | "while"
            | "true"
            | "false"
            | "null"
    )
}

/// Lazy token stream over a borrowed string. Holds no state besides its
/// position, so calling [`tokenize`] again starts over.
#[derive(Clone, Debug)]
pub struct Tokens<'a> {
    src: &'a str,
    pos: usize,
}

pub fn tokenize(code: &str) -> Tokens<'_> {
    Tokens { src: code, pos: 0 }
}

/// Token texts only, in order.
pub fn token_texts(code: &str) -> Vec<String> {
    tokenize(code).map(|t| t.text.to_string()).collect()
}

impl<'a> Tokens<'a> {
    fn skip_trivia(&mut self) {
        loop {
            let rest = &self.src[self.pos..];
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if trimmed.starts_with("/*") {
                self.pos += trimmed[2..]
                    .find("*/")
                    .map(|end| end + 4)
                    .unwrap_or(trimmed.len());
            } else {
                return;
            }
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.skip_trivia();
        let rest = &self.src[self.pos..];
        let c = rest.chars().next()?;

        let (kind, len) = if c == '"' || c == '\'' {
            (TokenKind::String, string_len(rest))
        } else if c.is_ascii_digit() || (c == '.' && starts_with_digit(&rest[1..])) {
            (TokenKind::Number, number_len(rest))
        } else if is_ident_start(c) {
            let len = ident_len(rest);
            if is_keyword(&rest[..len]) {
                (TokenKind::Keyword, len)
            } else {
                (TokenKind::Identifier, len)
            }
        } else if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(*op)) {
            (TokenKind::Operator, op.len())
        } else if rest.starts_with("...") {
            (TokenKind::Punctuation, 3)
        } else if PUNCTUATION.contains(&c) {
            (TokenKind::Punctuation, 1)
        } else if SINGLE_OPERATORS.contains(&c) {
            (TokenKind::Operator, 1)
        } else {
            (TokenKind::Unknown, c.len_utf8())
        };

        let start = self.pos;
        self.pos += len;
        Some(Token {
            kind,
            text: &self.src[start..self.pos],
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn starts_with_digit(s: &str) -> bool {
    s.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

fn ident_len(rest: &str) -> usize {
    rest.char_indices()
        .find(|(_, c)| !is_ident_continue(*c))
        .map(|(i, _)| i)
        .unwrap_or(rest.len())
}

/// Length of the string, char, or text-block literal at the start of `rest`.
///
/// Ordinary literals that are not closed stop before the end of their line.
fn string_len(rest: &str) -> usize {
    if let Some(body) = rest.strip_prefix("\"\"\"") {
        let mut chars = body.char_indices();
        while let Some((i, ch)) = chars.next() {
            if ch == '\\' {
                chars.next();
            } else if body[i..].starts_with("\"\"\"") {
                return 3 + i + 3;
            }
        }
        return rest.len();
    }

    let quote = rest.chars().next().unwrap_or('"');
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '\n' => return i,
            c if c == quote => return i + 1,
            _ => {}
        }
    }
    rest.len()
}

fn number_len(rest: &str) -> usize {
    let b = rest.as_bytes();
    let n = b.len();
    let mut i = 0;

    if n > 1 && b[0] == b'0' && matches!(b[1], b'x' | b'X' | b'b' | b'B') {
        i = 2;
        while i < n && (b[i].is_ascii_hexdigit() || b[i] == b'_') {
            i += 1;
        }
        if i < n && matches!(b[i], b'l' | b'L') {
            i += 1;
        }
        return i;
    }

    while i < n && (b[i].is_ascii_digit() || b[i] == b'_') {
        i += 1;
    }
    if i < n && b[i] == b'.' {
        let next = b.get(i + 1).copied();
        let continues_number = match next {
            Some(d) if d.is_ascii_digit() => true,
            Some(b'.') => false,
            Some(c) if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
                matches!(c, b'e' | b'E' | b'f' | b'F' | b'd' | b'D')
            }
            _ => i > 0,
        };
        if continues_number {
            i += 1;
            while i < n && (b[i].is_ascii_digit() || b[i] == b'_') {
                i += 1;
            }
        }
    }
    if i < n && matches!(b[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < n && matches!(b[j], b'+' | b'-') {
            j += 1;
        }
        if j < n && b[j].is_ascii_digit() {
            i = j;
            while i < n && (b[i].is_ascii_digit() || b[i] == b'_') {
                i += 1;
            }
        }
    }
    if i < n && matches!(b[i], b'f' | b'F' | b'd' | b'D' | b'l' | b'L') {
        i += 1;
    }
    i.max(1)
}
