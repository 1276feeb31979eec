use logos::{Lexer as LogosLexer, Logos};
use logos_iter::{LogosIter, PeekableLexer};
use std::fmt;

pub type Lexer<'a> = PeekableLexer<'a, LogosLexer<'a, TokenKind>, TokenKind>;

pub fn lexer(s: &str) -> Lexer {
    TokenKind::lexer(s).peekable_lexer()
}

#[derive(Logos, Debug, Copy, Clone, Eq, PartialEq)]
pub enum TokenKind {
    #[regex(r"@[a-zA-Z0-9._\-]+")]
    Variable,

    #[token("<damageSection>")]
    DamageSection,

    #[regex(r"[^@<]+")]
    Text,

    // A marker character that does not start a token is plain text
    #[token("@")]
    #[token("<")]
    Stray,

    #[error]
    Error,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        use TokenKind::*;

        match self {
            Variable => "<variable>",
            DamageSection => "<damage section>",
            Text => "<text>",
            Stray => "<stray marker>",
            Error => "<error>",
        }
    }

    /// Token kinds that carry no meaning of their own and are copied verbatim.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text | Self::Stray | Self::Error)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
