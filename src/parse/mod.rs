//! Scanning of roll formulas into text runs, variable references and
//! damage-section placeholders.

mod lexer;

use indexmap::IndexSet;
use lexer::{lexer, TokenKind};
use logos_iter::LogosIter;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Piece<'a> {
    Text(&'a str),
    Variable(&'a str),
    DamageSection,
}

/// Splits `formula` into pieces. Adjacent text is merged into one run, so the
/// pieces concatenate back to the original string.
pub fn scan(formula: &str) -> Vec<Piece<'_>> {
    let mut lex = lexer(formula);
    let mut ret = Vec::new();

    while let Some(kind) = lex.next() {
        match kind {
            TokenKind::Variable => ret.push(Piece::Variable(lex.slice())),
            TokenKind::DamageSection => ret.push(Piece::DamageSection),
            _ => {
                let start = lex.span().start;
                let mut end = lex.span().end;
                while lex.peek().map_or(false, TokenKind::is_text) {
                    lex.next();
                    end = lex.span().end;
                }
                ret.push(Piece::Text(&formula[start..end]));
            }
        }
    }
    ret
}

/// Unique variable tokens of `formula`, in order of first appearance.
pub fn variables(formula: &str) -> IndexSet<&str> {
    scan(formula)
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Variable(v) => Some(v),
            _ => None,
        })
        .collect()
}
