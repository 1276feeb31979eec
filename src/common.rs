pub use vec1::vec1;

pub type Int = i64;

pub type Float = f64;

pub type NonEmpty<T> = vec1::Vec1<T>;

/// Marker spliced out of a resolved formula once per damage section.
pub const DAMAGE_SECTION: &str = "<damageSection>";

/// Text substituted for anything that cannot be resolved.
pub const NEUTRAL: &str = "0";

/// Deepest nesting of sub-formulas expanded before a branch is cut to [NEUTRAL].
pub const MAX_DEPTH: usize = 32;

/// Most nodes a single tree may hold; further expansions become [NEUTRAL].
pub const MAX_NODES: usize = 4096;

pub const ARITHMETIC_OPERATORS: &[char] = &['+', '-', '*', '/'];

pub fn starts_with_operator(s: &str) -> bool {
    s.starts_with(ARITHMETIC_OPERATORS)
}

/// Returns `true` if `s` can be spliced into a larger formula without
/// parentheses, i.e. it is a single, optionally signed, term.
pub fn is_single_term(s: &str) -> bool {
    let s = s.trim();
    let body = s.strip_prefix(ARITHMETIC_OPERATORS).unwrap_or(s);
    if body.is_empty() {
        return false;
    }
    if body.starts_with('(') && body.ends_with(')') && is_balanced_group(body) {
        return true;
    }
    !body
        .chars()
        .any(|c| c.is_whitespace() || ARITHMETIC_OPERATORS.contains(&c) || c == '%')
}

/// Wraps `s` in parentheses unless it is already a single term.
pub fn group(s: &str) -> String {
    if is_single_term(s) {
        s.trim().to_owned()
    } else {
        format!("({})", s.trim())
    }
}

// `(a) + (b)` starts and ends with parens but is not one group
fn is_balanced_group(s: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != s.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
