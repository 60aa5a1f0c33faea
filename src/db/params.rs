//! Ordinal parameter translation.
//!
//! Statements are written with `$1..$N` placeholders. Before execution they
//! are rewritten into the connector's native markers: every distinct
//! placeholder is bound once, in first-occurrence order, and the original
//! binding entries nobody refers to are dropped. Single-quoted string
//! literals are never rewritten.

use crate::db::dialect::MarkerStyle;
use crate::db::types::to_wire;
use crate::models::{Value, WireValue};
use std::collections::HashMap;

/// Result of [`translate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub sql: String,
    /// One wire value per distinct placeholder, in first-occurrence order.
    pub binding: Vec<WireValue>,
    /// Binding index of every emitted marker, in text order.
    pub marker_order: Vec<usize>,
}

impl Translated {
    /// Binding with one value per marker, for drivers that only know `?`.
    pub fn positional_binding(&self) -> Vec<WireValue> {
        self.marker_order
            .iter()
            .map(|&idx| self.binding[idx].clone())
            .collect()
    }

    /// Binding in the shape the given marker style expects.
    pub fn binding_for(&self, style: MarkerStyle) -> Vec<WireValue> {
        match style {
            MarkerStyle::Anonymous => self.positional_binding(),
            MarkerStyle::Numbered => self.binding.clone(),
        }
    }
}

/// Rewrite `$N` placeholders into native markers and coerce the binding.
///
/// A placeholder whose index has no entry in `binding` (including `$0`)
/// binds null.
pub fn translate(sql: &str, binding: &[Value], style: MarkerStyle) -> Translated {
    let sql = normalize_comparisons(sql);
    let bytes = sql.as_bytes();

    let mut out = String::with_capacity(sql.len());
    let mut positions: HashMap<usize, usize> = HashMap::new();
    let mut new_binding = Vec::new();
    let mut marker_order = Vec::new();

    let mut in_quote = false;
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'$' if !in_quote => {
                let digits = bytes[i + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if digits > 0 {
                    let end = i + 1 + digits;
                    let ordinal = sql[i + 1..end].parse::<usize>().unwrap_or(0);
                    let position = *positions.entry(ordinal).or_insert_with(|| {
                        let value = ordinal
                            .checked_sub(1)
                            .and_then(|idx| binding.get(idx))
                            .map(to_wire)
                            .unwrap_or(WireValue::Null);
                        new_binding.push(value);
                        new_binding.len() - 1
                    });

                    out.push_str(&sql[copied..i]);
                    match style {
                        MarkerStyle::Anonymous => out.push('?'),
                        MarkerStyle::Numbered => {
                            out.push('?');
                            out.push_str(&(position + 1).to_string());
                        }
                    }
                    marker_order.push(position);
                    copied = end;
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    out.push_str(&sql[copied..]);

    Translated {
        sql: out,
        binding: new_binding,
        marker_order,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Literal {
    True,
    False,
    Null,
}

/// Rewrite `= true`, `<> false`, `= null`, `!= null` and friends into forms
/// every backend accepts: booleans become `1`/`0`, null comparisons become
/// `IS [NOT] NULL`. Matching is case-insensitive and skips string literals.
pub fn normalize_comparisons(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut in_quote = false;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\'' {
            in_quote = !in_quote;
            i += 1;
            continue;
        }
        if !in_quote {
            if let Some(op_len) = comparison_at(bytes, i) {
                if let Some((literal, end)) = literal_at(bytes, i + op_len) {
                    let op = &sql[i..i + op_len];
                    out.push_str(&sql[copied..i]);
                    match (op, literal) {
                        ("=", Literal::Null) => out.push_str("IS NULL"),
                        (_, Literal::Null) => out.push_str("IS NOT NULL"),
                        (op, Literal::True) => {
                            out.push_str(op);
                            out.push_str(" 1");
                        }
                        (op, Literal::False) => {
                            out.push_str(op);
                            out.push_str(" 0");
                        }
                    }
                    copied = end;
                    i = end;
                    continue;
                }
            }
        }
        i += 1;
    }
    out.push_str(&sql[copied..]);
    out
}

/// Length of an equality/inequality operator starting at `i`.
fn comparison_at(bytes: &[u8], i: usize) -> Option<usize> {
    let rest = &bytes[i..];
    if rest.starts_with(b"!=") || rest.starts_with(b"<>") {
        return Some(2);
    }
    if rest.first() != Some(&b'=') || rest.get(1) == Some(&b'=') {
        return None;
    }
    match i.checked_sub(1).map(|p| bytes[p]) {
        Some(b'<' | b'>' | b'!' | b'=') => None,
        _ => Some(1),
    }
}

/// `true`, `false` or `null` after optional whitespace, as a whole word.
fn literal_at(bytes: &[u8], start: usize) -> Option<(Literal, usize)> {
    let ws = bytes[start..]
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    let word_start = start + ws;
    let word_len = bytes[word_start..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    let word = &bytes[word_start..word_start + word_len];

    let literal = if word.eq_ignore_ascii_case(b"true") {
        Literal::True
    } else if word.eq_ignore_ascii_case(b"false") {
        Literal::False
    } else if word.eq_ignore_ascii_case(b"null") {
        Literal::Null
    } else {
        return None;
    };
    Some((literal, word_start + word_len))
}
