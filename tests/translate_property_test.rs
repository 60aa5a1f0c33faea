//! Randomized checks of `$N` placeholder translation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sql_access::db::MarkerStyle;
use sql_access::db::params::translate;
use sql_access::db::types::to_wire;
use sql_access::models::{Value, WireValue};

const FRAGMENTS: &[&str] = &[
    "SELECT * FROM orders WHERE ",
    " AND ",
    " OR ",
    "status = 'open' ",
    "note = 'costs $3' ",
    "(",
    ")",
    ", ",
];

/// Build a statement mixing fixed fragments and placeholders, returning the
/// placeholder ordinals in text order.
fn random_statement(rng: &mut StdRng, max_ordinal: usize) -> (String, Vec<usize>) {
    let mut sql = String::new();
    let mut ordinals = Vec::new();
    for _ in 0..rng.gen_range(1..12) {
        if rng.gen_bool(0.5) {
            let ordinal = rng.gen_range(1..=max_ordinal);
            sql.push_str(&format!("col{} = ${}", ordinal, ordinal));
            ordinals.push(ordinal);
        } else {
            sql.push_str(FRAGMENTS[rng.gen_range(0..FRAGMENTS.len())]);
        }
    }
    (sql, ordinals)
}

fn random_binding(rng: &mut StdRng, len: usize) -> Vec<Value> {
    (0..len)
        .map(|i| match rng.gen_range(0..4) {
            0 => Value::Int(rng.gen_range(-1000..1000)),
            1 => Value::Text(format!("v{}", i)),
            2 => Value::Bool(rng.gen_bool(0.5)),
            _ => Value::Null,
        })
        .collect()
}

fn expected_wire(binding: &[Value], ordinal: usize) -> WireValue {
    binding
        .get(ordinal - 1)
        .map(to_wire)
        .unwrap_or(WireValue::Null)
}

#[test]
fn test_anonymous_markers_bind_in_text_order() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..500 {
        let (sql, ordinals) = random_statement(&mut rng, 9);
        let len = rng.gen_range(0..9);
        let binding = random_binding(&mut rng, len);

        let translated = translate(&sql, &binding, MarkerStyle::Anonymous);
        let sent = translated.positional_binding();

        assert_eq!(sent.len(), ordinals.len(), "sql: {}", sql);
        assert_eq!(translated.sql.matches('?').count(), ordinals.len());
        for (wire, ordinal) in sent.iter().zip(&ordinals) {
            assert_eq!(wire, &expected_wire(&binding, *ordinal), "sql: {}", sql);
        }
        assert!(translated.sql.contains("'costs $3'") || !sql.contains("'costs $3'"));
    }
}

#[test]
fn test_numbered_markers_bind_each_ordinal_once() {
    let mut rng = StdRng::seed_from_u64(0xfeed);

    for _ in 0..500 {
        let (sql, ordinals) = random_statement(&mut rng, 9);
        let binding = random_binding(&mut rng, 9);

        let translated = translate(&sql, &binding, MarkerStyle::Numbered);

        let mut distinct: Vec<usize> = Vec::new();
        for ordinal in &ordinals {
            if !distinct.contains(ordinal) {
                distinct.push(*ordinal);
            }
        }
        assert_eq!(translated.binding.len(), distinct.len(), "sql: {}", sql);
        for (position, ordinal) in distinct.iter().enumerate() {
            assert_eq!(
                translated.binding[position],
                expected_wire(&binding, *ordinal)
            );
            assert!(translated.sql.contains(&format!("col{} = ?{}", ordinal, position + 1)));
        }
    }
}
