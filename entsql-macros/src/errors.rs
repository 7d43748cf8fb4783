//! Helpers for compile-time error messages.

use proc_macro2::Span;
use syn::Error;

// =============================================================================
// FUZZY MATCHING ("DID YOU MEAN?")
// =============================================================================

/// Case-insensitive Levenshtein distance.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        if let Some(first) = curr.first_mut() {
            *first = i + 1;
        }
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            let delete = prev.get(j + 1).map_or(usize::MAX, |d| d + 1);
            let insert = curr.get(j).map_or(usize::MAX, |d| d + 1);
            let replace = prev.get(j).map_or(usize::MAX, |d| d + cost);
            if let Some(cell) = curr.get_mut(j + 1) {
                *cell = delete.min(insert).min(replace);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev.last().copied().unwrap_or(0)
}

/// Closest option within a small edit distance.
fn find_similar<'a>(input: &str, options: &[&'a str]) -> Option<&'a str> {
    let threshold = (input.len() / 2).clamp(2, 4);
    options
        .iter()
        .map(|opt| (*opt, edit_distance(input, opt)))
        .filter(|(_, dist)| *dist <= threshold && *dist > 0)
        .min_by_key(|(_, dist)| *dist)
        .map(|(opt, _)| opt)
}

/// `"\n\nDid you mean 'x'?"` when a close option exists, empty otherwise.
pub fn did_you_mean(input: &str, options: &[&str]) -> String {
    find_similar(input, options)
        .map_or_else(String::new, |s| format!("\n\nDid you mean '{s}'?"))
}

// =============================================================================
// ERROR BUILDERS
// =============================================================================

/// Unknown key inside `#[attr(...)]`.
pub fn unknown_key(span: Span, attr: &str, key: &str, valid: &[&str]) -> Error {
    Error::new(
        span,
        format!(
            "Unknown {attr} attribute '{key}'.{}\n\nValid attributes: {}",
            did_you_mean(key, valid),
            valid.join(", ")
        ),
    )
}

/// Unknown database type name.
pub fn unknown_db_type(span: Span, name: &str, valid: &[&str]) -> Error {
    Error::new(
        span,
        format!(
            "Unknown db_type '{name}'.{}\n\nValid types: {}",
            did_you_mean(name, valid),
            valid.join(", ")
        ),
    )
}
