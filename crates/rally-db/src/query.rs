//! Small helpers for building parameterised SQL.

/// Returns a comma separated list of numbered placeholders.
///
/// `placeholders(3, 2)` yields `"?3, ?4"`. Callers bind one value per
/// placeholder in the same order.
pub fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ")
}
