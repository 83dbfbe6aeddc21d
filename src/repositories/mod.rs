pub(crate) mod answers;
pub(crate) mod applications;
pub(crate) mod evaluations;
pub(crate) mod users;

/// `%term%` for ILIKE with the LIKE metacharacters of `term` escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
