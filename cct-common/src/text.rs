//! Name normalization helpers

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strip diacritics so "Velázquez" sorts next to "Velazquez"
pub fn normalize_for_sorting(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Sort key for a "First Last" display name: (last word, first word)
pub fn name_sort_key(full_name: &str) -> (String, String) {
    let mut words = full_name.split_whitespace();
    let first = words.next().unwrap_or("");
    let last = full_name.split_whitespace().last().unwrap_or("");
    (
        normalize_for_sorting(last).to_lowercase(),
        normalize_for_sorting(first).to_lowercase(),
    )
}
