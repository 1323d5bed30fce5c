use crate::pipeline::domain::fold_case;

/// Canonical form used to compare CSV headers: invisible BOM/zero-width characters removed,
/// whitespace collapsed, lowercase.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    fold_case(&collapsed)
}
