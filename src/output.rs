//! Line splitting for reports

/// Split each raw result into its lines.
///
/// Lines are split on `\n` (a preceding `\r` is dropped) and empty lines are
/// kept, so `"a\n\nb"` gives `["a", "", "b"]`. One inner list per result, in
/// the same order.
pub fn to_lines<S: AsRef<str>>(results: &[S]) -> Vec<Vec<String>> {
    results
        .iter()
        .map(|r| {
            r.as_ref()
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect()
        })
        .collect()
}
