/// Normalizes an object name into a path segment:
/// `camelCase` becomes `camel-case`, everything is lowercased, runs of other
/// characters collapse into a single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev: Option<char> = None;
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            let camel_boundary = ch.is_uppercase()
                && prev.map(|p| p.is_lowercase() || p.is_ascii_digit()).unwrap_or(false);
            if (pending_dash || camel_boundary) && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
        prev = Some(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("branchName", "branch-name")]
    #[case("Task 1", "task-1")]
    #[case("  My  Config!!", "my-config")]
    #[case("already-kebab", "already-kebab")]
    #[case("snake_case_name", "snake-case-name")]
    #[case("Žluťoučký kůň", "žluťoučký-kůň")]
    #[case("", "")]
    #[case("---", "")]
    fn normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_name(input), expected);
    }
}
