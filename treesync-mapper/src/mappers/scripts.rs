//! Conversion between code files and script lists.

/// Splits a code file into scripts. SQL is split into statements on lines
/// ending with `;`, other languages form a single script.
pub fn parse(content: &str, ext: &str) -> Vec<String> {
    if ext != "sql" {
        let script = content.trim();
        return if script.is_empty() {
            Vec::new()
        } else {
            vec![script.to_string()]
        };
    }

    let mut scripts = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
        if line.trim_end().ends_with(';') {
            push_trimmed(&mut scripts, &current);
            current.clear();
        }
    }
    push_trimmed(&mut scripts, &current);
    scripts
}

fn push_trimmed(scripts: &mut Vec<String>, script: &str) {
    let script = script.trim();
    if !script.is_empty() {
        scripts.push(script.to_string());
    }
}

/// Joins scripts into a code file.
pub fn join(scripts: &[String]) -> String {
    let mut out = scripts
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push('\n');
    out
}

/// Extension of a `code.<ext>` file name.
pub fn file_ext(file_name: &str) -> &str {
    file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("SELECT 1;\nSELECT 2;\n", &["SELECT 1;", "SELECT 2;"])]
    #[case("CREATE TABLE x\n  AS SELECT 1;\n\n\nSELECT 2", &["CREATE TABLE x\n  AS SELECT 1;", "SELECT 2"])]
    #[case("  \n", &[])]
    fn splits_sql_statements(#[case] input: &str, #[case] expected: &[&str]) {
        assert_eq!(parse(input, "sql"), expected);
    }

    #[test]
    fn other_languages_are_one_script() {
        assert_eq!(parse("import x\n\nprint(x);\n", "py"), vec!["import x\n\nprint(x);"]);
    }

    #[test]
    fn join_separates_with_blank_line() {
        let scripts = vec!["SELECT 1;".to_string(), "SELECT 2;".to_string()];
        assert_eq!(join(&scripts), "SELECT 1;\n\nSELECT 2;\n");
        assert_eq!(parse(&join(&scripts), "sql"), scripts);
    }

    #[test]
    fn ext_of_code_file() {
        assert_eq!(file_ext("code.sql"), "sql");
        assert_eq!(file_ext("code"), "");
    }
}
