use std::sync::OnceLock;

use regex::Regex;

use super::sql_head_regex;

/// Reduces raw model output to the SQL statement it contains.
///
/// Code-fence lines are dropped (their content is kept), role tags such as
/// `AI:` and `Answer:` / `Query:` labels are stripped per line, and the result
/// starts at the first line that opens with a SQL keyword. Returns an empty
/// string when no such line exists.
#[must_use]
pub fn extract_sql(raw: &str) -> String {
    let lines = raw
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("```"))
        .map(strip_line_labels)
        .collect::<Vec<_>>();

    let Some(start) = lines.iter().position(|line| sql_head_regex().is_match(line)) else {
        return String::new();
    };

    lines[start..]
        .iter()
        .copied()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn strip_line_labels(line: &str) -> &str {
    let mut current = line;
    loop {
        let Some(found) = line_label_regex().find(current) else {
            return current;
        };
        current = current[found.end()..].trim_start();
    }
}

fn line_label_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)^(?:system|human|ai|tool|answer|query)\s*:\s*")
            .expect("line label regex should compile")
    })
}
