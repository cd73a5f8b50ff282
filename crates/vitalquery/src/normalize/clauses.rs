use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

/// Byte range of the outermost SELECT list (between SELECT and the first FROM).
pub(super) fn select_list(sql: &str) -> Option<Range<usize>> {
    select_list_regex()
        .captures(sql)
        .and_then(|captures| captures.get(1))
        .map(|list| list.range())
}

pub(super) fn replace_select_list(sql: &str, replacement: &str) -> String {
    match select_list(sql) {
        Some(range) => format!("{}{replacement}{}", &sql[..range.start], &sql[range.end..]),
        None => sql.to_string(),
    }
}

/// Splits on commas outside parentheses and string literals.
pub(super) fn split_top_level_commas(list: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0_usize;
    let mut in_literal = false;
    let mut start = 0;
    for (index, ch) in list.char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => depth = depth.saturating_sub(1),
            ',' if !in_literal && depth == 0 => {
                items.push(list[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    items.push(list[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

/// Offset of the first GROUP BY / HAVING / ORDER BY / LIMIT keyword.
pub(super) fn tail_clause_start(sql: &str) -> Option<usize> {
    tail_clause_regex().find(sql).map(|found| found.start())
}

pub(super) fn aggregate_call_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(AVG|SUM|MIN|MAX|COUNT)\s*\(").expect("aggregate call regex should compile")
    })
}

pub(super) fn group_by_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?i)\bGROUP\s+BY\b").expect("group by regex should compile"))
}

pub(super) fn order_by_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?i)\bORDER\s+BY\b").expect("order by regex should compile"))
}

pub(super) fn order_by_aggregate_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\bORDER\s+BY\s+(?:AVG|SUM|MIN|MAX|COUNT)\s*\(")
            .expect("order by aggregate regex should compile")
    })
}

fn select_list_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?is)^\s*SELECT\s+(.*?)\s+FROM\s").expect("select list regex should compile")
    })
}

fn tail_clause_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(?:GROUP\s+BY|HAVING|ORDER\s+BY|LIMIT)\b")
            .expect("tail clause regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use super::{replace_select_list, select_list, split_top_level_commas, tail_clause_start};

    #[test]
    fn select_list_stops_at_first_from() {
        let sql = "SELECT e.timestamp, e.stress FROM event e";
        let range = select_list(sql).expect("select list should be found");
        assert_eq!(&sql[range], "e.timestamp, e.stress");
        assert_eq!(
            replace_select_list(sql, "e.stress"),
            "SELECT e.stress FROM event e"
        );
    }

    #[test]
    fn commas_inside_calls_and_literals_do_not_split() {
        assert_eq!(
            split_top_level_commas("u.name, ROUND(AVG(e.hrv), 1), 'a,b'"),
            vec!["u.name", "ROUND(AVG(e.hrv), 1)", "'a,b'"]
        );
    }

    #[test]
    fn tail_clause_finds_earliest_keyword() {
        let sql = "SELECT e.hrv FROM event e ORDER BY e.hrv LIMIT 1";
        assert_eq!(tail_clause_start(sql), sql.find("ORDER"));
    }
}
