//! Surface-level read-only classification of SQL scripts.
//!
//! This is not a SQL parser. It strips comments, splits the script into
//! statements and looks at keywords outside string literals and quoted
//! identifiers.

use crate::error::{QuarryError, Result};

const READ_ONLY_LEADERS: [&str; 8] = [
    "SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "VALUES", "TABLE",
];

const MUTATING_KEYWORDS: [&str; 17] = [
    "INSERT", "UPDATE", "DELETE", "MERGE", "UPSERT", "REPLACE", "CREATE", "ALTER", "DROP",
    "TRUNCATE", "GRANT", "REVOKE", "COPY", "CALL", "EXEC", "EXECUTE", "VACUUM",
];

/// Whether every statement of `sql` is read-only.
pub fn is_read_only(sql: &str) -> bool {
    ensure_read_only(sql).is_ok()
}

/// Reject scripts containing any write or DDL statement.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let statements = split_statements(&strip_comments(sql));
    if statements.is_empty() {
        return Err(QuarryError::ReadOnlyViolation(
            "empty statement".to_string(),
        ));
    }
    for statement in &statements {
        check_statement(statement)?;
    }
    Ok(())
}

fn check_statement(statement: &str) -> Result<()> {
    let words = keywords(statement);
    let Some(leader) = words.first() else {
        return Err(violation(statement, "no statement keyword"));
    };
    if !READ_ONLY_LEADERS.contains(&leader.as_str()) {
        return Err(violation(statement, &format!("{leader} is not read-only")));
    }
    match leader.as_str() {
        "SELECT" | "WITH" => {
            // `REPLACE(...)` is also a string function.
            if let Some(word) = words[1..]
                .iter()
                .find(|w| is_mutating(w) && w.as_str() != "REPLACE")
            {
                return Err(violation(statement, &format!("contains {word}")));
            }
            if words.iter().any(|w| w == "INTO") {
                return Err(violation(statement, "SELECT ... INTO writes a table"));
            }
        }
        "EXPLAIN" => {
            let analyzed = words.iter().any(|w| w == "ANALYZE" || w == "ANALYSE");
            if analyzed {
                if let Some(word) = words.iter().find(|w| is_mutating(w)) {
                    return Err(violation(
                        statement,
                        &format!("EXPLAIN ANALYZE executes {word}"),
                    ));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn is_mutating(word: &str) -> bool {
    MUTATING_KEYWORDS.contains(&word)
}

fn violation(statement: &str, reason: &str) -> QuarryError {
    let preview: String = statement.chars().take(80).collect();
    QuarryError::ReadOnlyViolation(format!("{reason}: {preview}"))
}

/// Remove `-- ...` and `/* ... */` comments outside quotes.
fn strip_comments(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                out.push(' ');
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Split on `;` outside quotes, dropping empty statements.
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None if c == ';' => {
                statements.push(std::mem::take(&mut current));
            }
            None => {
                if matches!(c, '\'' | '"' | '`') {
                    quote = Some(c);
                }
                current.push(c);
            }
        }
    }
    statements.push(current);
    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Uppercased bare words outside literals and quoted identifiers.
fn keywords(statement: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in statement.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_alphanumeric() || c == '_' || c == '$' {
            current.push(c.to_ascii_uppercase());
            continue;
        }
        if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        if matches!(c, '\'' | '"' | '`') {
            quote = Some(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
