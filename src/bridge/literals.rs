//! String-literal table of a compiled query
//!
//! The query engine keeps one table of the string values its predicates
//! refer to: predicate operator names (`eq?`, `set!`) and string or bare-word
//! arguments, deduplicated in order of first appearance. The Rust binding
//! does not expose that table, so it is rebuilt here from the query source.
//! The source has already compiled successfully, which keeps the scan simple.

/// Collect the string table for `source`
pub fn string_literals(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut table: Vec<String> = Vec::new();
    // One entry per open parenthesis: whether it opened a predicate
    let mut predicates: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let in_predicate = predicates.last() == Some(&true);
        match chars[i] {
            ';' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' => {
                let (value, next) = read_string(&chars, i + 1);
                if in_predicate {
                    insert(&mut table, value);
                }
                i = next;
                continue;
            }
            '(' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == '#' {
                    let (name, next) = read_identifier(&chars, j + 1);
                    insert(&mut table, name);
                    predicates.push(true);
                    i = next;
                    continue;
                }
                predicates.push(false);
            }
            ')' => {
                predicates.pop();
            }
            '@' => {
                let (_, next) = read_identifier(&chars, i + 1);
                i = next;
                continue;
            }
            c if in_predicate && is_identifier_start(c) => {
                let (word, next) = read_identifier(&chars, i);
                insert(&mut table, word);
                i = next;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    table
}

fn insert(table: &mut Vec<String>, value: String) {
    if !table.contains(&value) {
        table.push(value);
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '?' | '!')
}

fn read_identifier(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && is_identifier_char(chars[end]) {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

/// Read a string body starting after the opening quote; returns the
/// unescaped value and the index after the closing quote.
fn read_string(chars: &[char], start: usize) -> (String, usize) {
    let mut value = String::new();
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '"' => return (value, i + 1),
            '\\' if i + 1 < chars.len() => {
                value.push(match chars[i + 1] {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    '0' => '\0',
                    other => other,
                });
                i += 2;
            }
            c => {
                value.push(c);
                i += 1;
            }
        }
    }
    (value, i)
}
