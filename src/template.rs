//! `{name}` substitution for SQL files.
//!
//! `{{` and `}}` produce literal braces. A name with no value is an error
//! rather than being left in the SQL.

use crate::error::{DbError, DbResult};

use std::collections::HashMap;

pub fn render(template: &str, values: &HashMap<String, String>) -> DbResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(DbError::Template(format!(
                        "unclosed '{{' at offset {}",
                        pos
                    )));
                }
                let key = name.trim();
                let value = values
                    .get(key)
                    .ok_or_else(|| DbError::Template(format!("no value for '{{{}}}'", key)))?;
                out.push_str(value);
            }
            '}' => {
                return Err(DbError::Template(format!(
                    "single '}}' at offset {}",
                    pos
                )));
            }
            c => out.push(c),
        }
    }

    Ok(out)
}
