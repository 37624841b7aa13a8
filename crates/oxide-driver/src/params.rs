//! Placeholder rewriting.
//!
//! Statements reach the connection with positional placeholders only:
//! `:name` placeholders are replaced by the dialect's positional form and
//! their values lined up in order of appearance, and on Postgres bare `?`
//! placeholders become `$n`. Quoted strings, quoted identifiers, comments
//! and `::` casts are left alone.

use oxide_query::{Dialect, Params, SqlValue};

use crate::error::{DriverError, Result};

/// Returns the SQL to send and the positional values to bind with it.
///
/// # Errors
///
/// Returns [`DriverError::MissingParameter`] when a `:name` placeholder has
/// no value in `params`.
pub fn bind_params(dialect: Dialect, sql: &str, params: &Params) -> Result<(String, Vec<SqlValue>)> {
    match params {
        Params::None => Ok((String::from(sql), Vec::new())),
        Params::Positional(values) => {
            let sql = if dialect == Dialect::Postgres {
                rewrite(dialect, sql, |_, _| Ok(None))?
            } else {
                String::from(sql)
            };
            Ok((sql, values.clone()))
        }
        Params::Named(named) => {
            let mut values = Vec::new();
            let sql = rewrite(dialect, sql, |name, position| {
                let value = named
                    .iter()
                    .rev()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| DriverError::MissingParameter(String::from(name)))?;
                values.push(value);
                Ok(Some(dialect.placeholder(position)))
            })?;
            Ok((sql, values))
        }
    }
}

/// Walks `sql` outside quotes and comments. `named` is called for each
/// `:name` with its 1-based position and returns the replacement; `?` is
/// numbered for Postgres.
fn rewrite<F>(dialect: Dialect, sql: &str, mut named: F) -> Result<String>
where
    F: FnMut(&str, usize) -> Result<Option<String>>,
{
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut position = 0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let end = skip_quoted(dialect, &chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&c| c == '\n')
                    .map_or(chars.len(), |offset| i + offset);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = chars[i + 2..]
                    .windows(2)
                    .position(|pair| pair == ['*', '/'])
                    .map_or(chars.len(), |offset| i + 2 + offset + 2);
                out.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).is_some_and(|&c| c.is_ascii_alphabetic() || c == '_') => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&c| !(c.is_ascii_alphanumeric() || c == '_'))
                    .map_or(chars.len(), |offset| start + offset);
                let name: String = chars[start..end].iter().collect();
                position += 1;
                match named(&name, position)? {
                    Some(replacement) => out.push_str(&replacement),
                    None => {
                        position -= 1;
                        out.push(':');
                        out.push_str(&name);
                    }
                }
                i = end;
            }
            '?' if dialect == Dialect::Postgres => {
                position += 1;
                out.push_str(&dialect.placeholder(position));
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Returns the index just past the quoted section starting at `start`.
/// A doubled quote stays inside the section; MySQL also honours backslash
/// escapes in strings.
fn skip_quoted(dialect: Dialect, chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && dialect == Dialect::MySql && quote != '`' {
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}
