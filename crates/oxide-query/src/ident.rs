//! Identifier protection.
//!
//! Table and column names are split into their dotted parts
//! (`schema.table.column`), each part is quoted with the dialect's quote
//! character, and an optional alias is appended. Expressions such as
//! `COUNT(*) AS total` are recognised and kept verbatim.

use crate::dialect::Dialect;
use crate::error::{QueryError, Result};

/// A protected reference to a table, column, or raw expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    parts: Vec<String>,
    alias: Option<String>,
    raw: bool,
}

impl Identifier {
    /// Creates an identifier from already-split, unquoted parts.
    pub fn new<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() || parts.iter().any(String::is_empty) {
            return Err(QueryError::Validation(String::from(
                "identifier parts must not be empty",
            )));
        }
        Ok(Self {
            parts,
            alias: None,
            raw: false,
        })
    }

    /// Creates a raw expression that is emitted verbatim.
    pub fn raw(expression: impl Into<String>) -> Self {
        Self {
            parts: vec![expression.into()],
            alias: None,
            raw: true,
        }
    }

    /// Sets the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        self.alias = if alias.is_empty() { None } else { Some(alias) };
        self
    }

    /// Returns the unquoted name parts.
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Returns the alias, if any.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns true when the identifier is a raw expression.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.raw
    }

    /// Returns the last part: the column of `t.c`, the table of `s.t`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.parts.last().map_or("", String::as_str)
    }

    /// Returns the part before the last one, if any.
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        let len = self.parts.len();
        (len >= 2).then(|| self.parts[len - 2].as_str())
    }

    /// Returns the part two before the last one, if any.
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        let len = self.parts.len();
        (len >= 3).then(|| self.parts[len - 3].as_str())
    }

    /// Renders the identifier for `dialect` without its alias.
    #[must_use]
    pub fn to_sql_unaliased(&self, dialect: Dialect) -> String {
        if self.raw {
            self.parts.concat()
        } else {
            self.parts
                .iter()
                .map(|part| dialect.quote_identifier(part))
                .collect::<Vec<_>>()
                .join(".")
        }
    }

    /// Renders the identifier for `dialect`.
    #[must_use]
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = self.to_sql_unaliased(dialect);
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }
        sql
    }

    /// Re-parses SQL produced by [`Identifier::to_sql`].
    pub fn parse(sql: &str, dialect: Dialect) -> Result<Self> {
        let quote = dialect.identifier_quote();
        let words = split_words(sql, quote)?;
        let (name, alias) = match words.as_slice() {
            [name] => (name.as_str(), None),
            [name, kw, alias] if kw.eq_ignore_ascii_case("AS") => {
                (name.as_str(), Some(alias.as_str()))
            }
            _ => {
                return Err(QueryError::Validation(format!(
                    "cannot parse identifier: {sql}"
                )))
            }
        };
        let mut ident = Self::new(split_parts(name, quote)?)?;
        if let Some(alias) = alias {
            let mut alias_parts = split_parts(alias, quote)?;
            if alias_parts.len() != 1 {
                return Err(QueryError::Validation(format!("invalid alias: {alias}")));
            }
            ident.alias = alias_parts.pop();
        }
        Ok(ident)
    }
}

/// Protects a table or column name for `dialect`.
///
/// `name` may be dotted (`schema.table.column`), may already contain quoted
/// parts, and may carry its own alias (`users u`, `users AS u`). An explicit
/// non-empty `alias` takes precedence. With `as_source` set, anything that is
/// not a plain name with an optional alias is rejected; otherwise it is kept
/// as a raw expression.
pub fn protect_identifier(
    dialect: Dialect,
    name: &str,
    alias: Option<&str>,
    as_source: bool,
) -> Result<Identifier> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(QueryError::Validation(String::from(
            "identifier name must not be empty",
        )));
    }
    let alias = alias.map(str::trim).filter(|a| !a.is_empty());

    if trimmed.contains('(') {
        let ident = Identifier::raw(trimmed);
        return Ok(match alias {
            Some(alias) => ident.with_alias(alias),
            None => ident,
        });
    }

    let quote = dialect.identifier_quote();
    let words = split_words(trimmed, quote)?;
    let (base, inline_alias) = match words.as_slice() {
        [base] => (base.as_str(), None),
        [base, alias] => (base.as_str(), Some(alias.as_str())),
        [base, kw, alias] if kw.eq_ignore_ascii_case("AS") => {
            (base.as_str(), Some(alias.as_str()))
        }
        _ if as_source => {
            return Err(QueryError::Validation(format!(
                "invalid table reference: {trimmed}"
            )))
        }
        _ => return Ok(Identifier::raw(trimmed)),
    };

    let mut ident = Identifier::new(split_parts(base, quote)?)?;
    if let Some(alias) = alias.or(inline_alias) {
        let mut alias_parts = split_parts(alias, quote)?;
        if alias_parts.len() != 1 {
            return Err(QueryError::Validation(format!("invalid alias: {alias}")));
        }
        ident.alias = alias_parts.pop();
    }
    Ok(ident)
}

/// Protects an ORDER BY / GROUP BY term, keeping a trailing direction.
pub fn protect_ordering(dialect: Dialect, term: &str) -> Result<String> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return Err(QueryError::Validation(String::from(
            "ordering term must not be empty",
        )));
    }
    if trimmed.contains('(') {
        return Ok(String::from(trimmed));
    }
    let words = split_words(trimmed, dialect.identifier_quote())?;
    let (column, direction) = match words.as_slice() {
        [column] => (column.as_str(), None),
        [column, dir] if is_direction(dir) => (column.as_str(), Some(dir.to_ascii_uppercase())),
        _ => return Ok(String::from(trimmed)),
    };
    let mut sql = protect_identifier(dialect, column, None, false)?.to_sql(dialect);
    if let Some(direction) = direction {
        sql.push(' ');
        sql.push_str(&direction);
    }
    Ok(sql)
}

fn is_direction(word: &str) -> bool {
    word.eq_ignore_ascii_case("ASC") || word.eq_ignore_ascii_case("DESC")
}

/// Splits on whitespace outside quoted sections.
///
/// A quote character only opens a quoted section at the start of a name
/// part, so bare names may contain it.
fn split_words(input: &str, quote: char) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut just_closed = false;
    for c in input.chars() {
        let closing = quoted && c == quote;
        if quoted {
            quoted = !closing;
            current.push(c);
        } else if c == quote && (current.is_empty() || current.ends_with('.') || just_closed) {
            // opening quote, or the second half of a doubled quote
            quoted = true;
            current.push(c);
        } else if c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
        just_closed = closing;
    }
    if quoted {
        return Err(QueryError::Validation(format!(
            "unterminated quoted identifier: {input}"
        )));
    }
    if !current.is_empty() {
        words.push(current);
    }
    Ok(words)
}

/// Splits a dotted name into unquoted parts.
fn split_parts(input: &str, quote: char) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        let mut part = String::new();
        if chars.peek() == Some(&quote) {
            chars.next();
            loop {
                match chars.next() {
                    Some(c) if c == quote => {
                        if chars.peek() == Some(&quote) {
                            chars.next();
                            part.push(quote);
                        } else {
                            break;
                        }
                    }
                    Some(c) => part.push(c),
                    None => {
                        return Err(QueryError::Validation(format!(
                            "unterminated quoted identifier: {input}"
                        )))
                    }
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                part.push(c);
                chars.next();
            }
        }
        if part.is_empty() {
            return Err(QueryError::Validation(format!(
                "empty identifier part in: {input}"
            )));
        }
        parts.push(part);
        match chars.next() {
            None => return Ok(parts),
            Some('.') => {}
            Some(c) => {
                return Err(QueryError::Validation(format!(
                    "unexpected '{c}' in identifier: {input}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protect_simple_name() {
        let ident = protect_identifier(Dialect::Postgres, "users", None, true).unwrap();
        assert_eq!(ident.to_sql(Dialect::Postgres), "\"users\"");
        assert_eq!(ident.to_sql(Dialect::MySql), "`users`");
    }

    #[test]
    fn test_protect_dotted_name() {
        let ident = protect_identifier(Dialect::MySql, "app.users.id", None, false).unwrap();
        assert_eq!(ident.to_sql(Dialect::MySql), "`app`.`users`.`id`");
        assert_eq!(ident.schema(), Some("app"));
        assert_eq!(ident.qualifier(), Some("users"));
        assert_eq!(ident.name(), "id");
    }

    #[test]
    fn test_protect_star() {
        let ident = protect_identifier(Dialect::Sqlite, "u.*", None, false).unwrap();
        assert_eq!(ident.to_sql(Dialect::Sqlite), "\"u\".*");
    }

    #[test]
    fn test_protect_inline_alias() {
        let short = protect_identifier(Dialect::Postgres, "users u", None, true).unwrap();
        assert_eq!(short.to_sql(Dialect::Postgres), "\"users\" AS \"u\"");
        let long = protect_identifier(Dialect::Postgres, "users AS u", None, true).unwrap();
        assert_eq!(long, short);
    }

    #[test]
    fn test_protect_explicit_alias_wins() {
        let ident = protect_identifier(Dialect::MySql, "users u", Some("x"), true).unwrap();
        assert_eq!(ident.to_sql(Dialect::MySql), "`users` AS `x`");
    }

    #[test]
    fn test_protect_doubles_embedded_quotes() {
        let ident = protect_identifier(Dialect::Postgres, "we\"ird", None, false).unwrap();
        assert_eq!(ident.to_sql(Dialect::Postgres), "\"we\"\"ird\"");
    }

    #[test]
    fn test_protect_expression_is_raw() {
        let ident =
            protect_identifier(Dialect::Postgres, "COUNT(*) AS total_items", None, false).unwrap();
        assert!(ident.is_raw());
        assert_eq!(ident.to_sql(Dialect::Postgres), "COUNT(*) AS total_items");
    }

    #[test]
    fn test_protect_empty_name_fails() {
        let err = protect_identifier(Dialect::MySql, "  ", None, false).unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
        let err = protect_identifier(Dialect::MySql, "a..b", None, false).unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
    }

    #[test]
    fn test_protect_rejects_garbage_source() {
        let err = protect_identifier(Dialect::MySql, "a b c d", None, true).unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
    }

    #[test]
    fn test_round_trip_recovers_parts() {
        for dialect in [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite] {
            for name in ["users", "public.users", "db.users.id", "odd`na\"me.col"] {
                let ident = protect_identifier(dialect, name, Some("al"), false).unwrap();
                let parsed = Identifier::parse(&ident.to_sql(dialect), dialect).unwrap();
                assert_eq!(parsed, ident, "{dialect}: {name}");
            }
        }
    }

    #[test]
    fn test_quoted_dot_survives_round_trip() {
        let ident = Identifier::new(["my.schema", "t"]).unwrap();
        let sql = ident.to_sql(Dialect::Postgres);
        assert_eq!(sql, "\"my.schema\".\"t\"");
        assert_eq!(Identifier::parse(&sql, Dialect::Postgres).unwrap(), ident);
    }

    #[test]
    fn test_protect_ordering() {
        assert_eq!(
            protect_ordering(Dialect::Postgres, "name desc").unwrap(),
            "\"name\" DESC"
        );
        assert_eq!(protect_ordering(Dialect::MySql, "u.id").unwrap(), "`u`.`id`");
        assert_eq!(
            protect_ordering(Dialect::MySql, "FIELD(id, 3, 1)").unwrap(),
            "FIELD(id, 3, 1)"
        );
    }
}
