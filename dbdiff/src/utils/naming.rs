//! Identifier utilities for dbdiff
//!
//! Table and column names come from the catalogs being compared and are
//! spliced into introspection queries, so they are always quoted.

/// Quote character used by a backend for delimited identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `"name"`, used by PostgreSQL and SQLite
    Ansi,
    /// `` `name` ``, used by MySQL
    Backtick,
}

impl QuoteStyle {
    fn quote_char(self) -> char {
        match self {
            QuoteStyle::Ansi => '"',
            QuoteStyle::Backtick => '`',
        }
    }
}

/// Quote an identifier, doubling any embedded quote characters
pub fn quote_ident(name: &str, style: QuoteStyle) -> String {
    let quote = style.quote_char();
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(quote);
    for ch in name.chars() {
        if ch == quote {
            quoted.push(quote);
        }
        quoted.push(ch);
    }
    quoted.push(quote);
    quoted
}

/// Quote a column list and wrap each entry in `wrap` (e.g. a text cast)
pub fn select_list<F>(columns: &[String], style: QuoteStyle, wrap: F) -> String
where
    F: Fn(&str) -> String,
{
    columns
        .iter()
        .map(|column| wrap(&quote_ident(column, style)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_escapes() {
        assert_eq!(quote_ident("orders", QuoteStyle::Ansi), "\"orders\"");
        assert_eq!(quote_ident("we\"ird", QuoteStyle::Ansi), "\"we\"\"ird\"");
        assert_eq!(quote_ident("a`b", QuoteStyle::Backtick), "`a``b`");
    }

    #[test]
    fn builds_select_lists() {
        let columns = vec!["id".to_string(), "total".to_string()];
        assert_eq!(
            select_list(&columns, QuoteStyle::Ansi, |c| format!("{}::text", c)),
            "\"id\"::text, \"total\"::text"
        );
    }
}
