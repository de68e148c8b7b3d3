//! SQL identifier handling.
//!
//! Every identifier pgqb emits is double-quoted, so table and column names keep their case
//! (`"chatId"`) and can never be used to smuggle SQL into a statement.
//!
//! - Unquoted input parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted input parts allow any characters except NUL and escape `"` as `""`
//! - `*` is accepted as the last part only (`user.*`)
//!
//! # Example
//! ```ignore
//! use pgqb::Ident;
//!
//! let c = Ident::parse("user.chatId")?;
//! assert_eq!(c.to_sql(), r#""user"."chatId""#);
//! # Ok::<(), pgqb::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// A named part, rendered quoted.
    Name(String),
    /// The `*` wildcard.
    Star,
}

/// A possibly dotted SQL identifier (`schema.table`, `table.column`, `table.*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// Create a single-part identifier from a name taken verbatim.
    pub fn quoted(name: &str) -> OrmResult<Self> {
        check_name(name)?;
        Ok(Self {
            parts: vec![IdentPart::Name(name.to_string())],
        })
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table`
    /// - Quoted: `"Weird.Name"."id"`
    /// - Wildcard: `user.*`
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::construction("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(OrmError::construction(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(OrmError::construction("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(OrmError::construction(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }
            if parts.last() == Some(&IdentPart::Star) {
                return Err(OrmError::construction("'*' must be the last identifier part"));
            }

            if chars.peek() == Some(&'*') {
                chars.next();
                parts.push(IdentPart::Star);
                continue;
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(OrmError::construction("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(OrmError::construction("Empty quoted identifier"));
                }
                parts.push(IdentPart::Name(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let valid = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !valid {
                    return Err(OrmError::construction(format!(
                        "Invalid character in identifier '{s}': '{c}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(OrmError::construction("Empty identifier segment"));
            }
            parts.push(IdentPart::Name(name));
        }

        Ok(Self { parts })
    }

    /// Whether the identifier ends with `*`.
    pub fn is_star(&self) -> bool {
        self.parts.last() == Some(&IdentPart::Star)
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Name(s) => push_quoted(out, s),
                IdentPart::Star => out.push('*'),
            }
        }
    }
}

fn check_name(name: &str) -> OrmResult<()> {
    if name.is_empty() {
        return Err(OrmError::construction("Empty quoted identifier"));
    }
    if name.contains('\0') {
        return Err(OrmError::construction(
            "Identifier cannot contain NUL character",
        ));
    }
    Ok(())
}

/// Quote a single name: `user` -> `"user"`, `a"b` -> `"a""b"`.
pub fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    push_quoted(&mut out, name);
    out
}

/// Quote a table name with an optional schema: `"public"."user"`.
pub fn quote_table(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote(schema), quote(name)),
        None => quote(name),
    }
}

pub(crate) fn push_quoted(out: &mut String, name: &str) {
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push_str("\"\"");
        } else {
            out.push(ch);
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        let ident = Ident::parse("users").unwrap();
        assert_eq!(ident.to_sql(), r#""users""#);
    }

    #[test]
    fn ident_keeps_case() {
        let ident = Ident::parse("message.chatId").unwrap();
        assert_eq!(ident.to_sql(), r#""message"."chatId""#);
    }

    #[test]
    fn ident_quoted_part_with_dot() {
        let ident = Ident::parse(r#""Weird.Name".id"#).unwrap();
        assert_eq!(ident.parts.len(), 2);
        assert_eq!(ident.to_sql(), r#""Weird.Name"."id""#);
    }

    #[test]
    fn ident_escapes_quotes() {
        let ident = Ident::parse(r#""a""b""#).unwrap();
        assert_eq!(ident.to_sql(), r#""a""b""#);
        assert_eq!(quote(r#"x"y"#), r#""x""y""#);
    }

    #[test]
    fn ident_star() {
        let ident = Ident::parse("user.*").unwrap();
        assert!(ident.is_star());
        assert_eq!(ident.to_sql(), r#""user".*"#);
        assert!(Ident::parse("*.id").is_err());
    }

    #[test]
    fn ident_rejects_injection() {
        assert!(Ident::parse("id; DROP TABLE users").is_err());
        assert!(Ident::parse("a b").is_err());
        assert!(Ident::parse("1abc").is_err());
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse("a.").is_err());
        assert!(Ident::parse("a\0b").is_err());
    }

    #[test]
    fn quote_table_with_schema() {
        assert_eq!(quote_table(Some("app"), "user"), r#""app"."user""#);
        assert_eq!(quote_table(None, "user"), r#""user""#);
    }
}
