//! Token stream over a SQL statement.
//!
//! The lexer is deliberately forgiving: anything it does not recognise
//! becomes [`Token::Other`] and is ignored by the analyzer. Only
//! unterminated quotes and unbalanced parentheses are rejected.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::{AnalysisError, AnalysisResult};

const TOKEN_PATTERN: &str = concat!(
    r"(?P<comment>--[^\n]*|(?s:/\*.*?\*/))",
    r"|(?P<ph>#\{[^}]*\}|\$[0-9]+|\?|:[A-Za-z_][A-Za-z0-9_]*)",
    r"|(?P<str>'(?:[^']|'')*')",
    r#"|(?P<qid>"[^"]*"|`[^`]*`)"#,
    r"|(?P<word>[A-Za-z_][A-Za-z0-9_$]*)",
    r"|(?P<num>[0-9]+(?:\.[0-9]+)?)",
    r"|(?P<op><>|!=|<=|>=|::|\|\||[=<>+\-*/%])",
    r"|(?P<punct>[(),.;])",
    r"|(?P<other>\S)",
);

static TOKEN_RE: LazyLock<Result<Regex, regex_lite::Error>> =
    LazyLock::new(|| Regex::new(TOKEN_PATTERN));

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Word { text: String, quoted: bool },
    /// A bind placeholder; `name` is set for `:name` and `#{name}` forms.
    Placeholder { name: Option<String> },
    Literal,
    Op(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Other,
}

impl Token {
    /// Case-insensitive keyword test. Quoted identifiers are never keywords.
    pub(crate) fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word { text, quoted: false } if text.eq_ignore_ascii_case(keyword))
    }

    pub(crate) fn is_reserved(&self) -> bool {
        RESERVED.iter().any(|kw| self.is_keyword(kw))
    }

    /// Identifier text, if this token may name a table, alias or column.
    pub(crate) fn ident(&self) -> Option<&str> {
        match self {
            Token::Word { text, .. } if !self.is_reserved() => Some(text),
            _ => None,
        }
    }

    pub(crate) fn is_value(&self) -> bool {
        matches!(self, Token::Placeholder { .. } | Token::Literal)
    }
}

const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "IS", "NULL", "LIKE", "ILIKE",
    "BETWEEN", "AS", "ON", "USING", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS",
    "NATURAL", "GROUP", "ORDER", "BY", "LIMIT", "OFFSET", "HAVING", "UNION", "EXCEPT",
    "INTERSECT", "VALUES", "VALUE", "SET", "INTO", "UPDATE", "DELETE", "INSERT", "WINDOW",
    "FOR", "RETURNING", "DEFAULT", "FETCH", "LATERAL", "DISTINCT", "CASE", "WHEN", "THEN",
    "ELSE", "END", "EXISTS",
];

fn compiled() -> AnalysisResult<&'static Regex> {
    TOKEN_RE
        .as_ref()
        .map_err(|e| AnalysisError::Parse(format!("Regex error: {e}")))
}

/// Split `sql` into tokens, dropping whitespace and comments.
pub(crate) fn tokenize(sql: &str) -> AnalysisResult<Vec<Token>> {
    let re = compiled()?;
    let mut tokens = Vec::new();
    let mut depth: i64 = 0;

    for cap in re.captures_iter(sql) {
        let token = if cap.name("comment").is_some() {
            continue;
        } else if let Some(m) = cap.name("ph") {
            Token::Placeholder {
                name: placeholder_name(m.as_str()),
            }
        } else if cap.name("str").is_some() || cap.name("num").is_some() {
            Token::Literal
        } else if let Some(m) = cap.name("qid") {
            let raw = m.as_str();
            Token::Word {
                text: raw[1..raw.len() - 1].to_string(),
                quoted: true,
            }
        } else if let Some(m) = cap.name("word") {
            Token::Word {
                text: m.as_str().to_string(),
                quoted: false,
            }
        } else if let Some(m) = cap.name("op") {
            Token::Op(m.as_str().to_string())
        } else if let Some(m) = cap.name("punct") {
            match m.as_str() {
                "(" => {
                    depth += 1;
                    Token::LParen
                }
                ")" => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(AnalysisError::Parse(format!(
                            "unbalanced ')' at byte {}",
                            m.start()
                        )));
                    }
                    Token::RParen
                }
                "," => Token::Comma,
                "." => Token::Dot,
                _ => Token::Other,
            }
        } else if let Some(m) = cap.name("other") {
            match m.as_str() {
                "'" => {
                    return Err(AnalysisError::Parse(format!(
                        "unterminated string literal at byte {}",
                        m.start()
                    )));
                }
                "\"" | "`" => {
                    return Err(AnalysisError::Parse(format!(
                        "unterminated quoted identifier at byte {}",
                        m.start()
                    )));
                }
                _ => Token::Other,
            }
        } else {
            Token::Other
        };
        tokens.push(token);
    }

    if depth != 0 {
        return Err(AnalysisError::Parse("unbalanced parentheses".to_string()));
    }
    Ok(tokens)
}

/// `#{user.phone,jdbcType=VARCHAR}` yields `user.phone`; `:phone` yields
/// `phone`; positional forms yield nothing.
fn placeholder_name(raw: &str) -> Option<String> {
    if let Some(inner) = raw.strip_prefix("#{").and_then(|s| s.strip_suffix('}')) {
        let name = inner.split(',').next().unwrap_or_default().trim();
        return (!name.is_empty()).then(|| name.to_string());
    }
    raw.strip_prefix(':').map(str::to_string)
}
