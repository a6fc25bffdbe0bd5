//! Keyword-driven analyzer over the [`lexer`](crate::lexer) token stream.

use std::collections::HashMap;

use crate::lexer::{Token, tokenize};
use crate::{AnalysisError, AnalysisResult, ParamBinding, SqlAnalyzer, TableRef};

const TABLE_KEYWORDS: &[&str] = &["FROM", "JOIN", "UPDATE", "INTO"];
const COMPARISONS: &[&str] = &["=", "<>", "!=", "<", ">", "<=", ">="];

/// Analyzer for the statement shapes ORMs generate.
///
/// Tables are read after `FROM` (including comma lists), `JOIN`, `UPDATE`
/// and `INTO`. A placeholder is attributed to a column when it is the
/// right-hand side of a comparison, `LIKE`, `BETWEEN` or `IN (...)`
/// list, the value of a `SET` assignment, or an element of an
/// `INSERT ... VALUES` tuple. Anything else gets an empty column.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexSqlAnalyzer;

impl RegexSqlAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl SqlAnalyzer for RegexSqlAnalyzer {
    fn tables(&self, sql: &str) -> AnalysisResult<Vec<TableRef>> {
        let tokens = lex(sql)?;
        Ok(collect_tables(&tokens))
    }

    fn param_bindings(&self, sql: &str) -> AnalysisResult<Vec<ParamBinding>> {
        let tokens = lex(sql)?;
        Ok(collect_bindings(&tokens))
    }
}

fn lex(sql: &str) -> AnalysisResult<Vec<Token>> {
    if sql.trim().is_empty() {
        return Err(AnalysisError::EmptySql);
    }
    tokenize(sql)
}

fn collect_tables(tokens: &[Token]) -> Vec<TableRef> {
    let mut tables: Vec<TableRef> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let keyword = &tokens[i];
        i += 1;
        if !TABLE_KEYWORDS.iter().any(|kw| keyword.is_keyword(kw)) {
            continue;
        }
        let comma_list = keyword.is_keyword("FROM");

        while let Some((table, next)) = table_ref_at(tokens, i) {
            i = next;
            if !tables.iter().any(|t| t.name.eq_ignore_ascii_case(&table.name)) {
                tables.push(table);
            }
            if comma_list && matches!(tokens.get(i), Some(Token::Comma)) {
                i += 1;
                continue;
            }
            break;
        }
    }
    tables
}

fn table_ref_at(tokens: &[Token], start: usize) -> Option<(TableRef, usize)> {
    let (segments, mut i) = qualified_name_at(tokens, start)?;
    let name = segments.last()?.clone();

    let mut alias = None;
    if tokens.get(i).is_some_and(|t| t.is_keyword("AS")) {
        i += 1;
    }
    if let Some(a) = tokens.get(i).and_then(Token::ident) {
        alias = Some(a.to_string());
        i += 1;
    }
    Some((TableRef { name, alias }, i))
}

/// Reads `a.b.c` starting at `start`; returns the segments and the index
/// just past the name.
fn qualified_name_at(tokens: &[Token], start: usize) -> Option<(Vec<String>, usize)> {
    let mut segments = vec![tokens.get(start)?.ident()?.to_string()];
    let mut i = start + 1;
    while matches!(tokens.get(i), Some(Token::Dot)) {
        match tokens.get(i + 1).and_then(Token::ident) {
            Some(seg) => {
                segments.push(seg.to_string());
                i += 2;
            }
            None => break,
        }
    }
    Some((segments, i))
}

/// Column whose last token sits at `end`, optionally qualified.
fn column_ending_at(tokens: &[Token], end: usize) -> Option<String> {
    let column = tokens.get(end)?.ident()?;
    let qualifier = end
        .checked_sub(2)
        .filter(|_| matches!(tokens.get(end - 1), Some(Token::Dot)))
        .and_then(|q| tokens[q].ident());
    Some(match qualifier {
        Some(q) => format!("{q}.{column}"),
        None => column.to_string(),
    })
}

/// Column left of the operator at `op`, skipping a `NOT` in between.
fn column_before_operator(tokens: &[Token], op: usize) -> Option<String> {
    let mut end = op.checked_sub(1)?;
    if tokens[end].is_keyword("NOT") {
        end = end.checked_sub(1)?;
    }
    column_ending_at(tokens, end)
}

fn column_before(tokens: &[Token], pos: usize) -> Option<String> {
    let prev = pos.checked_sub(1)?;
    match &tokens[prev] {
        Token::Op(op) if COMPARISONS.contains(&op.as_str()) => column_before_operator(tokens, prev),
        t if t.is_keyword("LIKE") || t.is_keyword("ILIKE") || t.is_keyword("BETWEEN") => {
            column_before_operator(tokens, prev)
        }
        t if t.is_keyword("AND") => {
            let between = prev.checked_sub(2)?;
            if tokens[prev - 1].is_value() && tokens[between].is_keyword("BETWEEN") {
                column_before_operator(tokens, between)
            } else {
                None
            }
        }
        Token::Comma | Token::LParen => in_list_column(tokens, prev),
        _ => None,
    }
}

/// `col IN (?, ?, ?)`: walks back over the list to its opening parenthesis.
fn in_list_column(tokens: &[Token], from: usize) -> Option<String> {
    let mut k = from;
    while matches!(tokens[k], Token::Comma) || tokens[k].is_value() {
        k = k.checked_sub(1)?;
    }
    if !matches!(tokens[k], Token::LParen) {
        return None;
    }
    let keyword = k.checked_sub(1)?;
    if tokens[keyword].is_keyword("IN") {
        column_before_operator(tokens, keyword)
    } else {
        None
    }
}

/// `? = col`
fn column_after(tokens: &[Token], pos: usize) -> Option<String> {
    match tokens.get(pos + 1)? {
        Token::Op(op) if COMPARISONS.contains(&op.as_str()) => {
            let (segments, _) = qualified_name_at(tokens, pos + 2)?;
            let n = segments.len();
            Some(segments[n.saturating_sub(2)..].join("."))
        }
        _ => None,
    }
}

/// Maps token positions of placeholders inside `INSERT ... VALUES` tuples
/// to the column declared at the same position.
fn insert_columns(tokens: &[Token]) -> HashMap<usize, String> {
    let mut out = HashMap::new();
    let Some(insert) = tokens.iter().position(|t| t.is_keyword("INSERT")) else {
        return out;
    };
    let Some(into) = tokens[insert..].iter().position(|t| t.is_keyword("INTO")) else {
        return out;
    };
    let Some((_, mut i)) = qualified_name_at(tokens, insert + into + 1) else {
        return out;
    };

    if !matches!(tokens.get(i), Some(Token::LParen)) {
        return out;
    }
    i += 1;
    let mut columns = Vec::new();
    loop {
        match tokens.get(i).and_then(Token::ident) {
            Some(column) => {
                columns.push(column.to_string());
                i += 1;
            }
            None => return out,
        }
        match tokens.get(i) {
            Some(Token::Comma) => i += 1,
            Some(Token::RParen) => {
                i += 1;
                break;
            }
            _ => return out,
        }
    }

    if !tokens
        .get(i)
        .is_some_and(|t| t.is_keyword("VALUES") || t.is_keyword("VALUE"))
    {
        return out;
    }
    i += 1;

    // One or more tuples; only placeholders directly inside a tuple count.
    let mut depth = 0usize;
    let mut position = 0usize;
    while let Some(token) = tokens.get(i) {
        match token {
            Token::LParen => {
                depth += 1;
                if depth == 1 {
                    position = 0;
                }
            }
            Token::RParen => {
                depth = depth.saturating_sub(1);
            }
            Token::Comma if depth == 1 => position += 1,
            Token::Comma if depth == 0 => {}
            Token::Placeholder { .. } if depth == 1 => {
                if let Some(column) = columns.get(position) {
                    out.insert(i, column.clone());
                }
            }
            _ if depth == 0 => break,
            _ => {}
        }
        i += 1;
    }
    out
}

fn collect_bindings(tokens: &[Token]) -> Vec<ParamBinding> {
    let inserts = insert_columns(tokens);
    let mut bindings = Vec::new();

    for (pos, token) in tokens.iter().enumerate() {
        let Token::Placeholder { name } = token else {
            continue;
        };
        let column = inserts
            .get(&pos)
            .cloned()
            .or_else(|| column_before(tokens, pos))
            .or_else(|| column_after(tokens, pos))
            .unwrap_or_default();
        bindings.push(ParamBinding {
            index: bindings.len(),
            column,
            placeholder: name.clone(),
        });
    }
    bindings
}
