//! Identifier normalisation and parameter-name heuristics.
//!
//! Parameter names come from application code (`userPhone`, `param.phone`,
//! `list[0].phoneNumber`) while registry keys come from the schema
//! (`phone_number`). Matching tries the raw name plus its snake_case and
//! camelCase forms.

use serde::{Deserialize, Serialize};

/// How the backend folds unquoted identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierCase {
    #[default]
    Lower,
    Upper,
    Sensitive,
}

impl IdentifierCase {
    /// Quote-stripped, trimmed and case-folded identifier.
    pub fn normalize(self, ident: &str) -> String {
        let clean = clear_sql_quotes(ident);
        match self {
            IdentifierCase::Lower => clean.to_lowercase(),
            IdentifierCase::Upper => clean.to_uppercase(),
            IdentifierCase::Sensitive => clean,
        }
    }
}

/// Strips identifier quoting (`` ` ``, `"`, `[ ]`) and surrounding whitespace.
pub fn clear_sql_quotes(ident: &str) -> String {
    ident
        .trim()
        .chars()
        .filter(|c| !matches!(c, '`' | '"' | '[' | ']'))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Last segment of a dotted property path. A trailing dot is kept as-is.
pub fn extract_field_name(property: &str) -> &str {
    match property.rsplit_once('.') {
        Some((_, last)) if !last.is_empty() => last,
        _ => property,
    }
}

/// `param.userId` -> `userId`, `list[0].phone` -> `phone`, `items[2]` -> `items`.
pub fn clean_parameter_name(property: &str) -> &str {
    let field = extract_field_name(property);
    match field.find('[') {
        Some(0) | None => field,
        Some(bracket) => &field[..bracket],
    }
}

/// The raw name plus its snake_case and camelCase forms, deduplicated,
/// raw first.
pub fn name_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    for v in [camel_to_snake(name), snake_to_camel(name)] {
        if !variants.contains(&v) {
            variants.push(v);
        }
    }
    variants
}

/// Case-insensitive match across name variants.
pub fn names_match(a: &str, b: &str) -> bool {
    let b_variants = name_variants(b);
    name_variants(a)
        .iter()
        .any(|x| b_variants.iter().any(|y| x.eq_ignore_ascii_case(y)))
}

pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_to_snake_cases() {
        assert_eq!(camel_to_snake("userName"), "user_name");
        assert_eq!(camel_to_snake("ID"), "id");
        assert_eq!(camel_to_snake("myBatisPlus"), "my_batis_plus");
        assert_eq!(camel_to_snake("phoneNumber"), "phone_number");
        assert_eq!(camel_to_snake("phone_number"), "phone_number");
        assert_eq!(camel_to_snake("address2Line"), "address2_line");
    }

    #[test]
    fn snake_to_camel_cases() {
        assert_eq!(snake_to_camel("user_name"), "userName");
        assert_eq!(snake_to_camel("_id"), "Id");
        assert_eq!(snake_to_camel("phone"), "phone");
    }

    #[test]
    fn parameter_name_cleaning() {
        assert_eq!(clean_parameter_name("param.userId"), "userId");
        assert_eq!(clean_parameter_name("arg.phoneNo"), "phoneNo");
        assert_eq!(clean_parameter_name("list[0].phone"), "phone");
        assert_eq!(clean_parameter_name("items[2]"), "items");
        assert_eq!(extract_field_name("user.address.city"), "city");
        assert_eq!(extract_field_name("field."), "field.");
        assert_eq!(extract_field_name("plain"), "plain");
    }

    #[test]
    fn quotes_are_cleared() {
        assert_eq!(clear_sql_quotes(" `user` "), "user");
        assert_eq!(clear_sql_quotes("\"Phone\""), "Phone");
        assert_eq!(clear_sql_quotes("[order]"), "order");
    }

    #[test]
    fn normalization_follows_case_rule() {
        assert_eq!(IdentifierCase::Lower.normalize("`User`"), "user");
        assert_eq!(IdentifierCase::Upper.normalize("user"), "USER");
        assert_eq!(IdentifierCase::Sensitive.normalize("User"), "User");
    }

    #[test]
    fn variants_and_matching() {
        assert_eq!(name_variants("userPhone"), vec!["userPhone", "user_phone"]);
        assert_eq!(name_variants("phone_number"), vec!["phone_number", "phoneNumber"]);
        assert!(names_match("phoneNumber", "PHONE_NUMBER"));
        assert!(names_match("phone", "Phone"));
        assert!(!names_match("phone", "email"));
    }

    #[test]
    fn capitalize_first_char() {
        assert_eq!(capitalize("active"), "Active");
        assert_eq!(capitalize(""), "");
    }
}
