//! Parameter analysis across map, object and dynamic-query carriers.

mod support;

use std::sync::Arc;

use fieldseal_core::{
    AlgorithmId, ColumnRegistry, DynamicQuery, EncryptionTask, FieldDef, Locator,
    ParameterAnalyzer, ParameterCarrier, RecordType, RegexSqlAnalyzer, Schema, SealConfig,
    SqlAnalyzer, Value, mappings,
};
use pretty_assertions::assert_eq;
use support::{PHONE, params, registry, user};

fn analyze(
    registry: &ColumnRegistry,
    sql: &str,
    properties: &[&str],
    carrier: &ParameterCarrier<'_>,
) -> Vec<EncryptionTask> {
    let config = SealConfig::default();
    let sql_analyzer = RegexSqlAnalyzer::new();
    let tables = sql_analyzer.tables(sql).unwrap();
    let bindings = sql_analyzer.param_bindings(sql).unwrap();
    ParameterAnalyzer::new(registry, &sql_analyzer, &config)
        .analyze(&mappings(properties.iter().copied()), &bindings, &tables, carrier)
        .unwrap()
}

#[test]
fn map_parameter_matched_by_position() {
    let registry = registry();
    let mut map = params([("userPhone", Value::text(PHONE))]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(
        &registry,
        "SELECT * FROM user WHERE phone_number = ?",
        &["userPhone"],
        &carrier,
    );
    assert_eq!(
        tasks,
        vec![EncryptionTask {
            table: "user".into(),
            column: "phoneNumber".into(),
            original_value: PHONE.into(),
            algorithm: AlgorithmId::default_algorithm(),
            locator: Locator::Map {
                key: "userPhone".into()
            },
        }]
    );
}

#[test]
fn name_matching_tries_case_and_naming_variants() {
    let registry = registry();
    for name in ["phoneNumber", "PhoneNumber", "phone_number", "param.phoneNumber"] {
        let mut map = params([(name, Value::text(PHONE))]);
        let carrier = ParameterCarrier::from_map(&mut map);
        // The placeholder is not attributable, so only the name can match.
        let tasks = analyze(
            &registry,
            "SELECT * FROM user WHERE lower(phone_number) = ?",
            &[name],
            &carrier,
        );
        assert_eq!(tasks.len(), 1, "parameter {name} should match");
        assert!(tasks[0].column.eq_ignore_ascii_case("phoneNumber"));
    }
}

#[test]
fn snake_case_parameter_matches_camel_case_column() {
    let ty = RecordType::new("Legacy")
        .table("legacy")
        .field(FieldDef::new("phone").column("phoneNumber").encrypted())
        .build();
    let registry = ColumnRegistry::new(Arc::new(Schema::new().with(ty)));
    let mut map = params([("phone_number", Value::text(PHONE))]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(&registry, "SELECT * FROM legacy WHERE x = ?", &["phone_number"], &carrier);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].column, "phoneNumber");
}

#[test]
fn non_text_and_unencrypted_parameters_are_ignored() {
    let registry = registry();
    let mut map = params([
        ("id", Value::Int(7)),
        ("name", Value::text("Ada")),
        ("phone", Value::Null),
    ]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(
        &registry,
        "SELECT * FROM user WHERE id = ? AND name = ? AND phone_number = ?",
        &["id", "name", "phone"],
        &carrier,
    );
    assert!(tasks.is_empty());
}

#[test]
fn nested_map_property_is_located_by_path() {
    let registry = registry();
    let mut map = params([(
        "user",
        Value::Map(params([("phone", Value::text(PHONE))])),
    )]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(
        &registry,
        "UPDATE user SET phone_number = ? WHERE id = 1",
        &["user.phone"],
        &carrier,
    );
    assert_eq!(tasks.len(), 1);
    assert_eq!(
        tasks[0].locator,
        Locator::Map {
            key: "user.phone".into()
        }
    );
}

#[test]
fn repeated_property_yields_one_task() {
    let registry = registry();
    let mut map = params([("phone", Value::text(PHONE))]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(
        &registry,
        "SELECT * FROM user WHERE phone_number = ? OR email = ?",
        &["phone", "phone"],
        &carrier,
    );
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].column, "phoneNumber");
}

#[test]
fn undeclared_map_entries_are_matched_by_name() {
    let registry = registry();
    let mut map = params([
        ("id", Value::Int(1)),
        ("email", Value::text("ada@example.com")),
    ]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(&registry, "SELECT * FROM user WHERE id = ?", &["id"], &carrier);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].column, "email");
    assert_eq!(tasks[0].locator, Locator::Map { key: "email".into() });
}

#[test]
fn qualified_binding_prefers_aliased_table() {
    let ty = RecordType::new("Contact")
        .table("contact")
        .field(FieldDef::new("phone").encrypted_with("acme.contact"))
        .build();
    let user_phone = RecordType::new("Member")
        .table("member")
        .field(FieldDef::new("phone").encrypted_with("acme.member"))
        .build();
    let registry = ColumnRegistry::new(Arc::new(Schema::new().with(ty).with(user_phone)));
    let mut map = params([("p", Value::text(PHONE))]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(
        &registry,
        "SELECT * FROM contact c JOIN member m ON m.id = c.member_id WHERE m.phone = ?",
        &["p"],
        &carrier,
    );
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].table, "member");
    assert_eq!(tasks[0].algorithm, AlgorithmId::new("acme.member"));
}

#[test]
fn object_carrier_reads_properties() {
    let registry = registry();
    let mut record = user(1, PHONE, "ada@example.com");
    let carrier = ParameterCarrier::object(&mut record);
    let tasks = analyze(
        &registry,
        "INSERT INTO user (id, name, phone_number, email) VALUES (?, ?, ?, ?)",
        &["id", "name", "phoneNumber", "email"],
        &carrier,
    );
    let columns: Vec<_> = tasks.iter().map(|t| t.column.as_str()).collect();
    assert_eq!(columns, vec!["phoneNumber", "email"]);
    assert_eq!(
        tasks[0].locator,
        Locator::Object {
            property: "phoneNumber".into()
        }
    );
}

#[test]
fn dynamic_query_parameters_are_matched_through_the_fragment() {
    let registry = registry();
    let query = DynamicQuery::new()
        .eq("phone_number", PHONE)
        .condition("name", "LIKE", "%Ada%");
    let mut map = params([("ew", query.into())]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(
        &registry,
        "SELECT * FROM user WHERE (phone_number = ? AND name LIKE ?)",
        &[
            "ew.paramNameValuePairs.MPGENVAL1",
            "ew.paramNameValuePairs.MPGENVAL2",
        ],
        &carrier,
    );
    assert_eq!(
        tasks,
        vec![EncryptionTask {
            table: "user".into(),
            column: "phoneNumber".into(),
            original_value: PHONE.into(),
            algorithm: AlgorithmId::default_algorithm(),
            locator: Locator::DynamicQuery {
                wrapper_key: "ew".into(),
                param_name: "MPGENVAL1".into(),
            },
        }]
    );
}

#[test]
fn dynamic_query_without_wrapper_yields_nothing() {
    let registry = registry();
    let mut map = params([("ew.paramNameValuePairs.MPGENVAL1", Value::text(PHONE))]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(
        &registry,
        "SELECT * FROM user WHERE phone_number = ?",
        &["ew.paramNameValuePairs.MPGENVAL1"],
        &carrier,
    );
    assert!(tasks.is_empty());
}

#[test]
fn dynamic_query_with_where_prefix_and_positional_names() {
    let registry = registry();
    let query = DynamicQuery::with_segment("WHERE email = ?").param("MPGENVAL1", "ada@example.com");
    let mut map = params([("ew", query.into())]);
    let carrier = ParameterCarrier::from_map(&mut map);
    let tasks = analyze(&registry, "SELECT * FROM user WHERE email = ?", &["x"], &carrier);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].column, "email");
    assert_eq!(
        tasks[0].locator,
        Locator::DynamicQuery {
            wrapper_key: "ew".into(),
            param_name: "MPGENVAL1".into()
        }
    );
}
