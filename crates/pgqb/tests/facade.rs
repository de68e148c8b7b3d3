//! Builder behaviour through the public API only.

use pgqb::{
    ColumnDef, ColumnType, ConditionNode, Data, Db, DbConfig, NoPrimaryKey, Query, SqlValue,
    TableSchema,
};
use serde_json::json;
use std::sync::Arc;

fn users() -> Query {
    Db::new(
        vec![
            TableSchema::new("user")
                .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                .column(ColumnDef::new("name", ColumnType::Text))
                .column(ColumnDef::new("password", ColumnType::Text))
                .column(ColumnDef::new("a", ColumnType::Integer).nullable())
                .column(ColumnDef::new("b", ColumnType::Integer).nullable()),
        ],
        DbConfig::new(),
    )
    .and_then(|db| db.table("user"))
    .unwrap()
}

#[test]
fn insert_returns_every_column() {
    let sql = users()
        .insert(Data::new().set("name", "a").set("password", "b"))
        .unwrap()
        .to_sql_fresh()
        .unwrap();
    assert_eq!(
        sql.text,
        r#"INSERT INTO "user"("name", "password") VALUES ($1, $2) RETURNING *"#
    );
    assert_eq!(
        sql.values,
        vec![SqlValue::Text("a".into()), SqlValue::Text("b".into())]
    );
}

#[test]
fn heterogeneous_rows_share_one_column_list() {
    let sql = users()
        .insert_many(vec![Data::new().set("a", 1).set("b", 2), Data::new().set("a", 3)])
        .unwrap()
        .to_sql_fresh()
        .unwrap();
    assert_eq!(
        sql.text,
        r#"INSERT INTO "user"("a", "b") VALUES ($1, $2), ($3, DEFAULT) RETURNING *"#
    );
}

#[test]
fn missing_values_are_skipped_but_null_is_kept() {
    let sql = users()
        .all()
        .update(Data::new().set_opt("a", None::<i32>).set("b", SqlValue::Null))
        .unwrap()
        .to_sql_fresh()
        .unwrap();
    assert_eq!(sql.text, r#"UPDATE "user" SET "b" = $1"#);
    assert_eq!(sql.values, vec![SqlValue::Null]);
}

#[test]
fn having_count_is_inlined() {
    let sql = users()
        .group(&["name"])
        .unwrap()
        .having_json(&json!({ "count": 5 }))
        .unwrap()
        .to_sql_fresh()
        .unwrap();
    assert!(sql.text.ends_with("HAVING count(*) = 5"), "{}", sql.text);
    assert!(sql.values.is_empty());
}

#[test]
fn derived_handles_leave_the_base_untouched() {
    let base = users().where_(ConditionNode::eq("name", "a").unwrap());
    let before = base.to_sql_fresh().unwrap();

    let _narrowed = base.select(&["id"]).unwrap().limit(5);
    let _updated = base.update(Data::new().set("a", 1)).unwrap();
    let _deleted = base.delete().unwrap();

    assert_eq!(base.to_sql_fresh().unwrap(), before);
}

#[test]
fn compiled_sql_is_cached_per_handle() {
    let query = users().where_(ConditionNode::gt("a", 1).unwrap());
    let first = query.to_sql().unwrap();
    assert!(Arc::ptr_eq(&first, &query.to_sql().unwrap()));
    assert_eq!(*first, query.to_sql_fresh().unwrap());
}

#[test]
fn cloned_handles_share_state_and_cache() {
    let query = users().where_(ConditionNode::gt("a", 1).unwrap());
    let copy = query.clone();
    assert!(std::ptr::eq(query.state(), copy.state()));

    let compiled = query.to_sql().unwrap();
    assert!(Arc::ptr_eq(&compiled, &copy.to_sql().unwrap()));

    let narrowed = copy.limit(1);
    assert!(!std::ptr::eq(query.state(), narrowed.state()));
    assert!(!Arc::ptr_eq(&compiled, &narrowed.to_sql().unwrap()));
}

#[test]
fn tables_without_primary_key_follow_the_policy() {
    let tables = || vec![TableSchema::new("log").column(ColumnDef::new("line", ColumnType::Text))];

    let err = Db::new(tables(), DbConfig::new()).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));

    let db = Db::new(tables(), DbConfig::new().no_primary_key(NoPrimaryKey::Ignore)).unwrap();
    assert!(db.table("log").unwrap().find(1).is_err());
}
