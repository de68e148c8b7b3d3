mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{MockAdapter, affected, db, rows, text};
use pgqb::{ConditionNode, Data, OrmError, QueryOutput, SqlValue, TruncateOptions};

#[tokio::test]
async fn select_returns_records() {
    let adapter = MockAdapter::new();
    adapter.respond(rows(
        &["id", "name"],
        vec![
            vec![SqlValue::Int(1), text("a")],
            vec![SqlValue::Int(2), text("b")],
        ],
    ));

    let users = db().table("user").unwrap();
    let output = users
        .where_(ConditionNode::gt("age", 18).unwrap())
        .exec(&adapter)
        .await
        .unwrap();

    let records = output.records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get("name"), Some(&text("b")));
    assert_eq!(
        adapter.calls(),
        vec![(
            r#"SELECT "user".* FROM "user" WHERE "user"."age" > $1"#.to_string(),
            vec![SqlValue::Int(18)]
        )]
    );
}

#[tokio::test]
async fn text_results_are_decoded_by_column_type() {
    let adapter = MockAdapter::new();
    adapter.respond(rows(&["id", "age"], vec![vec![text("1"), text("30")]]));

    let users = db().table("user").unwrap();
    let record = users.take().exec(&adapter).await.unwrap().record().unwrap().unwrap();
    assert_eq!(record.values(), &[SqlValue::Int(1), SqlValue::Int(30)]);
}

#[tokio::test]
async fn find_reports_not_found() {
    let adapter = MockAdapter::new();
    let users = db().table("user").unwrap();

    let err = users.find(1).unwrap().exec(&adapter).await.unwrap_err();
    assert!(err.is_not_found());

    let output = users.find_optional(1).unwrap().exec(&adapter).await.unwrap();
    assert_eq!(output, QueryOutput::One(None));
}

#[tokio::test]
async fn value_pluck_and_rows_shapes() {
    let adapter = MockAdapter::new();
    adapter
        .respond(rows(&["name"], vec![vec![text("a")]]))
        .respond(rows(&["id"], vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]]))
        .respond(rows(
            &["id", "name"],
            vec![vec![SqlValue::Int(1), text("a")]],
        ));

    let users = db().table("user").unwrap();
    assert_eq!(
        users.get("name").unwrap().exec(&adapter).await.unwrap().value().unwrap(),
        Some(text("a"))
    );
    assert_eq!(
        users.pluck("id").unwrap().exec(&adapter).await.unwrap(),
        QueryOutput::Pluck(vec![SqlValue::Int(1), SqlValue::Int(2)])
    );
    assert_eq!(
        users.rows().exec(&adapter).await.unwrap(),
        QueryOutput::Rows(vec![vec![SqlValue::Int(1), text("a")]])
    );
}

#[tokio::test]
async fn fetch_maps_rows_onto_models() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    let adapter = MockAdapter::new();
    adapter
        .respond(rows(&["id", "name"], vec![vec![SqlValue::Int(1), text("a")]]))
        .respond(rows(&["id", "name"], vec![]));

    let users = db().table("user").unwrap();
    let all: Vec<User> = users.fetch_all(&adapter).await.unwrap();
    assert_eq!(
        all,
        vec![User {
            id: 1,
            name: "a".to_string()
        }]
    );

    let err = users.take().fetch_one::<User, _>(&adapter).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_returns_row_count() {
    let adapter = MockAdapter::new();
    adapter.respond(affected(3)).respond(affected(3));

    let users = db().table("user").unwrap();
    let update = users
        .where_(ConditionNode::gt("age", 18).unwrap())
        .update(Data::new().set("name", "x"))
        .unwrap();

    assert_eq!(update.exec(&adapter).await.unwrap(), QueryOutput::RowCount(3));
    assert_eq!(update.execute(&adapter).await.unwrap(), 3);
}

#[tokio::test]
async fn single_row_mutations_check_the_count() {
    let adapter = MockAdapter::new();
    adapter.respond(affected(0)).respond(affected(2));

    let users = db().table("user").unwrap();
    let update = users
        .find(1)
        .unwrap()
        .update(Data::new().set("name", "x"))
        .unwrap();

    assert!(update.exec(&adapter).await.unwrap_err().is_not_found());
    assert!(update.exec(&adapter).await.unwrap_err().is_more_than_one_row());
}

#[tokio::test]
async fn truncate_returns_nothing() {
    let adapter = MockAdapter::new();
    let users = db().table("user").unwrap();
    let truncate = users.truncate(TruncateOptions::new().cascade()).unwrap();

    assert_eq!(truncate.exec(&adapter).await.unwrap(), QueryOutput::Void);
    assert_eq!(truncate.execute(&adapter).await.unwrap(), 0);
    assert_eq!(adapter.statements()[0], r#"TRUNCATE "user" CASCADE"#);
}

#[tokio::test]
async fn upsert_inserts_when_nothing_matched() {
    let adapter = MockAdapter::new();
    adapter.respond(affected(0)).respond(affected(1));

    let users = db().table("user").unwrap();
    let output = users
        .where_(ConditionNode::eq("name", "a").unwrap())
        .upsert(Data::new().set("age", 2), Data::new().set("name", "a").set("age", 2))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap();

    assert_eq!(output, QueryOutput::RowCount(1));
    assert_eq!(
        adapter.statements(),
        vec![
            "BEGIN".to_string(),
            r#"UPDATE "user" SET "age" = $1 WHERE "user"."name" = $2"#.to_string(),
            r#"INSERT INTO "user"("name", "age") VALUES ($1, $2)"#.to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn upsert_skips_insert_when_matched() {
    let adapter = MockAdapter::new();
    adapter.respond(affected(1));

    let users = db().table("user").unwrap();
    let output = users
        .where_(ConditionNode::eq("name", "a").unwrap())
        .upsert(Data::new().set("age", 2), Data::new().set("name", "a"))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap();

    assert_eq!(output, QueryOutput::RowCount(1));
    assert_eq!(adapter.statements().len(), 3);
}

#[tokio::test]
async fn upsert_rejects_many_matches() {
    let adapter = MockAdapter::new();
    adapter.respond(affected(2));

    let users = db().table("user").unwrap();
    let err = users
        .where_(ConditionNode::eq("name", "a").unwrap())
        .upsert(Data::new().set("age", 2), Data::new().set("name", "a"))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap_err();

    assert!(err.is_more_than_one_row());
    assert_eq!(adapter.statements().last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn or_create_returns_existing_row() {
    let adapter = MockAdapter::new();
    adapter.respond(rows(&["id", "name"], vec![vec![SqlValue::Int(4), text("a")]]));

    let users = db().table("user").unwrap();
    let record = users
        .where_(ConditionNode::eq("name", "a").unwrap())
        .or_create(Data::new().set("name", "a"))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap()
        .record()
        .unwrap()
        .unwrap();

    assert_eq!(record.get("id"), Some(&SqlValue::Int(4)));
    assert_eq!(
        adapter.statements()[1],
        r#"SELECT "user".* FROM "user" WHERE "user"."name" = $1 LIMIT $2"#
    );
}

#[tokio::test]
async fn hooks_run_around_inserts() {
    let before = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));

    let adapter = MockAdapter::new();
    adapter.respond(rows(&["id"], vec![vec![SqlValue::Int(1)]]));

    let users = db().table("user").unwrap();
    let (b, a) = (Arc::clone(&before), Arc::clone(&after));
    let insert = users
        .before_insert(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .after_insert(move |_, output| {
            assert!(matches!(output, QueryOutput::One(Some(_))));
            a.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .insert(Data::new().set("name", "a"))
        .unwrap();

    insert.exec(&adapter).await.unwrap();
    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(after.load(Ordering::SeqCst), 1);

    // Update hooks do not fire for inserts.
    let update_hook = users
        .before_update(|_| Err(OrmError::construction("no")))
        .insert(Data::new().set("name", "a"))
        .unwrap();
    update_hook.exec(&adapter).await.unwrap();
}

#[tokio::test]
async fn failing_before_hook_aborts() {
    let adapter = MockAdapter::new();
    let users = db().table("user").unwrap();

    let err = users
        .all()
        .before_update(|_| Err(OrmError::construction("read only")))
        .update(Data::new().set("name", "x"))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("read only"));
    assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn upsert_fallback_runs_insert_hooks() {
    let fired = Arc::new(std::sync::Mutex::new(Vec::new()));

    let adapter = MockAdapter::new();
    adapter.respond(affected(0)).respond(affected(1));

    let users = db().table("user").unwrap();
    let (u, i) = (Arc::clone(&fired), Arc::clone(&fired));
    users
        .where_(ConditionNode::eq("name", "a").unwrap())
        .after_update(move |_, _| {
            u.lock().unwrap().push("update");
            Ok(())
        })
        .after_insert(move |_, _| {
            i.lock().unwrap().push("insert");
            Ok(())
        })
        .upsert(Data::new().set("age", 1), Data::new().set("name", "a"))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap();

    assert_eq!(*fired.lock().unwrap(), vec!["insert"]);
}
