mod common;

use common::{MockAdapter, affected, db, rows, text};
use pgqb::{Data, NestedWrite, OrmError, QueryOutput, SqlValue};

#[tokio::test]
async fn belongs_to_is_inserted_first() {
    let adapter = MockAdapter::new();
    adapter
        .respond(rows(&["id"], vec![vec![SqlValue::Int(7)]]))
        .respond(rows(
            &["id", "title", "authorId"],
            vec![vec![SqlValue::Int(1), text("t"), SqlValue::Int(7)]],
        ));

    let posts = db().table("post").unwrap();
    let output = posts
        .insert(
            Data::new()
                .set("title", "t")
                .relation("author", NestedWrite::Create(Data::new().set("name", "a"))),
        )
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap();

    let record = output.record().unwrap().unwrap();
    assert_eq!(record.get("authorId"), Some(&SqlValue::Int(7)));
    assert_eq!(
        adapter.calls(),
        vec![
            ("BEGIN".to_string(), vec![]),
            (
                r#"INSERT INTO "user"("name") VALUES ($1) RETURNING "user"."id""#.to_string(),
                vec![text("a")]
            ),
            (
                r#"INSERT INTO "post"("title", "authorId") VALUES ($1, $2) RETURNING *"#.to_string(),
                vec![text("t"), SqlValue::Int(7)]
            ),
            ("COMMIT".to_string(), vec![]),
        ]
    );
}

#[tokio::test]
async fn has_many_rows_follow_the_parent() {
    let adapter = MockAdapter::new();
    adapter
        .respond(rows(&["id", "name"], vec![vec![SqlValue::Int(1), text("a")]]))
        .respond(affected(2));

    let users = db().table("user").unwrap();
    users
        .insert(Data::new().set("name", "a").relation(
            "posts",
            NestedWrite::CreateMany(vec![
                Data::new().set("title", "x"),
                Data::new().set("title", "y"),
            ]),
        ))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap();

    let calls = adapter.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(
        calls[2],
        (
            r#"INSERT INTO "post"("title", "authorId") VALUES ($1, $2), ($3, $4)"#.to_string(),
            vec![text("x"), SqlValue::Int(1), text("y"), SqlValue::Int(1)]
        )
    );
    assert_eq!(calls[3].0, "COMMIT");
}

#[tokio::test]
async fn has_one_reads_back_the_key_without_returning_rows() {
    let adapter = MockAdapter::new();
    adapter
        .respond(rows(&["id"], vec![vec![SqlValue::Int(3)]]))
        .respond(affected(1));

    let users = db().table("user").unwrap();
    let output = users
        .count()
        .insert(
            Data::new()
                .set("name", "a")
                .relation("profile", NestedWrite::Create(Data::new().set("bio", "hi"))),
        )
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap();

    assert_eq!(output, QueryOutput::RowCount(1));
    let statements = adapter.statements();
    assert_eq!(
        statements[1],
        r#"INSERT INTO "user"("name") VALUES ($1) RETURNING "user"."id""#
    );
    assert_eq!(
        statements[2],
        r#"INSERT INTO "profile"("bio", "userId") VALUES ($1, $2)"#
    );
}

#[tokio::test]
async fn failure_rolls_back() {
    let adapter = MockAdapter::new();
    adapter
        .respond(rows(&["id"], vec![vec![SqlValue::Int(1)]]))
        .fail("post insert failed");

    let users = db().table("user").unwrap();
    let err = users
        .insert(Data::new().set("name", "a").relation(
            "posts",
            NestedWrite::Create(Data::new().set("title", "x")),
        ))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("post insert failed"));
    assert_eq!(
        adapter.statements().last().map(String::as_str),
        Some("ROLLBACK")
    );
}

#[tokio::test]
async fn missing_parent_key_is_an_error() {
    let adapter = MockAdapter::new();
    adapter.respond(rows(&["name"], vec![vec![text("a")]]));

    let users = db().table("user").unwrap();
    let err = users
        .insert(Data::new().set("name", "a").relation(
            "posts",
            NestedWrite::Create(Data::new().set("title", "x")),
        ))
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn shared_connections_refuse_to_begin() {
    let adapter = MockAdapter::shared();
    let posts = db().table("post").unwrap();
    let err = posts
        .insert(
            Data::new()
                .set("title", "t")
                .relation("author", NestedWrite::Create(Data::new().set("name", "a"))),
        )
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::Construction(_)), "{err}");
    assert!(adapter.calls().is_empty());

    // Single statements don't need the session to themselves.
    let users = db().table("user").unwrap();
    users.find_optional(1).unwrap().exec(&adapter).await.unwrap();
    assert_eq!(adapter.statements().len(), 1);
}

#[tokio::test]
async fn nested_transactions_use_savepoints() {
    let adapter = MockAdapter::nested();
    adapter
        .respond(rows(&["id"], vec![vec![SqlValue::Int(7)]]))
        .respond(rows(&["id"], vec![vec![SqlValue::Int(1)]]));

    let posts = db().table("post").unwrap();
    posts
        .insert(
            Data::new()
                .set("title", "t")
                .relation("author", NestedWrite::Create(Data::new().set("name", "a"))),
        )
        .unwrap()
        .exec(&adapter)
        .await
        .unwrap();

    let statements = adapter.statements();
    let savepoint = statements[0].strip_prefix("SAVEPOINT ").unwrap();
    assert!(savepoint.starts_with("pgqb_sp_"));
    assert_eq!(
        statements.last().unwrap(),
        &format!("RELEASE SAVEPOINT {savepoint}")
    );
}
