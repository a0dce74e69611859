mod common;

use common::{orm, row_count, seed_users, Article, User};
use quarry_core::repo::OperationKind;
use quarry_core::{Entity, OrmError, WriteOutcome};

#[test]
fn two_deferred_creates_persist_in_order_with_distinct_ids() {
    let orm = orm();
    let mut first = User::new("ada", 36);
    let mut second = User::new("bob", 17);

    assert!(matches!(
        orm.create(&mut first, true).unwrap(),
        WriteOutcome::Queued(_)
    ));
    assert!(matches!(
        orm.create(&mut second, true).unwrap(),
        WriteOutcome::Queued(_)
    ));
    assert_eq!(row_count(&orm, "users"), 0);

    let report = orm.persist().unwrap();
    assert_eq!(report.executed.len(), 2);
    assert!(report.apply(&mut first).unwrap());
    assert!(report.apply(&mut second).unwrap());

    let (a, b) = (first.id.unwrap(), second.id.unwrap());
    assert!(a < b);
    let stored = orm.find_one::<User>(b).unwrap().get_one_or_fail().unwrap();
    assert_eq!(stored.name, "bob");
    assert!(first.as_storable_changed_array().is_empty());
}

#[test]
fn failing_batch_rolls_back_everything() {
    let orm = orm();
    let mut users = [
        User::new("ada", 36).with_email("same@example.com"),
        User::new("bob", 17).with_email("same@example.com"),
        User::new("cy", 41).with_email("cy@example.com"),
    ];
    for user in users.iter_mut() {
        orm.create(user, true).unwrap();
    }

    let err = orm.persist().unwrap_err();
    match err {
        OrmError::PersistFailed {
            index, kind, table, ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(kind, OperationKind::Create);
            assert_eq!(table, "users");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(row_count(&orm, "users"), 0);
    assert!(orm.default_connection().unwrap().pending().is_empty());
    assert!(!orm.in_transaction().unwrap());
}

#[test]
fn persisting_an_empty_queue_twice_is_a_no_op() {
    let orm = orm();
    for _ in 0..2 {
        let report = orm.persist().unwrap();
        assert!(report.is_empty());
        assert!(!orm.in_transaction().unwrap());
    }
}

#[test]
fn saving_an_unchanged_entity_does_nothing() {
    let orm = orm();
    let ids = seed_users(&orm, &[("ada", 36)]);
    let mut ada = orm.find_one::<User>(ids[0]).unwrap().get_one_or_fail().unwrap();

    assert_eq!(orm.save(&mut ada, false).unwrap(), WriteOutcome::Unchanged);
    assert_eq!(orm.save(&mut ada, true).unwrap(), WriteOutcome::Unchanged);
    assert!(orm.default_connection().unwrap().pending().is_empty());
}

#[test]
fn save_writes_only_changed_fields() {
    let orm = orm();
    let ids = seed_users(&orm, &[("ada", 36)]);
    let mut ada = orm.find_one::<User>(ids[0]).unwrap().get_one_or_fail().unwrap();

    // Changed behind the entity's back; save must not overwrite it.
    orm.default_connection()
        .unwrap()
        .query("UPDATE users SET name = 'Ada L.' WHERE id = :id")
        .bind("id", ids[0])
        .execute()
        .unwrap();

    ada.age = 37;
    assert_eq!(
        ada.as_storable_changed_array(),
        vec![("age", quarry_core::Value::Integer(37))]
    );
    assert!(matches!(
        orm.save(&mut ada, false).unwrap(),
        WriteOutcome::Executed { affected: 1, .. }
    ));

    let stored = orm.find_one::<User>(ids[0]).unwrap().get_one_or_fail().unwrap();
    assert_eq!((stored.name.as_str(), stored.age), ("Ada L.", 37));
}

#[test]
fn deferred_delete_of_a_queued_create_never_touches_the_database() {
    let orm = orm();
    let mut user = User::new("temp", 1);
    orm.create(&mut user, true).unwrap();
    assert!(matches!(
        orm.delete(&mut user, true).unwrap(),
        WriteOutcome::Dequeued(_)
    ));
    assert!(orm.persist().unwrap().is_empty());
    assert_eq!(row_count(&orm, "users"), 0);
}

#[test]
fn immediate_delete_removes_the_row() {
    let orm = orm();
    let ids = seed_users(&orm, &[("ada", 36), ("bob", 17)]);
    let mut bob = orm.find_one::<User>(ids[1]).unwrap().get_one_or_fail().unwrap();

    orm.delete(&mut bob, false).unwrap();
    assert_eq!(row_count(&orm, "users"), 1);

    let mut never_saved = User::new("ghost", 0);
    assert!(matches!(
        orm.delete(&mut never_saved, false),
        Err(OrmError::MissingPrimaryKey { .. })
    ));
}

#[test]
fn dated_entities_are_stamped() {
    let orm = orm();
    let mut article = Article::new("draft");
    orm.create(&mut article, false).unwrap();

    let created = article.created.clone().unwrap();
    assert_eq!(created.len(), "2024-01-01 00:00:00".len());
    assert!(article.modified.is_some());

    article.title = "final".to_string();
    orm.save(&mut article, false).unwrap();
    assert_eq!(article.created.as_deref(), Some(created.as_str()));

    let stored = orm
        .find_one::<Article>(article.id.unwrap())
        .unwrap()
        .get_one_or_fail()
        .unwrap();
    assert_eq!(stored.title, "final");
    assert_eq!(stored.created, article.created);
}

#[test]
fn soft_delete_flags_and_dates_the_row() {
    let orm = orm();
    let mut article = Article::new("old");
    orm.create(&mut article, false).unwrap();
    orm.soft_delete(&mut article, true).unwrap();
    orm.persist().unwrap();

    let stored = orm
        .find_one::<Article>(article.id.unwrap())
        .unwrap()
        .include_deleted()
        .get_one_or_fail()
        .unwrap();
    assert_eq!(stored.deleted, 1);
    assert!(stored.deleted_date.is_some());

    let mut user = User::new("ada", 36);
    orm.create(&mut user, false).unwrap();
    assert!(matches!(
        orm.soft_delete(&mut user, false),
        Err(OrmError::NotSoftDeletable { .. })
    ));
}

#[test]
fn clear_drops_a_single_queued_operation() {
    let orm = orm();
    let mut kept = User::new("kept", 1);
    let mut dropped = User::new("dropped", 2);
    orm.create(&mut kept, true).unwrap();
    orm.create(&mut dropped, true).unwrap();

    assert_eq!(orm.clear(&dropped).unwrap(), 1);
    let report = orm.persist().unwrap();
    assert_eq!(report.executed.len(), 1);
    assert!(report.inserted_id(kept.handle().unwrap()).is_some());
    assert_eq!(row_count(&orm, "users"), 1);
}

#[test]
fn persist_inside_an_outer_transaction_leaves_it_open() {
    let orm = orm();
    orm.begin_transaction().unwrap();
    let mut user = User::new("ada", 36);
    orm.create(&mut user, true).unwrap();
    orm.persist().unwrap();
    assert!(orm.in_transaction().unwrap());

    orm.rollback().unwrap();
    assert_eq!(row_count(&orm, "users"), 0);
}
