mod common;

use clausemap_core::{params, select, SqlValue};
use common::{addresses, assert_compiles, compiled, compiled_with, users};

#[test]
fn test_insert_binds_every_column_by_default() {
    assert_compiles(
        users().insert(),
        "INSERT INTO users (user_id, user_name) VALUES (?, ?)",
        &["user_id", "user_name"],
    );
}

#[test]
fn test_insert_with_call_time_params_renders_only_those_columns() {
    let p = params([("user_name", "jack")]);
    let c = compiled_with(users().insert(), &p);
    assert_eq!(c.sql(), "INSERT INTO users (user_name) VALUES (?)");
    assert_eq!(c.params(&p), vec![SqlValue::Text("jack".into())]);
}

#[test]
fn test_call_time_params_beat_statement_values() {
    let p = params([("user_name", "ed")]);
    let stmt = users().insert().values([("user_id", SqlValue::Int(3)), ("user_name", SqlValue::Text("jack".into()))]);
    let c = compiled_with(stmt, &p);
    assert_eq!(c.sql(), "INSERT INTO users (user_id, user_name) VALUES (?, ?)");
    assert_eq!(
        c.params(&p),
        vec![SqlValue::Int(3), SqlValue::Text("ed".into())]
    );
}

#[test]
fn test_update_with_values_and_criterion() {
    let u = users();
    assert_compiles(
        u.update()
            .values([("user_name", "ed")])
            .where_(u.c("user_id").eq(7)),
        "UPDATE users SET user_name = ? WHERE users.user_id = ?",
        &["user_name", "users_user_id"],
    );
}

#[test]
fn test_update_with_correlated_subquery_value() {
    let u = users();
    let a = addresses();
    let email = select([a.c("email_address")])
        .where_(a.c("user_id").eq(u.c("user_id")))
        .limit(1);
    assert_compiles(
        u.update().values([("user_name", email)]),
        "UPDATE users SET user_name = (SELECT addresses.email_address FROM addresses \
         WHERE addresses.user_id = users.user_id LIMIT 1)",
        &[],
    );
}

#[test]
fn test_delete_with_criterion() {
    let u = users();
    assert_compiles(
        u.delete().where_(u.c("user_id").eq(7)),
        "DELETE FROM users WHERE users.user_id = ?",
        &["users_user_id"],
    );
}

#[test]
fn test_call_time_value_does_not_reach_update_criterion() {
    let u = users();
    let p = params([("user_id", 8_i64)]);
    let c = compiled_with(u.update().where_(u.c("user_id").eq(7)), &p);
    assert_eq!(c.sql(), "UPDATE users SET user_id = ? WHERE users.user_id = ?");
    assert_eq!(c.params(&p), vec![SqlValue::Int(8), SqlValue::Int(7)]);
}

#[test]
fn test_call_time_value_does_not_reach_delete_criterion() {
    let u = users();
    let p = params([("user_id", 8_i64)]);
    let c = compiled_with(u.delete().where_(u.c("user_id").eq(7)), &p);
    assert_eq!(c.params(&p), vec![SqlValue::Int(7)]);
    assert_eq!(c.params(&params([("users_user_id", 9_i64)])), vec![SqlValue::Int(9)]);
}

#[test]
fn test_short_name_still_fills_select_criterion() {
    let u = users();
    let c = compiled(select([u.c("user_name")]).where_(u.c("user_id").eq(7)));
    assert_eq!(c.params(&params([("user_id", 8_i64)])), vec![SqlValue::Int(8)]);
}
