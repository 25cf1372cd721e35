#![allow(dead_code)]

use clausemap_core::{
    compile, ClauseNode, ColumnDef, CompileError, Compiled, GenericDialect, Params, SqlType, Table,
};

pub fn users() -> Table {
    Table::new(
        "users",
        vec![
            ColumnDef::new("user_id", SqlType::Integer).primary_key(),
            ColumnDef::new("user_name", SqlType::varchar(40)),
        ],
    )
}

pub fn addresses() -> Table {
    Table::new(
        "addresses",
        vec![
            ColumnDef::new("address_id", SqlType::Integer).primary_key(),
            ColumnDef::new("user_id", SqlType::Integer).references("users.user_id"),
            ColumnDef::new("email_address", SqlType::varchar(40)),
        ],
    )
}

pub fn compiled(node: impl Into<ClauseNode>) -> Compiled {
    let node = node.into();
    compile(&node, &GenericDialect::new(), None)
        .unwrap_or_else(|e| panic!("Failed to compile: {node:?}\nError: {e:?}"))
}

pub fn compiled_with(node: impl Into<ClauseNode>, params: &Params) -> Compiled {
    let node = node.into();
    compile(&node, &GenericDialect::new(), Some(params))
        .unwrap_or_else(|e| panic!("Failed to compile: {node:?}\nError: {e:?}"))
}

pub fn compile_err(node: impl Into<ClauseNode>) -> CompileError {
    let node = node.into();
    compile(&node, &GenericDialect::new(), None).expect_err("expected a compile error")
}

/// Asserts the SQL text and the bind names in placeholder order.
pub fn assert_compiles(node: impl Into<ClauseNode>, sql: &str, binds: &[&str]) {
    let c = compiled(node);
    assert_eq!(c.sql(), sql);
    let names: Vec<&str> = c.bind_names().iter().map(String::as_str).collect();
    assert_eq!(names, binds);
}
