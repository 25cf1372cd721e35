mod common;

use clausemap_core::{ColumnDef, Engine, SqlType, SqlValue, Table};
use clausemap_orm::{mapper, relation, ClassId, Instance, Mapper, MapperExtension, OrmError, Registry, Session};
use common::{seed, text, user_mappers, Schema, ADDRESS, ITEM, KEYWORD, ORDER, USER};

fn scalar(session: &mut Session<'_, common::RecordingEngine>, sql: &str) -> SqlValue {
    let result = session.engine_mut().execute(sql, &[]).unwrap();
    result.rows[0][0].clone()
}

#[test]
fn test_insert_parent_before_child() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());

    let jack = session.new_tracked(USER);
    jack.set("user_name", "jack");
    let home = Instance::new(ADDRESS);
    home.set("email_address", "jack@home.com");
    let work = Instance::new(ADDRESS);
    work.set("email_address", "jack@work.com");
    session.append_related(&jack, "addresses", &home).unwrap();
    session.append_related(&jack, "addresses", &work).unwrap();
    session.flush().unwrap();

    let engine = session.engine();
    let users = engine.position("INSERT INTO users").unwrap();
    let addresses = engine.position("INSERT INTO email_addresses").unwrap();
    assert!(users < addresses);

    assert_eq!(jack.get("user_id"), Some(SqlValue::Int(1)));
    assert_eq!(home.get("user_id"), jack.get("user_id"));
    assert_eq!(work.get("user_id"), jack.get("user_id"));
    assert_eq!(session.engine().matching("INSERT INTO email_addresses").len(), 2);
    assert!(jack.is_persistent());
    assert!(home.is_persistent());
    assert!(!jack.is_modified());

    // Same row, same object, no SELECT.
    let before = session.engine().statements().len();
    let again = m.user.get(&mut session, &[SqlValue::Int(1)]).unwrap();
    assert_eq!(again, Some(jack));
    assert_eq!(session.engine().statements().len(), before);
}

#[test]
fn test_second_flush_writes_nothing() {
    let schema = Schema::new();
    let registry = Registry::new();
    let _m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());

    let ed = session.new_tracked(USER);
    ed.set("user_name", "ed");
    session.flush().unwrap();
    let written = session.engine().statements().len();

    session.flush().unwrap();
    assert_eq!(session.engine().statements().len(), written);
}

#[test]
fn test_update_writes_only_changed_columns() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let ed = m.user.get(&mut session, &[SqlValue::Int(8)]).unwrap().unwrap();
    ed.set("user_name", "eddie");
    session.flush().unwrap();

    let updates = session.engine().matching("UPDATE users");
    assert_eq!(updates.len(), 1);
    assert!(updates[0].contains("user_name"));
    assert!(!updates[0].contains("SET user_id"));

    let name = scalar(&mut session, "SELECT user_name FROM users WHERE user_id = 8");
    assert_eq!(name, text("eddie"));
}

#[test]
fn test_many_to_many_association_rows() {
    let schema = Schema::new();
    let registry = Registry::new();
    let keyword = mapper(KEYWORD, &schema.keywords).build(&registry).unwrap();
    mapper(ITEM, &schema.items)
        .property("keywords", relation(&keyword).secondary(&schema.itemkeywords))
        .build(&registry)
        .unwrap();
    let mut session = Session::new(&registry, schema.engine());

    let item = session.new_tracked(ITEM);
    item.set("item_name", "hat");
    let blue = Instance::new(KEYWORD);
    blue.set("name", "blue");
    let red = Instance::new(KEYWORD);
    red.set("name", "red");
    session.append_related(&item, "keywords", &blue).unwrap();
    session.append_related(&item, "keywords", &red).unwrap();
    session.flush().unwrap();

    let count = "SELECT COUNT(*) AS n FROM itemkeywords";
    assert_eq!(scalar(&mut session, count), SqlValue::Int(2));
    let engine = session.engine();
    assert!(engine.position("INSERT INTO keywords").unwrap() < engine.position("INSERT INTO itemkeywords").unwrap());

    session.flush().unwrap();
    assert_eq!(scalar(&mut session, count), SqlValue::Int(2));

    session.remove_related(&item, "keywords", &blue).unwrap();
    session.flush().unwrap();
    assert_eq!(scalar(&mut session, count), SqlValue::Int(1));
    let kept = scalar(&mut session, "SELECT keyword_id FROM itemkeywords");
    assert_eq!(Some(kept), red.get("keyword_id"));
}

#[test]
fn test_stale_update_raises_concurrency_error() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    // ed has no addresses or orders, so the foreign keys allow the delete.
    let ed = m.user.get(&mut session, &[SqlValue::Int(8)]).unwrap().unwrap();
    let gone = session
        .engine_mut()
        .execute("DELETE FROM users WHERE user_id = 8", &[])
        .unwrap();
    assert_eq!(gone.rows_affected, 1);
    ed.set("user_name", "eddie");

    let err = session.flush().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Concurrency { ref table, expected: 1, actual: 0 } if table == "users"
    ));
    // The object keeps its unsaved change.
    assert!(ed.is_modified());
}

#[test]
fn test_delete_cascades_to_private_children() {
    let schema = Schema::new();
    let registry = Registry::new();
    let address = mapper(ADDRESS, &schema.addresses).build(&registry).unwrap();
    let order = mapper(ORDER, &schema.orders).build(&registry).unwrap();
    let user = mapper(USER, &schema.users)
        .property("addresses", relation(&address).private())
        .property("orders", relation(&order))
        .build(&registry)
        .unwrap();
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let jack = user.get(&mut session, &[SqlValue::Int(7)]).unwrap().unwrap();
    session.delete(&jack);
    session.flush().unwrap();

    let engine = session.engine();
    let delete_user = engine.position("DELETE FROM users").unwrap();
    assert!(engine.position("DELETE FROM email_addresses").unwrap() < delete_user);
    assert!(engine.position("UPDATE orders").unwrap() < delete_user);
    assert_eq!(engine.matching("DELETE FROM email_addresses").len(), 2);

    assert_eq!(
        scalar(&mut session, "SELECT COUNT(*) AS n FROM email_addresses"),
        SqlValue::Int(0)
    );
    assert_eq!(
        scalar(&mut session, "SELECT user_id FROM orders WHERE order_id = 1"),
        SqlValue::Null
    );
    assert!(!jack.is_persistent());
    assert!(user.get(&mut session, &[SqlValue::Int(7)]).unwrap().is_none());
}

#[test]
fn test_removed_child_is_detached() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let jack = m.user.get(&mut session, &[SqlValue::Int(7)]).unwrap().unwrap();
    let bean = session.related(&jack, "addresses").unwrap().items()[0].clone();
    session.remove_related(&jack, "addresses", &bean).unwrap();
    session.flush().unwrap();

    assert_eq!(session.engine().matching("UPDATE email_addresses").len(), 1);
    assert!(session.engine().matching("DELETE").is_empty());
    assert_eq!(bean.get("user_id"), Some(SqlValue::Null));
    assert_eq!(
        scalar(&mut session, "SELECT COUNT(*) AS n FROM email_addresses WHERE user_id = 7"),
        SqlValue::Int(1)
    );
}

#[test]
fn test_removed_private_child_is_deleted() {
    let schema = Schema::new();
    let registry = Registry::new();
    let address = mapper(ADDRESS, &schema.addresses).build(&registry).unwrap();
    let user = mapper(USER, &schema.users)
        .property("addresses", relation(&address).private())
        .build(&registry)
        .unwrap();
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let jack = user.get(&mut session, &[SqlValue::Int(7)]).unwrap().unwrap();
    let bean = session.related(&jack, "addresses").unwrap().items()[0].clone();
    session.remove_related(&jack, "addresses", &bean).unwrap();
    session.flush().unwrap();

    assert_eq!(session.engine().matching("DELETE FROM email_addresses").len(), 1);
    assert!(!bean.is_persistent());
    assert_eq!(
        scalar(&mut session, "SELECT COUNT(*) AS n FROM email_addresses"),
        SqlValue::Int(1)
    );
}

#[test]
fn test_self_referential_parent_written_first() {
    const NODE: ClassId = ClassId::new("Node");

    let schema = Schema::new();
    let nodes = Table::new(
        "nodes",
        vec![
            ColumnDef::new("node_id", SqlType::Integer).primary_key(),
            ColumnDef::new("parent_id", SqlType::Integer).references("nodes.node_id"),
            ColumnDef::new("name", SqlType::varchar(30)),
        ],
    );
    let mut engine = schema.engine();
    nodes.create(&mut engine).unwrap();
    let registry = Registry::new();
    mapper(NODE, &nodes)
        .property("children", relation(NODE).remote_side(nodes.c("parent_id")))
        .build(&registry)
        .unwrap();
    let mut session = Session::new(&registry, engine);

    // The child is registered first; the parent still goes in first.
    let leaf = session.new_tracked(NODE);
    leaf.set("name", "leaf");
    let root = session.new_tracked(NODE);
    root.set("name", "root");
    session.append_related(&root, "children", &leaf).unwrap();
    session.flush().unwrap();

    assert_eq!(root.get("node_id"), Some(SqlValue::Int(1)));
    assert_eq!(leaf.get("parent_id"), root.get("node_id"));
    assert_eq!(
        scalar(&mut session, "SELECT parent_id FROM nodes WHERE name = 'leaf'"),
        SqlValue::Int(1)
    );
}

#[derive(Debug)]
struct DefaultName;

impl MapperExtension for DefaultName {
    fn before_insert(&self, _mapper: &Mapper, instance: &Instance) {
        if instance.get("user_name").is_none() {
            instance.set("user_name", "anonymous");
        }
    }
}

#[test]
fn test_extension_runs_before_insert() {
    let schema = Schema::new();
    let registry = Registry::new();
    mapper(USER, &schema.users)
        .extension(DefaultName)
        .build(&registry)
        .unwrap();
    let mut session = Session::new(&registry, schema.engine());

    let nobody = session.new_tracked(USER);
    session.flush().unwrap();

    assert_eq!(nobody.get("user_name"), Some(text("anonymous")));
    assert_eq!(
        scalar(&mut session, "SELECT user_name FROM users"),
        text("anonymous")
    );
}

#[test]
fn test_deleting_pending_object_skips_insert() {
    let schema = Schema::new();
    let registry = Registry::new();
    let _m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());

    let temp = session.new_tracked(USER);
    temp.set("user_name", "temp");
    session.delete(&temp);
    session.flush().unwrap();

    assert!(session.engine().statements().is_empty());
    assert!(!temp.is_persistent());
}

#[test]
fn test_inherited_many_to_many_writes_association_last() {
    const PRINCIPAL: ClassId = ClassId::new("Principal");
    const MEMBER: ClassId = ClassId::new("Member");
    const TEAM: ClassId = ClassId::new("Team");

    let schema = Schema::new();
    let principals = Table::new(
        "principals",
        vec![
            ColumnDef::new("principal_id", SqlType::Integer).primary_key(),
            ColumnDef::new("name", SqlType::varchar(30)),
        ],
    );
    let members = Table::new(
        "members",
        vec![
            ColumnDef::new("principal_id", SqlType::Integer)
                .primary_key()
                .references("principals.principal_id"),
            ColumnDef::new("password", SqlType::varchar(30)),
        ],
    );
    let teams = Table::new(
        "teams",
        vec![
            ColumnDef::new("principal_id", SqlType::Integer)
                .primary_key()
                .references("principals.principal_id"),
            ColumnDef::new("description", SqlType::varchar(60)),
        ],
    );
    let member_teams = Table::new(
        "member_teams",
        vec![
            ColumnDef::new("member_id", SqlType::Integer).references("members.principal_id"),
            ColumnDef::new("team_id", SqlType::Integer).references("teams.principal_id"),
        ],
    );
    let mut engine = schema.engine();
    for table in [&principals, &members, &teams, &member_teams] {
        table.create(&mut engine).unwrap();
    }
    engine.log.clear();

    let registry = Registry::new();
    let principal = mapper(PRINCIPAL, &principals).build(&registry).unwrap();
    let member = mapper(MEMBER, &members).inherits(&principal).build(&registry).unwrap();
    let team = mapper(TEAM, &teams)
        .inherits(&principal)
        .property("members", relation(&member).secondary(&member_teams))
        .build(&registry)
        .unwrap();
    let mut session = Session::new(&registry, engine);

    let admins = session.new_tracked(TEAM);
    admins.set("name", "admins");
    admins.set("description", "site admins");
    let ann = Instance::new(MEMBER);
    ann.set("name", "ann");
    ann.set("password", "secret");
    session.append_related(&admins, "members", &ann).unwrap();
    session.flush().unwrap();

    let engine = session.engine();
    let association = engine.position("INSERT INTO member_teams").unwrap();
    assert_eq!(engine.matching("INSERT INTO principals").len(), 2);
    for insert in ["INSERT INTO principals", "INSERT INTO members", "INSERT INTO teams"] {
        assert!(engine.position(insert).unwrap() < association, "{insert}");
    }
    let team_id = admins.get("principal_id").unwrap();
    assert_eq!(
        scalar(&mut session, "SELECT member_id FROM member_teams"),
        ann.get("principal_id").unwrap()
    );

    session.clear();
    let loaded = team.get(&mut session, &[team_id]).unwrap().unwrap();
    assert_eq!(loaded.get("description"), Some(text("site admins")));
    let names: Vec<String> = session
        .related(&loaded, "members")
        .unwrap()
        .items()
        .iter()
        .filter_map(|m| m.get_as::<String>("name"))
        .collect();
    assert_eq!(names, ["ann"]);
}
