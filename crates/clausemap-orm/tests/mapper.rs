mod common;

use std::sync::Arc;

use clausemap_core::{params, ColumnDef, Engine, Params, SqlType, SqlValue, Table};
use clausemap_orm::{
    eagerload, mapper, noload, relation, ClassId, Direction, Instance, LoadStrategy, MapperExtension, OrmError,
    Registry, Related, SelectOptions, Session,
};
use common::{seed, text, user_mappers, Schema, ADDRESS, KEYWORD, USER};

fn emails(session: &mut Session<'_, common::RecordingEngine>, user: &Instance) -> Vec<String> {
    session
        .related(user, "addresses")
        .unwrap()
        .items()
        .iter()
        .filter_map(|a| a.get_as::<String>("email_address"))
        .collect()
}

#[test]
fn test_select_all_orders_by_primary_key() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let users = m.user.select_all(&mut session).unwrap();
    let names: Vec<String> = users.iter().filter_map(|u| u.get_as("user_name")).collect();
    assert_eq!(names, vec!["jack", "ed"]);
    assert!(users.iter().all(Instance::is_persistent));
    assert!(session.engine().statements()[0].contains("ORDER BY users.user_id"));
}

#[test]
fn test_one_instance_per_row() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let first = m.user.select(&mut session, schema.users.c("user_id").eq(7)).unwrap();
    let again = m.user.select_all(&mut session).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(again[0], first[0]);

    session.clear();
    let fresh = m.user.select_all(&mut session).unwrap();
    assert_ne!(fresh[0], first[0]);
}

#[test]
fn test_loaded_instances_are_not_overwritten() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let jack = m.user.get(&mut session, &[SqlValue::Int(7)]).unwrap().unwrap();
    jack.set("user_name", "jacques");
    m.user.select_all(&mut session).unwrap();
    assert_eq!(jack.get("user_name"), Some(text("jacques")));

    let refreshed = m
        .user
        .select_with(&mut session, None, &SelectOptions::new().populate_existing())
        .unwrap();
    assert_eq!(refreshed[0], jack);
    assert_eq!(jack.get("user_name"), Some(text("jack")));
    assert!(!jack.is_modified());
}

#[test]
fn test_get_uses_identity_map() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let jack = m.user.get(&mut session, &[SqlValue::Int(7)]).unwrap().unwrap();
    let selects = session.engine().statements().len();
    let again = m.user.get(&mut session, &[SqlValue::Int(7)]).unwrap().unwrap();
    assert_eq!(jack, again);
    assert_eq!(session.engine().statements().len(), selects);

    assert!(m.user.get(&mut session, &[SqlValue::Int(99)]).unwrap().is_none());
    let err = m.user.get(&mut session, &[]).unwrap_err();
    assert!(matches!(err, OrmError::Configuration(_)));
}

#[test]
fn test_get_by_attribute_and_relation() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let ed = m.user.get_by(&mut session, &params([("user_name", "ed")])).unwrap().unwrap();
    assert_eq!(ed.get("user_id"), Some(SqlValue::Int(8)));

    let owners = m
        .user
        .select_by(&mut session, &params([("email_address", "jack@home.com")]))
        .unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].get_as::<String>("user_name").as_deref(), Some("jack"));

    let err = m.user.select_by(&mut session, &params([("shoe_size", 9_i64)])).unwrap_err();
    assert!(matches!(err, OrmError::UnknownProperty { key, .. } if key == "shoe_size"));
}

#[test]
fn test_lazy_load_runs_on_first_access() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let users = m.user.select_all(&mut session).unwrap();
    assert_eq!(session.engine().statements().len(), 1);

    assert_eq!(emails(&mut session, &users[0]), vec!["jack@bean.com", "jack@home.com"]);
    assert_eq!(session.engine().statements().len(), 2);
    assert!(session.engine().statements()[1].contains("FROM email_addresses"));

    // Loaded now; no further SELECT.
    emails(&mut session, &users[0]);
    assert_eq!(session.engine().statements().len(), 2);
    assert!(emails(&mut session, &users[1]).is_empty());
}

#[test]
fn test_eager_load_uses_outer_join() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let eager = m.user.options(&registry, [eagerload("addresses")]).unwrap();
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let users = eager.select_all(&mut session).unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(session.engine().statements().len(), 1);
    assert!(session.engine().statements()[0].contains("LEFT OUTER JOIN email_addresses"));

    assert_eq!(emails(&mut session, &users[0]), vec!["jack@bean.com", "jack@home.com"]);
    // ed has no addresses: the outer join row had nulls, not an instance.
    assert!(emails(&mut session, &users[1]).is_empty());
    assert_eq!(session.engine().statements().len(), 1);
}

#[test]
fn test_eager_and_lazy_load_the_same_graph() {
    let schema = Schema::new();

    let lazy_registry = Registry::new();
    let lazy = user_mappers(&schema, &lazy_registry);
    let mut lazy_session = Session::new(&lazy_registry, schema.engine());
    seed(&mut lazy_session);
    let lazy_users = lazy.user.select_all(&mut lazy_session).unwrap();

    let eager_registry = Registry::new();
    let eager = user_mappers(&schema, &eager_registry);
    let eager_user = eager
        .user
        .options(&eager_registry, [eagerload("addresses"), eagerload("orders")])
        .unwrap();
    let mut eager_session = Session::new(&eager_registry, schema.engine());
    seed(&mut eager_session);
    let eager_users = eager_user.select_all(&mut eager_session).unwrap();

    assert_eq!(lazy_users.len(), eager_users.len());
    for (l, e) in lazy_users.iter().zip(&eager_users) {
        assert_eq!(l.get("user_name"), e.get("user_name"));
        assert_eq!(emails(&mut lazy_session, l), emails(&mut eager_session, e));
        let lazy_orders = lazy_session.related(l, "orders").unwrap().len();
        let eager_orders = eager_session.related(e, "orders").unwrap().len();
        assert_eq!(lazy_orders, eager_orders);
    }
}

#[test]
fn test_eager_limit_counts_parent_rows() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let eager = m.user.options(&registry, [eagerload("addresses")]).unwrap();
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let opts = SelectOptions::new().limit(1);
    let compiled = eager
        .compile(&registry, session.engine().dialect(), None, &opts)
        .unwrap();
    assert!(compiled.sql().contains("rowcount"));

    let users = eager.select_with(&mut session, None, &opts).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(emails(&mut session, &users[0]).len(), 2);
}

#[test]
fn test_noload_relation_stays_empty() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let quiet = m.user.options(&registry, [noload("addresses")]).unwrap();
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let users = quiet.select_all(&mut session).unwrap();
    assert!(emails(&mut session, &users[0]).is_empty());
    assert_eq!(session.engine().statements().len(), 1);
}

#[test]
fn test_options_are_cached_per_configuration() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);

    let a = m.user.options(&registry, [eagerload("addresses")]).unwrap();
    let b = m.user.options(&registry, [eagerload("addresses")]).unwrap();
    let c = m.user.options(&registry, [eagerload("orders")]).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert!(Arc::ptr_eq(&m.user.options(&registry, []).unwrap(), &m.user));
    assert!(Arc::ptr_eq(&registry.class_mapper(USER).unwrap(), &m.user));

    let original = m.user.property("addresses").and_then(|p| p.as_relation()).unwrap();
    assert_eq!(original.strategy(), LoadStrategy::Lazy);

    let err = m.user.options(&registry, [eagerload("nothing")]).unwrap_err();
    assert!(matches!(err, OrmError::UnknownProperty { .. }));
}

#[test]
fn test_relation_directions() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let address_user = mapper(ADDRESS, &schema.addresses)
        .property("user", relation(&m.user))
        .non_primary()
        .build(&registry)
        .unwrap();

    let addresses = m.user.relation(&registry, "addresses").unwrap();
    assert_eq!(addresses.direction(), Direction::Right);
    assert!(addresses.uselist());
    assert_eq!(addresses.foreign_keys(), &[schema.addresses.c("user_id")]);

    let user = address_user.relation(&registry, "user").unwrap();
    assert_eq!(user.direction(), Direction::Left);
    assert!(!user.uselist());
}

#[test]
fn test_unjoinable_relation_fails_build() {
    let schema = Schema::new();
    let registry = Registry::new();
    let keyword = mapper(KEYWORD, &schema.keywords).build(&registry).unwrap();
    let err = mapper(USER, &schema.users)
        .property("keywords", relation(&keyword))
        .build(&registry)
        .unwrap_err();
    assert!(matches!(err, OrmError::Configuration(ref msg) if msg.contains("no foreign key")));

    // The mapper stays registered, so configure reports it again.
    let err = registry.configure().unwrap_err();
    assert!(matches!(err, OrmError::Configuration(msg) if msg.contains("no foreign key")));
}

#[test]
fn test_relation_to_unmapped_class_resolves_later() {
    let schema = Schema::new();
    let registry = Registry::new();
    let user = mapper(USER, &schema.users)
        .property("addresses", relation(ADDRESS))
        .build(&registry)
        .unwrap();
    assert!(matches!(registry.configure().unwrap_err(), OrmError::NoMapper(name) if name == "Address"));

    mapper(ADDRESS, &schema.addresses).build(&registry).unwrap();
    registry.configure().unwrap();
    let addresses = user.relation(&registry, "addresses").unwrap();
    assert_eq!(addresses.direction(), Direction::Right);
}

#[test]
fn test_unjoinable_relation_to_unmapped_class_fails_configure() {
    let schema = Schema::new();
    let registry = Registry::new();
    mapper(USER, &schema.users)
        .property("keywords", relation(KEYWORD))
        .build(&registry)
        .unwrap();
    mapper(KEYWORD, &schema.keywords).build(&registry).unwrap();

    let err = registry.configure().unwrap_err();
    assert!(matches!(err, OrmError::Configuration(msg) if msg.contains("no foreign key")));
}

#[test]
fn test_select_text_and_instances() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let mut p = Params::new();
    p.insert("name".into(), text("ed"));
    let found = m
        .user
        .select_text(&mut session, "SELECT user_id, user_name FROM users WHERE user_name = :name", &p)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("user_id"), Some(SqlValue::Int(8)));

    let rows = session
        .engine_mut()
        .execute("SELECT user_id, user_name FROM users ORDER BY user_id", &[])
        .unwrap();
    let all = m.user.instances(&session, &rows).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1], found[0]);
}

#[derive(Debug)]
struct SkipEd;

impl MapperExtension for SkipEd {
    fn append_result(&self, _mapper: &clausemap_orm::Mapper, instance: &Instance, _result: &mut Vec<Instance>) -> bool {
        instance.get_as::<String>("user_name").as_deref() != Some("ed")
    }
}

#[test]
fn test_extension_filters_results() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let filtered = m.user.options(&registry, [clausemap_orm::extension(SkipEd)]).unwrap();
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let users = filtered.select_all(&mut session).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].get_as::<String>("user_name").as_deref(), Some("jack"));
}

#[test]
fn test_joined_inheritance_round_trip() {
    const MANAGER: ClassId = ClassId::new("Manager");
    let schema = Schema::new();
    let managers = Table::new(
        "managers",
        vec![
            ColumnDef::new("user_id", SqlType::Integer)
                .primary_key()
                .references("users.user_id"),
            ColumnDef::new("rank", SqlType::varchar(20)),
        ],
    );
    let registry = Registry::new();
    let user = mapper(USER, &schema.users).build(&registry).unwrap();
    let manager = mapper(MANAGER, &managers).inherits(&user).build(&registry).unwrap();

    let mut engine = schema.engine();
    managers.create(&mut engine).unwrap();
    engine.log.clear();
    let mut session = Session::new(&registry, engine);

    let boss = session.new_tracked(MANAGER);
    boss.set("user_name", "ann");
    boss.set("rank", "director");
    session.flush().unwrap();

    let log = session.engine().statements();
    assert!(log[0].starts_with("INSERT INTO users"));
    assert!(log[1].starts_with("INSERT INTO managers"));
    assert_eq!(boss.get("user_id"), Some(SqlValue::Int(1)));

    session.clear();
    let loaded = manager.select_all(&mut session).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].get("rank"), Some(text("director")));
    assert_eq!(loaded[0].get("user_name"), Some(text("ann")));
}

clausemap_orm::mapped_class! {
    /// A typed user handle.
    pub struct User: "User" {
        user_id / set_user_id: i64,
        user_name / set_user_name: String,
    }
}

#[test]
fn test_typed_handle_over_loaded_instance() {
    let schema = Schema::new();
    let registry = Registry::new();
    let m = user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());
    seed(&mut session);

    let raw = m.user.get(&mut session, &[SqlValue::Int(8)]).unwrap().unwrap();
    let ed = User::wrap(raw).unwrap();
    assert_eq!(ed.user_id(), Some(8));
    assert_eq!(ed.user_name().as_deref(), Some("ed"));
    assert_eq!(User::CLASS, USER);
}

#[test]
fn test_deferred_related_is_not_loaded_for_new_objects() {
    let schema = Schema::new();
    let registry = Registry::new();
    user_mappers(&schema, &registry);
    let mut session = Session::new(&registry, schema.engine());

    let fresh = session.new_tracked(USER);
    assert_eq!(session.related(&fresh, "addresses").unwrap(), Related::Many(Vec::new()));
    assert!(session.engine().statements().is_empty());
}
