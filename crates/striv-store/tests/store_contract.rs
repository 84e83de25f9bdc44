//! Behavioral contract of the entity store, checked on every backend.
//!
//! SQLite (in memory) always runs. PostgreSQL and MySQL run when the crate is
//! built with the matching feature and `STRIV_TEST_POSTGRES_URL` /
//! `STRIV_TEST_MYSQL_URL` point at a scratch database. Server-backed stores
//! share one database, so tests serialize on a process-wide lock and wipe
//! the tables they use before running.

use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use serde_json::{json, Value};

use striv_store::{
    Entity, EntityKey, EntityStore, FindQuery, Order, PageRequest, Range, StoreConfig,
    StoreError, TypeRegistry,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

static SERVER_LOCK: Mutex<()> = Mutex::new(());

/// The same extractors the server registers for jobs and runs.
fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with_sort_key("job", |job: &Value| job["name"].as_str().map(str::to_owned))
        .with_sort_key("run", |run: &Value| {
            run["created_at"].as_str().map(str::to_owned)
        })
        .with_relations("run", |run: &Value| {
            vec![(
                "job".to_string(),
                run["job_id"].as_str().unwrap_or_default().to_string(),
            )]
        })
        .with_relations("job", |job: &Value| -> Vec<(String, String)> {
            job["dimensions"]
                .as_object()
                .map(|dims| {
                    dims.iter()
                        .map(|(name, value)| {
                            (
                                "dvalue".to_string(),
                                format!("{}:{}", name, value.as_str().unwrap_or_default()),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
}

fn server_configs() -> Vec<StoreConfig> {
    #[allow(unused_mut)]
    let mut configs = Vec::new();
    #[cfg(feature = "postgres")]
    if let Ok(url) = std::env::var("STRIV_TEST_POSTGRES_URL") {
        configs.push(StoreConfig::Postgres {
            url,
            create_database: true,
        });
    }
    #[cfg(feature = "mysql")]
    if let Ok(url) = std::env::var("STRIV_TEST_MYSQL_URL") {
        configs.push(StoreConfig::Mysql {
            url,
            create_database: true,
        });
    }
    configs
}

/// Every configured store, emptied of the types the tests touch, plus the
/// lock guarding shared server databases.
fn stores() -> (MutexGuard<'static, ()>, Vec<EntityStore>) {
    let guard = SERVER_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut stores = vec![EntityStore::in_memory(registry()).expect("sqlite store")];
    for config in server_configs() {
        let mut store = EntityStore::open(&config, registry()).expect("server store");
        for typ in ["job", "run", "dimension", "execution"] {
            store.replace_type(typ, &IndexMap::new()).expect("wipe");
        }
        stores.push(store);
    }
    (guard, stores)
}

fn job(n: u32) -> Entity {
    let id = format!("job-{n:02}");
    Entity::new(
        "job",
        id.clone(),
        json!({
            "name": id,
            "dimensions": {
                "shared": format!("value-{}", n % 2),
                "unique": format!("value-{n}"),
            }
        }),
    )
}

fn with_five_jobs(store: &mut EntityStore) {
    let jobs: Vec<Entity> = (1..=5).map(job).collect();
    store.upsert(&jobs).expect("upsert five jobs");
}

fn ids(found: &IndexMap<String, Value>) -> Vec<&str> {
    found.keys().map(String::as_str).collect()
}

fn find(store: &mut EntityStore, query: FindQuery) -> Vec<String> {
    store
        .find(&query)
        .expect("find")
        .into_keys()
        .collect()
}

// ---------------------------------------------------------------------------
// load
// ---------------------------------------------------------------------------

#[test]
fn load_returns_entities_in_request_order() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let loaded = store
            .load(&[EntityKey::new("job", "job-01"), EntityKey::new("job", "job-02")])
            .unwrap();
        assert_eq!(loaded[0]["name"], "job-01");
        assert_eq!(loaded[1]["name"], "job-02");

        let loaded = store
            .load(&[EntityKey::new("job", "job-02"), EntityKey::new("job", "job-01")])
            .unwrap();
        assert_eq!(loaded[0]["name"], "job-02");
        assert_eq!(loaded[1]["name"], "job-01");
    }
}

#[test]
fn load_fails_naming_the_missing_key() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let err = store
            .load(&[EntityKey::new("job", "job-01"), EntityKey::new("job", "job-10")])
            .unwrap_err();
        assert!(matches!(&err, StoreError::EntityNotFound(key) if key == "job:job-10"));
        assert!(err.to_string().contains("job:job-10"));
    }
}

#[test]
fn load_returns_repeated_keys_repeatedly() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let key = EntityKey::new("job", "job-03");
        let loaded = store.load(&[key.clone(), key]).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], loaded[1]);
    }
}

// ---------------------------------------------------------------------------
// find
// ---------------------------------------------------------------------------

#[test]
fn find_returns_all_entities_of_type() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let found = store.find(&FindQuery::of_type("job")).unwrap();
        assert_eq!(ids(&found), vec!["job-01", "job-02", "job-03", "job-04", "job-05"]);
    }
}

#[test]
fn related_to_returns_only_related() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").related_to("dvalue", "unique:value-1")),
            vec!["job-01"]
        );
        assert!(find(
            &mut store,
            FindQuery::of_type("job").related_to("dvalue", "unique:value-10")
        )
        .is_empty());
    }
}

#[test]
fn limit_truncates_after_ordering() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").limit(3)),
            vec!["job-01", "job-02", "job-03"]
        );
    }
}

#[test]
fn range_bounds_are_inclusive() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").range(Range::desc(Some("job-03"), None))),
            vec!["job-05", "job-04", "job-03"]
        );
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").range(Range::desc(None, Some("job-03")))),
            vec!["job-03", "job-02", "job-01"]
        );
        assert_eq!(
            find(
                &mut store,
                FindQuery::of_type("job").range(Range::desc(Some("job-02"), Some("job-04")))
            ),
            vec!["job-04", "job-03", "job-02"]
        );
        assert!(find(
            &mut store,
            FindQuery::of_type("job").range(Range::desc(Some("job-10"), None))
        )
        .is_empty());
    }
}

#[test]
fn related_to_and_range_cooperate() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let query = FindQuery::of_type("job")
            .related_to("dvalue", "shared:value-1")
            .range(Range::desc(Some("job-01"), Some("job-03")));
        assert_eq!(find(&mut store, query), vec!["job-03", "job-01"]);
    }
}

#[test]
fn ranged_limit_follows_direction() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let desc = FindQuery::of_type("job")
            .range(Range::desc(Some("job-01"), Some("job-06")))
            .limit(3);
        assert_eq!(find(&mut store, desc), vec!["job-05", "job-04", "job-03"]);
        let asc = FindQuery::of_type("job")
            .range(Range::asc(Some("job-01"), Some("job-06")))
            .limit(3);
        assert_eq!(find(&mut store, asc), vec!["job-01", "job-02", "job-03"]);
    }
}

#[test]
fn hostile_bounds_are_plain_values() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        for bound in [";", "'", "' OR '1'='1", "%", "_"] {
            let found = find(&mut store, FindQuery::of_type("job").range(Range::desc(None, Some(bound))));
            assert!(found.is_empty(), "bound {bound:?} matched {found:?}");
        }
        assert_eq!(store.find(&FindQuery::of_type("job")).unwrap().len(), 5);
    }
}

#[test]
fn wildcards_in_type_are_literal() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        assert!(find(&mut store, FindQuery::of_type("j%")).is_empty());
        assert!(find(&mut store, FindQuery::of_type("jo_")).is_empty());
    }
}

#[test]
fn oversized_limits_behave_alike_everywhere() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        for limit in [i64::MAX as u64, i64::MAX as u64 + 1, u64::MAX] {
            assert_eq!(find(&mut store, FindQuery::of_type("job").limit(limit)).len(), 5);
            let ranged = FindQuery::of_type("job")
                .range(Range::unbounded(Order::Desc))
                .limit(limit);
            assert_eq!(find(&mut store, ranged).first().map(String::as_str), Some("job-05"));
        }
    }
}

#[test]
fn trailing_spaces_make_distinct_keys() {
    let (_guard, stores) = stores();
    for mut store in stores {
        store
            .upsert(&[
                Entity::new("job", "a", json!({"name": "a"})),
                Entity::new("job", "a ", json!({"name": "a "})),
            ])
            .unwrap();

        let loaded = store
            .load(&[EntityKey::new("job", "a"), EntityKey::new("job", "a ")])
            .unwrap();
        assert_eq!(loaded, vec![json!({"name": "a"}), json!({"name": "a "})]);
        assert_eq!(find(&mut store, FindQuery::of_type("job")), vec!["a", "a "]);

        // The padded sort key lies strictly above the bare one.
        let upto_a = FindQuery::of_type("job").range(Range::asc(None, Some("a")));
        assert_eq!(find(&mut store, upto_a), vec!["a"]);
    }
}

// ---------------------------------------------------------------------------
// upsert / delete
// ---------------------------------------------------------------------------

#[test]
fn upsert_updates_sort_key() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        store
            .upsert(&[Entity::new("job", "job-01", json!({"name": "job-00"}))])
            .unwrap();
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").range(Range::asc(None, Some("job-00")))),
            vec!["job-01"]
        );
    }
}

#[test]
fn upsert_recomputes_relations() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        store
            .upsert(&[Entity::new(
                "job",
                "job-01",
                json!({"name": "job-01", "dimensions": {"unique": "value-99"}}),
            )])
            .unwrap();
        assert!(find(
            &mut store,
            FindQuery::of_type("job").related_to("dvalue", "unique:value-1")
        )
        .is_empty());
        assert!(find(
            &mut store,
            FindQuery::of_type("job").related_to("dvalue", "shared:value-1")
        )
        .iter()
        .all(|id| id != "job-01"));
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").related_to("dvalue", "unique:value-99")),
            vec!["job-01"]
        );
    }
}

#[test]
fn upsert_is_idempotent() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        with_five_jobs(&mut store);
        assert_eq!(store.find(&FindQuery::of_type("job")).unwrap().len(), 5);
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").related_to("dvalue", "shared:value-1")),
            vec!["job-01", "job-03", "job-05"]
        );
    }
}

#[test]
fn delete_removes_entities_and_relations() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        store.delete(&[EntityKey::new("job", "job-01")]).unwrap();
        assert!(matches!(
            store.load(&[EntityKey::new("job", "job-01")]),
            Err(StoreError::EntityNotFound(_))
        ));
        assert!(find(
            &mut store,
            FindQuery::of_type("job").related_to("dvalue", "unique:value-1")
        )
        .is_empty());
    }
}

#[test]
fn delete_of_a_missing_key_deletes_nothing() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let err = store
            .delete(&[EntityKey::new("job", "job-01"), EntityKey::new("job", "job-42")])
            .unwrap_err();
        assert!(matches!(err, StoreError::EntityNotFound(key) if key == "job:job-42"));
        assert_eq!(store.load(&[EntityKey::new("job", "job-01")]).unwrap().len(), 1);
    }
}

// ---------------------------------------------------------------------------
// replace_type
// ---------------------------------------------------------------------------

#[test]
fn replace_type_reports_counts_and_replaces() {
    let (_guard, stores) = stores();
    for mut store in stores {
        let first: IndexMap<String, Value> = (0..3)
            .map(|n| (format!("dim-{n}"), json!({"priority": n})))
            .collect();
        let counts = store.replace_type("dimension", &first).unwrap();
        assert_eq!((counts.deleted, counts.inserted), (0, 3));

        let second: IndexMap<String, Value> = (0..2)
            .map(|n| (format!("other-{n}"), json!({"priority": n})))
            .collect();
        let counts = store.replace_type("dimension", &second).unwrap();
        assert_eq!((counts.deleted, counts.inserted), (3, 2));

        let found = store.find(&FindQuery::of_type("dimension")).unwrap();
        assert_eq!(ids(&found), vec!["other-0", "other-1"]);
    }
}

#[test]
fn replace_type_leaves_other_types_alone() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        store.replace_type("jobs", &IndexMap::new()).unwrap();
        store.replace_type("jo", &IndexMap::new()).unwrap();
        assert_eq!(store.find(&FindQuery::of_type("job")).unwrap().len(), 5);
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").related_to("dvalue", "unique:value-2")),
            vec!["job-02"]
        );
    }
}

#[test]
fn replace_type_rebuilds_relations_and_sort_keys() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let replacement: IndexMap<String, Value> = [(
            "job-09".to_string(),
            json!({"name": "job-09", "dimensions": {"unique": "value-9"}}),
        )]
        .into_iter()
        .collect();
        let counts = store.replace_type("job", &replacement).unwrap();
        assert_eq!((counts.deleted, counts.inserted), (5, 1));

        assert!(find(
            &mut store,
            FindQuery::of_type("job").related_to("dvalue", "unique:value-1")
        )
        .is_empty());
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").related_to("dvalue", "unique:value-9")),
            vec!["job-09"]
        );
        assert_eq!(
            find(&mut store, FindQuery::of_type("job").range(Range::desc(None, None))),
            vec!["job-09"]
        );
    }
}

// ---------------------------------------------------------------------------
// find_page
// ---------------------------------------------------------------------------

fn walk(store: &mut EntityStore, related_to: Option<(&str, &str)>, mut request: PageRequest) -> Vec<Vec<String>> {
    let mut pages = Vec::new();
    loop {
        assert!(pages.len() < 100, "page walk did not terminate");
        let page = store.find_page("job", related_to, &request).unwrap();
        pages.push(page.entities.into_keys().collect());
        match page.next {
            Some(token) => {
                request = PageRequest {
                    range: None,
                    token: Some(token),
                    limit: request.limit,
                }
            }
            None => return pages,
        }
    }
}

#[test]
fn pages_walk_most_recent_first() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let pages = walk(
            &mut store,
            None,
            PageRequest {
                limit: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(
            pages,
            vec![
                vec!["job-05", "job-04"],
                vec!["job-03", "job-02"],
                vec!["job-01"],
            ]
        );
    }
}

#[test]
fn pages_walk_ascending_within_explicit_range() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let pages = walk(
            &mut store,
            None,
            PageRequest {
                range: Some(Range::asc(Some("job-02"), Some("job-05"))),
                limit: Some(3),
                ..Default::default()
            },
        );
        assert_eq!(
            pages,
            vec![vec!["job-02", "job-03", "job-04"], vec!["job-05"]]
        );
    }
}

#[test]
fn pages_respect_related_to() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let pages = walk(
            &mut store,
            Some(("dvalue", "shared:value-1")),
            PageRequest {
                limit: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(pages, vec![vec!["job-05", "job-03"], vec!["job-01"]]);
    }
}

#[test]
fn exact_fit_issues_no_token() {
    let (_guard, stores) = stores();
    for mut store in stores {
        with_five_jobs(&mut store);
        let page = store
            .find_page(
                "job",
                None,
                &PageRequest {
                    limit: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.entities.len(), 5);
        assert_eq!(page.next, None);
    }
}

#[test]
fn bad_page_requests_are_rejected() {
    let (_guard, stores) = stores();
    for mut store in stores {
        let err = store
            .find_page(
                "job",
                None,
                &PageRequest {
                    token: Some("not a token".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPageToken(_)));

        let err = store
            .find_page(
                "job",
                None,
                &PageRequest {
                    range: Some(Range::unbounded(Order::Desc)),
                    token: Some(Range::unbounded(Order::Desc).to_token()),
                    limit: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::RangeWithPageToken));
    }
}

#[test]
fn colliding_sort_keys_at_a_boundary_are_never_skipped() {
    let (_guard, stores) = stores();
    for mut store in stores {
        let jobs: Vec<Entity> = [("a", "alpha"), ("b", "same"), ("c", "same"), ("d", "zulu")]
            .iter()
            .map(|(id, name)| Entity::new("job", *id, json!({ "name": name })))
            .collect();
        store.upsert(&jobs).unwrap();

        // "c" shares the pivot's sort key and shows up on both sides of the
        // first boundary, but every entity is seen.
        let pages = walk(
            &mut store,
            None,
            PageRequest {
                limit: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(pages, vec![vec!["d", "c"], vec!["c", "b"], vec!["a"]]);

        // A page made up entirely of one sort key cannot advance: the next
        // token repeats the page.
        let request = |token: Option<String>| PageRequest {
            token,
            limit: Some(1),
            ..Default::default()
        };
        let first = store.find_page("job", None, &request(None)).unwrap();
        assert_eq!(ids(&first.entities), vec!["d"]);
        let second = store.find_page("job", None, &request(first.next)).unwrap();
        assert_eq!(ids(&second.entities), vec!["c"]);
        let third = store
            .find_page("job", None, &request(second.next.clone()))
            .unwrap();
        assert_eq!(ids(&third.entities), vec!["c"]);
        assert_eq!(third.next, second.next);
    }
}

#[test]
fn sqlite_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::sqlite(dir.path().join("striv.db").to_string_lossy());
    {
        let mut store = EntityStore::open(&config, registry()).unwrap();
        with_five_jobs(&mut store);
    }
    let mut store = EntityStore::open(&config, registry()).unwrap();
    assert_eq!(
        find(&mut store, FindQuery::of_type("job").related_to("dvalue", "unique:value-4")),
        vec!["job-04"]
    );
}
