//! End-to-end tests against real SQLite databases, in memory and on disk.

#[cfg(test)]
mod database_tests {
    use dbwrapper::context::{attach_to_context, must_from_context, Context};
    use dbwrapper::{Database, DbError, FailurePolicy, OrAbort};
    use rusqlite::params;
    use std::thread;
    use tempfile::tempdir;

    fn users_db(prefix: &str) -> Database {
        let db = Database::new("sqlite", ":memory:", prefix).unwrap();
        db.exec(
            "CREATE TABLE #__users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            [],
        )
        .unwrap();
        db
    }

    #[test]
    fn test_prefixed_lookup_scenario() {
        let db = users_db("wp_");
        db.exec("INSERT INTO #__users (id, name) VALUES (?1, ?2)", params![7, "Alice"])
            .unwrap();

        let row = db.row("SELECT * FROM #__users WHERE id=?", [7]).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row["id"], "7");
        assert_eq!(row["name"], "Alice");

        assert_eq!(db.result("SELECT * FROM #__users WHERE id=?", [7]).unwrap(), "7");

        // The table really carries the prefix.
        let tables = db
            .query("SELECT name FROM sqlite_master WHERE type = 'table'", [])
            .unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0]["name"], "wp_users");
    }

    #[test]
    fn test_escape_scenario() {
        let db = Database::new("sqlite", ":memory:", "").unwrap();
        assert_eq!(
            db.escape_string("O'Brien said \"hi\""),
            r#"O\'Brien said \"hi\""#
        );
        assert_eq!(db.escape_string(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_on_disk_database_is_shared_between_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.db");
        let path = path.to_str().unwrap();

        let writer = Database::new("sqlite", path, "app_").unwrap();
        writer
            .exec("CREATE TABLE #__notes (id INTEGER PRIMARY KEY, body TEXT)", [])
            .unwrap();
        let id = writer
            .exec_id("INSERT INTO #__notes (body) VALUES (?1)", ["first"])
            .unwrap();
        assert_eq!(id, 1);

        let reader = Database::new("sqlite3", path, "app_").unwrap();
        assert_eq!(
            reader.result("SELECT body FROM #__notes WHERE id = ?1", [id]).unwrap(),
            "first"
        );

        // Same file, different prefix: the table is not visible under that name.
        let other = Database::new("sqlite", path, "other_").unwrap();
        assert!(matches!(
            other.query("SELECT * FROM #__notes", []),
            Err(DbError::Query(_))
        ));
    }

    #[test]
    fn test_concurrent_inserts_through_clones() {
        let db = users_db("t_");

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let db = db.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        db.exec(
                            "INSERT INTO #__users (name) VALUES (?1)",
                            [format!("worker{}-{}", worker, i)],
                        )
                        .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(db.result("SELECT count(*) FROM #__users", []).unwrap(), "100");
    }

    #[test]
    fn test_handle_from_context_runs_queries() {
        let ctx = attach_to_context(&Context::background(), "sqlite", ":memory:", "req_").unwrap();
        let db = must_from_context(&ctx).unwrap();

        db.exec("CREATE TABLE #__hits (n INTEGER)", []).unwrap();
        db.exec("INSERT INTO #__hits VALUES (1), (2), (3)", []).unwrap();

        // Handles pulled out of the same context share one connection.
        let again = must_from_context(&ctx).unwrap();
        assert_eq!(again.result("SELECT sum(n) FROM #__hits", []).unwrap(), "6");
    }

    #[test]
    fn test_returned_errors_leave_handle_usable() {
        let db = users_db("wp_");
        assert!(db.query("SELEC nonsense", []).is_err());
        assert!(db.exec("INSERT INTO #__users (missing) VALUES (1)", []).is_err());

        db.exec("INSERT INTO #__users (name) VALUES ('ok')", []).unwrap();
        assert_eq!(db.result("SELECT name FROM #__users", []).unwrap(), "ok");
    }

    #[test]
    #[should_panic(expected = "database failure: Query error")]
    fn test_fail_fast_handle_panics_on_query_error() {
        let db = Database::builder()
            .prefix("wp_")
            .failure_policy(FailurePolicy::FailFast)
            .open()
            .unwrap();
        let _ = db.query("SELECT * FROM #__missing", []);
    }

    #[test]
    #[should_panic(expected = "database failure: Insert id error")]
    fn test_or_abort_at_call_site() {
        let db = users_db("wp_");
        db.exec_id("DELETE FROM #__users", []).or_abort();
    }
}
