use common::DbConfig;
use driver::{Driver, DriverError, ExecutionResult};
use pretty_assertions_sorted::assert_eq;

fn run(driver: &Driver, sql: &str) -> String {
    driver
        .execute_sql(sql)
        .unwrap_or_else(|err| panic!("`{}` failed: {}", sql, err))
        .to_string()
}

fn fail(driver: &Driver, sql: &str) -> DriverError {
    match driver.execute_sql(sql) {
        Ok(result) => panic!("`{}` unexpectedly succeeded: {}", sql, result),
        Err(err) => err,
    }
}

fn rows(driver: &Driver, sql: &str) -> Vec<Vec<String>> {
    match driver.execute_sql(sql).unwrap() {
        ExecutionResult::Rows(rows) => rows.rows().to_vec(),
        ExecutionResult::NoRows => Vec::new(),
        other => panic!("`{}` returned {:?}", sql, other),
    }
}

fn company() -> Driver {
    let driver = Driver::in_memory().unwrap();
    for sql in [
        "CREATE DATABASE acme",
        "CREATE TABLE acme.teams (id INT PRIMARY KEY, name VARCHAR(32) UNIQUE)",
        "CREATE TABLE acme.users (id INT PRIMARY KEY, login TEXT UNIQUE, team_id INT REFERENCES teams(id))",
        "INSERT INTO acme.teams (id, name) VALUES (1, 'core')",
        "INSERT INTO acme.teams (id, name) VALUES (2, 'infra')",
        "INSERT INTO acme.users (id, login, team_id) VALUES (10, 'ann', 1)",
        "INSERT INTO acme.users (id, login, team_id) VALUES (11, 'bob', 1)",
        "INSERT INTO acme.users (id, login, team_id) VALUES (12, 'cyd', NULL)",
    ] {
        run(&driver, sql);
    }
    driver
}

#[test]
fn constraint_scenario() {
    let driver = Driver::in_memory().unwrap();
    run(&driver, "CREATE DATABASE d1");
    run(&driver, "CREATE TABLE d1.t1 (id INT PRIMARY KEY, name STRING UNIQUE)");

    run(&driver, "INSERT INTO d1.t1 (id, name) VALUES (1, 'a')");
    assert!(matches!(
        fail(&driver, "INSERT INTO d1.t1 (id, name) VALUES (1, 'b')"),
        DriverError::DuplicateEntity(_)
    ));
    assert!(matches!(
        fail(&driver, "INSERT INTO d1.t1 (id, name) VALUES (2, 'a')"),
        DriverError::UniqueConstraintViolation(_)
    ));
    run(&driver, "INSERT INTO d1.t1 (id, name) VALUES (2, 'b')");

    assert_eq!(
        rows(&driver, "SELECT * FROM d1.t1"),
        vec![
            vec!["1".to_string(), "a".to_string()],
            vec!["2".to_string(), "b".to_string()],
        ]
    );
}

#[test]
fn values_with_delimiters_round_trip() {
    let driver = Driver::in_memory().unwrap();
    run(&driver, "CREATE DATABASE d1");
    run(&driver, "CREATE TABLE d1.notes (id INT PRIMARY KEY, body TEXT UNIQUE)");
    run(&driver, "INSERT INTO d1.notes (id, body) VALUES (1, 'a#b&c:d''e')");

    assert_eq!(
        rows(&driver, "SELECT body FROM d1.notes WHERE id = 1"),
        vec![vec!["a#b&c:d'e".to_string()]]
    );
}

#[test]
fn foreign_keys_guard_deletes_and_drops() {
    let driver = company();

    assert!(matches!(
        fail(&driver, "DELETE FROM acme.teams WHERE id = 1"),
        DriverError::ForeignKeyConstraintViolation(_)
    ));
    assert!(matches!(
        fail(&driver, "INSERT INTO acme.users (id, login, team_id) VALUES (13, 'dee', 7)"),
        DriverError::ForeignKeyConstraintViolation(_)
    ));
    assert!(matches!(
        fail(&driver, "DROP TABLE acme.teams"),
        DriverError::ForeignKeyConstraintViolation(_)
    ));
    assert_eq!(rows(&driver, "SELECT id FROM acme.teams").len(), 2);

    assert_eq!(run(&driver, "DELETE FROM acme.teams WHERE id = 2"), "1 row(s) deleted");
    run(&driver, "DROP TABLE acme.users");
    run(&driver, "DROP TABLE acme.teams");
    assert!(driver.records().is_metadata_in_sync().unwrap());
}

#[test]
fn join_keeps_unmatched_outer_rows() {
    let driver = company();

    let result = rows(
        &driver,
        "SELECT users.login, teams.name FROM acme.users JOIN teams ON users.team_id = teams.id",
    );

    assert_eq!(
        result,
        vec![
            vec!["ann".to_string(), "core".to_string()],
            vec!["bob".to_string(), "core".to_string()],
            vec!["cyd".to_string(), String::new()],
        ]
    );
}

#[test]
fn join_from_the_referenced_side() {
    let driver = company();

    let result = rows(
        &driver,
        "SELECT name, login FROM acme.teams JOIN acme.users ON users.team_id = teams.id \
         WHERE teams.name = 'core'",
    );

    assert_eq!(
        result,
        vec![
            vec!["core".to_string(), "ann".to_string()],
            vec!["core".to_string(), "bob".to_string()],
        ]
    );
}

#[test]
fn update_rechecks_constraints() {
    let driver = company();

    assert_eq!(
        run(&driver, "UPDATE acme.users SET team_id = 2 WHERE team_id = 1"),
        "2 row(s) updated"
    );
    assert!(matches!(
        fail(&driver, "UPDATE acme.users SET login = 'ann' WHERE id = 11"),
        DriverError::UniqueConstraintViolation(_)
    ));
    assert!(matches!(
        fail(&driver, "UPDATE acme.teams SET id = 9 WHERE id = 2"),
        DriverError::ForeignKeyConstraintViolation(_)
    ));
    assert_eq!(
        rows(&driver, "SELECT login, team_id FROM acme.users WHERE id = 11"),
        vec![vec!["bob".to_string(), "2".to_string()]]
    );
}

#[test]
fn indexes_and_listings() {
    let driver = company();

    run(&driver, "CREATE UNIQUE INDEX by_pair ON acme.users (login, team_id)");
    assert!(matches!(
        fail(&driver, "CREATE INDEX by_pair ON acme.users (team_id)"),
        DriverError::DuplicateEntity(_)
    ));
    run(&driver, "DROP INDEX by_pair ON acme.users");
    assert!(matches!(
        fail(&driver, "DROP INDEX by_pair ON acme.users"),
        DriverError::NotFound(_)
    ));

    assert_eq!(rows(&driver, "SHOW DATABASES"), vec![vec!["acme".to_string()]]);
    assert_eq!(
        rows(&driver, "SHOW TABLES acme"),
        vec![vec!["teams".to_string()], vec!["users".to_string()]]
    );
    assert!(driver.records().is_metadata_in_sync().unwrap());
}

#[test]
fn errors_are_typed() {
    let driver = company();

    assert!(matches!(
        fail(&driver, "SELECT * FROM nowhere.t"),
        DriverError::NotFound(_)
    ));
    assert!(matches!(
        fail(&driver, "SELECT * FROM acme.users WHERE shoe_size = 3"),
        DriverError::NotFound(_)
    ));
    assert!(matches!(
        fail(&driver, "CREATE TABLE acme.bad (id INT, name TEXT)"),
        DriverError::InvalidSchema(_)
    ));
    assert!(matches!(
        fail(&driver, "INSERT INTO acme.teams (id, name) VALUES ('three', 'x')"),
        DriverError::InvalidSchema(_)
    ));
    assert!(matches!(
        fail(&driver, "SELECT FROM"),
        DriverError::InvalidSchema(_)
    ));
    assert!(matches!(
        fail(&driver, "CREATE DATABASE acme"),
        DriverError::DuplicateEntity(_)
    ));
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::builder().data_dir(dir.path().to_path_buf()).build();

    {
        let driver = Driver::open(&config).unwrap();
        run(&driver, "CREATE DATABASE d1");
        run(&driver, "CREATE TABLE d1.t1 (id INT PRIMARY KEY, name TEXT UNIQUE)");
        run(&driver, "INSERT INTO d1.t1 (id, name) VALUES (1, 'a')");
    }

    let driver = Driver::open(&config).unwrap();
    assert!(driver.records().is_metadata_in_sync().unwrap());
    assert_eq!(
        rows(&driver, "SELECT name FROM d1.t1"),
        vec![vec!["a".to_string()]]
    );
    assert!(matches!(
        fail(&driver, "INSERT INTO d1.t1 (id, name) VALUES (2, 'a')"),
        DriverError::UniqueConstraintViolation(_)
    ));
}
