//! End-to-end scenarios S1-S6, driving `Database::execute` only.

use latticedb::engine::Database;
use latticedb::value::Value;

fn run(db: &mut Database, sql: &str) -> Vec<latticedb::engine::StatementResult> {
    let results = db.execute(sql);
    for r in &results {
        assert!(r.ok, "statement failed: {}", r.message);
    }
    results
}

fn last_rows(results: &[latticedb::engine::StatementResult]) -> &Vec<Vec<Value>> {
    &results.last().unwrap().rows
}

#[test]
fn s1_crdt_merge_bounded_counter_growing_set_lww() {
    let mut db = Database::new();
    run(
        &mut db,
        "CREATE TABLE people (id TEXT PRIMARY KEY, name TEXT MERGE lww,
           tags SET<TEXT> MERGE gset, credits INT MERGE sum_bounded(0, 1000000));",
    );
    run(&mut db, "INSERT INTO people (id,name,tags,credits) VALUES ('u1','Ada',{'engineer'},10);");
    let results = run(
        &mut db,
        "INSERT INTO people (id,name,tags,credits) VALUES ('u1','Ada Lovelace',{'leader'},15) ON CONFLICT MERGE;
         SELECT name, tags, credits FROM people WHERE id='u1';",
    );
    let rows = last_rows(&results);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row[0], Value::Text("Ada Lovelace".into()));
    match &row[1] {
        Value::Set(items) => {
            let mut items = items.clone();
            items.sort();
            assert_eq!(items, vec!["engineer".to_string(), "leader".to_string()]);
        }
        other => panic!("expected a set, got {other:?}"),
    }
    assert_eq!(row[2], Value::Int(25));
}

#[test]
fn s2_time_travel_as_of_tx() {
    let mut db = Database::new();
    run(
        &mut db,
        "CREATE TABLE people (id TEXT PRIMARY KEY, name TEXT MERGE lww,
           tags SET<TEXT> MERGE gset, credits INT MERGE sum_bounded(0, 1000000));",
    );
    run(&mut db, "INSERT INTO people (id,name,tags,credits) VALUES ('u1','Ada',{'engineer'},10);");
    run(
        &mut db,
        "INSERT INTO people (id,name,tags,credits) VALUES ('u1','Ada Lovelace',{'leader'},15) ON CONFLICT MERGE;",
    );
    let results = run(&mut db, "SELECT name FROM people FOR SYSTEM_TIME AS OF TX 1 WHERE id='u1';");
    let rows = last_rows(&results);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Text("Ada".into()));
}

#[test]
fn s3_join_and_group_by() {
    let mut db = Database::new();
    run(&mut db, "CREATE TABLE departments (dept_id INT PRIMARY KEY, dept_name TEXT);");
    run(&mut db, "CREATE TABLE employees (emp_id INT PRIMARY KEY, name TEXT, dept_id INT, salary INT);");
    run(&mut db, "INSERT INTO departments (dept_id, dept_name) VALUES (1,'Eng');");
    run(&mut db, "INSERT INTO departments (dept_id, dept_name) VALUES (2,'Sales');");
    run(&mut db, "INSERT INTO employees (emp_id, name, dept_id, salary) VALUES (1,'A',1,100);");
    run(&mut db, "INSERT INTO employees (emp_id, name, dept_id, salary) VALUES (2,'B',1,120);");
    let results = run(
        &mut db,
        "INSERT INTO employees (emp_id, name, dept_id, salary) VALUES (3,'C',2,90);
         SELECT d.dept_name, COUNT(*), SUM(e.salary)
           FROM employees e JOIN departments d ON e.dept_id=d.dept_id
           GROUP BY d.dept_name ORDER BY dept_name;",
    );
    let rows = last_rows(&results);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], Value::Text("Eng".into()));
    assert_eq!(rows[0][1], Value::Int(2));
    assert_eq!(rows[0][2], Value::Double(220.0));
    assert_eq!(rows[1][0], Value::Text("Sales".into()));
    assert_eq!(rows[1][1], Value::Int(1));
    assert_eq!(rows[1][2], Value::Double(90.0));
}

#[test]
fn s4_transaction_rollback_restores_prior_count() {
    let mut db = Database::new();
    run(&mut db, "CREATE TABLE people (id TEXT PRIMARY KEY, name TEXT MERGE lww, credits INT);");
    run(&mut db, "INSERT INTO people (id,name,credits) VALUES ('u1','Ada',10);");
    let before = run(&mut db, "SELECT COUNT(*) FROM people;");
    let before_count = last_rows(&before)[0][0].clone();

    run(&mut db, "BEGIN;");
    run(&mut db, "INSERT INTO people (id,name,credits) VALUES ('u2','X',0);");
    run(&mut db, "ROLLBACK;");

    let after = run(&mut db, "SELECT COUNT(*) FROM people;");
    assert_eq!(last_rows(&after)[0][0], before_count);
}

#[test]
fn s5_vector_distance_predicate() {
    let mut db = Database::new();
    run(&mut db, "CREATE TABLE v (id TEXT PRIMARY KEY, e VECTOR<4>);");
    run(&mut db, "INSERT INTO v (id, e) VALUES ('a',[0,0,0,0]);");
    let results = run(
        &mut db,
        "INSERT INTO v (id, e) VALUES ('b',[1,1,1,1]);
         SELECT id FROM v WHERE DISTANCE(e,[0.1,0,0,0]) < 0.5;",
    );
    let rows = last_rows(&results);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Text("a".into()));
}

#[test]
fn s6_dp_count_deviates_on_the_order_of_one_over_epsilon() {
    let mut db = Database::new();
    run(&mut db, "CREATE TABLE employees (emp_id INT PRIMARY KEY, salary INT);");
    for i in 0..50 {
        run(&mut db, &format!("INSERT INTO employees (emp_id, salary) VALUES ({i}, 100);"));
    }
    run(&mut db, "SET DP_EPSILON=0.5;");
    let results = run(&mut db, "SELECT DP_COUNT(*) FROM employees;");
    let rows = last_rows(&results);
    assert_eq!(rows.len(), 1);
    let noisy = match &rows[0][0] {
        Value::Double(d) => *d,
        Value::Int(i) => *i as f64,
        other => panic!("expected a numeric DP_COUNT, got {other:?}"),
    };
    // b = 1/epsilon = 2; the Laplace noise is essentially always within a
    // generous number of scale units of the true count of 50.
    assert!((noisy - 50.0).abs() < 200.0, "noisy count {noisy} too far from true count 50");
}
