mod common;

use cass_mock::{Action, Error, Statement, Value};

#[test]
fn prepare_then_bind_round_trips_parameters() {
    let session = common::books_session();
    let statement = session
        .prepare("INSERT INTO books (pk1, ck1, ck2, field1) VALUES (?, ?, ?, ?)")
        .unwrap();
    assert_eq!(statement.action(), Action::Insert);

    let bound = statement
        .bind(&[
            Value::from("cds"),
            Value::from("Rock"),
            Value::Int(1),
            Value::from("Nevermind"),
        ])
        .unwrap();
    session.execute(&bound, &[]).unwrap();

    let page = session
        .execute_query(
            "SELECT field1 FROM books WHERE pk1 = ? AND ck1 = ?",
            &[Value::from("cds"), Value::from("Rock")],
        )
        .unwrap();
    assert_eq!(page[0]["field1"], Value::from("Nevermind"));
}

#[test]
fn fill_params_consumes_placeholders_in_declaration_order() {
    let statement = Statement::new(
        "SELECT * FROM everything WHERE something = ? AND nothing = ?",
        &[],
    )
    .unwrap();
    let filled = statement
        .fill_params(&[Value::from("first"), Value::from("second")])
        .unwrap();
    assert_ne!(filled, statement);
    // already-bound values stay put when extra parameters are supplied
    assert_eq!(filled.fill_params(&[Value::from("third")]).unwrap(), filled);
}

#[test]
fn fill_params_with_too_few_parameters_errors() {
    let statement =
        Statement::new("SELECT * FROM everything WHERE something = ?", &[]).unwrap();
    assert_eq!(
        statement.fill_params(&[]).unwrap_err(),
        Error::Invalid("Not enough params provided to fill_params".into())
    );
}

#[test]
fn executing_unbound_statements_is_rejected() {
    let session = common::books_session();
    let statement = session
        .prepare("SELECT * FROM books WHERE pk1 = ?")
        .unwrap();
    assert_eq!(
        session.execute(&statement, &[]).unwrap_err(),
        Error::Invalid("Cannot execute a statement with unbound parameters".into())
    );
}

#[test]
fn statement_equality_is_structural() {
    let a = Statement::new("SELECT * FROM everything", &[]).unwrap();
    let b = Statement::new("SELECT * FROM everything", &[]).unwrap();
    assert_eq!(a, b);
    let c = Statement::new("SELECT * FROM nothing", &[]).unwrap();
    assert_ne!(a, c);
}

#[test]
fn operators_parse_without_surrounding_whitespace() {
    let session = common::books_session();
    for n in 1..=4 {
        session
            .execute_query(
                "INSERT INTO books (pk1, ck1, ck2, field1) VALUES ('a', 'b', ?, 'x')",
                &[Value::Int(n)],
            )
            .unwrap();
    }
    let page = session
        .execute_query(
            "SELECT * FROM books WHERE pk1='a' AND ck1='b' AND ck2<=?",
            &[Value::Int(2)],
        )
        .unwrap();
    assert_eq!(page.len(), 2);
}

#[test]
fn tuple_comparisons_apply_lexicographic_ordering() {
    let session = common::books_session();
    let rows = [("a", 1, "low"), ("b", 5, "mid"), ("c", 9, "high")];
    for (ck1, ck2, field1) in rows {
        session
            .execute_query(
                "INSERT INTO books (pk1, ck1, ck2, field1) VALUES (?, ?, ?, ?)",
                &[
                    Value::from("shelf"),
                    Value::from(ck1),
                    Value::Int(ck2),
                    Value::from(field1),
                ],
            )
            .unwrap();
    }
    let page = session
        .execute_query(
            "SELECT field1 FROM books WHERE pk1 = 'shelf' AND (ck1, ck2) >= ('b', 5)",
            &[],
        )
        .unwrap();
    let field1: Vec<_> = page.rows().iter().map(|r| r["field1"].clone()).collect();
    assert_eq!(field1, vec![Value::from("mid"), Value::from("high")]);
}

#[test]
fn same_column_inequalities_combine_conjunctively() {
    let session = common::books_session();
    for n in 1..=9 {
        session
            .execute_query(
                "INSERT INTO books (pk1, ck1, ck2, field1) VALUES ('a', 'b', ?, 'x')",
                &[Value::Int(n)],
            )
            .unwrap();
    }
    let page = session
        .execute_query(
            "SELECT * FROM books WHERE pk1 = 'a' AND ck1 = 'b' AND ck2 >= 5 AND ck2 <= 7",
            &[],
        )
        .unwrap();
    let ck2: Vec<_> = page.rows().iter().map(|r| r["ck2"].clone()).collect();
    assert_eq!(ck2, vec![Value::Int(5), Value::Int(6), Value::Int(7)]);
}
