use super::*;
use pretty_assertions::assert_eq;

fn parse(code: &str) -> Program {
    code.parse::<Program>()
        .unwrap_or_else(|e| panic!("failed to parse:\n{code}\n{e}"))
}

fn validation_errors(code: &str) -> Vec<String> {
    match parse(code).validate() {
        Ok(_) => vec![],
        Err(e) => e.errors,
    }
}

// SECTION: parsing and printing

#[test]
fn parses_statements() {
    let program = parse(
        r#"{
            let x := 1
            let y
            y := add(x, 0x20)
            sstore(x, y)
        }"#,
    );

    assert_eq!(
        program,
        Program::new(vec![
            let_stmt("x", num(1)),
            Statement::VariableDeclaration {
                variables: vec![name("y")],
                value: None,
            },
            Statement::Assignment {
                variables: vec![name("y")],
                value: call("add", vec![ident("x"), num(32)]),
            },
            call_stmt("sstore", vec![ident("x"), ident("y")]),
        ])
    );
}

#[test]
fn prints_canonical_form() {
    let program = parse(
        r#"{
            function f(a, b) -> r { if lt(a, b) { r := a leave } r := b }
            let i := 0
            for { } lt(i, 10) { i := add(i, 1) } { if i { break } continue }
            switch calldataload(0) case 0 { } case "abc" { stop() } default { revert(0, 0) }
            { }
        }"#,
    );

    let expected = r#"{
    function f(a, b) -> r {
        if lt(a, b) {
            r := a
            leave
        }
        r := b
    }
    let i := 0
    for { } lt(i, 10) {
        i := add(i, 1)
    } {
        if i {
            break
        }
        continue
    }
    switch calldataload(0)
    case 0 { }
    case "abc" {
        stop()
    }
    default {
        revert(0, 0)
    }
    { }
}"#;
    assert_eq!(program.to_string(), expected);
    assert_eq!(parse(expected), program);
}

#[test]
fn literals() {
    let program = parse(r#"{ let a := 0xff let b := true let c := "a\"b\n" }"#);
    let values: Vec<_> = program
        .code
        .statements
        .iter()
        .map(|stmt| match stmt {
            Statement::VariableDeclaration {
                value: Some(Expression::Literal(lit)),
                ..
            } => lit.clone(),
            _ => panic!("unexpected statement {stmt}"),
        })
        .collect();

    assert_eq!(
        values,
        vec![
            Literal::Number(U256::from(255)),
            Literal::Bool(true),
            Literal::Str("a\"b\n".to_string()),
        ]
    );
    assert_eq!(values[1].value(), U256::one());
    let mut word = [0u8; 32];
    word[0] = b'a';
    assert_eq!(
        Literal::Str("a".to_string()).value(),
        U256::from_big_endian(&word)
    );
    assert_eq!(program.to_string(), parse(&program.to_string()).to_string());
}

#[test]
fn comments_and_keyword_prefixes() {
    let program = parse(
        r#"{
            // a line comment
            let letter := 1 /* a block
            comment */
            let leave_it := letter
        }"#,
    );
    assert_eq!(program.code.statements.len(), 2);
    assert_eq!(
        program.code.statements[1],
        let_stmt("leave_it", ident("letter"))
    );
}

#[test]
fn parse_errors() {
    assert!("{ let := 1 }".parse::<Program>().is_err());
    assert!("{ sstore(0, 1) ".parse::<Program>().is_err());
    assert!("{ let x := 0x1000000000000000000000000000000000000000000000000000000000000000000 }"
        .parse::<Program>()
        .is_err());
    assert!("{ function let() { } }".parse::<Program>().is_err());
}

#[test]
fn hex_literals() {
    let value = |code: &str| match &code.parse::<Program>().unwrap().code.statements[0] {
        Statement::VariableDeclaration {
            value: Some(Expression::Literal(Literal::Number(n))),
            ..
        } => *n,
        stmt => panic!("not a number declaration: {stmt}"),
    };

    assert_eq!(value("{ let x := 0x0 }"), U256::zero());
    assert_eq!(value("{ let x := 0xfF }"), U256::from(255));
    assert_eq!(value("{ let x := 0x100000000000000000000000000000000 }"), U256::from(u128::MAX) + 1);
    assert_eq!(
        value("{ let x := 0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff }"),
        U256::MAX
    );
}

#[test]
fn large_literals() {
    let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
    let program = parse(&format!("{{ let x := {max} }}"));
    assert_eq!(
        program.code.statements[0],
        let_stmt("x", Expression::Literal(Literal::Number(U256::MAX)))
    );
    assert!(format!("{{ let x := {max}0 }}").parse::<Program>().is_err());
}

// SECTION: statement numbering

#[test]
fn numbering_is_pre_order() {
    let program = parse(
        r#"{
            let x := 1
            for { let i := 0 } lt(i, 2) { i := add(i, 1) } { sstore(i, x) }
            function f() { sstore(0, 0) }
            mstore(0, 0)
        }"#,
    );

    let numbered: Vec<String> = program
        .numbered_statements()
        .into_iter()
        .map(|(id, stmt)| match stmt {
            Statement::ForLoop { .. } => format!("{id}: for"),
            Statement::FunctionDefinition(def) => format!("{id}: function {}", def.name),
            _ => format!("{id}: {stmt}"),
        })
        .collect();

    assert_eq!(
        numbered,
        vec![
            "0: let x := 1",
            "1: for",
            "2: let i := 0",
            "3: i := add(i, 1)",
            "4: sstore(i, x)",
            "5: function f",
            "6: sstore(0, 0)",
            "7: mstore(0, 0)",
        ]
    );
    assert_eq!(program.code.subtree_len(), 8);
    assert_eq!(program.code.statements[1].subtree_len(), 4);
}

#[test]
fn finds_nested_functions() {
    let program = parse("{ function f() { function g() { } } { function h() { } } }");
    let names: Vec<_> = program
        .function_definitions()
        .iter()
        .map(|def| def.name.to_string())
        .collect();
    assert_eq!(names, vec!["f", "g", "h"]);
}

#[test]
fn serde_round_trip() {
    let program = parse("{ let x := 1 sstore(x, \"abc\") }");
    let json = serde_json::to_string(&program).unwrap();
    let back: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(back, program);
}

// SECTION: validation

#[test]
fn valid_program() {
    let errors = validation_errors(
        r#"{
            function f(a) -> r, s { r := a s := mload(a) }
            let x, y := f(1)
            for { let i := 0 } lt(i, x) { i := add(i, 1) } {
                if eq(i, y) { break }
                sstore(i, ext(i))
            }
            switch x case 0 { } default { }
        }"#,
    );
    assert_eq!(errors, Vec::<String>::new());
}

#[test]
fn undefined_and_out_of_scope_variables() {
    let errors = validation_errors("{ { let x := 1 } sstore(x, 0) }");
    assert_eq!(errors, vec!["[<top level>] undefined variable: x"]);

    let errors = validation_errors("{ let x := 1 function f() { sstore(x, 0) } }");
    assert_eq!(errors, vec!["[f] undefined variable: x"]);

    let errors = validation_errors("{ sstore(y, 0) let y := 1 }");
    assert_eq!(errors, vec!["[<top level>] undefined variable: y"]);
}

#[test]
fn duplicate_declarations() {
    let errors = validation_errors("{ function f(a) { } function g(a) { } }");
    assert_eq!(errors, vec!["variable a is declared more than once"]);

    let errors = validation_errors("{ function f() { } function f() { } function mstore() { } }");
    assert_eq!(
        errors,
        vec![
            "function f is defined more than once",
            "function mstore shadows a builtin",
        ]
    );
}

#[test]
fn arity() {
    let errors = validation_errors("{ sstore(0) }");
    assert_eq!(
        errors,
        vec!["[<top level>] sstore expects 2 argument(s) but is called with 1"]
    );

    let errors = validation_errors("{ function f() -> a, b { } let x := f() }");
    assert_eq!(
        errors,
        vec!["[<top level>] f() returns 2 value(s) where 1 are expected"]
    );

    let errors = validation_errors("{ sload(0) }");
    assert_eq!(
        errors,
        vec!["[<top level>] the 1 value(s) returned by sload(0) are discarded"]
    );

    // nothing is known about external functions.
    assert_eq!(validation_errors("{ let a, b := ext(1, 2, 3) ext() }"), Vec::<String>::new());
}

#[test]
fn misplaced_control_flow() {
    let errors = validation_errors(
        r#"{
            break
            for { } 1 { continue } { function f() { break leave } }
            leave
        }"#,
    );
    assert_eq!(
        errors,
        vec![
            "break outside of a loop body",
            "continue outside of a loop body",
            "break outside of a loop body",
            "leave outside of a function",
        ]
    );
}

#[test]
fn invalid_switches_and_literals() {
    let program = Program::new(vec![Statement::Switch {
        expression: num(0),
        cases: vec![
            Case {
                value: None,
                body: Block::default(),
            },
            Case {
                value: Some(Literal::Number(U256::one())),
                body: Block::default(),
            },
            Case {
                value: Some(Literal::Bool(true)),
                body: Block::default(),
            },
        ],
    }]);
    let errors = program.validate().unwrap_err().errors;
    assert_eq!(
        errors,
        vec![
            "the default case of switch 0 must come last",
            "switch 0 has duplicate case true",
        ]
    );

    let errors = validation_errors(r#"{ sstore(0, "0123456789012345678901234567890123") }"#);
    assert_eq!(
        errors,
        vec!["string literal \"0123456789012345678901234567890123\" is longer than 32 bytes"]
    );
}

#[test]
fn invalid_identifiers() {
    let program = Program::new(vec![
        let_stmt("9lives", num(0)),
        let_stmt("for", num(0)),
    ]);
    let errors = program.validate().unwrap_err().errors;
    assert_eq!(
        errors,
        vec![
            "9lives is an invalid identifier",
            "reserved word \"for\" used as identifier",
        ]
    );
}
