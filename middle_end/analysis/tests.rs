use std::collections::{BTreeMap as Map, BTreeSet as Set};

use pretty_assertions::assert_eq;
use primitive_types::U256;

use super::call_graph::*;
use super::knowledge_base::*;
use super::side_effects::*;
use super::ssa_values::*;
use super::*;
use crate::middle_end::dialect::{Effect, SideEffects};

fn parse(code: &str) -> Program {
    code.parse::<Program>()
        .unwrap_or_else(|e| panic!("failed to parse:\n{code}\n{e}"))
}

fn names(names: &Set<Name>) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// SECTION: structured walker

// calls that happened on some path, plus a log of every hook.
#[derive(Default)]
struct Trace {
    env: MayCalls,
    events: Vec<String>,
    snapshots: Map<StmtId, Vec<String>>,
}

#[derive(Clone, Default)]
struct MayCalls(Set<String>);

impl AbstractEnv for MayCalls {
    fn join_with(&mut self, rhs: Self) {
        self.0.extend(rhs.0);
    }
}

impl StructuredAnalysis for Trace {
    type Env = MayCalls;

    fn env(&mut self) -> &mut MayCalls {
        &mut self.env
    }

    fn visit_call(&mut self, call: &FunctionCall) {
        self.events.push(format!("call {}", call.function_name));
        self.env.0.insert(call.function_name.to_string());
    }

    fn visit_statement(&mut self, id: StmtId, _stmt: &Statement) {
        self.events.push(format!("stmt {id}"));
        self.snapshots
            .insert(id, self.env.0.iter().cloned().collect());
    }

    fn visit_leave(&mut self) {
        self.events.push("leave".to_string());
    }

    fn enter_function(&mut self, def: &FunctionDefinition) {
        self.events.push(format!("enter {}", def.name));
    }

    fn leave_function(&mut self, def: &FunctionDefinition) {
        self.events.push(format!("exit {}", def.name));
    }

    fn shortcut_nested_loop(&mut self, _zero_runs: &MayCalls) {
        self.events.push("shortcut".to_string());
    }
}

fn trace(code: &str, max_loop_nesting: usize) -> Trace {
    let mut analysis = Trace::default();
    forward_walk(&parse(code), &mut analysis, max_loop_nesting);
    analysis
}

// calls that happened on every path.  `None` is unreachable code.
#[derive(Clone, Default)]
struct MustCalls(Option<Set<String>>);

impl AbstractEnv for MustCalls {
    fn join_with(&mut self, rhs: Self) {
        self.0 = match (self.0.take(), rhs.0) {
            (Some(a), Some(b)) => Some(a.intersection(&b).cloned().collect()),
            (a, b) => a.or(b),
        };
    }
}

struct Must {
    env: MustCalls,
    at_end: Vec<String>,
}

impl StructuredAnalysis for Must {
    type Env = MustCalls;

    fn env(&mut self) -> &mut MustCalls {
        &mut self.env
    }

    fn visit_call(&mut self, call: &FunctionCall) {
        if let Some(calls) = &mut self.env.0 {
            calls.insert(call.function_name.to_string());
        }
    }

    fn enter_function(&mut self, _def: &FunctionDefinition) {
        self.env = MustCalls(Some(Set::new()));
    }

    fn leave_function(&mut self, def: &FunctionDefinition) {
        let calls = self.env.0.clone().unwrap_or_default();
        self.at_end.push(format!("{}: {calls:?}", def.name));
    }

}

fn must_calls(code: &str) -> Vec<String> {
    let mut analysis = Must {
        env: MustCalls(Some(Set::new())),
        at_end: vec![],
    };
    forward_walk(&parse(code), &mut analysis, DEFAULT_MAX_LOOP_NESTING);
    let calls = analysis.env.0.unwrap_or_default();
    analysis.at_end.push(format!("top: {calls:?}"));
    analysis.at_end
}

#[test]
fn calls_in_evaluation_order() {
    let trace = trace("{ let x := add(1, mload(0)) sstore(x, f(g(), h())) }", 6);
    assert_eq!(
        trace.events,
        vec![
            "call mload",
            "call add",
            "stmt 0",
            "enter f",
            "call h",
            "call g",
            "call f",
            "call sstore",
            "stmt 1",
        ]
    );
}

#[test]
fn loops_are_walked_twice_with_stable_ids() {
    let trace = trace(
        "{ for { let i := 0 } lt(i, 2) { i := add(i, 1) } { sstore(i, 1) } }",
        6,
    );
    assert_eq!(
        trace.events,
        vec![
            "stmt 1",
            "call lt",
            "call sstore",
            "stmt 3",
            "call add",
            "stmt 2",
            "call lt",
            "call sstore",
            "stmt 3",
            "call add",
            "stmt 2",
            "call lt",
            "stmt 0",
        ]
    );
}

#[test]
fn deeply_nested_loops_are_shortcut() {
    let trace = trace("{ for { } 1 { } { for { } 1 { } { f() } } }", 2);
    assert_eq!(
        trace.events,
        vec![
            // outer loop, first iteration
            "call f",
            "stmt 2",
            "shortcut",
            "stmt 1",
            // outer loop, second iteration
            "call f",
            "stmt 2",
            "shortcut",
            "stmt 1",
            "stmt 0",
        ]
    );
}

#[test]
fn break_skips_the_rest_of_the_body() {
    let trace = trace(
        r#"{
            for { } 1 { } {
                a()
                if x { b() break }
                c()
            }
            d()
        }"#,
        6,
    );
    // statements: for 0, a() 1, if 2, b() 3, break 4, c() 5, d() 6
    assert_eq!(trace.snapshots[&StmtId(5)], vec!["a", "c"]);
    assert_eq!(trace.snapshots[&StmtId(6)], vec!["a", "b", "c", "d"]);
}

#[test]
fn functions_and_leave() {
    let trace = trace("{ a() function f() { b() leave } c() }", 6);
    assert_eq!(
        trace.events,
        vec![
            "call a",
            "stmt 0",
            "call b",
            "stmt 2",
            "leave",
            "stmt 3",
            "exit f",
            "stmt 1",
            "call c",
            "stmt 4",
        ]
    );
    // the body of f starts from an empty environment, and the caller's is
    // restored afterwards.
    assert_eq!(trace.snapshots[&StmtId(2)], vec!["b"]);
    assert_eq!(trace.snapshots[&StmtId(4)], vec!["a", "c"]);
}

#[test]
fn branches_join() {
    assert_eq!(must_calls("{ if x { a() } b() }"), vec![r#"top: {"b"}"#]);
    assert_eq!(
        must_calls("{ switch x case 0 { a() } default { a() b() } c() }"),
        vec![r#"top: {"a", "c"}"#]
    );
    assert_eq!(
        must_calls("{ switch x case 0 { a() } case 1 { a() } c() }"),
        vec![r#"top: {"c"}"#]
    );
    assert_eq!(
        must_calls("{ a() function f() { if x { b() } c() } d() }"),
        vec![r#"f: {"c"}"#, r#"top: {"a", "d"}"#]
    );
}

#[test]
fn loop_exits_join() {
    // the condition is evaluated on every path out of the loop.
    assert_eq!(
        must_calls("{ for { a() } c() { p() } { b() } }"),
        vec![r#"top: {"a", "c"}"#]
    );
    // continue skips the rest of the body.
    assert_eq!(
        must_calls("{ for { } c() { } { if x { continue } b() } }"),
        vec![r#"top: {"c"}"#]
    );
}

// SECTION: call graph

#[test]
fn call_graph() {
    let program = parse(
        r#"{
            function f() { g() function h() { sstore(0, 0) } }
            function g() { f() pop(mload(0)) }
            f()
        }"#,
    );
    let graph = CallGraph::new(&program);

    assert_eq!(names(&graph.callees[&name("f")]), vec!["g"]);
    assert_eq!(names(&graph.callees[&name("g")]), vec!["f", "mload", "pop"]);
    assert_eq!(names(&graph.callees[&name("h")]), vec!["sstore"]);
    assert_eq!(names(&graph.reachable(&name("f"))), vec!["f", "g", "mload", "pop"]);
    assert_eq!(names(&graph.reachable(&name("h"))), vec!["sstore"]);
}

#[test]
fn msize() {
    assert!(contains_msize(&parse(
        "{ function f() { if 1 { let x := add(msize(), 1) } } }"
    )));
    assert!(!contains_msize(&parse("{ mstore(0, 0) }")));
}

// SECTION: side effects

fn summary(memory: Effect, storage: Effect, terminates: bool, reverts: bool) -> SideEffects {
    SideEffects {
        memory,
        storage,
        terminates,
        reverts,
    }
}

#[test]
fn side_effect_propagation() {
    use Effect::*;

    let program = parse(
        r#"{
            function reverts_always() { revert(0, 0) }
            function stops() { sstore(0, 1) return(0, 0) }
            function maybe(x) { if x { leave } revert(0, 0) }
            function calls_reverter() { let y := mload(0) reverts_always() }
            function external() { ext() }
            function reader() -> r { r := sload(0) }
            function recursive() { recursive() }
            function loops() { for { } 1 { } { } revert(0, 0) }
        }"#,
    );
    let effects = FunctionSideEffects::compute(&program);
    let get = |f: &str| effects.get(&name(f));

    assert_eq!(get("reverts_always"), summary(Read, None, true, true));
    assert_eq!(get("stops"), summary(Read, Write, true, false));
    assert_eq!(get("maybe"), summary(Read, None, false, false));
    assert_eq!(get("calls_reverter"), summary(Read, None, true, true));
    assert_eq!(get("external"), summary(Write, Write, false, false));
    assert_eq!(get("reader"), summary(None, Read, false, false));
    assert_eq!(get("recursive"), summary(None, None, false, false));
    // the loop hides the revert.
    assert_eq!(get("loops"), summary(Read, None, false, false));

    assert_eq!(get("sstore"), summary(None, Write, false, false));
    assert_eq!(get("ext"), SideEffects::worst());
}

#[test]
fn side_effects_from_json() {
    let effects = FunctionSideEffects::from_json(
        r#"{ "f": { "memory": "Write", "terminates": true, "reverts": true } }"#,
    )
    .unwrap();
    assert_eq!(
        effects.get(&name("f")),
        summary(Effect::Write, Effect::None, true, true)
    );

    let computed = FunctionSideEffects::compute(&parse("{ function g() { sstore(0, 0) } }"));
    let json = serde_json::to_string(&computed).unwrap();
    assert_eq!(FunctionSideEffects::from_json(&json).unwrap(), computed);

    assert!(FunctionSideEffects::from_json(r#"{ "f": { "memory": "Sometimes" } }"#).is_err());
}

// SECTION: SSA values and knowledge

#[test]
fn ssa_values() {
    let values = ValueMap::new(&parse(
        r#"{
            let a := 1
            let b := add(a, 2)
            let c, d := f()
            let e
            e := 3
            let g
            function h(p) -> r { }
        }"#,
    ));

    let get = |var: &str| values.get(&name(var)).map(|e| e.to_string());
    assert_eq!(get("a"), Some("1".to_string()));
    assert_eq!(get("b"), Some("add(a, 2)".to_string()));
    assert_eq!(get("c"), None);
    assert_eq!(get("d"), None);
    assert_eq!(get("e"), None);
    assert_eq!(get("g"), Some("0".to_string()));
    assert_eq!(get("p"), None);
    assert_eq!(get("r"), Some("0".to_string()));
    assert_eq!(get(ZERO), Some("0".to_string()));
    assert_eq!(get(ONE), Some("1".to_string()));
    assert_eq!(get(THIRTY_TWO), Some("32".to_string()));
    assert!(!values.is_ssa(&name("h")));
}

#[test]
fn loop_variables_are_not_ssa() {
    let values = ValueMap::new(&parse(
        r#"{
            for { let i := 0 } lt(i, 2) { let s := 1 i := add(i, s) } {
                let p := calldataload(i)
                let r := add(p, 32)
                if r { let q := 5 }
                for { let j := 0 } j { } { let k := 1 }
                function f() -> x { let y := 7 }
            }
            let after := 4
        }"#,
    ));

    let ssa = |var: &str| values.is_ssa(&name(var));
    // reassigned in the post block.
    assert!(!ssa("i"));
    for var in ["s", "p", "r", "q", "j", "k"] {
        assert!(!ssa(var), "{var} is declared once per iteration");
    }
    // function bodies start over on every call.
    assert!(ssa("x"));
    assert!(ssa("y"));
    assert!(ssa("after"));
}

#[test]
fn knowledge_base() {
    let values = ValueMap::new(&parse(
        r#"{
            let base := calldataload(0)
            let p := add(base, 32)
            let q := add(64, base)
            let r := sub(q, 1)
            let k := 7
            let z := sub(k, 7)
            let other := calldataload(1)
            let wrap := sub(base, 1)
            function f(param) { let s := add(param, 1) }
        }"#,
    ));
    let kb = KnowledgeBase::new(&values);
    let n = name;

    assert_eq!(kb.difference_if_known_constant(&n("q"), &n("p")), Some(U256::from(32)));
    assert_eq!(
        kb.difference_if_known_constant(&n("p"), &n("q")),
        Some(U256::MAX - U256::from(31))
    );
    assert_eq!(kb.difference_if_known_constant(&n("r"), &n("base")), Some(U256::from(63)));
    assert_eq!(kb.difference_if_known_constant(&n("wrap"), &n("base")), Some(U256::MAX));
    assert_eq!(kb.difference_if_known_constant(&n("base"), &n("other")), None);
    // `param` can't be followed, so `s` is opaque.
    assert_eq!(kb.difference_if_known_constant(&n("s"), &n("param")), None);

    assert_eq!(kb.value_if_known_constant(&n("k")), Some(U256::from(7)));
    assert_eq!(kb.value_if_known_constant(&n(THIRTY_TWO)), Some(U256::from(32)));
    assert_eq!(kb.value_if_known_constant(&n("p")), None);

    assert!(kb.known_to_be_zero(&n("z")));
    assert!(!kb.known_to_be_zero(&n("k")));
    assert!(kb.known_to_be_different(&n("p"), &n("q")));
    assert!(!kb.known_to_be_different(&n("p"), &n("p")));
    assert!(!kb.known_to_be_different(&n("base"), &n("other")));
}

#[test]
fn long_definition_chains_stay_sound() {
    let mut code = String::from("{ let v0 := calldataload(0)\n");
    for i in 1..=40 {
        code.push_str(&format!("let v{i} := add(v{}, 1)\n", i - 1));
    }
    code.push('}');
    let values = ValueMap::new(&parse(&code));
    let kb = KnowledgeBase::new(&values);

    assert_eq!(
        kb.difference_if_known_constant(&name("v2"), &name("v0")),
        Some(U256::from(2))
    );
    // too deep to reach `v0`, but never a wrong answer.
    let diff = kb.difference_if_known_constant(&name("v40"), &name("v0"));
    assert!(diff.is_none() || diff == Some(U256::from(40)));
}
