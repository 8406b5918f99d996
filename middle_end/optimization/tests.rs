use pretty_assertions::assert_eq;

use crate::commons::Valid;
use crate::middle_end::sir::Program;


fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn parse_valid(code: &str) -> Valid<Program> {
    code.parse::<Program>()
        .unwrap_or_else(|e| panic!("failed to parse:\n{code}\n{e}"))
        .validate()
        .unwrap_or_else(|e| panic!("invalid program:\n{code}\n{e}"))
}

// Check if the input program optimizes to the expected output program.  Both
// sides go through the printer, so layout doesn't matter.
fn optimizes_to(pass: fn(Valid<Program>) -> Valid<Program>, input: &str, expected: &str) {
    init_logging();

    let input = parse_valid(input);
    let expected = parse_valid(expected).0.to_string();

    let actual = pass(input).0.validate().unwrap().0;

    assert_eq!(actual.to_string(), expected);
}
