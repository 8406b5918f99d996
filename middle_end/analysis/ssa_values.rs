//! Values of variables that are assigned exactly once.
//!
//! A variable declared with `let x := e` and never assigned again holds the
//! value of `e` wherever it is visible.  Variables declared without a value
//! (including return variables) hold zero until assigned.  Validated programs
//! declare every name once, so the map can be keyed by name.
//!
//! A variable declared in the body or post block of a loop is declared again
//! on every iteration, and a store made with one iteration's value may still
//! be tracked in the next.  Such variables are left out.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use primitive_types::U256;

use crate::middle_end::sir::*;

/// Names for constants the optimizer needs to refer to.  They can't be
/// written in source, so they never clash with program variables.
pub const ZERO: &str = "@ 0";
pub const ONE: &str = "@ 1";
pub const THIRTY_TWO: &str = "@ 32";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueMap {
    values: Map<Name, Expression>,
}

impl ValueMap {
    pub fn new(program: &Program) -> Self {
        let mut values = Map::new();
        let mut reassigned = Set::new();
        collect(&program.code, false, &mut values, &mut reassigned);

        for var in &reassigned {
            values.remove(var);
        }

        let constant = |n: u64| Expression::Literal(Literal::Number(U256::from(n)));
        values.insert(name(ZERO), constant(0));
        values.insert(name(ONE), constant(1));
        values.insert(name(THIRTY_TWO), constant(32));

        ValueMap { values }
    }

    /// The expression defining `var`, if it is an SSA variable.
    pub fn get(&self, var: &Name) -> Option<&Expression> {
        self.values.get(var)
    }

    pub fn is_ssa(&self, var: &Name) -> bool {
        self.values.contains_key(var)
    }
}

fn collect(
    block: &Block,
    in_loop: bool,
    values: &mut Map<Name, Expression>,
    reassigned: &mut Set<Name>,
) {
    let zero = || Expression::Literal(Literal::Number(U256::zero()));

    for stmt in &block.statements {
        match stmt {
            Statement::VariableDeclaration { .. } if in_loop => {}
            Statement::VariableDeclaration { variables, value } => match (variables.as_slice(), value) {
                ([var], Some(value)) => {
                    values.insert(var.clone(), value.clone());
                }
                (vars, None) => {
                    for var in vars {
                        values.insert(var.clone(), zero());
                    }
                }
                // the values of a multi-valued call can't be named.
                _ => {}
            },
            Statement::Assignment { variables, .. } => {
                reassigned.extend(variables.iter().cloned());
            }
            Statement::FunctionDefinition(def) => {
                for var in &def.returns {
                    values.insert(var.clone(), zero());
                }
            }
            _ => {}
        }

        match stmt {
            Statement::ForLoop { pre, post, body, .. } => {
                collect(pre, in_loop, values, reassigned);
                collect(post, true, values, reassigned);
                collect(body, true, values, reassigned);
            }
            // a function body runs once per call, wherever it is written.
            Statement::FunctionDefinition(def) => collect(&def.body, false, values, reassigned),
            _ => {
                for child in stmt.child_blocks() {
                    collect(child, in_loop, values, reassigned);
                }
            }
        }
    }
}
