// check whether a Program is valid:
//
// - identifiers:
//     - declared names and called names match "[A-Za-z_$][A-Za-z0-9_$.]*".
//     - identifiers aren't reserved words.
// - every variable (parameter, return variable or `let`) is declared once in
//   the whole program.  the value tracking of the store optimizer keys
//   definitions by name, so shadowing is not allowed.
// - function names are unique and don't shadow builtins.
// - every used variable is declared before the use, in an enclosing scope.
//   function bodies only see their own parameters, return variables and
//   locals.
// - calls to builtins and to defined functions have the right number of
//   arguments, and the number of values they return fits where they are used:
//   exactly one as an argument or a condition, none as a statement, and as
//   many as there are variables in a declaration or an assignment.  calls to
//   undefined names (external functions) can't be checked and are accepted.
// - break and continue only occur in the body of a loop, without crossing a
//   function boundary.
// - leave only occurs inside a function.
// - switch statements have at least one clause, distinct case values and at
//   most one default, which comes last.
// - string literals are at most 32 bytes long.

use super::*;
use crate::commons::*;
use crate::middle_end::dialect::Instruction;

use std::collections::{BTreeMap as Map, BTreeSet as Set};

const RESERVED: [&str; 12] = [
    "function", "let", "if", "switch", "case", "default", "for", "break", "continue", "leave",
    "true", "false",
];

impl Program {
    pub fn validate(self) -> Result<Valid<Program>, ValidationError> {
        validate(&self).map(|()| Valid(self))
    }
}

// SECTION: program validation

pub fn validate(program: &Program) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    errors += check_identifiers(program);
    errors += check_unique_variables(program);
    errors += check_function_names(program);
    errors += check_control_flow(program);
    errors += check_switches(program);
    errors += check_literals(program);

    // arity checking looks functions up by name, which only makes sense once
    // the names are known to be unique.
    if errors.is_empty() {
        errors += check_scopes_and_arity(program);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// SECTION: helpers

fn for_each_statement<'a>(block: &'a Block, visit: &mut impl FnMut(&'a Statement)) {
    for stmt in &block.statements {
        visit(stmt);
        for child in stmt.child_blocks() {
            for_each_statement(child, visit);
        }
    }
}

fn for_each_expression<'a>(block: &'a Block, visit: &mut impl FnMut(&'a Expression)) {
    fn walk<'a>(expr: &'a Expression, visit: &mut impl FnMut(&'a Expression)) {
        visit(expr);
        if let Expression::Call(call) = expr {
            for arg in &call.arguments {
                walk(arg, visit);
            }
        }
    }

    for_each_statement(block, &mut |stmt| {
        for expr in stmt.expressions() {
            walk(expr, visit);
        }
    });
}

// variables introduced by a statement, in declaration order.
fn declared_variables(stmt: &Statement) -> Vec<&Name> {
    match stmt {
        Statement::VariableDeclaration { variables, .. } => variables.iter().collect(),
        Statement::FunctionDefinition(def) => {
            def.parameters.iter().chain(def.returns.iter()).collect()
        }
        _ => vec![],
    }
}

// SECTION: individual checks

// - declared names and called names match "[A-Za-z_$][A-Za-z0-9_$.]*".
// - identifiers aren't reserved words.
//
// variable uses are not checked here: using a name that was never declared is
// caught by the scope check.
fn check_identifiers(program: &Program) -> ValidationError {
    let mut err = ValidationError::new();

    let mut check = |s: &str| {
        let mut chars = s.chars();
        match chars.next() {
            None => err.add_error("identifier cannot be the empty string".to_string()),
            Some(hdr) => {
                let start_ok = hdr.is_ascii_alphabetic() || hdr == '_' || hdr == '$';
                let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || "_$.".contains(c));
                if !(start_ok && rest_ok) {
                    err.add_error(format!("{s} is an invalid identifier"));
                } else if RESERVED.contains(&s) {
                    err.add_error(format!("reserved word \"{s}\" used as identifier"));
                }
            }
        }
    };

    for_each_statement(&program.code, &mut |stmt| {
        if let Statement::FunctionDefinition(def) = stmt {
            check(def.name.as_str());
        }
        for var in declared_variables(stmt) {
            check(var.as_str());
        }
    });
    for_each_expression(&program.code, &mut |expr| {
        if let Expression::Call(call) = expr {
            check(call.function_name.as_str());
        }
    });

    err
}

// - every variable is declared once in the whole program.
fn check_unique_variables(program: &Program) -> ValidationError {
    let mut err = ValidationError::new();
    let mut seen = Set::new();

    for_each_statement(&program.code, &mut |stmt| {
        for var in declared_variables(stmt) {
            if !seen.insert(var) {
                err.add_error(format!("variable {var} is declared more than once"));
            }
        }
    });

    err
}

// - function names are unique and don't shadow builtins.
fn check_function_names(program: &Program) -> ValidationError {
    let mut err = ValidationError::new();
    let mut seen = Set::new();

    for def in program.function_definitions() {
        if Instruction::from_name(def.name.as_str()).is_some() {
            err.add_error(format!("function {} shadows a builtin", def.name));
        }
        if !seen.insert(&def.name) {
            err.add_error(format!("function {} is defined more than once", def.name));
        }
    }

    err
}

// - break and continue only occur in the body of a loop.
// - leave only occurs inside a function.
fn check_control_flow(program: &Program) -> ValidationError {
    fn walk(block: &Block, in_loop: bool, in_function: bool, err: &mut ValidationError) {
        for stmt in &block.statements {
            match stmt {
                Statement::Break | Statement::Continue if !in_loop => {
                    err.add_error(format!("{stmt} outside of a loop body"));
                }
                Statement::Leave if !in_function => {
                    err.add_error("leave outside of a function".to_string());
                }
                Statement::ForLoop { pre, post, body, .. } => {
                    walk(pre, false, in_function, err);
                    walk(post, false, in_function, err);
                    walk(body, true, in_function, err);
                }
                Statement::FunctionDefinition(def) => walk(&def.body, false, true, err),
                _ => {
                    for child in stmt.child_blocks() {
                        walk(child, in_loop, in_function, err);
                    }
                }
            }
        }
    }

    let mut err = ValidationError::new();
    walk(&program.code, false, false, &mut err);
    err
}

// - switch statements have at least one clause, distinct case values and at
//   most one default, which comes last.
fn check_switches(program: &Program) -> ValidationError {
    let mut err = ValidationError::new();

    for_each_statement(&program.code, &mut |stmt| {
        if let Statement::Switch { expression, cases } = stmt {
            if cases.is_empty() {
                err.add_error(format!("switch {expression} has no cases"));
            }

            let mut values = Set::new();
            for (i, case) in cases.iter().enumerate() {
                match &case.value {
                    Some(value) => {
                        if !values.insert(value.value()) {
                            err.add_error(format!(
                                "switch {expression} has duplicate case {value}"
                            ));
                        }
                    }
                    None if i + 1 != cases.len() => {
                        err.add_error(format!(
                            "the default case of switch {expression} must come last"
                        ));
                    }
                    None => {}
                }
            }
        }
    });

    err
}

// - string literals are at most 32 bytes long.
fn check_literals(program: &Program) -> ValidationError {
    let mut err = ValidationError::new();

    let mut check = |lit: &Literal| {
        if let Literal::Str(s) = lit {
            if s.len() > 32 {
                err.add_error(format!("string literal {lit} is longer than 32 bytes"));
            }
        }
    };

    for_each_expression(&program.code, &mut |expr| {
        if let Expression::Literal(lit) = expr {
            check(lit);
        }
    });
    for_each_statement(&program.code, &mut |stmt| {
        if let Statement::Switch { cases, .. } = stmt {
            for value in cases.iter().filter_map(|c| c.value.as_ref()) {
                check(value);
            }
        }
    });

    err
}

// SECTION: scopes and arities

// - every used variable is declared before the use, in an enclosing scope.
// - calls have the right number of arguments and return values.
fn check_scopes_and_arity(program: &Program) -> ValidationError {
    let signatures = program
        .function_definitions()
        .into_iter()
        .map(|def| (&def.name, (def.parameters.len(), def.returns.len())))
        .collect();

    let mut checker = ScopeChecker {
        signatures,
        scopes: vec![],
        func: "<top level>".to_string(),
        err: ValidationError::new(),
    };
    checker.block(&program.code);
    checker.err
}

struct ScopeChecker<'a> {
    // (number of parameters, number of returned values) per defined function.
    signatures: Map<&'a Name, (usize, usize)>,
    // variables visible at the current point, innermost scope last.
    scopes: Vec<Set<&'a Name>>,
    // current function, for error messages
    func: String,
    err: ValidationError,
}

impl<'a> ScopeChecker<'a> {
    fn declare(&mut self, vars: impl IntoIterator<Item = &'a Name>) {
        let scope = self
            .scopes
            .last_mut()
            .expect("variables are only declared inside a scope");
        scope.extend(vars);
    }

    fn check_visible(&mut self, var: &Name) {
        if !self.scopes.iter().any(|scope| scope.contains(var)) {
            self.err
                .add_error(format!("[{}] undefined variable: {var}", self.func));
        }
    }

    fn block(&mut self, block: &'a Block) {
        self.scopes.push(Set::new());
        for stmt in &block.statements {
            self.statement(stmt);
        }
        self.scopes.pop();
    }

    fn statement(&mut self, stmt: &'a Statement) {
        match stmt {
            Statement::Expression(e) => {
                if let Some(n) = self.expression(e) {
                    if n != 0 {
                        self.err.add_error(format!(
                            "[{}] the {n} value(s) returned by {e} are discarded",
                            self.func
                        ));
                    }
                }
            }
            Statement::VariableDeclaration { variables, value } => {
                if let Some(value) = value {
                    self.expect_values(value, variables.len());
                }
                self.declare(variables);
            }
            Statement::Assignment { variables, value } => {
                self.expect_values(value, variables.len());
                for var in variables {
                    self.check_visible(var);
                }
            }
            Statement::If { condition, body } => {
                self.expect_values(condition, 1);
                self.block(body);
            }
            Statement::Switch { expression, cases } => {
                self.expect_values(expression, 1);
                for case in cases {
                    self.block(&case.body);
                }
            }
            Statement::ForLoop {
                pre,
                condition,
                post,
                body,
            } => {
                // variables declared in `pre` are visible in the rest of the
                // loop.
                self.scopes.push(Set::new());
                for stmt in &pre.statements {
                    self.statement(stmt);
                }
                self.expect_values(condition, 1);
                self.block(post);
                self.block(body);
                self.scopes.pop();
            }
            Statement::FunctionDefinition(def) => {
                let outer_scopes = std::mem::take(&mut self.scopes);
                let outer_func = std::mem::replace(&mut self.func, def.name.to_string());

                self.scopes.push(Set::new());
                self.declare(def.parameters.iter().chain(def.returns.iter()));
                self.block(&def.body);

                self.scopes = outer_scopes;
                self.func = outer_func;
            }
            Statement::Block(block) => self.block(block),
            Statement::Break | Statement::Continue | Statement::Leave => {}
        }
    }

    fn expect_values(&mut self, expr: &Expression, expected: usize) {
        if let Some(n) = self.expression(expr) {
            if n != expected {
                self.err.add_error(format!(
                    "[{}] {expr} returns {n} value(s) where {expected} are expected",
                    self.func
                ));
            }
        }
    }

    // the number of values the expression evaluates to, or None for calls to
    // external functions.
    fn expression(&mut self, expr: &Expression) -> Option<usize> {
        match expr {
            Expression::Literal(_) => Some(1),
            Expression::Identifier(var) => {
                self.check_visible(var);
                Some(1)
            }
            Expression::Call(call) => {
                for arg in &call.arguments {
                    self.expect_values(arg, 1);
                }

                let signature = match Instruction::from_name(call.function_name.as_str()) {
                    Some(inst) => Some((inst.arity(), inst.returns())),
                    None => self.signatures.get(&call.function_name).copied(),
                };
                let (arity, returns) = signature?;
                if arity != call.arguments.len() {
                    self.err.add_error(format!(
                        "[{}] {} expects {arity} argument(s) but is called with {}",
                        self.func,
                        call.function_name,
                        call.arguments.len()
                    ));
                }
                Some(returns)
            }
        }
    }
}
