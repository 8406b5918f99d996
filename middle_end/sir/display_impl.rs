//! Pretty printing.  The output is valid input for the parser, and parsing it
//! back gives the same tree.

use super::*;

use std::fmt::{Display, Formatter, Result as FmtResult};

const INDENT: &str = "    ";

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        '\0' => write!(f, "\\0")?,
                        '\\' => write!(f, "\\\\")?,
                        '"' => write!(f, "\\\"")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

impl Display for FunctionCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}(", self.function_name)?;
        write_list(f, &self.arguments)?;
        write!(f, ")")
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Expression::Literal(lit) => write!(f, "{lit}"),
            Expression::Identifier(id) => write!(f, "{id}"),
            Expression::Call(call) => write!(f, "{call}"),
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write_statement(f, self, 0)
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write_block(f, self, 0)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write_block(f, &self.code, 0)
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> FmtResult {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_indent(f: &mut Formatter<'_>, depth: usize) -> FmtResult {
    for _ in 0..depth {
        write!(f, "{INDENT}")?;
    }
    Ok(())
}

// the opening brace goes on the current line, the closing one on its own line
// at `depth`.
fn write_block(f: &mut Formatter<'_>, block: &Block, depth: usize) -> FmtResult {
    if block.statements.is_empty() {
        return write!(f, "{{ }}");
    }

    writeln!(f, "{{")?;
    for stmt in &block.statements {
        write_indent(f, depth + 1)?;
        write_statement(f, stmt, depth + 1)?;
        writeln!(f)?;
    }
    write_indent(f, depth)?;
    write!(f, "}}")
}

// assumes the indentation of the first line has been written already.
fn write_statement(f: &mut Formatter<'_>, stmt: &Statement, depth: usize) -> FmtResult {
    match stmt {
        Statement::Expression(e) => write!(f, "{e}"),
        Statement::VariableDeclaration { variables, value } => {
            write!(f, "let ")?;
            write_list(f, variables)?;
            if let Some(value) = value {
                write!(f, " := {value}")?;
            }
            Ok(())
        }
        Statement::Assignment { variables, value } => {
            write_list(f, variables)?;
            write!(f, " := {value}")
        }
        Statement::If { condition, body } => {
            write!(f, "if {condition} ")?;
            write_block(f, body, depth)
        }
        Statement::Switch { expression, cases } => {
            write!(f, "switch {expression}")?;
            for case in cases {
                writeln!(f)?;
                write_indent(f, depth)?;
                match &case.value {
                    Some(value) => write!(f, "case {value} ")?,
                    None => write!(f, "default ")?,
                }
                write_block(f, &case.body, depth)?;
            }
            Ok(())
        }
        Statement::ForLoop {
            pre,
            condition,
            post,
            body,
        } => {
            write!(f, "for ")?;
            write_block(f, pre, depth)?;
            write!(f, " {condition} ")?;
            write_block(f, post, depth)?;
            write!(f, " ")?;
            write_block(f, body, depth)
        }
        Statement::FunctionDefinition(def) => {
            write!(f, "function {}(", def.name)?;
            write_list(f, &def.parameters)?;
            write!(f, ")")?;
            if !def.returns.is_empty() {
                write!(f, " -> ")?;
                write_list(f, &def.returns)?;
            }
            write!(f, " ")?;
            write_block(f, &def.body, depth)
        }
        Statement::Break => write!(f, "break"),
        Statement::Continue => write!(f, "continue"),
        Statement::Leave => write!(f, "leave"),
        Statement::Block(block) => write_block(f, block, depth),
    }
}
