//! The structured intermediate representation (sir) the store optimizer works
//! on.
//!
//! A program is a tree: blocks hold statements, statements hold expressions
//! and nested blocks, and every computation is a function call whose
//! arguments are literals, identifiers or other calls.  There is no `goto`;
//! control flow is `if`, `switch`, `for` (with `break`/`continue`) and `leave`
//! for returning early from a function.
//!
//! Statements are identified by [StmtId], their position in a pre-order walk
//! of the whole tree.  Blocks nested in a statement come right after it, in
//! the order returned by [Statement::child_blocks].

use std::cmp::Ordering;
use std::fmt;

use derive_more::Display;
use hashconsing::{consign, HConsed, HashConsign};
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod display_impl;
pub mod fromstr_impl;
pub mod validate;

#[cfg(test)]
mod tests;

pub use fromstr_impl::ParseError;

// SECTION: names

consign! {
    /// Factory for interned identifier names.
    let NAME_FACTORY = consign(97) for String ;
}

/// An interned identifier.  Two names are equal iff they are spelled the same,
/// and comparing them is a pointer comparison.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(HConsed<String>);

impl Name {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

// names are ordered by spelling so that maps keyed by names iterate in a
// stable order.
impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(name(&s))
    }
}

pub fn name(s: &str) -> Name {
    Name(NAME_FACTORY.mk(s.to_string()))
}

// SECTION: the program tree

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Number(U256),
    Bool(bool),
    // at most 32 bytes, see `validate`.
    Str(String),
}

impl Literal {
    /// The 256-bit word this literal evaluates to.  Strings are left-aligned.
    pub fn value(&self) -> U256 {
        match self {
            Literal::Number(n) => *n,
            Literal::Bool(b) => U256::from(*b as u8),
            Literal::Str(s) => {
                let mut word = [0u8; 32];
                for (dst, src) in word.iter_mut().zip(s.bytes()) {
                    *dst = src;
                }
                U256::from_big_endian(&word)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub function_name: Name,
    pub arguments: Vec<Expression>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Identifier(Name),
    Call(FunctionCall),
}

impl Expression {
    /// Whether this is a bare identifier or literal.
    pub fn is_simple(&self) -> bool {
        matches!(self, Expression::Identifier(_) | Expression::Literal(_))
    }

    /// Calls every function call in this expression, innermost first, in
    /// evaluation order (arguments are evaluated right to left).
    pub fn for_each_call<'a>(&'a self, visit: &mut impl FnMut(&'a FunctionCall)) {
        if let Expression::Call(call) = self {
            for arg in call.arguments.iter().rev() {
                arg.for_each_call(visit);
            }
            visit(call);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    // `None` for the default case.
    pub value: Option<Literal>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: Name,
    pub parameters: Vec<Name>,
    pub returns: Vec<Name>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    Expression(Expression),
    VariableDeclaration {
        variables: Vec<Name>,
        value: Option<Expression>,
    },
    Assignment {
        variables: Vec<Name>,
        value: Expression,
    },
    If {
        condition: Expression,
        body: Block,
    },
    Switch {
        expression: Expression,
        cases: Vec<Case>,
    },
    ForLoop {
        pre: Block,
        condition: Expression,
        post: Block,
        body: Block,
    },
    FunctionDefinition(FunctionDefinition),
    Break,
    Continue,
    Leave,
    Block(Block),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub code: Block,
}

/// Position of a statement in a pre-order walk of the program.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StmtId(pub usize);

impl StmtId {
    pub fn offset(self, n: usize) -> StmtId {
        StmtId(self.0 + n)
    }
}

// SECTION: tree helpers

impl Statement {
    /// The blocks nested directly in this statement, in numbering order.  For
    /// loops this is source order: `pre`, `post`, then `body`.
    pub fn child_blocks(&self) -> Vec<&Block> {
        match self {
            Statement::If { body, .. } => vec![body],
            Statement::Switch { cases, .. } => cases.iter().map(|c| &c.body).collect(),
            Statement::ForLoop { pre, post, body, .. } => vec![pre, post, body],
            Statement::FunctionDefinition(def) => vec![&def.body],
            Statement::Block(block) => vec![block],
            _ => vec![],
        }
    }

    /// Same as [Statement::child_blocks], mutably.
    pub fn child_blocks_mut(&mut self) -> Vec<&mut Block> {
        match self {
            Statement::If { body, .. } => vec![body],
            Statement::Switch { cases, .. } => cases.iter_mut().map(|c| &mut c.body).collect(),
            Statement::ForLoop { pre, post, body, .. } => vec![pre, post, body],
            Statement::FunctionDefinition(def) => vec![&mut def.body],
            Statement::Block(block) => vec![block],
            _ => vec![],
        }
    }

    /// Number of statements in the tree rooted here, this one included.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .child_blocks()
            .into_iter()
            .map(Block::subtree_len)
            .sum::<usize>()
    }

    /// The expressions evaluated directly by this statement (not the ones in
    /// nested blocks).
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Statement::Expression(e) => vec![e],
            Statement::VariableDeclaration { value, .. } => value.iter().collect(),
            Statement::Assignment { value, .. } => vec![value],
            Statement::If { condition, .. } => vec![condition],
            Statement::Switch { expression, .. } => vec![expression],
            Statement::ForLoop { condition, .. } => vec![condition],
            _ => vec![],
        }
    }
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Block { statements }
    }

    /// Number of statements in this block, nested ones included.
    pub fn subtree_len(&self) -> usize {
        self.statements.iter().map(Statement::subtree_len).sum()
    }
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Program {
            code: Block::new(statements),
        }
    }

    /// Every function definition in the program, including nested ones.
    pub fn function_definitions(&self) -> Vec<&FunctionDefinition> {
        fn collect<'a>(block: &'a Block, defs: &mut Vec<&'a FunctionDefinition>) {
            for stmt in &block.statements {
                if let Statement::FunctionDefinition(def) = stmt {
                    defs.push(def);
                }
                for child in stmt.child_blocks() {
                    collect(child, defs);
                }
            }
        }

        let mut defs = vec![];
        collect(&self.code, &mut defs);
        defs
    }

    /// Number every statement: returns each statement with its [StmtId], in
    /// pre-order.
    #[cfg(test)]
    pub fn numbered_statements(&self) -> Vec<(StmtId, &Statement)> {
        fn number<'a>(block: &'a Block, next: &mut usize, out: &mut Vec<(StmtId, &'a Statement)>) {
            for stmt in &block.statements {
                out.push((StmtId(*next), stmt));
                *next += 1;
                for child in stmt.child_blocks() {
                    number(child, next, out);
                }
            }
        }

        let mut out = vec![];
        number(&self.code, &mut 0, &mut out);
        out
    }
}

// SECTION: constructors

pub fn ident(s: &str) -> Expression {
    Expression::Identifier(name(s))
}

pub fn num(n: u64) -> Expression {
    Expression::Literal(Literal::Number(U256::from(n)))
}

pub fn call(function: &str, arguments: Vec<Expression>) -> Expression {
    Expression::Call(FunctionCall {
        function_name: name(function),
        arguments,
    })
}

/// An expression statement calling `function`.
pub fn call_stmt(function: &str, arguments: Vec<Expression>) -> Statement {
    Statement::Expression(call(function, arguments))
}

pub fn let_stmt(var: &str, value: Expression) -> Statement {
    Statement::VariableDeclaration {
        variables: vec![name(var)],
        value: Some(value),
    }
}
