use super::*;

use pest::iterators::Pair;
use pest::Parser;

#[derive(pest_derive::Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\t" | "\r" | "\n" }
COMMENT = _{ ("//" ~ (!NEWLINE ~ ANY)*) | ("/*" ~ (!"*/" ~ ANY)* ~ "*/") }

program = { SOI ~ block ~ EOI }
block = { "{" ~ statement* ~ "}" }

statement = _{
    function_definition
  | variable_declaration
  | if_statement
  | switch_statement
  | for_loop
  | break_statement
  | continue_statement
  | leave_statement
  | block
  | assignment
  | expression_statement
}

function_definition = { kw_function ~ identifier ~ "(" ~ parameters ~ ")" ~ returns ~ block }
parameters = { (identifier ~ ("," ~ identifier)*)? }
returns = { ("->" ~ identifier ~ ("," ~ identifier)*)? }
variable_declaration = { kw_let ~ identifier_list ~ (":=" ~ expression)? }
assignment = { identifier_list ~ ":=" ~ expression }
identifier_list = { identifier ~ ("," ~ identifier)* }
if_statement = { kw_if ~ expression ~ block }
switch_statement = { kw_switch ~ expression ~ ((case_clause+ ~ default_clause?) | default_clause) }
case_clause = { kw_case ~ literal ~ block }
default_clause = { kw_default ~ block }
for_loop = { kw_for ~ block ~ expression ~ block ~ block }
break_statement = { kw_break }
continue_statement = { kw_continue }
leave_statement = { kw_leave }
expression_statement = { function_call }

expression = { function_call | literal | identifier }
function_call = { identifier ~ "(" ~ (expression ~ ("," ~ expression)*)? ~ ")" }

literal = { hex_number | dec_number | bool_literal | string_literal }
hex_number = @{ "0x" ~ ASCII_HEX_DIGIT+ ~ !ident_char }
dec_number = @{ ASCII_DIGIT+ ~ !ident_char }
bool_literal = @{ ("true" | "false") ~ !ident_char }
string_literal = ${ "\"" ~ string_body ~ "\"" }
string_body = @{ ((!("\"" | "\\" | NEWLINE) ~ ANY) | ("\\" ~ ANY))* }

identifier = @{ !keyword ~ ident_start ~ ident_char* }
ident_start = _{ ASCII_ALPHA | "_" | "$" }
ident_char = _{ ASCII_ALPHANUMERIC | "_" | "$" | "." }
keyword = @{
    ("function" | "let" | "if" | "switch" | "case" | "default" | "for"
     | "break" | "continue" | "leave" | "true" | "false") ~ !ident_char
}

kw_function = @{ "function" ~ !ident_char }
kw_let = @{ "let" ~ !ident_char }
kw_if = @{ "if" ~ !ident_char }
kw_switch = @{ "switch" ~ !ident_char }
kw_case = @{ "case" ~ !ident_char }
kw_default = @{ "default" ~ !ident_char }
kw_for = @{ "for" ~ !ident_char }
kw_break = @{ "break" ~ !ident_char }
kw_continue = @{ "continue" ~ !ident_char }
kw_leave = @{ "leave" ~ !ident_char }
"#]
struct SirParser;

/// A parse error with explanatory message.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub struct ParseError(pub String);
impl std::error::Error for ParseError {}

impl std::str::FromStr for Program {
    type Err = ParseError;

    fn from_str(prog_str: &str) -> Result<Self, Self::Err> {
        match SirParser::parse(Rule::program, prog_str) {
            Ok(mut parse_tree) => {
                let program = next(&mut parse_tree);
                let code = next(&mut program.into_inner());
                Ok(Program {
                    code: create_block(code)?,
                })
            }
            Err(err) => Err(ParseError(err.to_string())),
        }
    }
}

// SECTION: parse tree to AST

// keyword pairs only exist to enforce word boundaries.
fn children(pair: Pair<Rule>) -> impl Iterator<Item = Pair<Rule>> {
    pair.into_inner().filter(|p| {
        !matches!(
            p.as_rule(),
            Rule::kw_function
                | Rule::kw_let
                | Rule::kw_if
                | Rule::kw_switch
                | Rule::kw_case
                | Rule::kw_default
                | Rule::kw_for
                | Rule::kw_break
                | Rule::kw_continue
                | Rule::kw_leave
        )
    })
}

fn next<'i>(pairs: &mut impl Iterator<Item = Pair<'i, Rule>>) -> Pair<'i, Rule> {
    pairs
        .next()
        .expect("the grammar fixes the shape of the parse tree")
}

fn create_block(block: Pair<Rule>) -> Result<Block, ParseError> {
    let statements = children(block)
        .map(create_statement)
        .collect::<Result<_, _>>()?;
    Ok(Block { statements })
}

fn create_statement(stmt: Pair<Rule>) -> Result<Statement, ParseError> {
    let stmt = match stmt.as_rule() {
        Rule::block => Statement::Block(create_block(stmt)?),
        Rule::break_statement => Statement::Break,
        Rule::continue_statement => Statement::Continue,
        Rule::leave_statement => Statement::Leave,
        Rule::expression_statement => {
            let call = next(&mut children(stmt));
            Statement::Expression(Expression::Call(create_call(call)?))
        }
        Rule::variable_declaration => {
            let mut inner = children(stmt);
            let variables = create_names(next(&mut inner));
            let value = inner.next().map(create_expr).transpose()?;
            Statement::VariableDeclaration { variables, value }
        }
        Rule::assignment => {
            let mut inner = children(stmt);
            let variables = create_names(next(&mut inner));
            let value = create_expr(next(&mut inner))?;
            Statement::Assignment { variables, value }
        }
        Rule::if_statement => {
            let mut inner = children(stmt);
            let condition = create_expr(next(&mut inner))?;
            let body = create_block(next(&mut inner))?;
            Statement::If { condition, body }
        }
        Rule::switch_statement => {
            let mut inner = children(stmt);
            let expression = create_expr(next(&mut inner))?;
            let cases = inner.map(create_case).collect::<Result<_, _>>()?;
            Statement::Switch { expression, cases }
        }
        Rule::for_loop => {
            let mut inner = children(stmt);
            let pre = create_block(next(&mut inner))?;
            let condition = create_expr(next(&mut inner))?;
            let post = create_block(next(&mut inner))?;
            let body = create_block(next(&mut inner))?;
            Statement::ForLoop {
                pre,
                condition,
                post,
                body,
            }
        }
        Rule::function_definition => {
            let mut inner = children(stmt);
            let name = create_name(next(&mut inner));
            let parameters = create_names(next(&mut inner));
            let returns = create_names(next(&mut inner));
            let body = create_block(next(&mut inner))?;
            Statement::FunctionDefinition(FunctionDefinition {
                name,
                parameters,
                returns,
                body,
            })
        }
        _ => unreachable!("not a statement: {:#?}", stmt),
    };
    Ok(stmt)
}

fn create_case(clause: Pair<Rule>) -> Result<Case, ParseError> {
    match clause.as_rule() {
        Rule::case_clause => {
            let mut inner = children(clause);
            let value = create_literal(next(&mut inner))?;
            let body = create_block(next(&mut inner))?;
            Ok(Case {
                value: Some(value),
                body,
            })
        }
        Rule::default_clause => Ok(Case {
            value: None,
            body: create_block(next(&mut children(clause)))?,
        }),
        _ => unreachable!("not a switch clause: {:#?}", clause),
    }
}

fn create_name(id: Pair<Rule>) -> Name {
    name(id.as_str())
}

// works for `identifier_list`, `parameters` and `returns`.
fn create_names(list: Pair<Rule>) -> Vec<Name> {
    children(list).map(create_name).collect()
}

fn create_expr(expr: Pair<Rule>) -> Result<Expression, ParseError> {
    let expr = next(&mut children(expr));
    match expr.as_rule() {
        Rule::function_call => Ok(Expression::Call(create_call(expr)?)),
        Rule::literal => Ok(Expression::Literal(create_literal(expr)?)),
        Rule::identifier => Ok(Expression::Identifier(create_name(expr))),
        _ => unreachable!("not an expression: {:#?}", expr),
    }
}

fn create_call(call: Pair<Rule>) -> Result<FunctionCall, ParseError> {
    let mut inner = children(call);
    let function_name = create_name(next(&mut inner));
    let arguments = inner.map(create_expr).collect::<Result<_, _>>()?;
    Ok(FunctionCall {
        function_name,
        arguments,
    })
}

fn create_literal(lit: Pair<Rule>) -> Result<Literal, ParseError> {
    let lit = next(&mut children(lit));
    let text = lit.as_str();
    match lit.as_rule() {
        Rule::dec_number => U256::from_dec_str(text)
            .map(Literal::Number)
            .map_err(|_| ParseError(format!("number literal {text} does not fit in 256 bits"))),
        Rule::hex_number => U256::from_str_radix(&text[2..], 16)
            .map(Literal::Number)
            .map_err(|_| ParseError(format!("number literal {text} does not fit in 256 bits"))),
        Rule::bool_literal => Ok(Literal::Bool(text == "true")),
        Rule::string_literal => unescape(next(&mut children(lit)).as_str()).map(Literal::Str),
        _ => unreachable!("not a literal: {:#?}", lit),
    }
}

fn unescape(body: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                return Err(ParseError(format!(
                    "unsupported escape sequence \\{other} in \"{body}\""
                )))
            }
            None => unreachable!("the grammar never ends a string body with a lone backslash"),
        }
    }
    Ok(out)
}
