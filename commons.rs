//! Things shared by every stage of the optimizer.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::AddAssign;

/// A value that passed validation.  Passes take and return `Valid` programs so
/// that the checks performed by `validate` can be assumed downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Valid<T>(pub T);

/// All the problems found while validating a program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub errors: Vec<String>,
}

impl ValidationError {
    pub fn new() -> Self {
        ValidationError { errors: vec![] }
    }

    pub fn from_string(msg: String) -> Self {
        ValidationError { errors: vec![msg] }
    }

    pub fn add_error(&mut self, msg: String) {
        self.errors.push(msg);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl AddAssign for ValidationError {
    fn add_assign(&mut self, rhs: Self) {
        self.errors.extend(rhs.errors);
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for err in &self.errors {
            writeln!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
