//! Optimization passes.

pub mod config;
pub mod dead_store_elimination;
pub mod statement_remover;

#[cfg(test)]
mod tests;
