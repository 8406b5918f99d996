pub mod commons;
pub mod middle_end;
