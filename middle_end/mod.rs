pub mod analysis;
pub mod dialect;
pub mod optimization;
pub mod sir;
