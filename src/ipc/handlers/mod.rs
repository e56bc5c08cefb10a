pub mod core;
pub mod dashboard;
pub mod export;
pub mod roster;
