pub mod fixtures;
pub mod recorders;
