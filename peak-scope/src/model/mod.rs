pub mod agg;
pub mod cli;
pub mod peak;
pub mod sample;
