pub mod batch;
pub mod classify;
pub mod cli;
pub mod extract;
