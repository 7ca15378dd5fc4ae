pub mod executor;
pub mod urc;
