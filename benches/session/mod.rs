pub mod flags;
pub mod registry;
