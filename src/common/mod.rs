pub mod buffer;
pub mod errors;
pub mod types;
