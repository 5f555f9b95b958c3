pub mod bands;
pub mod engine;
