pub mod members;
pub mod root;
