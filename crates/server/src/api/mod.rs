pub mod directory;
pub mod tasks;
