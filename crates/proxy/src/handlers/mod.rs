pub mod blob;
pub mod jobs;
pub mod validate;
