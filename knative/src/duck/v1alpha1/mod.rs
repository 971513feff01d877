pub mod status_types;

pub use status_types::Status;
