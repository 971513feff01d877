mod gcp_pubsub_types;

pub use gcp_pubsub_types::*;
