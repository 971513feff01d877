//! The `GcpPubSubSource` custom resource: a Knative event source backed by a Google Cloud
//! Pub/Sub topic subscription.
pub mod apis;
pub mod crd;
pub mod error;

pub use apis::sources::v1alpha1::*;
pub use error::{Error, Result};
pub use knative_conditions::ConditionAccessor;
