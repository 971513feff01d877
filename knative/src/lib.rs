pub mod duck;

// expose only v1alpha1 types
pub use duck::v1alpha1::*;

pub mod conditions {
    pub use knative_conditions::{
        Condition,
        ConditionAccessor,
        ConditionManager,
        ConditionSet,
        ConditionSeverity,
        ConditionStatus,
        ConditionType,
        Conditions,
    };
}

pub mod derive {
    pub use knative_derive::ConditionType;
}
