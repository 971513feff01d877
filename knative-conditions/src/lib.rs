//! Knative style status conditions.
//!
//! A resource status carries an ordered list of [`Condition`]s. One of them, the "happy"
//! condition (`Ready` or `Succeeded`), summarizes the others: it is only true once every
//! dependent condition named by the [`ConditionType`] is true. Conditions that are not
//! dependents are informational and never affect readiness.
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt::Debug;
use tracing::debug;

/// Defines how the variants of a [`ConditionType`]
/// depend on one another.
#[derive(Clone, Copy, Debug)]
pub struct ConditionSet<C: ConditionType> {
    happy: C,
    dependents: &'static [C],
}

impl<C: ConditionType> ConditionSet<C> {
    /// Builds the set declared by `C`.
    ///
    /// ### Panic
    /// *Panics* if the dependents of `C` contain its happy condition.
    pub fn new() -> Self {
        assert!(
            !C::dependents().contains(&C::happy()),
            "dependents may not contain happy condition"
        );

        ConditionSet {
            happy: C::happy(),
            dependents: C::dependents(),
        }
    }

    pub fn happy(&self) -> C {
        self.happy
    }

    pub fn dependents(&self) -> &'static [C] {
        self.dependents
    }

    /// Whether the [`ConditionType`] determines happiness.
    pub fn is_terminal(&self, condition_type: &C) -> bool {
        self.dependents.contains(condition_type) || self.happy == *condition_type
    }

    pub fn severity(&self, condition_type: &C) -> ConditionSeverity {
        if self.is_terminal(condition_type) {
            ConditionSeverity::Error
        } else {
            ConditionSeverity::Info
        }
    }

    /// True when the happy condition and every dependent are present and true.
    pub fn is_happy(&self, conditions: &Conditions<C>) -> bool {
        [self.happy]
            .iter()
            .chain(self.dependents)
            .all(|t| conditions.get(t).map_or(false, Condition::is_true))
    }

    /// Returns a [`ConditionManager`] that applies this set to `conditions`.
    pub fn manage<'a>(&self, conditions: &'a mut Conditions<C>) -> ConditionManager<'a, C> {
        ConditionManager::with_set(*self, conditions)
    }
}

impl<C: ConditionType> Default for ConditionSet<C> {
    fn default() -> Self {
        ConditionSet::new()
    }
}

/// Enums that implement [`ConditionType`] can be used to differentiate [`Condition`]
/// and describe the state of the resource.
pub trait ConditionType: Clone + Copy + Default + Debug + PartialEq + 'static {
    /// The top-level variant that determines overall readiness of the resource.
    fn happy() -> Self;
    /// Variants that must be true to consider the happy condition true.
    fn dependents() -> &'static [Self];
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
/// The importance of a conditions status.
pub enum ConditionSeverity {
    #[serde(alias = "")]
    Error,
    Warning,
    Info,
}

impl ConditionSeverity {
    pub fn is_err(&self) -> bool {
        *self == ConditionSeverity::Error
    }
}

impl Default for ConditionSeverity {
    fn default() -> Self {
        ConditionSeverity::Error
    }
}

/// A [`Vec`] of [`Condition`] that maintains transition times.
///
/// Conditions keep the order in which they were first set. Entries that do not parse as a
/// `C`, such as condition types written by another controller version, are dropped when
/// deserializing.
#[derive(Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Conditions<C>(Vec<Condition<C>>)
    where C: ConditionType;

impl<C: ConditionType> Default for Conditions<C> {
    fn default() -> Self {
        Conditions(Vec::new())
    }
}

impl<C: ConditionType> Conditions<C> {
    pub fn new() -> Conditions<C> {
        Conditions::default()
    }

    pub fn with_conditions(conditions: Vec<Condition<C>>) -> Conditions<C> {
        Conditions(conditions)
    }

    pub fn get(&self, type_: &C) -> Option<&Condition<C>> {
        self.0.iter().find(|c| c.type_ == *type_)
    }

    fn get_mut(&mut self, type_: &C) -> Option<&mut Condition<C>> {
        self.0.iter_mut().find(|c| c.type_ == *type_)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition<C>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stores `condition`, stamping a new transition time.
    ///
    /// Returns `false` without touching the stored condition when only the transition time
    /// would differ.
    pub fn set(&mut self, mut condition: Condition<C>) -> bool {
        match self.get_mut(&condition.type_) {
            Some(cond) => {
                let unchanged = Condition {
                    last_transition_time: condition.last_transition_time,
                    ..cond.clone()
                } == condition;
                if unchanged {
                    return false
                }
                *cond = Condition {
                    last_transition_time: Some(Utc::now()),
                    ..condition
                };
            }
            None => {
                condition.last_transition_time = Some(Utc::now());
                self.0.push(condition);
            }
        }
        true
    }
}

impl<'de, C> Deserialize<'de> for Conditions<C>
where C: ConditionType + Deserialize<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Entry<C: ConditionType> {
            Known(Condition<C>),
            Foreign(IgnoredAny),
        }

        let entries = Vec::<Entry<C>>::deserialize(deserializer)?;
        let skipped = entries.iter().filter(|e| matches!(e, Entry::Foreign(_))).count();
        if skipped > 0 {
            debug!(skipped, "ignored conditions of unknown type");
        }

        Ok(Conditions(entries
            .into_iter()
            .filter_map(|e| match e {
                Entry::Known(condition) => Some(condition),
                Entry::Foreign(_) => None,
            })
            .collect()))
    }
}

impl<'a, C: ConditionType> IntoIterator for &'a Conditions<C> {
    type Item = &'a Condition<C>;
    type IntoIter = std::slice::Iter<'a, Condition<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A custom resource status condition.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition<C: ConditionType> {
    #[serde(rename = "type")]
    pub type_: C,
    pub status: ConditionStatus,
    /// Whether a failure of this condition should be viewed as an error. Error is the
    /// default and is left off the wire, so a true condition reads as nothing being wrong.
    #[serde(default)]
    #[serde(skip_serializing_if = "ConditionSeverity::is_err")]
    pub severity: ConditionSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// The reason for the condition's last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// A human readable message indicating details about the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<C: ConditionType> Default for Condition<C> {
    fn default() -> Condition<C> {
        Condition {
            type_: C::default(),
            status: ConditionStatus::default(),
            severity: ConditionSeverity::default(),
            last_transition_time: None,
            reason: None,
            message: None,
        }
    }
}

/// The state of a [`Condition`].
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Default for ConditionStatus {
    fn default() -> Self {
        ConditionStatus::Unknown
    }
}

impl<C: ConditionType> Condition<C> {
    pub fn new(type_: C) -> Self {
        Condition {
            type_,
            ..Default::default()
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }

    pub fn is_unknown(&self) -> bool {
        self.status == ConditionStatus::Unknown
    }

    /// Orders conditions by how strongly they block happiness: False over Unknown over True,
    /// then the most recent transition.
    fn unhappiness(&self, other: &Self) -> Ordering {
        use ConditionStatus::*;

        match (self.status, other.status) {
            (False, False) | (Unknown, Unknown) | (True, True) => {
                match (self.last_transition_time, other.last_transition_time) {
                    (Some(left), Some(right)) => left.cmp(&right),
                    _ => Ordering::Equal,
                }
            }
            (False, _) | (Unknown, True) => Ordering::Greater,
            (Unknown, False) | (True, _) => Ordering::Less,
        }
    }
}

/// Provides [`ConditionManager`] access to the [`Conditions`] of a status,
/// and exposes control of the top-level [`Condition`].
///
/// Any status type that can hand out its conditions gets condition management by
/// implementing the two required methods.
pub trait ConditionAccessor<C: ConditionType> {
    /// Return the conditions of your CR status type.
    fn conditions(&self) -> &Conditions<C>;

    /// Return the conditions of your CR status type for mutation.
    fn conditions_mut(&mut self) -> &mut Conditions<C>;

    /// The [`ConditionSet`] used to manage this status.
    fn condition_set(&self) -> ConditionSet<C> {
        ConditionSet::new()
    }

    /// Returns a [`ConditionManager`] for more fine-grained control of [`Conditions`].
    fn manager(&mut self) -> ConditionManager<'_, C> {
        let set = self.condition_set();
        set.manage(self.conditions_mut())
    }

    /// Returns the condition of the given type, if it has been set.
    fn get_condition(&self, condition_type: C) -> Option<&Condition<C>> {
        self.conditions().get(&condition_type)
    }

    /// Stores a condition as is, without recomputing the happy condition.
    fn set_condition(&mut self, condition: Condition<C>) {
        self.manager().set_condition(condition);
    }

    /// Sets every unset terminal condition to unknown.
    fn initialize_conditions(&mut self) {
        self.manager().initialize_conditions();
    }

    /// Returns true if the resource is ready overall.
    fn is_ready(&self) -> bool {
        self.condition_set().is_happy(self.conditions())
    }

    /// Set the status of the top level condition type to false
    fn mark_false(&mut self, reason: &str, message: Option<String>) {
        let mut manager = self.manager();
        let t = manager.set.happy;
        manager.mark_false(t, reason, message);
    }

    /// Set the status of the top level condition to unknown. Typically used when beginning the
    /// reconciliation of a new generation.
    fn mark_unknown(&mut self) {
        self.mark_unknown_with_message(
            "NewObservedGenFailure",
            Some("unsuccessfully observed a new generation".into()),
        );
    }

    fn mark_unknown_with_message(&mut self, reason: &str, message: Option<String>) {
        let mut manager = self.manager();
        let t = manager.set.happy;
        manager.mark_unknown(t, reason, message);
    }
}

/// Mutates [`Conditions`] in accordance with the condition dependency chain defined by a
/// [`ConditionType`]
pub struct ConditionManager<'a, C>
where C: ConditionType {
    set: ConditionSet<C>,
    conditions: &'a mut Conditions<C>,
}

impl<'a, C> ConditionManager<'a, C>
where C: ConditionType {
    pub fn new(conditions: &'a mut Conditions<C>) -> Self {
        ConditionManager::with_set(ConditionSet::new(), conditions)
    }

    pub fn with_set(set: ConditionSet<C>, conditions: &'a mut Conditions<C>) -> Self {
        ConditionManager { set, conditions }
    }

    pub fn get_condition(&self, condition_type: C) -> Option<&Condition<C>> {
        self.conditions.get(&condition_type)
    }

    /// Returns the happy [`Condition`], if it has been set.
    pub fn get_top_level_condition(&self) -> Option<&Condition<C>> {
        self.get_condition(self.set.happy)
    }

    pub fn is_happy(&self) -> bool {
        self.set.is_happy(self.conditions)
    }

    pub fn set_condition(&mut self, condition: Condition<C>) {
        if self.conditions.set(condition.clone()) {
            debug!(
                condition = ?condition.type_,
                status = ?condition.status,
                reason = ?condition.reason,
                "condition transitioned"
            );
        }
    }

    /// Sets the happy condition and every dependent to unknown unless already set.
    pub fn initialize_conditions(&mut self) {
        let set = self.set;
        for t in [set.happy].iter().chain(set.dependents) {
            if self.get_condition(*t).is_none() {
                self.set_condition(Condition {
                    type_: *t,
                    status: ConditionStatus::Unknown,
                    severity: set.severity(t),
                    ..Default::default()
                });
            }
        }
    }

    /// The dependent that currently blocks happiness, prioritizing the most recent False over
    /// the most recent Unknown. A dependent that was never set blocks as Unknown.
    fn find_unhappy_dependent(&self) -> Option<Condition<C>> {
        let unhappy = self.conditions
            .iter()
            .filter(|cond| self.set.dependents.contains(&cond.type_) && !cond.is_true())
            .reduce(|unhappy, cond| {
                if cond.unhappiness(unhappy) == Ordering::Greater { cond } else { unhappy }
            });

        if let Some(unhappy) = unhappy {
            return Some(unhappy.clone());
        }

        self.set.dependents
            .iter()
            .find(|t| self.get_condition(**t).is_none())
            .map(|t| Condition::new(*t))
    }

    /// Mark the happy condition to true if all other dependents are also true.
    fn recompute_happiness(&mut self, condition_type: &C) {
        let type_ = self.set.happy;
        let severity = self.set.severity(&type_);

        let cond = if let Some(dependent) = self.find_unhappy_dependent() {
            // make unhappy dependent reflect in happy condition
            Some(Condition {
                type_,
                status: dependent.status,
                reason: dependent.reason,
                message: dependent.message,
                severity,
                ..Default::default()
            })
        } else if *condition_type != type_ {
            Some(Condition {
                type_,
                status: ConditionStatus::True,
                severity,
                ..Default::default()
            })
        } else {
            None
        };

        if let Some(cond) = cond {
            self.set_condition(cond);
        }
    }

    pub fn mark_true(&mut self, condition_type: C) {
        self.set_condition(Condition {
            type_: condition_type,
            status: ConditionStatus::True,
            severity: self.set.severity(&condition_type),
            ..Default::default()
        });

        if self.set.is_terminal(&condition_type) {
            self.recompute_happiness(&condition_type);
        }
    }

    pub fn mark_true_with_reason(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.set_condition(Condition {
            type_: condition_type,
            status: ConditionStatus::True,
            severity: self.set.severity(&condition_type),
            reason: Some(reason.to_string()),
            message,
            ..Default::default()
        });

        if self.set.is_terminal(&condition_type) {
            self.recompute_happiness(&condition_type);
        }
    }

    /// Set the status of the condition type to false, as well as the happy condition if this
    /// condition is a dependent.
    pub fn mark_false(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.set_condition(Condition {
            type_: condition_type,
            status: ConditionStatus::False,
            severity: self.set.severity(&condition_type),
            reason: Some(reason.to_string()),
            message: message.clone(),
            ..Default::default()
        });

        if self.set.dependents.contains(&condition_type) {
            self.set_condition(Condition {
                type_: self.set.happy,
                status: ConditionStatus::False,
                severity: self.set.severity(&self.set.happy),
                reason: Some(reason.to_string()),
                message,
                ..Default::default()
            });
        }
    }

    /// Set the status to unknown and also set the happy condition to unknown if no other dependent
    /// condition is in an error state.
    pub fn mark_unknown(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.set_condition(Condition {
            type_: condition_type,
            status: ConditionStatus::Unknown,
            severity: self.set.severity(&condition_type),
            reason: Some(reason.to_string()),
            message: message.clone(),
            ..Default::default()
        });

        if !self.set.is_terminal(&condition_type) {
            return
        }

        // a false dependent trumps unknown
        let failed = self.set.dependents
            .iter()
            .filter_map(|t| self.get_condition(*t))
            .find(|c| c.is_false())
            .cloned();

        let happy = match failed {
            Some(failed) => {
                if self.get_top_level_condition().map_or(false, Condition::is_false) {
                    return
                }
                Condition {
                    status: ConditionStatus::False,
                    reason: failed.reason,
                    message: failed.message,
                    ..Default::default()
                }
            }
            None => Condition {
                status: ConditionStatus::Unknown,
                reason: Some(reason.to_string()),
                message,
                ..Default::default()
            },
        };

        self.set_condition(Condition {
            type_: self.set.happy,
            severity: self.set.severity(&self.set.happy),
            ..happy
        });
    }
}
