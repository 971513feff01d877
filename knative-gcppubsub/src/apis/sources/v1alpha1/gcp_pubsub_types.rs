use k8s_openapi::api::core::v1::{ObjectReference, SecretKeySelector};
use knative::{derive::ConditionType, Status};
use knative_conditions::{ConditionAccessor, Conditions};
use kube::core::ObjectList;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The CloudEvent type of events from a [`GcpPubSubSource`], in case Pub/Sub doesn't send a
/// CloudEvent itself.
pub const GCP_PUBSUB_SOURCE_EVENT_TYPE: &str = "google.pubsub.topic.publish";

/// The CloudEvent source of events published to `topic` in `google_cloud_project`.
pub fn gcp_pubsub_event_source(google_cloud_project: &str, topic: &str) -> String {
    format!("//pubsub.googleapis.com/{google_cloud_project}/topics/{topic}")
}

/// GcpPubSubSource subscribes to a Google Cloud Pub/Sub topic and delivers its messages to a
/// sink, optionally through a transformer.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, Clone, PartialEq, JsonSchema)]
#[kube(
    kind = "GcpPubSubSource",
    group = "sources.eventing.knative.dev",
    version = "v1alpha1",
    status = "GcpPubSubSourceStatus",
    shortname = "gcppubsub",
    category = "all",
    category = "knative",
    category = "eventing",
    category = "sources",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GcpPubSubSourceSpec {
    /// The credential used to poll the Pub/Sub subscription. It is not used to create or delete
    /// the subscription. The secret entry must hold a JSON service account key.
    #[serde(default)]
    pub gcp_creds_secret: SecretKeySelector,
    /// ID of the Google Cloud project the topic exists in.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub google_cloud_project: String,
    /// ID of the topic within the project, e.g. `laconia` rather than
    /// `projects/my-gcp-project/topics/laconia`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic: String,
    /// Reference to an object that will resolve to a domain name to use as the sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<ObjectReference>,
    /// Reference to an object that will resolve to a domain name to use as the transformer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<ObjectReference>,
    /// Name of the ServiceAccount that runs the receive adapter deployment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
}

impl GcpPubSubSourceSpec {
    /// The CloudEvent source of events from this topic.
    pub fn event_source(&self) -> String {
        gcp_pubsub_event_source(&self.google_cloud_project, &self.topic)
    }
}

/// GcpPubSubSourceList contains a list of GcpPubSubSources.
pub type GcpPubSubSourceList = ObjectList<GcpPubSubSource>;

/// The conditions of a [`GcpPubSubSourceStatus`].
///
/// The derive also generates the `GcpPubSubConditionType` and `GcpPubSubConditionManager`
/// traits for code that is generic over the status. On [`GcpPubSubSourceStatus`] the inherent
/// `mark_sink` and `mark_transformer` take precedence, and they also record the resolved URI.
/// The generated `mark_sinkprovided` only flips the condition.
#[derive(ConditionType, Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GcpPubSubCondition {
    /// True when the source is ready to send events.
    Ready,
    /// True when the source has been configured with a sink target.
    #[dependent]
    SinkProvided,
    /// True when the receive adapter deployment has been created.
    #[dependent]
    Deployed,
    /// True when a Pub/Sub subscription points at the receive adapter.
    #[dependent]
    Subscribed,
    /// True when the source has been configured with a transformer target.
    TransformerProvided,
    /// True when the event types of the source have been created.
    EventTypesProvided,
}

/// GcpPubSubSourceStatus defines the observed state of GcpPubSubSource.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GcpPubSubSourceStatus {
    /// inherits [`Status`], which currently provides:
    /// * observed_generation
    /// * conditions
    /// * annotations
    #[serde(flatten)]
    pub status: Status<GcpPubSubCondition>,
    /// The current active sink URI that has been configured for the source.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sink_uri: String,
    /// The current active transformer URI that has been configured for the source.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transformer_uri: String,
}

impl ConditionAccessor<GcpPubSubCondition> for GcpPubSubSourceStatus {
    fn conditions(&self) -> &Conditions<GcpPubSubCondition> {
        self.status.conditions()
    }

    fn conditions_mut(&mut self) -> &mut Conditions<GcpPubSubCondition> {
        self.status.conditions_mut()
    }
}

impl GcpPubSubSourceStatus {
    /// Records the resolved sink. An empty uri leaves the sink unknown.
    pub fn mark_sink(&mut self, uri: impl Into<String>) {
        self.sink_uri = uri.into();
        if self.sink_uri.is_empty() {
            self.manager().mark_unknown(
                GcpPubSubCondition::SinkProvided,
                "SinkEmpty",
                Some("Sink has resolved to empty.".into()),
            );
        } else {
            self.manager().mark_true(GcpPubSubCondition::SinkProvided);
        }
    }

    pub fn mark_no_sink(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_false(GcpPubSubCondition::SinkProvided, reason, message);
    }

    /// Records the resolved transformer. An empty uri leaves the transformer unknown.
    pub fn mark_transformer(&mut self, uri: impl Into<String>) {
        self.transformer_uri = uri.into();
        if self.transformer_uri.is_empty() {
            self.manager().mark_unknown(
                GcpPubSubCondition::TransformerProvided,
                "TransformerEmpty",
                Some("Transformer has resolved to empty.".into()),
            );
        } else {
            self.manager().mark_true(GcpPubSubCondition::TransformerProvided);
        }
    }

    pub fn mark_no_transformer(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_false(GcpPubSubCondition::TransformerProvided, reason, message);
    }

    pub fn mark_deployed(&mut self) {
        self.manager().mark_true(GcpPubSubCondition::Deployed);
    }

    pub fn mark_deploying(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_unknown(GcpPubSubCondition::Deployed, reason, message);
    }

    pub fn mark_not_deployed(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_false(GcpPubSubCondition::Deployed, reason, message);
    }

    pub fn mark_subscribed(&mut self) {
        self.manager().mark_true(GcpPubSubCondition::Subscribed);
    }

    pub fn mark_event_types(&mut self) {
        self.manager().mark_true(GcpPubSubCondition::EventTypesProvided);
    }

    pub fn mark_no_event_types(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_false(GcpPubSubCondition::EventTypesProvided, reason, message);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use knative_conditions::{ConditionSeverity, ConditionStatus};

    const REQUIRED: [GcpPubSubCondition; 3] = [
        GcpPubSubCondition::SinkProvided,
        GcpPubSubCondition::Deployed,
        GcpPubSubCondition::Subscribed,
    ];

    fn ready_status() -> GcpPubSubSourceStatus {
        let mut status = GcpPubSubSourceStatus::default();
        status.initialize_conditions();
        status.mark_sink("http://sink.default.svc.cluster.local");
        status.mark_deployed();
        status.mark_subscribed();
        status
    }

    fn status_of(status: &GcpPubSubSourceStatus, t: GcpPubSubCondition) -> Option<ConditionStatus> {
        status.get_condition(t).map(|c| c.status)
    }

    #[test]
    fn event_source() {
        assert_eq!(
            gcp_pubsub_event_source("my-proj", "laconia"),
            "//pubsub.googleapis.com/my-proj/topics/laconia"
        );

        let spec = GcpPubSubSourceSpec {
            google_cloud_project: "my-proj".into(),
            topic: "laconia".into(),
            ..Default::default()
        };
        assert_eq!(spec.event_source(), "//pubsub.googleapis.com/my-proj/topics/laconia");
    }

    #[test]
    fn condition_set() {
        use knative_conditions::ConditionType as _;
        assert_eq!(GcpPubSubCondition::happy(), GcpPubSubCondition::Ready);
        assert_eq!(GcpPubSubCondition::dependents(), &REQUIRED);
    }

    #[test]
    fn initialize_conditions() {
        let mut status = GcpPubSubSourceStatus::default();
        assert!(status.get_condition(GcpPubSubCondition::Ready).is_none());

        status.initialize_conditions();
        assert!(!status.is_ready());
        assert_eq!(status_of(&status, GcpPubSubCondition::Ready), Some(ConditionStatus::Unknown));
        for t in REQUIRED {
            assert_eq!(status_of(&status, t), Some(ConditionStatus::Unknown));
        }
        assert!(status.get_condition(GcpPubSubCondition::EventTypesProvided).is_none());
        assert!(status.get_condition(GcpPubSubCondition::TransformerProvided).is_none());
    }

    #[test]
    fn initialize_does_not_overwrite() {
        let mut status = ready_status();
        let conditions = status.conditions().clone();
        status.initialize_conditions();
        assert_eq!(&conditions, status.conditions());
        assert!(status.is_ready());
    }

    #[test]
    fn all_required_conditions_make_ready() {
        let status = ready_status();
        assert!(status.is_ready());
        assert_eq!(status_of(&status, GcpPubSubCondition::Ready), Some(ConditionStatus::True));
    }

    #[test]
    fn any_required_condition_false_is_not_ready() {
        let mut status = ready_status();
        status.mark_no_sink("NotFound", Some("sink default/missing not found".into()));
        assert!(!status.is_ready());
        let ready = status.get_condition(GcpPubSubCondition::Ready).unwrap();
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(ready.reason.as_deref(), Some("NotFound"));

        let mut status = ready_status();
        status.mark_not_deployed("DeploymentFailed", None);
        assert!(!status.is_ready());
        assert_eq!(status_of(&status, GcpPubSubCondition::Deployed), Some(ConditionStatus::False));
    }

    #[test]
    fn any_required_condition_unknown_is_not_ready() {
        let mut status = ready_status();
        status.mark_deploying("Deploying", Some(format!("waiting on {}", "gcppubsub-adapter")));
        assert!(!status.is_ready());
        let ready = status.get_condition(GcpPubSubCondition::Ready).unwrap();
        assert_eq!(ready.status, ConditionStatus::Unknown);
        assert_eq!(ready.message.as_deref(), Some("waiting on gcppubsub-adapter"));

        status.mark_deployed();
        assert!(status.is_ready());
    }

    #[test]
    fn order_of_marks_does_not_matter() {
        let mut status = GcpPubSubSourceStatus::default();
        status.mark_subscribed();
        assert!(!status.is_ready());
        status.mark_deployed();
        assert!(!status.is_ready());
        status.mark_sink("http://x");
        assert!(status.is_ready());
    }

    #[test]
    fn mark_sink() {
        let mut status = GcpPubSubSourceStatus::default();
        status.initialize_conditions();
        status.mark_sink("http://x");
        assert_eq!(status.sink_uri, "http://x");
        assert_eq!(status_of(&status, GcpPubSubCondition::SinkProvided), Some(ConditionStatus::True));
    }

    #[test]
    fn mark_empty_sink() {
        let mut status = ready_status();
        status.mark_sink("");
        assert_eq!(status.sink_uri, "");
        let sink = status.get_condition(GcpPubSubCondition::SinkProvided).unwrap();
        assert_eq!(sink.status, ConditionStatus::Unknown);
        assert_eq!(sink.reason.as_deref(), Some("SinkEmpty"));
        assert_eq!(sink.message.as_deref(), Some("Sink has resolved to empty."));
        assert!(!status.is_ready());
    }

    #[test]
    fn transformer_is_informational() {
        let mut status = ready_status();
        status.mark_transformer("");
        assert!(status.is_ready());
        let transformer = status.get_condition(GcpPubSubCondition::TransformerProvided).unwrap();
        assert_eq!(transformer.status, ConditionStatus::Unknown);
        assert_eq!(transformer.reason.as_deref(), Some("TransformerEmpty"));
        assert_eq!(transformer.severity, ConditionSeverity::Info);

        status.mark_no_transformer("NotFound", None);
        assert!(status.is_ready());

        status.mark_transformer("http://transformer");
        assert_eq!(status.transformer_uri, "http://transformer");
        assert_eq!(
            status_of(&status, GcpPubSubCondition::TransformerProvided),
            Some(ConditionStatus::True)
        );
        assert!(status.is_ready());
    }

    #[test]
    fn event_types_do_not_change_readiness() {
        let mut status = GcpPubSubSourceStatus::default();
        status.initialize_conditions();
        status.mark_event_types();
        assert!(!status.is_ready());
        status.mark_no_event_types("EventTypesCreateFailed", None);
        assert!(!status.is_ready());

        let mut status = ready_status();
        status.mark_no_event_types("EventTypesCreateFailed", Some("forbidden".into()));
        assert!(status.is_ready());
        assert_eq!(
            status_of(&status, GcpPubSubCondition::EventTypesProvided),
            Some(ConditionStatus::False)
        );
        status.mark_event_types();
        assert!(status.is_ready());
    }

    #[test]
    fn event_types_do_not_recover_failed_source() {
        let mut status = ready_status();
        status.mark_false("ReconcileFailed", None);
        assert!(!status.is_ready());
        status.mark_event_types();
        assert!(!status.is_ready());
    }

    #[test]
    fn remarking_keeps_transition_time() {
        let mut status = ready_status();
        let before = status.get_condition(GcpPubSubCondition::Deployed).unwrap().clone();
        status.mark_deployed();
        let after = status.get_condition(GcpPubSubCondition::Deployed).unwrap();
        assert_eq!(&before, after);
    }

    #[test]
    fn status_wire_format() {
        let status = GcpPubSubSourceStatus {
            sink_uri: "http://x".into(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&status).unwrap(), serde_json::json!({
            "sinkUri": "http://x"
        }));

        let status: GcpPubSubSourceStatus = serde_json::from_value(serde_json::json!({
            "observedGeneration": 2,
            "conditions": [
                {"type": "Ready", "status": "True"},
                {"type": "SinkProvided", "status": "True"},
                {"type": "Deployed", "status": "True"},
                {"type": "Subscribed", "status": "True"},
                {"type": "EventTypesProvided", "status": "False", "severity": "Info"}
            ],
            "sinkUri": "http://x",
            "transformerUri": "http://t"
        })).unwrap();
        assert_eq!(status.status.observed_generation, Some(2));
        assert_eq!(status.transformer_uri, "http://t");
        assert!(status.is_ready());
    }

    #[test]
    fn status_ignores_foreign_conditions() {
        let status: GcpPubSubSourceStatus = serde_json::from_value(serde_json::json!({
            "conditions": [
                {"type": "Ready", "status": "True", "severity": ""},
                {"type": "ReceiveAdapterReady", "status": "True"},
                {"type": "SinkProvided", "status": "True"},
                {"type": "Deployed", "status": "True"},
                {"type": "Subscribed", "status": "True"}
            ],
            "sinkUri": "http://x"
        })).unwrap();
        assert_eq!(status.status.conditions.len(), 4);
        assert!(status.is_ready());
    }

    #[test]
    fn generated_manager_only_flips_condition() {
        let mut status = GcpPubSubSourceStatus::default();
        GcpPubSubConditionManager::mark_sinkprovided(&mut status);

        assert_eq!(
            status.get_condition(GcpPubSubCondition::SinkProvided).map(|c| c.status),
            Some(ConditionStatus::True)
        );
        assert!(status.sink_uri.is_empty());

        status.mark_sink("http://x");
        assert_eq!(status.sink_uri, "http://x");
    }
}
