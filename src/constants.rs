//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Label keys, data keys and sentinel values describe the wire contract with
//! the binding secrets, the mirror ConfigMaps and the UnifiedPush server.
//! Tunables are defaults only and can be overridden through environment
//! variables (see [`crate::config::ControllerConfig`]).

/// Label on a binding secret that carries the type marker
pub const SECRET_TYPE_LABEL: &str = "secretType";

/// Type marker value identifying a mobile client binding request
pub const BINDING_SECRET_TYPE: &str = "mobile-client-binding-secret";

/// Owner reference kind that makes a deleted secret cascade-relevant
pub const SERVICE_BINDING_KIND: &str = "ServiceBinding";

/// Binding secret data keys
pub const BINDING_APP_TYPE_KEY: &str = "appType";
pub const BINDING_CLIENT_ID_KEY: &str = "clientId";
pub const BINDING_GOOGLE_KEY: &str = "googleKey";
pub const BINDING_PROJECT_NUMBER_KEY: &str = "projectNumber";

/// The only app type that provisions a variant
pub const ANDROID_APP_TYPE: &str = "Android";

/// Mirror ConfigMap labels
pub const MIRROR_MOBILE_LABEL: (&str, &str) = ("mobile", "enabled");
pub const MIRROR_SERVICE_LABEL: (&str, &str) = ("serviceName", "ups");
pub const MIRROR_RESOURCE_TYPE_LABEL: (&str, &str) = ("resourceType", "binding");

/// Suffix appended to a variant name to form its mirror ConfigMap name
pub const MIRROR_NAME_SUFFIX: &str = "-config-map";

/// Value of the `type` data field on every mirror record
pub const MIRROR_VARIANT_TYPE: &str = "android";

/// Data key in the bootstrap secret holding the push application id
pub const APPLICATION_ID_KEY: &str = "applicationId";

/// Default name of the bootstrap secret describing the push application
pub const DEFAULT_UPS_SECRET_NAME: &str = "unified-push-server";

/// Default UnifiedPush REST base URL
pub const DEFAULT_UPS_URL: &str = "http://localhost:8080/rest";

/// Default per-request timeout for UnifiedPush calls (seconds)
pub const DEFAULT_UPS_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default number of attempts for a retried operation, first call included
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default delay before restarting watch stream after errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Field manager / user agent name
pub const CONTROLLER_NAME: &str = "ups-binding-controller";
