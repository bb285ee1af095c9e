//! Resource kinds and payloads.

use quarry_core::Span;
use serde::Serialize;

/// Globally unique resource identifier.
///
/// Ids are `kind:package` for package-scoped resources (databases) and
/// `kind:package.name` for named resources. Uniqueness is enforced
/// atomically at registration time; a collision aborts the discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Build an id for a named resource.
    pub fn named(kind: ResourceKind, package: &str, name: &str) -> Self {
        Self(format!("{}:{}.{}", kind.as_str(), package, name))
    }

    /// Build an id for a package-scoped resource.
    pub fn package_scoped(kind: ResourceKind, package: &str) -> Self {
        Self(format!("{}:{}", kind.as_str(), package))
    }

    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    ApiEndpoint,
    SqlDatabase,
    PubSubTopic,
    PubSubSubscription,
    CronJob,
    Gateway,
    Bucket,
    Secret,
}

impl ResourceKind {
    /// Short kind tag used in resource ids and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ApiEndpoint => "api",
            ResourceKind::SqlDatabase => "sqldb",
            ResourceKind::PubSubTopic => "topic",
            ResourceKind::PubSubSubscription => "subscription",
            ResourceKind::CronJob => "cron",
            ResourceKind::Gateway => "gateway",
            ResourceKind::Bucket => "bucket",
            ResourceKind::Secret => "secret",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered infrastructure resource.
///
/// Resources are created once per discovery pass and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    /// Globally unique id.
    pub id: ResourceId,
    /// Logical name.
    pub name: String,
    /// Optional physical (cloud) name override.
    pub cloud_name: Option<String>,
    /// Name of the declaring package.
    pub package: String,
    /// Documentation text from the comments above the declaration.
    pub doc: Option<String>,
    /// Source range of the declaration.
    pub range: Span,
    /// Kind-specific payload.
    pub data: ResourceData,
}

impl Resource {
    /// The resource kind tag.
    pub fn kind(&self) -> ResourceKind {
        match &self.data {
            ResourceData::ApiEndpoint(_) => ResourceKind::ApiEndpoint,
            ResourceData::SqlDatabase(_) => ResourceKind::SqlDatabase,
            ResourceData::PubSubTopic(_) => ResourceKind::PubSubTopic,
            ResourceData::PubSubSubscription(_) => ResourceKind::PubSubSubscription,
            ResourceData::CronJob(_) => ResourceKind::CronJob,
            ResourceData::Gateway(_) => ResourceKind::Gateway,
            ResourceData::Bucket(_) => ResourceKind::Bucket,
            ResourceData::Secret(_) => ResourceKind::Secret,
        }
    }
}

/// Kind-specific resource payload.
#[derive(Debug, Clone, Serialize)]
pub enum ResourceData {
    ApiEndpoint(ApiEndpoint),
    SqlDatabase(SqlDatabase),
    PubSubTopic(PubSubTopic),
    PubSubSubscription(PubSubSubscription),
    CronJob(CronJob),
    Gateway(Gateway),
    Bucket(Bucket),
    Secret(Secret),
}

/// An API endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEndpoint {
    /// Path template the endpoint serves.
    pub path: PathTemplate,
    /// Allowed HTTP methods; `["*"]` means all.
    pub methods: Vec<String>,
    /// Endpoint visibility.
    pub visibility: Visibility,
    /// Transport mode.
    pub transport: Transport,
    /// Names of the handler parameters bound to path segments, in order.
    pub path_params: Vec<String>,
}

/// Endpoint visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Public,
    Private,
}

/// Endpoint transport mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transport {
    /// Typed request/response structs.
    Typed,
    /// Raw access to the underlying HTTP request.
    Raw,
}

/// An ordered path template of literal and parameter segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathTemplate {
    pub segments: Vec<PathSegment>,
}

/// One segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PathSegment {
    Literal(String),
    Param(String),
}

impl PathTemplate {
    /// Names of the parameter segments, in path order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PathSegment::Param(name) => Some(name.as_str()),
                PathSegment::Literal(_) => None,
            })
            .collect()
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.segments {
            match segment {
                PathSegment::Literal(s) => write!(f, "/{}", s)?,
                PathSegment::Param(s) => write!(f, "/:{}", s)?,
            }
        }
        Ok(())
    }
}

/// A SQL database with its migration history.
#[derive(Debug, Clone, Serialize)]
pub struct SqlDatabase {
    /// App-root-relative migration directory.
    pub migration_dir: String,
    /// Migrations ordered by number, contiguous from 1.
    pub migrations: Vec<Migration>,
}

/// One numbered schema migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    pub filename: String,
    pub number: u64,
    pub description: String,
}

/// A scheduled job.
#[derive(Debug, Clone, Serialize)]
pub struct CronJob {
    /// Human-readable title.
    pub title: Option<String>,
    /// When the job runs.
    pub schedule: CronSchedule,
    /// The endpoint invoked on each run, referenced by identity.
    pub endpoint: EndpointRef,
}

/// Cron job schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CronSchedule {
    /// Every N minutes.
    Every(u32),
    /// A five-field cron expression.
    Cron(String),
}

/// A symbolic reference to an endpoint by (package, declared name).
///
/// References stay symbolic so resources remain immutable; identity is
/// recovered through [`crate::ResourceGraph::lookup`] after finalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EndpointRef {
    pub package: String,
    pub name: String,
}

impl std::fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

/// An API gateway.
#[derive(Debug, Clone, Serialize)]
pub struct Gateway {
    pub base_url: Option<String>,
    pub hostnames: Vec<String>,
    pub cors: CorsPolicy,
}

/// CORS policy for a gateway. Structural decode only; enforcement happens
/// at the network layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorsPolicy {
    /// Log CORS decisions at the gateway.
    pub debug: bool,
    /// Origins allowed to make credentialed requests.
    pub allow_origins_with_credentials: Option<Vec<String>>,
    /// Allow every origin to make credentialed requests.
    pub allow_unsafe_all_origins_with_credentials: bool,
    /// Origins allowed to make non-credentialed requests.
    pub allow_origins_without_credentials: Option<Vec<String>>,
    /// Extra request headers to allow.
    pub extra_allowed_headers: Vec<String>,
    /// Extra response headers to expose.
    pub extra_exposed_headers: Vec<String>,
    /// Allow private-network-access preflight requests.
    pub allow_private_network_access: bool,
}

/// How the policy treats credentialed cross-origin access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CredentialsMode {
    /// No credentialed cross-origin access.
    None,
    /// Credentialed access from an explicit origin allow-list.
    AllowList,
    /// Credentialed access from any origin.
    UnsafeAllowAll,
}

impl CorsPolicy {
    /// The credentials mode implied by the policy fields.
    ///
    /// Only meaningful on a validated policy; the gateway parser rejects
    /// policies that set both the allow-list and the unsafe-all flag.
    pub fn credentials_mode(&self) -> CredentialsMode {
        if self.allow_unsafe_all_origins_with_credentials {
            CredentialsMode::UnsafeAllowAll
        } else if self.allow_origins_with_credentials.is_some() {
            CredentialsMode::AllowList
        } else {
            CredentialsMode::None
        }
    }
}

/// A pub/sub topic.
#[derive(Debug, Clone, Serialize)]
pub struct PubSubTopic {
    /// Name of the message type carried by the topic.
    pub message_type: String,
    /// Delivery guarantee.
    pub delivery: DeliveryGuarantee,
}

/// Topic delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryGuarantee {
    AtLeastOnce,
    ExactlyOnce,
}

/// A subscription on a pub/sub topic.
#[derive(Debug, Clone, Serialize)]
pub struct PubSubSubscription {
    /// Logical name of the topic subscribed to.
    pub topic: String,
    /// The endpoint handling delivered messages.
    pub handler: EndpointRef,
}

/// An object storage bucket.
#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    /// Whether object versioning is enabled.
    pub versioned: bool,
}

/// An application secret.
#[derive(Debug, Clone, Serialize)]
pub struct Secret {
    /// The secret's key name.
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_formats() {
        let named = ResourceId::named(ResourceKind::ApiEndpoint, "blog", "GetPost");
        assert_eq!(named.as_str(), "api:blog.GetPost");

        let scoped = ResourceId::package_scoped(ResourceKind::SqlDatabase, "blog");
        assert_eq!(scoped.as_str(), "sqldb:blog");
    }

    #[test]
    fn test_path_template_display_and_params() {
        let path = PathTemplate {
            segments: vec![
                PathSegment::Literal("blog".to_string()),
                PathSegment::Param("id".to_string()),
            ],
        };
        assert_eq!(path.to_string(), "/blog/:id");
        assert_eq!(path.param_names(), vec!["id"]);
    }

    #[test]
    fn test_credentials_mode() {
        let none = CorsPolicy::default();
        assert_eq!(none.credentials_mode(), CredentialsMode::None);

        let allow_list = CorsPolicy {
            allow_origins_with_credentials: Some(vec!["https://a.example".to_string()]),
            ..Default::default()
        };
        assert_eq!(allow_list.credentials_mode(), CredentialsMode::AllowList);

        let unsafe_all = CorsPolicy {
            allow_unsafe_all_origins_with_credentials: true,
            ..Default::default()
        };
        assert_eq!(unsafe_all.credentials_mode(), CredentialsMode::UnsafeAllowAll);
    }
}
