//! Typed resource graph for the Quarry discovery engine.
//!
//! This crate defines the closed set of infrastructure resource kinds that
//! discovery can produce, the bind records connecting resources to their
//! usage sites, and the finalized [`ResourceGraph`] handed to downstream
//! consumers (code generation, the infrastructure descriptor).
//!
//! The kind set is a closed tagged variant rather than open registration:
//! downstream consumers must exhaustively handle every kind.

mod bind;
mod graph;
mod resource;

pub use bind::{Bind, BindKind, BindTarget};
pub use graph::ResourceGraph;
pub use resource::{
    ApiEndpoint, Bucket, CorsPolicy, CredentialsMode, CronJob, CronSchedule, DeliveryGuarantee,
    EndpointRef, Gateway, Migration, PathSegment, PathTemplate, PubSubSubscription, PubSubTopic,
    Resource, ResourceData, ResourceId, ResourceKind, Secret, SqlDatabase, Transport, Visibility,
};
