//! JOnAS container adapter for the Java buildpack
//!
//! Detects web applications, provisions a JOnAS runtime next to them, wires
//! the application into it and composes the command that starts it.

pub mod acquire;
pub mod compose;
pub mod config;
pub mod container;
pub mod error;
pub mod fsutil;
pub mod layout;
pub mod provision;
pub mod resolver;
pub mod shell;
pub mod telemetry;
pub mod version;
pub mod wire;

pub use acquire::{ArtifactAcquirer, CachedAcquirer};
pub use compose::CommandComposer;
pub use config::{ContainerConfig, DeploymentStrategy, ItemConfig};
pub use container::{CompileReport, ContainerContext, JonasContainer};
pub use error::ContainerError;
pub use layout::{ProvisioningLayout, ProvisioningState};
pub use provision::{ArchiveProvisioner, ExclusionSet};
pub use resolver::{IndexResolver, ResolvedArtifacts, RuntimeDescriptor, VersionResolver};
pub use shell::{Clause, Separator, StartupCommand};
pub use telemetry::init_tracing;
pub use version::TokenizedVersion;
pub use wire::{LinkEntry, LinkKind, LinkManifest, LinkWirer};

/// Result type for container operations
pub type Result<T> = std::result::Result<T, ContainerError>;
