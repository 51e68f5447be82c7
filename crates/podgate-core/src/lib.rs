//! Core types for the podgate container-lifecycle gateway.
//!
//! This crate provides the value objects every caller of the gateway deals with:
//!
//! - **Connection descriptors**: how to reach one cluster, with which
//!   credential, under which TLS policy and namespace
//! - **Names**: validated orchestrator object names (DNS-1123 labels)
//! - **Error types**: descriptor and name validation failures
//!
//! # Example
//!
//! ```
//! use podgate_core::{ConnectionDescriptor, Credential, TlsPolicy};
//!
//! let descriptor = ConnectionDescriptor {
//!     name: "staging".to_string(),
//!     endpoint: "https://10.0.0.1:6443".to_string(),
//!     credential: Credential::BearerToken("s3cr3t".to_string()),
//!     target_namespace: Some("team-a".to_string()),
//!     tls: TlsPolicy::Verify,
//! };
//!
//! descriptor.validate().unwrap();
//! assert_eq!(descriptor.effective_namespace("default"), "team-a");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod descriptor;
pub mod error;
pub mod names;

pub use descriptor::{ConnectionDescriptor, Credential, CredentialKind, TlsPolicy};
pub use error::{CoreError, Result};
pub use names::{NameError, ResourceName};
