//! # kafka-ops
//!
//! Declarative management of Kafka topics, consumer groups and ACLs.
//!
//! A spec manifest lists the desired state. [`Reconciler`] compares it with
//! a live cluster through a [`ClusterAdmin`] and issues the create, alter and
//! delete calls needed to converge, reporting one outcome per declared item.
//!
//! ## Features
//!
//! - **Topics**: create, grow partitions, align config overrides, delete by
//!   name, prefix or regular expression
//! - **Consumer groups**: delete by name, prefix or regular expression
//! - **ACLs**: grouped allow/deny rules per principal and resource
//! - **Dump**: export a cluster as a manifest that applies back cleanly
//! - **Security**: TLS and SASL/SCRAM-SHA-256/512
//!
//! ## Library Usage
//!
//! ```no_run
//! use kafka_ops::{
//!     ApplyOptions, ConnectionArgs, ConnectionConfig, ItemReport, KafkaAdmin, Reconciler,
//!     Result, SpecLoader,
//! };
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let spec = SpecLoader::new().load_file(Path::new("kafka.yaml"))?;
//!     let config = ConnectionConfig::resolve(&spec.connection, &ConnectionArgs::default())?;
//!     let mut admin = KafkaAdmin::connect(config)?;
//!
//!     let mut reports: Vec<ItemReport> = Vec::new();
//!     let summary = Reconciler::new(&mut admin, ApplyOptions::default()).run(&spec, &mut reports)?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```
//!
//! [`InMemoryCluster`] implements the same trait in process and records every
//! call, which makes it the usual backend for tests.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![warn(clippy::expect_used)]

pub mod acl;
pub mod admin;
pub mod config;
pub mod dump;
pub mod error;
pub mod pattern;
pub mod reconcile;
pub mod spec;

pub use admin::{ClusterAdmin, InMemoryCluster, KafkaAdmin};
pub use config::{ApplyOptions, ConnectionArgs, ConnectionConfig, SecurityProtocol};
pub use dump::{dump_cluster, render, DumpFormat};
pub use error::{KafkaErrorCode, OpsError, Result};
pub use pattern::{Matcher, NamePattern};
pub use reconcile::{ItemReport, ItemStatus, Reconciler, Reporter, ResourceKind, RunSummary};
pub use spec::{Spec, SpecFormat, SpecLoader, TemplateVars};
