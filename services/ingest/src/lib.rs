//! # Earshot Audio Ingest
//!
//! ## Purpose
//!
//! Ingests continuous audio from many sensors that connect and disconnect at will,
//! rebuilds each sensor's ordered byte stream from sequenced MQTT packets, cuts it into
//! fixed-duration batches and streams every batch to the analyzer over gRPC. Presence
//! transitions are reported to the gateway.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌────────────────────── transport task ──────────────────────┐
//! MQTT  sensors/audio/N │ decode ─▶ registry lookup ─▶ try_send ──┐                  │
//!       sensors/status/# │ presence ─▶ register / unregister ─┐    │                  │
//!                      └─────────────────────────────────────│────│──────────────────┘
//!                                                            │    ▼
//!                                     status queue ◀─────────┘  sensor queue (bounded)
//!                                          │                          │
//!                                   status propagator           stream worker (one per sensor)
//!                                          │                          │
//!                               GatewayService/UpdateStatus   AnalyzerService/Analyze
//! ```
//!
//! ## Overload policy
//!
//! The transport task never waits on a worker. A full sensor queue drops the packet
//! with a warning; that is the only overload control. Delivery is not lossless.
//!
//! ## Modules
//!
//! - [`registry`]: sensor id to queue, one lock, never held across a send
//! - [`worker`]: gap detection, accumulation, batching, forwarding
//! - [`subscription`]: presence handling and the enqueue path
//! - [`status`]: ordered, non-blocking presence reporting
//! - [`forwarder`]: traits at the downstream seams
//! - [`grpc`] / [`transport`]: tonic and rumqttc implementations
//! - [`service`]: startup wiring and shutdown

pub mod error;
pub mod forwarder;
pub mod grpc;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod status;
pub mod subscription;
pub mod transport;
pub mod worker;

pub use error::{IngestError, Result};
pub use forwarder::{AnalysisClient, BatchSink, StatusReporter, TopicSubscriber};
pub use metrics::{IngestMetrics, MetricsSnapshot};
pub use registry::{PacketReceiver, PacketSender, Registration, SensorRegistry};
pub use service::IngestService;
pub use status::{status_channel, StatusHandle, StatusPropagator, StatusUpdate};
pub use subscription::{AudioOutcome, PipelineOptions, PresenceOutcome, SubscriptionManager};
pub use worker::{Gap, Ingested, StreamAccumulator, StreamWorker, WorkerSummary};
