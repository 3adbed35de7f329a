//! Broker transport
//!
//! The MQTT event loop is the single task that feeds the
//! [`SubscriptionManager`](crate::subscription::SubscriptionManager).

pub mod mqtt;

pub use mqtt::{MqttSubscriber, MqttTransport};
