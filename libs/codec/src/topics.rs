//! # Topic Layout
//!
//! Maps sensors onto MQTT topics and classifies inbound topics.
//!
//! ```text
//! sensors/audio/<id>     one topic per sensor, subscribed while the sensor is online
//! sensors/status/#       one wildcard subscription for every presence transition
//! ```
//!
//! Prefixes are configurable; trailing slashes are stripped so `sensors/audio/` and
//! `sensors/audio` produce the same topics.

use crate::error::{CodecError, CodecResult};
use types::{SensorId, ValidationError};

/// Default prefix of per-sensor audio topics
pub const DEFAULT_AUDIO_PREFIX: &str = "sensors/audio";

/// Default prefix of presence topics
pub const DEFAULT_PRESENCE_PREFIX: &str = "sensors/status";

/// What an inbound topic carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Audio frames for one sensor
    Audio(SensorId),
    /// A presence transition; the sensor id is decoded together with the payload
    Presence,
}

/// Topic naming for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicLayout {
    audio_prefix: String,
    presence_prefix: String,
}

impl TopicLayout {
    pub fn new(audio_prefix: impl Into<String>, presence_prefix: impl Into<String>) -> Self {
        Self {
            audio_prefix: normalize(audio_prefix.into()),
            presence_prefix: normalize(presence_prefix.into()),
        }
    }

    pub fn audio_prefix(&self) -> &str {
        &self.audio_prefix
    }

    pub fn presence_prefix(&self) -> &str {
        &self.presence_prefix
    }

    /// Topic carrying a sensor's audio frames
    pub fn audio_topic(&self, sensor: SensorId) -> String {
        format!("{}/{}", self.audio_prefix, sensor.inner())
    }

    /// Topic a sensor publishes its own presence on
    pub fn presence_topic(&self, sensor: SensorId) -> String {
        format!("{}/{}", self.presence_prefix, sensor.inner())
    }

    /// Wildcard filter matching every presence topic
    pub fn presence_filter(&self) -> String {
        format!("{}/#", self.presence_prefix)
    }

    /// Classify an inbound topic
    pub fn classify(&self, topic: &str) -> CodecResult<TopicKind> {
        if under_prefix(topic, &self.audio_prefix) {
            let sensor =
                sensor_id_from_topic(topic).map_err(|e| CodecError::invalid_value(topic, e))?;
            return Ok(TopicKind::Audio(sensor));
        }

        if under_prefix(topic, &self.presence_prefix) {
            return Ok(TopicKind::Presence);
        }

        Err(CodecError::UnexpectedTopic {
            topic: topic.to_string(),
            expected_prefix: format!("{} or {}", self.audio_prefix, self.presence_prefix),
        })
    }
}

impl Default for TopicLayout {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIO_PREFIX, DEFAULT_PRESENCE_PREFIX)
    }
}

/// Parse the final path segment of a topic as a sensor id
pub fn sensor_id_from_topic(topic: &str) -> Result<SensorId, ValidationError> {
    let last = topic.rsplit('/').next().unwrap_or_default();
    last.parse()
}

fn normalize(prefix: String) -> String {
    prefix.trim_end_matches('/').to_string()
}

fn under_prefix(topic: &str, prefix: &str) -> bool {
    topic
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_topics() {
        let layout = TopicLayout::default();
        let sensor = SensorId::new(7);
        assert_eq!(layout.audio_topic(sensor), "sensors/audio/7");
        assert_eq!(layout.presence_topic(sensor), "sensors/status/7");
        assert_eq!(layout.presence_filter(), "sensors/status/#");
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let layout = TopicLayout::new("mics/", "mics-presence///");
        assert_eq!(layout.audio_topic(SensorId::new(1)), "mics/1");
        assert_eq!(layout.presence_filter(), "mics-presence/#");
    }

    #[test]
    fn test_classify() {
        let layout = TopicLayout::default();
        assert_eq!(
            layout.classify("sensors/audio/12").unwrap(),
            TopicKind::Audio(SensorId::new(12))
        );
        assert_eq!(
            layout.classify("sensors/status/12").unwrap(),
            TopicKind::Presence
        );
        assert!(matches!(
            layout.classify("sensors/audio/twelve"),
            Err(CodecError::InvalidValue { .. })
        ));
        assert!(matches!(
            layout.classify("other/topic/1"),
            Err(CodecError::UnexpectedTopic { .. })
        ));
        // Prefix must end on a segment boundary
        assert!(matches!(
            layout.classify("sensors/audiox/1"),
            Err(CodecError::UnexpectedTopic { .. })
        ));
    }

    #[test]
    fn test_sensor_id_uses_final_segment() {
        assert_eq!(
            sensor_id_from_topic("sensors/status/site-a/41").unwrap(),
            SensorId::new(41)
        );
        assert!(sensor_id_from_topic("sensors/status/").is_err());
    }
}
