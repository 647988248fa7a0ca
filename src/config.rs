//! Tracker configuration.
//!
//! Loaded by the host from its own config file; this crate only parses and
//! validates the section it owns:
//!
//! ```
//! use worldsync::config::TrackerConfig;
//!
//! let config = TrackerConfig::from_json_str(r#"{ "events": { "join": { "repeat_times": 5 } } }"#).unwrap();
//! assert_eq!(config.events.join.repeat_times, 5);
//! assert_eq!(config.poll_interval_ticks, 60);
//! ```

use crate::error::{Result, SyncError};
use crate::time::TICKS_PER_SECOND;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Default outbound channel
pub const DEFAULT_CHANNEL: &str = "xaeroworldmap:main";

/// Offsets (in ticks) of the notification attempts for one event
pub type RepeatOffsets = SmallVec<[u64; 4]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Feature switch
    pub enabled: bool,
    /// Outbound channel name
    pub channel: String,
    /// Interval between world polls
    pub poll_interval_ticks: u64,
    pub events: EventsConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: DEFAULT_CHANNEL.to_string(),
            poll_interval_ticks: 3 * TICKS_PER_SECOND,
            events: EventsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub join: RepeatConfig,
    pub world_change: RepeatConfig,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            join: RepeatConfig {
                repeat_times: 3,
                spacing_ticks: 1,
            },
            world_change: RepeatConfig {
                repeat_times: 1,
                spacing_ticks: 1,
            },
        }
    }
}

/// How many times a notification is sent for one event, and how far apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatConfig {
    pub repeat_times: u32,
    pub spacing_ticks: u64,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            repeat_times: 1,
            spacing_ticks: 1,
        }
    }
}

impl RepeatConfig {
    /// Delay of each attempt; the first is always 0 (immediate)
    pub fn offsets(&self) -> RepeatOffsets {
        (0..u64::from(self.repeat_times))
            .map(|i| i.saturating_mul(self.spacing_ticks))
            .collect()
    }
}

impl TrackerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ticks == 0 {
            return Err(SyncError::InvalidConfig(
                "poll_interval_ticks must be at least 1".to_string(),
            ));
        }
        if self.channel.trim().is_empty() {
            return Err(SyncError::InvalidConfig("channel must not be empty".to_string()));
        }
        Ok(())
    }
}
