//! Scenario-level node description.
//!
//! The serde-friendly shape used in scenario and config files; converts into
//! the wire [`NodeConfig`] handed to `sim_create`.

use meshsim_api::{
    NodeConfig, DEFAULT_IDLE_LOOPS_BEFORE_YIELD, DEFAULT_INITIAL_RTC_SECS,
    DEFAULT_SPIN_DETECTION_THRESHOLD, PRV_KEY_SIZE, PUB_KEY_SIZE,
};
use serde::{Deserialize, Serialize};

fn default_lora_freq() -> f32 {
    915.0
}
fn default_lora_bw() -> f32 {
    250.0
}
fn default_lora_sf() -> u8 {
    11
}
fn default_lora_cr() -> u8 {
    5
}
fn default_tx_power() -> u8 {
    20
}
fn default_initial_rtc() -> u32 {
    DEFAULT_INITIAL_RTC_SECS
}
fn default_spin_threshold() -> u32 {
    DEFAULT_SPIN_DETECTION_THRESHOLD
}
fn default_idle_loops() -> u32 {
    DEFAULT_IDLE_LOOPS_BEFORE_YIELD
}

/// One node as described in a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Display name used in advertisements and logs.
    pub name: String,

    /// Seed for the node's deterministic RNG.
    pub rng_seed: u32,

    /// Identity. Zeroed keys mean "let the firmware generate one".
    #[serde(default)]
    pub public_key: [u8; PUB_KEY_SIZE],
    #[serde(default = "zero_private_key", with = "serde_bytes_64")]
    pub private_key: [u8; PRV_KEY_SIZE],

    #[serde(default = "default_lora_freq")]
    pub lora_freq: f32,
    #[serde(default = "default_lora_bw")]
    pub lora_bw: f32,
    #[serde(default = "default_lora_sf")]
    pub lora_sf: u8,
    #[serde(default = "default_lora_cr")]
    pub lora_cr: u8,
    #[serde(default = "default_tx_power")]
    pub lora_tx_power: u8,

    #[serde(default)]
    pub initial_millis: u64,
    #[serde(default = "default_initial_rtc")]
    pub initial_rtc: u32,

    #[serde(default = "default_spin_threshold")]
    pub spin_detection_threshold: u32,
    #[serde(default = "default_idle_loops")]
    pub idle_loops_before_yield: u32,
    #[serde(default)]
    pub log_spin_detection: bool,
    #[serde(default)]
    pub log_loop_iterations: bool,
}

fn zero_private_key() -> [u8; PRV_KEY_SIZE] {
    [0; PRV_KEY_SIZE]
}

// [u8; 64] has no serde impls; ship it as a plain byte sequence.
mod serde_bytes_64 {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(bytes.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 64], D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("private_key must be 64 bytes"))
    }
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            rng_seed: 12345,
            public_key: [0; PUB_KEY_SIZE],
            private_key: zero_private_key(),
            lora_freq: default_lora_freq(),
            lora_bw: default_lora_bw(),
            lora_sf: default_lora_sf(),
            lora_cr: default_lora_cr(),
            lora_tx_power: default_tx_power(),
            initial_millis: 0,
            initial_rtc: default_initial_rtc(),
            spin_detection_threshold: default_spin_threshold(),
            idle_loops_before_yield: default_idle_loops(),
            log_spin_detection: false,
            log_loop_iterations: false,
        }
    }
}

impl NodeSpec {
    /// Convert to the wire config handed to `sim_create`.
    pub fn to_config(&self) -> NodeConfig {
        NodeConfig::default()
            .with_name(&self.name)
            .with_keys(&self.public_key, &self.private_key)
            .with_rng_seed(self.rng_seed)
            .with_initial_time(self.initial_millis, self.initial_rtc)
            .with_lora(
                self.lora_freq,
                self.lora_bw,
                self.lora_sf,
                self.lora_cr,
                self.lora_tx_power,
            )
            .with_spin_detection(self.spin_detection_threshold, self.idle_loops_before_yield)
            .with_spin_logging(self.log_spin_detection, self.log_loop_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_defaults() {
        let spec = NodeSpec {
            name: "n1".into(),
            rng_seed: 7,
            ..Default::default()
        };
        let config = spec.to_config();
        let reference = NodeConfig::default();
        assert_eq!(config.name(), "n1");
        assert_eq!(config.rng_seed, 7);
        assert_eq!(config.lora_freq, reference.lora_freq);
        assert_eq!(config.lora_sf, reference.lora_sf);
        assert_eq!(config.spin_detection_threshold, reference.spin_detection_threshold);
    }

    #[test]
    fn json_round_trip() {
        let mut spec = NodeSpec {
            name: "gateway".into(),
            rng_seed: 99,
            lora_freq: 868.0,
            ..Default::default()
        };
        spec.private_key[0] = 0xAB;
        let json = serde_json::to_string(&spec).unwrap();
        let back: NodeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "gateway");
        assert_eq!(back.rng_seed, 99);
        assert_eq!(back.lora_freq, 868.0);
        assert_eq!(back.private_key[0], 0xAB);
    }

    #[test]
    fn sparse_json_uses_defaults() {
        let spec: NodeSpec = serde_json::from_str(r#"{"name": "min", "rng_seed": 1}"#).unwrap();
        assert_eq!(spec.lora_bw, 250.0);
        assert_eq!(spec.idle_loops_before_yield, 2);
        assert!(!spec.log_spin_detection);
    }
}
