//! Player configuration.

/// Knobs for a playback session.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Output device description substring; `None` picks the host default.
    pub device_name: Option<String>,
    /// Tick resolution in milliseconds.
    ///
    /// Controls both command latency (a transport request is applied on
    /// the engine's next tick) and ring headroom (the ring holds several
    /// ticks of audio).
    pub tick_ms: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            device_name: None,
            tick_ms: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_host_default_device() {
        let config = PlayerConfig::default();
        assert!(config.device_name.is_none());
        assert_eq!(config.tick_ms, 10);
    }
}
