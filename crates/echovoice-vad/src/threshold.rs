use crate::config::VadConfig;

/// Noise-floor tracking threshold. The floor follows an EMA of frame
/// energy during silence only, so sustained speech cannot drag it upward.
pub struct AdaptiveThreshold {
    noise_floor_db: f32,
    ema_alpha: f32,
    onset_offset_db: f32,
    offset_offset_db: f32,
    min_floor_db: f32,
    max_floor_db: f32,
}

const INITIAL_FLOOR_DB: f32 = -50.0;
const EMA_ALPHA: f32 = 0.02;

impl AdaptiveThreshold {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            noise_floor_db: INITIAL_FLOOR_DB,
            ema_alpha: EMA_ALPHA,
            onset_offset_db: config.mode.onset_offset_db(),
            offset_offset_db: config.mode.offset_offset_db(),
            min_floor_db: -80.0,
            max_floor_db: -20.0,
        }
    }

    pub fn update(&mut self, energy_db: f32, is_speech: bool) {
        if !is_speech && energy_db > self.min_floor_db && energy_db < self.max_floor_db {
            self.noise_floor_db =
                (1.0 - self.ema_alpha) * self.noise_floor_db + self.ema_alpha * energy_db;
            self.noise_floor_db = self.noise_floor_db.clamp(self.min_floor_db, self.max_floor_db);
        }
    }

    pub fn onset_threshold(&self) -> f32 {
        self.noise_floor_db + self.onset_offset_db
    }

    pub fn offset_threshold(&self) -> f32 {
        self.noise_floor_db + self.offset_offset_db
    }

    pub fn current_floor(&self) -> f32 {
        self.noise_floor_db
    }

    pub fn should_activate(&self, energy_db: f32) -> bool {
        energy_db >= self.onset_threshold()
    }

    pub fn should_deactivate(&self, energy_db: f32) -> bool {
        energy_db < self.offset_threshold()
    }

    pub fn reset(&mut self) {
        self.noise_floor_db = INITIAL_FLOOR_DB;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VadMode;

    #[test]
    fn thresholds_sit_above_the_floor() {
        let threshold = AdaptiveThreshold::new(&VadConfig::default());
        assert_eq!(threshold.current_floor(), -50.0);
        assert_eq!(threshold.onset_threshold(), -41.0);
        assert_eq!(threshold.offset_threshold(), -44.0);
    }

    #[test]
    fn floor_adapts_during_silence_only() {
        let mut t = AdaptiveThreshold::new(&VadConfig::default());
        let initial = t.current_floor();

        t.update(-30.0, true);
        assert_eq!(t.current_floor(), initial, "speech must not move the floor");

        t.update(-40.0, false);
        assert!(t.current_floor() > initial, "quiet silence raises the floor");
    }

    #[test]
    fn floor_stays_clamped() {
        let mut t = AdaptiveThreshold::new(&VadConfig::default());
        for _ in 0..10_000 {
            t.update(-25.0, false);
        }
        assert!(t.current_floor() <= -20.0);
        for _ in 0..10_000 {
            t.update(-79.0, false);
        }
        assert!(t.current_floor() >= -80.0);
    }

    #[test]
    fn aggressive_mode_raises_onset() {
        let normal = AdaptiveThreshold::new(&VadConfig::default());
        let aggressive = AdaptiveThreshold::new(&VadConfig {
            mode: VadMode::VeryAggressive,
            ..VadConfig::default()
        });
        assert!(aggressive.onset_threshold() > normal.onset_threshold());
    }
}
