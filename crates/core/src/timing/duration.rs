//! Narration text to target scene duration.

use super::config::TimingConfig;

/// Computes how long a scene should last from its narration.
#[derive(Debug, Clone)]
pub struct DurationCalculator {
    words_per_minute: f64,
    pause_multiplier: f64,
    min_secs: f64,
    max_secs: f64,
}

impl DurationCalculator {
    pub fn new(config: &TimingConfig) -> Self {
        Self {
            words_per_minute: config.words_per_minute,
            pause_multiplier: config.pause_multiplier,
            min_secs: config.min_scene_secs,
            max_secs: config.max_scene_secs,
        }
    }

    /// Target duration in seconds, always within the configured bounds.
    pub fn calculate(&self, narration_text: &str) -> f64 {
        let words = count_words(narration_text) as f64;
        let base_secs = words * 60.0 / self.words_per_minute;
        self.clamp(base_secs * self.pause_multiplier)
    }

    /// Clamps an externally supplied duration into the scene bounds.
    pub fn clamp(&self, secs: f64) -> f64 {
        if secs.is_nan() {
            return self.min_secs;
        }
        secs.max(self.min_secs).min(self.max_secs)
    }

    pub fn min_secs(&self) -> f64 {
        self.min_secs
    }

    pub fn max_secs(&self) -> f64 {
        self.max_secs
    }
}

impl Default for DurationCalculator {
    fn default() -> Self {
        Self::new(&TimingConfig::default())
    }
}

/// Whitespace-separated word count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("one"), 1);
        assert_eq!(count_words(" one\ttwo\nthree  "), 3);
    }

    #[test]
    fn test_default_formula() {
        let calc = DurationCalculator::default();
        // 10 words -> 7.5s, clamped up
        assert_eq!(calc.calculate(&words(10)), 60.0);
        // 200 words -> 100s * 1.5
        assert_eq!(calc.calculate(&words(200)), 150.0);
        // 600 words -> 450s, clamped down
        assert_eq!(calc.calculate(&words(600)), 300.0);
    }

    #[test]
    fn test_without_pause_multiplier() {
        let calc = DurationCalculator::new(&TimingConfig::default().with_pause_multiplier(1.0));
        assert_eq!(calc.calculate(&words(10)), 60.0);
        assert_eq!(calc.calculate(&words(200)), 100.0);
        assert_eq!(calc.calculate(&words(600)), 300.0);
    }

    #[test]
    fn test_custom_bounds() {
        let calc = DurationCalculator::new(&TimingConfig::default().with_scene_bounds(5.0, 30.0));
        assert_eq!(calc.calculate(&words(2)), 5.0);
        assert_eq!(calc.calculate(&words(20)), 15.0);
        assert_eq!(calc.calculate(&words(100)), 30.0);
    }

    #[test]
    fn test_nan_bound_does_not_panic() {
        let calc =
            DurationCalculator::new(&TimingConfig::default().with_scene_bounds(f64::NAN, 300.0));
        assert_eq!(calc.calculate(&words(200)), 150.0);
        assert_eq!(calc.calculate(&words(600)), 300.0);
        assert_eq!(calc.clamp(1000.0), 300.0);
    }

    #[test]
    fn test_bounds_and_monotonic() {
        let calc = DurationCalculator::default();
        let mut previous = 0.0;
        for n in (0..800).step_by(7) {
            let secs = calc.calculate(&words(n));
            assert!(secs >= calc.min_secs() && secs <= calc.max_secs());
            assert!(secs >= previous, "not monotonic at {} words", n);
            previous = secs;
        }
    }

    #[test]
    fn test_clamp() {
        let calc = DurationCalculator::default();
        assert_eq!(calc.clamp(10.0), 60.0);
        assert_eq!(calc.clamp(120.0), 120.0);
        assert_eq!(calc.clamp(1e9), 300.0);
        assert_eq!(calc.clamp(f64::NAN), 60.0);
    }
}
