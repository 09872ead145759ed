use super::{types::Config, ConfigError};

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}

/// Validate configuration
/// Currently validates:
/// - Reading pace and pause multiplier are positive
/// - Scene bounds are ordered and tolerances non-negative
/// - At least one worker, output slot and attempt
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let timing = &config.timing;
    if !is_positive(timing.words_per_minute) {
        return invalid("timing.words_per_minute must be positive");
    }
    if !is_positive(timing.pause_multiplier) {
        return invalid("timing.pause_multiplier must be positive");
    }
    if !timing.min_scene_secs.is_finite() || !timing.max_scene_secs.is_finite() {
        return invalid("timing scene bounds must be finite numbers");
    }
    if timing.min_scene_secs < 0.0 || timing.min_scene_secs > timing.max_scene_secs {
        return invalid(format!(
            "timing.min_scene_secs ({}) must be between 0 and max_scene_secs ({})",
            timing.min_scene_secs, timing.max_scene_secs
        ));
    }
    let tolerances = [timing.scene_tolerance_secs, timing.global_tolerance_secs];
    if tolerances.iter().any(|t| !t.is_finite() || *t < 0.0) {
        return invalid("timing tolerances must be finite and non-negative");
    }

    if config.composer.timeout_ms == 0 {
        return invalid("composer.timeout_ms cannot be 0");
    }
    if config.composer.fps == 0 {
        return invalid("composer.fps cannot be 0");
    }

    if config.render.max_parallel_outputs == 0 {
        return invalid("render.max_parallel_outputs cannot be 0");
    }
    if !is_positive(config.render.render_speed_factor) {
        return invalid("render.render_speed_factor must be positive");
    }

    if config.manager.workers == 0 {
        return invalid("manager.workers cannot be 0");
    }
    if config.manager.retry.max_attempts == 0 {
        return invalid("manager.retry.max_attempts cannot be 0");
    }
    if config.manager.retry.base_delay_ms > config.manager.retry.max_delay_ms {
        return invalid("manager.retry.base_delay_ms cannot exceed max_delay_ms");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(config: &Config) {
        let err = validate_config(config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_timing() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut config = Config::default();
            config.timing.min_scene_secs = bad;
            assert_invalid(&config);

            let mut config = Config::default();
            config.timing.max_scene_secs = bad;
            assert_invalid(&config);

            let mut config = Config::default();
            config.timing.scene_tolerance_secs = bad;
            assert_invalid(&config);

            let mut config = Config::default();
            config.timing.global_tolerance_secs = bad;
            assert_invalid(&config);
        }
    }

    #[test]
    fn test_validate_rejects_nan_from_toml() {
        let config = crate::config::load_config_from_str("[timing]\nmin_scene_secs = nan").unwrap();
        assert!(config.timing.min_scene_secs.is_nan());
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_scene_bounds() {
        let mut config = Config::default();
        config.timing.min_scene_secs = 400.0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_pace() {
        let mut config = Config::default();
        config.timing.words_per_minute = 0.0;
        assert_invalid(&config);

        let mut config = Config::default();
        config.timing.pause_multiplier = f64::NAN;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_negative_tolerance() {
        let mut config = Config::default();
        config.timing.global_tolerance_secs = -1.0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_zero_workers_and_attempts() {
        let mut config = Config::default();
        config.manager.workers = 0;
        assert_invalid(&config);

        let mut config = Config::default();
        config.manager.retry.max_attempts = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_zero_output_slots() {
        let mut config = Config::default();
        config.render.max_parallel_outputs = 0;
        assert_invalid(&config);
    }
}
