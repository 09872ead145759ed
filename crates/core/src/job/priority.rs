//! Priority heuristic and completion estimates.

use chrono::{DateTime, Duration, Utc};

use crate::render::OutputSpec;
use crate::script::ContentSet;
use crate::timing::DurationCalculator;

/// Each output beyond the first.
const PER_EXTRA_OUTPUT: i64 = 10;
/// Each interactive output.
const PER_INTERACTIVE_OUTPUT: i64 = 20;

/// Priority for a new job. Lower runs sooner, so heavier jobs sink.
pub fn compute_priority(base: i64, outputs: &[OutputSpec]) -> i64 {
    let extra_outputs = outputs.len().saturating_sub(1) as i64;
    let quality: i64 = outputs
        .iter()
        .map(|o| o.quality_preset.priority_weight())
        .sum();
    let interactive = outputs.iter().filter(|o| o.interactive).count() as i64;

    base + PER_EXTRA_OUTPUT * extra_outputs + quality + PER_INTERACTIVE_OUTPUT * interactive
}

/// Priority for a retried job: boosted ahead of its original lane.
pub fn retry_priority(priority: i64, boost: i64) -> i64 {
    priority - boost
}

/// Seconds of video the content will produce, per output.
pub fn expected_video_secs(content: &ContentSet, calculator: &DurationCalculator) -> f64 {
    content
        .scenes
        .iter()
        .map(|s| match s.computed_duration {
            Some(secs) => calculator.clamp(secs),
            None => calculator.calculate(&s.narration_text),
        })
        .sum()
}

/// Estimated finish time for `remaining_fraction` of the work starting `from`.
pub fn estimate_completion(
    from: DateTime<Utc>,
    video_secs: f64,
    output_count: usize,
    speed_factor: f64,
    remaining_fraction: f64,
) -> DateTime<Utc> {
    let wall_secs =
        video_secs * output_count as f64 * speed_factor * remaining_fraction.clamp(0.0, 1.0);
    from + Duration::milliseconds((wall_secs * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{QualityPreset, Resolution, VideoFormat};
    use crate::script::Scene;

    fn spec(quality: QualityPreset, interactive: bool) -> OutputSpec {
        OutputSpec::new(VideoFormat::Mp4, Resolution::hd())
            .with_quality(quality)
            .with_interactive(interactive)
    }

    #[test]
    fn test_single_draft_output_is_base() {
        assert_eq!(compute_priority(100, &[spec(QualityPreset::Draft, false)]), 100);
    }

    #[test]
    fn test_heavier_jobs_sink() {
        let light = compute_priority(100, &[spec(QualityPreset::Standard, false)]);
        let more_outputs = compute_priority(
            100,
            &[
                spec(QualityPreset::Standard, false),
                spec(QualityPreset::Standard, false),
            ],
        );
        let higher_quality = compute_priority(100, &[spec(QualityPreset::Ultra, false)]);
        let interactive = compute_priority(100, &[spec(QualityPreset::Standard, true)]);

        assert_eq!(light, 105);
        assert_eq!(more_outputs, 120);
        assert_eq!(higher_quality, 130);
        assert_eq!(interactive, 125);
    }

    #[test]
    fn test_retry_priority() {
        assert_eq!(retry_priority(120, 50), 70);
    }

    #[test]
    fn test_expected_video_secs() {
        let calculator = DurationCalculator::default();
        let content = ContentSet::new(
            "Demo",
            vec![
                Scene::new("a", "short"),
                Scene::new("b", "explicit").with_duration(90.0),
                Scene::new("c", "too long").with_duration(1000.0),
            ],
        );
        assert_eq!(expected_video_secs(&content, &calculator), 60.0 + 90.0 + 300.0);
    }

    #[test]
    fn test_estimate_completion() {
        let now = Utc::now();
        let eta = estimate_completion(now, 460.0, 2, 0.25, 1.0);
        assert_eq!(eta - now, Duration::milliseconds(230_000));

        let half = estimate_completion(now, 460.0, 2, 0.25, 0.5);
        assert_eq!(half - now, Duration::milliseconds(115_000));
    }
}
