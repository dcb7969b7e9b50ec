use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{GenerateError, PipelineError};
use crate::gemini::ReportSource;
use crate::models::{GenerationRequest, StyleReport};
use crate::prompts;
use crate::validate::{validate_hairstyles, validate_outfits, SimilarityLimits};

/// Knobs for the reject-retry loop.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_attempts: u32,
    /// Base inter-attempt wait; attempt N waits N times this.
    pub attempt_delay: Duration,
    pub limits: SimilarityLimits,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            attempt_delay: Duration::from_millis(750),
            limits: SimilarityLimits::default(),
        }
    }
}

/// Drives generation attempts until a candidate passes both validators or
/// the budget runs out. Each rejection's reason is folded into the next
/// attempt's instruction; parse failures consume an attempt the same way.
/// Transport-terminal errors escape immediately.
pub async fn run_generation(
    source: &dyn ReportSource,
    request: &GenerationRequest,
    settings: &GenerationSettings,
) -> Result<StyleReport, PipelineError> {
    let mut feedback: Option<String> = None;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let instruction =
            prompts::style_report_instruction(request, &settings.limits, feedback.as_deref());
        info!("🎯 Generation attempt {}/{}", attempt, settings.max_attempts);

        let rejection = match source.generate_report(&instruction, &request.photo).await {
            Ok(report) => {
                let hair = validate_hairstyles(&report.hairstyles, &settings.limits);
                let outfits = validate_outfits(&report.outfits, &settings.limits);
                match (hair.reason, outfits.reason) {
                    (None, None) => {
                        info!("✅ Candidate accepted on attempt {}", attempt);
                        return Ok(report);
                    }
                    (Some(reason), _) | (None, Some(reason)) => reason,
                }
            }
            Err(GenerateError::Parse(detail)) => {
                format!("the response was not the required JSON: {detail}")
            }
            Err(GenerateError::Call(error)) => return Err(PipelineError::Call(error)),
        };

        warn!("❌ Attempt {} rejected: {}", attempt, rejection);
        if attempt >= settings.max_attempts {
            return Err(PipelineError::GenerationFailed {
                attempts: attempt,
                last_reason: rejection,
            });
        }
        feedback = Some(rejection);
        sleep(settings.attempt_delay * attempt).await;
    }
}
