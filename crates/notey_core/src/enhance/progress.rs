//! Cosmetic progress signal for running enhancements.

use super::{EnhancementState, EnhancementStatus};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Shape of the simulated progress curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPlan {
    /// Wall-clock time to reach the ceiling.
    pub budget: Duration,
    pub steps: u32,
    /// Highest value the simulator may report; completion owns the rest.
    pub ceiling: f32,
}

impl Default for ProgressPlan {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(5),
            steps: 50,
            ceiling: 0.9,
        }
    }
}

impl ProgressPlan {
    pub fn step_delay(&self) -> Duration {
        self.budget / self.steps.max(1)
    }

    /// Value reported after `step` increments, capped at the ceiling.
    pub fn value_at(&self, step: u32) -> f32 {
        let steps = self.steps.max(1) as f32;
        (self.ceiling * step as f32 / steps).min(self.ceiling)
    }
}

/// Advances `status.progress` along `plan` until the ceiling or cancellation.
///
/// Only raises progress while the state is `Running`, so a completed run is
/// never overwritten by a late step.
pub(crate) async fn simulate_progress(
    status: &watch::Sender<EnhancementStatus>,
    token: CancellationToken,
    plan: ProgressPlan,
) {
    for step in 1..=plan.steps {
        if token.is_cancelled() {
            return;
        }

        let value = plan.value_at(step);
        status.send_if_modified(|current| {
            if current.state != EnhancementState::Running || value <= current.progress {
                return false;
            }
            current.progress = value;
            true
        });

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(plan.step_delay()) => {}
        }
    }
}
