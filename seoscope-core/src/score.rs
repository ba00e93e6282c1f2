use serde::{Deserialize, Serialize};

/// Content health on a 0..=100 scale with the penalties that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: u8,
    pub decay_penalty: u8,
    pub cannibalization_penalty: u8,
    pub thin_penalty: u8,
}

impl HealthScore {
    /// `100 - min(40, 4*decay) - min(30, 5*groups) - min(20, 2*thin)`.
    pub fn compute(decaying_pages: usize, cannibal_groups: usize, thin_pages: usize) -> Self {
        let decay_penalty = decaying_pages.saturating_mul(4).min(40) as u8;
        let cannibalization_penalty = cannibal_groups.saturating_mul(5).min(30) as u8;
        let thin_penalty = thin_pages.saturating_mul(2).min(20) as u8;
        let score = 100u8.saturating_sub(decay_penalty + cannibalization_penalty + thin_penalty);

        Self {
            score,
            decay_penalty,
            cannibalization_penalty,
            thin_penalty,
        }
    }

    pub fn label(&self) -> &'static str {
        match self.score {
            80..=100 => "healthy",
            60..=79 => "needs attention",
            _ => "critical",
        }
    }
}
