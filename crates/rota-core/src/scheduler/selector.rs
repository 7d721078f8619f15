//! Gumbel-max team selection.
//!
//! Turns a priority map into a weighted, reproducible top-k draw: each
//! candidate's log-priority is perturbed with Gumbel noise, and the
//! perturbed scores are ranked. Structural constraints (mentor coverage,
//! no back-to-back weeks) are applied as filters around the draw.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::rng::ScheduleRng;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub priority: f64,
    pub experienced: bool,
    /// Main assignments accumulated so far, the first tie-breaker
    pub accumulated: u32,
}

#[derive(Debug, Clone)]
pub struct SelectionRequest<'a> {
    pub team_size: usize,
    pub require_mentor: bool,
    pub avoid_consecutive: bool,
    pub previous_main_ids: &'a [String],
    /// Gumbel temperature, strictly positive
    pub temperature: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TeamSelection {
    /// Picked ids, highest perturbed score first (mentor pick leads when
    /// mentor coverage was requested)
    pub ids: Vec<String>,

    /// Selection-time fairness scores of the picked candidates
    pub scores: BTreeMap<String, f64>,

    /// True iff at least one picked candidate is experienced
    pub mentor_picked: bool,

    /// True iff the pool could not fill `team_size`
    pub is_emergency: bool,
}

/// Weighted top-k pick over `candidates`.
///
/// The perturbed score is `ln(priority) / τ + gumbel`: as τ → 0 the
/// log-priorities dominate and the pick converges to the deterministic
/// top-k; as τ → ∞ the noise dominates and the pick approaches a uniform
/// draw. Gumbel noise is drawn in candidate order, so the same RNG state
/// and candidate list reproduce the same team.
pub fn select_team(
    candidates: &[Candidate],
    request: &SelectionRequest<'_>,
    rng: &mut ScheduleRng,
) -> TeamSelection {
    let mut pool: Vec<&Candidate> = candidates.iter().collect();

    if request.avoid_consecutive {
        let filtered: Vec<&Candidate> = pool
            .iter()
            .copied()
            .filter(|c| !request.previous_main_ids.contains(&c.id))
            .collect();
        // Degrade to the unfiltered pool rather than emit a short week.
        if filtered.len() >= request.team_size {
            pool = filtered;
        }
    }

    let mut scored: Vec<(f64, &Candidate)> = pool
        .into_iter()
        .map(|c| {
            let score = c.priority.ln() / request.temperature + rng.gumbel();
            (score, c)
        })
        .collect();

    scored.sort_by(|a, b| compare_scored(a, b));

    let mut picked: Vec<&Candidate> = Vec::with_capacity(request.team_size);

    if request.require_mentor {
        if let Some(mentor) = scored.iter().map(|(_, c)| *c).find(|c| c.experienced) {
            picked.push(mentor);
        }
    }

    for (_, candidate) in &scored {
        if picked.len() >= request.team_size {
            break;
        }
        if picked.iter().any(|p| p.id == candidate.id) {
            continue;
        }
        picked.push(candidate);
    }

    let mut selection = TeamSelection {
        is_emergency: picked.len() < request.team_size,
        ..Default::default()
    };
    for candidate in picked {
        selection.mentor_picked |= candidate.experienced;
        selection.ids.push(candidate.id.clone());
        selection.scores.insert(candidate.id.clone(), candidate.priority);
    }
    selection
}

/// Score descending, then fewer accumulated assignments, then id.
fn compare_scored(a: &(f64, &Candidate), b: &(f64, &Candidate)) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.accumulated.cmp(&b.1.accumulated))
        .then_with(|| a.1.id.cmp(&b.1.id))
}
