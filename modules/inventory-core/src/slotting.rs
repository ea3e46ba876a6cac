//! Multi-criteria weighted location ranking (C5). Pure — deterministic
//! given its inputs.

use std::cmp::Ordering;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbcClass {
    A,
    B,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureZone {
    Ambient,
    Chilled,
    Frozen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Pick,
    Staging,
    BulkReserve,
}

#[derive(Debug, Clone)]
pub struct LocationCandidate {
    pub location_id: Uuid,
    pub active: bool,
    pub zone: TemperatureZone,
    pub kind: LocationKind,
    pub hazmat_certified: bool,
    pub utilization_pct: f64,
    pub distance_from_dock: f64,
    pub pick_frequency: f64,
    pub pick_sequence: i32,
}

#[derive(Debug, Clone)]
pub struct SlottingContext {
    pub abc_class: AbcClass,
    pub required_temperature_zone: Option<TemperatureZone>,
    pub hazmat: bool,
    pub preferred_zones: HashSet<Uuid>,
    pub excluded_locations: HashSet<Uuid>,
    pub max_distance: f64,
    pub max_pick_frequency: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub abc_velocity: f64,
    pub proximity: f64,
    pub capacity: f64,
    pub temperature: f64,
    pub fefo_friendliness: f64,
    pub hazard: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            abc_velocity: 0.30,
            proximity: 0.25,
            capacity: 0.20,
            temperature: 0.10,
            fefo_friendliness: 0.10,
            hazard: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreBreakdown {
    pub abc_velocity: f64,
    pub proximity: f64,
    pub capacity: f64,
    pub temperature: f64,
    pub fefo_friendliness: f64,
    pub hazard: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredLocation {
    pub location_id: Uuid,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Filter out ineligible locations, score the rest, and return them
/// sorted descending by score (ties broken by lower pick-sequence).
pub fn score_locations(
    candidates: &[LocationCandidate],
    ctx: &SlottingContext,
    weights: ScoreWeights,
) -> Vec<ScoredLocation> {
    let mut scored: Vec<ScoredLocation> = candidates
        .iter()
        .filter(|c| is_eligible(c, ctx))
        .map(|c| {
            let breakdown = ScoreBreakdown {
                abc_velocity: abc_velocity_subscore(c, ctx),
                proximity: proximity_subscore(c, ctx),
                capacity: capacity_subscore(c),
                temperature: temperature_subscore(c, ctx),
                fefo_friendliness: fefo_friendliness_subscore(c),
                hazard: hazard_subscore(c, ctx),
            };
            let score = breakdown.abc_velocity * weights.abc_velocity
                + breakdown.proximity * weights.proximity
                + breakdown.capacity * weights.capacity
                + breakdown.temperature * weights.temperature
                + breakdown.fefo_friendliness * weights.fefo_friendliness
                + breakdown.hazard * weights.hazard;
            ScoredLocation {
                location_id: c.location_id,
                score,
                breakdown,
            }
        })
        .collect();

    let sequence_by_id: std::collections::HashMap<Uuid, i32> = candidates
        .iter()
        .map(|c| (c.location_id, c.pick_sequence))
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                sequence_by_id[&a.location_id].cmp(&sequence_by_id[&b.location_id])
            })
    });

    scored
}

fn is_eligible(c: &LocationCandidate, ctx: &SlottingContext) -> bool {
    if !c.active {
        return false;
    }
    if ctx.excluded_locations.contains(&c.location_id) {
        return false;
    }
    if !ctx.preferred_zones.is_empty() && !ctx.preferred_zones.contains(&c.location_id) {
        return false;
    }
    if let Some(required) = ctx.required_temperature_zone {
        if required != TemperatureZone::Ambient && c.zone != TemperatureZone::Ambient && c.zone != required {
            return false;
        }
    }
    if ctx.hazmat && !c.hazmat_certified {
        return false;
    }
    true
}

fn abc_velocity_subscore(c: &LocationCandidate, ctx: &SlottingContext) -> f64 {
    if ctx.max_pick_frequency <= 0.0 {
        return 0.5;
    }
    let normalized_frequency = (c.pick_frequency / ctx.max_pick_frequency).clamp(0.0, 1.0);
    match ctx.abc_class {
        AbcClass::A => normalized_frequency,
        AbcClass::C => 1.0 - normalized_frequency,
        AbcClass::B => 0.5,
    }
}

fn proximity_subscore(c: &LocationCandidate, ctx: &SlottingContext) -> f64 {
    if ctx.max_distance <= 0.0 {
        return 1.0;
    }
    (1.0 - c.distance_from_dock / ctx.max_distance).clamp(0.0, 1.0)
}

fn capacity_subscore(c: &LocationCandidate) -> f64 {
    (1.0 - c.utilization_pct / 100.0).clamp(0.0, 1.0)
}

fn temperature_subscore(c: &LocationCandidate, ctx: &SlottingContext) -> f64 {
    match ctx.required_temperature_zone {
        None => 0.5,
        Some(required) if required == c.zone => 1.0,
        _ => 0.0,
    }
}

fn fefo_friendliness_subscore(c: &LocationCandidate) -> f64 {
    match c.kind {
        LocationKind::Pick | LocationKind::Staging => 1.0,
        LocationKind::BulkReserve => 0.5,
    }
}

fn hazard_subscore(c: &LocationCandidate, ctx: &SlottingContext) -> f64 {
    if !ctx.hazmat {
        1.0
    } else if c.hazmat_certified {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(location_id: Uuid, pick_sequence: i32) -> LocationCandidate {
        LocationCandidate {
            location_id,
            active: true,
            zone: TemperatureZone::Ambient,
            kind: LocationKind::Pick,
            hazmat_certified: false,
            utilization_pct: 50.0,
            distance_from_dock: 10.0,
            pick_frequency: 5.0,
            pick_sequence,
        }
    }

    fn ctx() -> SlottingContext {
        SlottingContext {
            abc_class: AbcClass::B,
            required_temperature_zone: None,
            hazmat: false,
            preferred_zones: HashSet::new(),
            excluded_locations: HashSet::new(),
            max_distance: 20.0,
            max_pick_frequency: 10.0,
        }
    }

    #[test]
    fn inactive_and_excluded_locations_are_dropped() {
        let active = candidate(Uuid::new_v4(), 1);
        let mut inactive = candidate(Uuid::new_v4(), 2);
        inactive.active = false;

        let mut context = ctx();
        let excluded_id = Uuid::new_v4();
        let mut excluded = candidate(excluded_id, 3);
        excluded.active = true;
        context.excluded_locations.insert(excluded_id);

        let scored = score_locations(&[active.clone(), inactive, excluded], &context, ScoreWeights::default());
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].location_id, active.location_id);
    }

    #[test]
    fn hazmat_product_drops_uncertified_locations() {
        let mut certified = candidate(Uuid::new_v4(), 1);
        certified.hazmat_certified = true;
        let uncertified = candidate(Uuid::new_v4(), 2);

        let mut context = ctx();
        context.hazmat = true;

        let scored = score_locations(&[certified.clone(), uncertified], &context, ScoreWeights::default());
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].location_id, certified.location_id);
    }

    #[test]
    fn class_a_favors_high_frequency_class_c_favors_low_frequency() {
        let mut high_freq = candidate(Uuid::new_v4(), 1);
        high_freq.pick_frequency = 10.0;
        let mut low_freq = candidate(Uuid::new_v4(), 2);
        low_freq.pick_frequency = 0.0;

        let mut class_a = ctx();
        class_a.abc_class = AbcClass::A;
        let scored_a = score_locations(&[high_freq.clone(), low_freq.clone()], &class_a, ScoreWeights::default());
        assert_eq!(scored_a[0].location_id, high_freq.location_id);

        let mut class_c = ctx();
        class_c.abc_class = AbcClass::C;
        let scored_c = score_locations(&[high_freq, low_freq.clone()], &class_c, ScoreWeights::default());
        assert_eq!(scored_c[0].location_id, low_freq.location_id);
    }

    #[test]
    fn ties_broken_by_lower_pick_sequence() {
        let a = candidate(Uuid::new_v4(), 5);
        let b = candidate(Uuid::new_v4(), 1);

        let scored = score_locations(&[a, b.clone()], &ctx(), ScoreWeights::default());
        assert_eq!(scored[0].location_id, b.location_id);
    }

    #[test]
    fn scoring_is_deterministic_given_identical_inputs() {
        let candidates = vec![candidate(Uuid::new_v4(), 1), candidate(Uuid::new_v4(), 2)];
        let context = ctx();
        let first = score_locations(&candidates, &context, ScoreWeights::default());
        let second = score_locations(&candidates, &context, ScoreWeights::default());
        let first_ids: Vec<_> = first.iter().map(|s| s.location_id).collect();
        let second_ids: Vec<_> = second.iter().map(|s| s.location_id).collect();
        assert_eq!(first_ids, second_ids);
    }
}
