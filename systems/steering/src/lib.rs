#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Social-force steering resolution for crowd agents.
//!
//! The resolver is a pure function over a frozen snapshot of every agent
//! body plus the static wall list. It blends the desired direction obtained
//! from the path planner with short-range inverse-power repulsion from
//! neighboring agents and wall cells, then clamps the result into a bounded
//! magnitude band. Exponential smoothing of the returned vectors belongs to
//! the simulation driver, not to this crate.

use crowdflow_core::{AgentBody, CellCoord};
use glam::Vec2;

/// Floor applied to repulsion distances so coincident agents and wall
/// contact produce large but finite magnitudes.
const DISTANCE_FLOOR: f32 = 1e-4;

/// Tuning knobs for the repulsion force model.
#[derive(Clone, Debug)]
pub struct ForceTuning {
    /// Inverse-power falloff exponent; higher values sharpen the falloff so
    /// agents barely feel each other until very close.
    pub exponent: f32,
    /// Radius in cells within which neighbors and walls exert repulsion.
    pub interaction_radius: f32,
    /// Repulsion multiplier applied when the neighbor occupies a lower agent
    /// slot than the resolving agent.
    pub senior_weight: f32,
    /// Repulsion multiplier applied when the neighbor occupies a higher agent
    /// slot. Deliberately different from `senior_weight`: the asymmetry
    /// breaks the equal-and-opposite impulse symmetry that otherwise locks
    /// agent pairs into oscillating mutual pushes.
    pub junior_weight: f32,
    /// Multiplier applied to wall repulsion on top of the inverse-power term.
    pub wall_weight: f32,
    /// Lower bound of the steering magnitude band.
    pub min_magnitude: f32,
    /// Upper bound of the steering magnitude band.
    pub max_magnitude: f32,
}

impl Default for ForceTuning {
    fn default() -> Self {
        Self {
            exponent: 3.0,
            interaction_radius: 5.0,
            senior_weight: 6.0,
            junior_weight: 4.0,
            wall_weight: 2.0,
            min_magnitude: 0.2,
            max_magnitude: 1.0,
        }
    }
}

/// Outcome of resolving one agent against the frozen sub-step snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    /// Unit vector toward the next path waypoint, or straight toward the
    /// target when no useful route exists.
    pub desired: Vec2,
    /// Repulsion-adjusted steering vector, magnitude-clamped into the
    /// configured band.
    pub steering: Vec2,
    /// True when repulsion pushed the resolved vector against the desired
    /// direction.
    pub reverse: bool,
}

/// Resolves the steering force for the agent at `index`.
///
/// `next_waypoint` is the path-planning seam: given the agent's rounded
/// position and rounded target it returns the first waypoint beyond the
/// occupied cell, or `None` when no useful route exists (the agent then aims
/// straight at its target and relies on repulsion to slide along walls).
///
/// Reads but never mutates agent state, so the driver may invoke it for
/// every agent concurrently against the same snapshot.
#[must_use]
pub fn resolve<S>(
    index: usize,
    bodies: &[AgentBody],
    walls: &[CellCoord],
    next_waypoint: &S,
    tuning: &ForceTuning,
) -> Resolution
where
    S: Fn(CellCoord, CellCoord) -> Option<CellCoord>,
{
    let agent = &bodies[index];
    let desired = desired_direction(agent, next_waypoint);

    let mut accumulator = desired;

    for (other_index, other) in bodies.iter().enumerate() {
        if other_index == index {
            continue;
        }
        let offset = agent.position - other.position;
        let distance = offset.length();
        if distance > tuning.interaction_radius {
            continue;
        }
        let distance = distance.max(DISTANCE_FLOOR);
        let reach = agent.padding + other.padding;
        let rank_weight = if other_index < index {
            tuning.senior_weight
        } else {
            tuning.junior_weight
        };
        let magnitude = (reach / distance).powf(tuning.exponent) * rank_weight;
        accumulator += offset * magnitude;
    }

    for wall in walls {
        let offset = agent.position - wall.center();
        let distance = face_distance(offset);
        if distance > tuning.interaction_radius {
            continue;
        }
        let distance = distance.max(DISTANCE_FLOOR);
        let magnitude = (agent.padding / distance).powf(tuning.exponent) * tuning.wall_weight;
        accumulator += offset * magnitude;
    }

    let reverse = desired.dot(accumulator) < 0.0;
    let steering = clamp_magnitude(accumulator, tuning.min_magnitude, tuning.max_magnitude);

    Resolution {
        desired,
        steering,
        reverse,
    }
}

fn desired_direction<S>(agent: &AgentBody, next_waypoint: &S) -> Vec2
where
    S: Fn(CellCoord, CellCoord) -> Option<CellCoord>,
{
    if let Some(waypoint) = next_waypoint(agent.cell(), agent.target_cell()) {
        (waypoint.center() - agent.position).normalize_or_zero()
    } else {
        (agent.target - agent.position).normalize_or_zero()
    }
}

/// Distance from a cell-center offset to the face of the cell's unit square.
///
/// Each axis offset shrinks by half a cell and floors at zero, so repulsion
/// begins at the wall face rather than at its center point.
fn face_distance(offset: Vec2) -> f32 {
    (offset.abs() - Vec2::splat(0.5)).max(Vec2::ZERO).length()
}

fn clamp_magnitude(vector: Vec2, min: f32, max: f32) -> Vec2 {
    let length = vector.length();
    if length <= f32::EPSILON {
        return Vec2::ZERO;
    }
    vector / length * length.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_at(position: Vec2, target: Vec2) -> AgentBody {
        AgentBody {
            position,
            target,
            direction: Vec2::ZERO,
            pointer: Vec2::ZERO,
            padding: 0.2,
            speed: 2.0,
            reverse: false,
        }
    }

    fn no_route(_: CellCoord, _: CellCoord) -> Option<CellCoord> {
        None
    }

    /// Tuning with the clamp band opened wide so raw repulsion magnitudes
    /// are observable.
    fn unclamped() -> ForceTuning {
        ForceTuning {
            min_magnitude: 0.0,
            max_magnitude: f32::MAX,
            ..ForceTuning::default()
        }
    }

    #[test]
    fn desired_direction_points_at_second_path_cell() {
        let bodies = [body_at(Vec2::new(1.0, 1.0), Vec2::new(9.0, 1.0))];
        let waypoint = |src: CellCoord, dst: CellCoord| {
            assert_eq!(src, CellCoord::new(1, 1));
            assert_eq!(dst, CellCoord::new(9, 1));
            Some(CellCoord::new(2, 2))
        };
        let resolution = resolve(0, &bodies, &[], &waypoint, &ForceTuning::default());
        let expected = Vec2::new(1.0, 1.0).normalize();
        assert!((resolution.desired - expected).length() < 1e-6);
    }

    #[test]
    fn desired_direction_falls_back_to_straight_line() {
        let bodies = [body_at(Vec2::new(1.0, 1.0), Vec2::new(1.0, 5.0))];
        let resolution = resolve(0, &bodies, &[], &no_route, &ForceTuning::default());
        assert!((resolution.desired - Vec2::new(0.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn steering_magnitude_stays_within_band() {
        let tuning = ForceTuning::default();
        // A crowded knot of agents produces a raw accumulator far above the
        // band; an isolated distant pair produces one near the desired unit
        // vector. Both must clamp into [min, max].
        let crowded: Vec<AgentBody> = (0..6)
            .map(|i| {
                body_at(
                    Vec2::new(5.0 + 0.1 * i as f32, 5.0),
                    Vec2::new(15.0, 5.0),
                )
            })
            .collect();
        let lonely = [
            body_at(Vec2::new(1.0, 1.0), Vec2::new(9.0, 9.0)),
            body_at(Vec2::new(30.0, 30.0), Vec2::new(9.0, 9.0)),
        ];
        for (bodies, index) in [(crowded.as_slice(), 3), (&lonely[..], 0)] {
            let resolution = resolve(index, bodies, &[], &no_route, &tuning);
            let magnitude = resolution.steering.length();
            assert!(
                magnitude >= tuning.min_magnitude - 1e-6
                    && magnitude <= tuning.max_magnitude + 1e-6,
                "magnitude {magnitude} outside band"
            );
        }
    }

    #[test]
    fn neighbor_repulsion_grows_as_distance_shrinks() {
        let tuning = unclamped();
        let mut previous = 0.0;
        for gap in [2.0_f32, 1.0, 0.5, 0.25] {
            // Target equals position so the desired term is zero and the
            // steering vector is the bare repulsion contribution.
            let position = Vec2::new(10.0, 10.0);
            let bodies = [
                body_at(position, position),
                body_at(position + Vec2::new(gap, 0.0), position),
            ];
            let resolution = resolve(0, &bodies, &[], &no_route, &tuning);
            let magnitude = resolution.steering.length();
            assert!(
                magnitude > previous,
                "repulsion did not grow when gap shrank to {gap}"
            );
            previous = magnitude;
        }
    }

    #[test]
    fn neighbors_beyond_interaction_radius_are_ignored() {
        let tuning = unclamped();
        let position = Vec2::new(10.0, 10.0);
        let bodies = [
            body_at(position, position),
            body_at(position + Vec2::new(tuning.interaction_radius + 1.0, 0.0), position),
        ];
        let resolution = resolve(0, &bodies, &[], &no_route, &tuning);
        assert_eq!(resolution.steering, Vec2::ZERO);
    }

    #[test]
    fn rank_weights_break_pair_symmetry() {
        let tuning = unclamped();
        let position = Vec2::new(10.0, 10.0);
        let bodies = [
            body_at(position, position),
            body_at(position + Vec2::new(1.0, 0.0), position + Vec2::new(1.0, 0.0)),
        ];
        let first = resolve(0, &bodies, &[], &no_route, &tuning);
        let second = resolve(1, &bodies, &[], &no_route, &tuning);
        let ratio = second.steering.length() / first.steering.length();
        let expected = tuning.senior_weight / tuning.junior_weight;
        assert!(
            (ratio - expected).abs() < 1e-4,
            "expected weight ratio {expected}, observed {ratio}"
        );
    }

    #[test]
    fn wall_repulsion_measures_distance_to_cell_face() {
        assert_eq!(face_distance(Vec2::new(2.0, 0.0)), 1.5);
        assert_eq!(face_distance(Vec2::new(0.5, 0.5)), 0.0);
        let diagonal = face_distance(Vec2::new(1.5, 1.5));
        assert!((diagonal - Vec2::splat(1.0).length()).abs() < 1e-6);
    }

    #[test]
    fn wall_repulsion_pushes_away_and_uses_own_multiplier() {
        let tuning = unclamped();
        let position = Vec2::new(2.0, 0.0);
        let bodies = [body_at(position, position)];
        let walls = [CellCoord::new(0, 0)];
        let resolution = resolve(0, &bodies, &walls, &no_route, &tuning);
        assert!(resolution.steering.x > 0.0);
        assert_eq!(resolution.steering.y, 0.0);
        let expected = (0.2_f32 / 1.5).powf(tuning.exponent) * tuning.wall_weight * 2.0;
        assert!((resolution.steering.x - expected).abs() < 1e-6);
    }

    #[test]
    fn reverse_flags_opposing_push() {
        let tuning = ForceTuning::default();
        // Neighbor sits directly between the agent and its target, close
        // enough that repulsion overwhelms the unit desired vector.
        let bodies = [
            body_at(Vec2::new(5.0, 5.0), Vec2::new(9.0, 5.0)),
            body_at(Vec2::new(5.3, 5.0), Vec2::new(1.0, 5.0)),
        ];
        let resolution = resolve(0, &bodies, &[], &no_route, &tuning);
        assert!(resolution.reverse);
        assert!(resolution.steering.x < 0.0);
    }

    #[test]
    fn coincident_agents_resolve_to_finite_vectors() {
        let tuning = ForceTuning::default();
        let position = Vec2::new(4.0, 4.0);
        let bodies = [
            body_at(position, Vec2::new(8.0, 4.0)),
            body_at(position, Vec2::new(0.0, 4.0)),
        ];
        let resolution = resolve(0, &bodies, &[], &no_route, &tuning);
        assert!(resolution.steering.is_finite());
        assert!(resolution.desired.is_finite());
    }
}
