// Spawn director: what to spawn (weighted by rarity) and where (around a live player).

use crate::domain::catalog::EnemyKind;
use crate::domain::tuning::SpawnTuning;
use rand::Rng;
use std::f32::consts::TAU;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Position) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Result of a spawn decision; the caller creates and registers the enemy.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPlan {
    pub kind: EnemyKind,
    pub position: Position,
}

/// Sum of the tier weights of every valid entry.
pub fn total_weight(catalog: &[EnemyKind]) -> f32 {
    catalog
        .iter()
        .filter(|e| e.is_valid())
        .map(|e| e.rarity.weight())
        .sum()
}

/// Weighted pick for an explicit roll in `[0, total_weight)`.
///
/// Returns the first entry whose cumulative weight reaches the roll (`roll <= cumulative`).
/// If floating point drift leaves the roll unmatched, the first valid entry wins.
pub fn pick_weighted_with_roll(catalog: &[EnemyKind], roll: f32) -> Option<&EnemyKind> {
    let mut cumulative = 0.0;
    for entry in catalog.iter().filter(|e| e.is_valid()) {
        cumulative += entry.rarity.weight();
        if roll <= cumulative {
            return Some(entry);
        }
    }
    catalog.iter().find(|e| e.is_valid())
}

#[derive(Debug, Clone)]
pub struct SpawnDirector {
    catalog: Arc<[EnemyKind]>,
    min_distance: f32,
    max_distance: f32,
}

impl SpawnDirector {
    pub fn new(catalog: Arc<[EnemyKind]>, tuning: SpawnTuning) -> Self {
        Self {
            catalog,
            min_distance: tuning.min_distance,
            max_distance: tuning.max_distance,
        }
    }

    pub fn pick_weighted_enemy<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&EnemyKind> {
        let total = total_weight(&self.catalog);
        if total <= 0.0 {
            return None;
        }
        let roll = rng.gen_range(0.0..total);
        pick_weighted_with_roll(&self.catalog, roll)
    }

    /// Random point on a ring around a uniformly chosen anchor. `None` without anchors.
    pub fn pick_spawn_position<R: Rng + ?Sized>(
        &self,
        anchors: &[Position],
        rng: &mut R,
    ) -> Option<Position> {
        if anchors.is_empty() {
            return None;
        }
        let anchor = anchors[rng.gen_range(0..anchors.len())];
        let angle = rng.gen_range(0.0..TAU);
        let distance = rng.gen_range(self.min_distance..=self.max_distance);
        Some(Position {
            x: anchor.x + angle.cos() * distance,
            y: anchor.y + angle.sin() * distance,
        })
    }

    /// Picks an enemy and a position. Without anchors the enemy appears at the origin.
    pub fn plan<R: Rng + ?Sized>(&self, anchors: &[Position], rng: &mut R) -> Option<SpawnPlan> {
        let kind = self.pick_weighted_enemy(rng)?.clone();
        let position = self
            .pick_spawn_position(anchors, rng)
            .unwrap_or(Position::ORIGIN);
        Some(SpawnPlan { kind, position })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Rarity;
    use crate::domain::catalog::fixtures::enemy;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn director(catalog: Vec<EnemyKind>) -> SpawnDirector {
        SpawnDirector::new(
            catalog.into(),
            SpawnTuning {
                min_distance: 8.0,
                max_distance: 12.0,
            },
        )
    }

    #[test]
    fn when_roll_is_zero_then_first_tier_is_picked() {
        let catalog = vec![enemy("Grunt", Rarity::Common), enemy("Brute", Rarity::Rare)];

        assert_eq!(total_weight(&catalog), 70.0);
        let picked = pick_weighted_with_roll(&catalog, 0.0).expect("expected a pick");
        assert_eq!(picked.name, "Grunt");
    }

    #[test]
    fn when_roll_equals_cumulative_boundary_then_earlier_entry_wins() {
        let catalog = vec![enemy("Grunt", Rarity::Common), enemy("Brute", Rarity::Rare)];

        assert_eq!(pick_weighted_with_roll(&catalog, 60.0).map(|e| e.name.as_str()), Some("Grunt"));
        assert_eq!(pick_weighted_with_roll(&catalog, 60.5).map(|e| e.name.as_str()), Some("Brute"));
    }

    #[test]
    fn when_roll_overshoots_total_then_first_valid_entry_is_returned() {
        let mut invalid = enemy("Ghost", Rarity::Common);
        invalid.name = String::new();
        let catalog = vec![invalid, enemy("Runner", Rarity::Uncommon)];

        let picked = pick_weighted_with_roll(&catalog, 1_000.0).expect("expected fallback");
        assert_eq!(picked.name, "Runner");
    }

    #[test]
    fn when_single_entry_is_eligible_then_every_draw_returns_it() {
        let director = director(vec![enemy("Lonely", Rarity::Legendary)]);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let picked = director.pick_weighted_enemy(&mut rng).expect("expected a pick");
            assert_eq!(picked.name, "Lonely");
        }
    }

    #[test]
    fn when_catalog_is_empty_then_no_enemy_is_picked() {
        let director = director(Vec::new());
        let mut rng = StdRng::seed_from_u64(1);

        assert!(director.pick_weighted_enemy(&mut rng).is_none());
        assert!(director.plan(&[Position::ORIGIN], &mut rng).is_none());
    }

    #[test]
    fn when_anchors_exist_then_spawn_lands_on_the_ring_around_one_of_them() {
        let director = director(vec![enemy("Grunt", Rarity::Common)]);
        let mut rng = StdRng::seed_from_u64(42);
        let anchors = [Position::new(-20.0, 0.0), Position::new(20.0, 5.0)];

        for _ in 0..200 {
            let spawn = director
                .pick_spawn_position(&anchors, &mut rng)
                .expect("expected a position");
            let nearest_ok = anchors.iter().any(|a| {
                let d = a.distance(spawn);
                (8.0 - 1e-3..=12.0 + 1e-3).contains(&d)
            });
            assert!(nearest_ok, "spawn {spawn:?} not on any anchor ring");
        }
    }

    #[test]
    fn when_no_anchor_exists_then_position_is_none_and_plan_uses_origin() {
        let director = director(vec![enemy("Grunt", Rarity::Common)]);
        let mut rng = StdRng::seed_from_u64(3);

        assert!(director.pick_spawn_position(&[], &mut rng).is_none());
        let plan = director.plan(&[], &mut rng).expect("expected a plan");
        assert_eq!(plan.position, Position::ORIGIN);
    }
}
