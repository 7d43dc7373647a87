use rand::{Rng, seq::SliceRandom};

use crate::{Exercise, ExerciseID};

/// Pick the next exercise uniformly at random from the active ones.
///
/// The exercise `excluding` is skipped unless it is the only active one. If
/// the selected exercise alternates sides, its side is switched.
pub fn select_next<'a, R: Rng + ?Sized>(
    pool: &'a mut [Exercise],
    excluding: Option<ExerciseID>,
    rng: &mut R,
) -> Option<&'a mut Exercise> {
    let active = pool
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_active)
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    let candidates = active
        .iter()
        .copied()
        .filter(|idx| Some(pool[*idx].id) != excluding)
        .collect::<Vec<_>>();

    let idx = if candidates.is_empty() {
        *active.choose(rng)?
    } else {
        *candidates.choose(rng)?
    };

    let exercise = &mut pool[idx];
    exercise.toggle_side();
    Some(exercise)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use rand::{SeedableRng, rngs::StdRng};
    use rstest::rstest;

    use super::*;
    use crate::{ExerciseDraft, Side, Target, Title, Units};

    fn exercise(id: u128, is_active: bool, alternates_sides: bool) -> Exercise {
        let mut exercise = ExerciseDraft {
            title: Title::new(&format!("Exercise {id}")).unwrap(),
            units: Units::Reps,
            initial_target: Target::new(10.0).unwrap(),
            initial_increment: 0.0,
            initial_momentum: 0.0,
            alternates_sides,
            notes: String::new(),
        }
        .into_exercise(id.into());
        exercise.is_active = is_active;
        exercise
    }

    #[rstest]
    #[case::exclusion(vec![exercise(1, true, false), exercise(2, true, false)], Some(1), Some(2))]
    #[case::fallback(vec![exercise(1, true, false)], Some(1), Some(1))]
    #[case::inactive_skipped(vec![exercise(1, false, false), exercise(2, true, false)], None, Some(2))]
    #[case::fallback_ignores_inactive(
        vec![exercise(1, true, false), exercise(2, false, false)],
        Some(1),
        Some(1)
    )]
    #[case::empty_pool(vec![], None, None)]
    #[case::no_active(vec![exercise(1, false, false), exercise(2, false, false)], Some(1), None)]
    fn test_select_next(
        #[case] mut pool: Vec<Exercise>,
        #[case] excluding: Option<u128>,
        #[case] expected: Option<u128>,
    ) {
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..20 {
            assert_eq!(
                select_next(&mut pool, excluding.map(ExerciseID::from), &mut rng).map(|e| e.id),
                expected.map(ExerciseID::from)
            );
        }
    }

    #[test]
    fn test_select_next_covers_all_candidates() {
        let mut pool = (1..=4).map(|id| exercise(id, true, false)).collect::<Vec<_>>();
        let mut rng = StdRng::seed_from_u64(42);
        let mut selected = HashSet::new();

        for _ in 0..200 {
            if let Some(e) = select_next(&mut pool, Some(1.into()), &mut rng) {
                selected.insert(e.id);
            }
        }

        assert_eq!(selected, HashSet::from([2.into(), 3.into(), 4.into()]));
    }

    #[test]
    fn test_select_next_alternates_sides() {
        let mut pool = vec![exercise(1, true, true)];
        let mut rng = StdRng::seed_from_u64(0);

        let sides = (0..4)
            .map(|_| {
                select_next(&mut pool, None, &mut rng)
                    .map(|e| e.current_side)
                    .unwrap()
            })
            .collect::<Vec<_>>();

        assert_eq!(sides, vec![Side::Right, Side::Left, Side::Right, Side::Left]);
    }
}
