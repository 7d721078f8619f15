//! Property-based invariants over the scheduling pipeline.

use chrono::NaiveDate;
use proptest::prelude::*;
use rstest::rstest;

use rota_core::calendar::{add_weeks, monday_of};
use rota_core::registry::is_experienced;
use rota_core::scheduler::{
    coefficient_of_variation, gini, initial_state, select_team, update_state, Candidate,
    ConfidenceLevel, ScheduleRng, SchedulerConfig, SelectionRequest,
};
use rota_core::{generate, FixedClock, Person, ScheduleRequest};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn cohort(n: usize, since: NaiveDate) -> Vec<Person> {
    (0..n)
        .map(|i| Person::new(format!("p{}", i), format!("Person {}", i), since))
        .collect()
}

/// Main count for one person in the weeks before `week_index`, mirroring
/// what the selector saw at selection time (no prior schedules involved).
fn main_count_before(schedule: &rota_core::Schedule, week_index: usize, id: &str) -> u32 {
    schedule
        .assignments
        .iter()
        .take(week_index)
        .filter(|a| a.main_ids.iter().any(|m| m == id))
        .count() as u32
}

proptest! {
    #[test]
    fn generated_schedules_hold_structural_invariants(
        weeks in 1u32..=20,
        pool in 2usize..=9,
        tenure_days in 0i64..400,
        seed in any::<u64>(),
    ) {
        let start = date(2025, 6, 2);
        let people = cohort(pool, start - chrono::Duration::days(tenure_days));
        let request = ScheduleRequest::new(people.clone(), start, weeks, seed);
        let config = SchedulerConfig::default();
        let outcome = generate(&request, &FixedClock(start)).unwrap();

        prop_assert_eq!(outcome.schedule.assignments.len(), weeks as usize);

        for (i, assignment) in outcome.schedule.assignments.iter().enumerate() {
            prop_assert_eq!(assignment.week_start, add_weeks(start, i as i64));
            prop_assert!(assignment.main_ids.len() <= config.team_size);
            prop_assert!(assignment.substitute_ids.len() <= config.sub_size);
            for id in &assignment.main_ids {
                prop_assert!(!assignment.substitute_ids.contains(id));
            }

            // Mentor coverage mirrors the experience of the main team.
            let covered = assignment.main_ids.iter().any(|id| {
                let person = people.iter().find(|p| &p.id == id).unwrap();
                is_experienced(
                    person,
                    assignment.week_start,
                    main_count_before(&outcome.schedule, i, id),
                    &config,
                )
            });
            prop_assert_eq!(assignment.has_mentor, covered);
        }
    }

    #[test]
    fn generation_is_deterministic(
        weeks in 1u32..=12,
        pool in 2usize..=6,
        seed in any::<u64>(),
    ) {
        let start = date(2025, 6, 2);
        let people = cohort(pool, date(2024, 6, 3));
        let request = ScheduleRequest::new(people, start, weeks, seed);

        let first = generate(&request, &FixedClock(start)).unwrap();
        let second = generate(&request, &FixedClock(start)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn gini_stays_in_unit_interval_and_ignores_scale(
        rates in proptest::collection::vec(0.0f64..1.0, 1..20),
        scale in 0.001f64..1000.0,
    ) {
        let value = gini(&rates);
        prop_assert!((0.0..=1.0).contains(&value));

        let scaled: Vec<f64> = rates.iter().map(|r| r * scale).collect();
        prop_assert!((gini(&scaled) - value).abs() < 1e-9);
        prop_assert!((coefficient_of_variation(&scaled) - coefficient_of_variation(&rates)).abs() < 1e-9);
    }

    #[test]
    fn equal_rates_show_no_inequality(rate in 0.0f64..1.0, n in 1usize..20) {
        let rates = vec![rate; n];
        prop_assert_eq!(gini(&rates), 0.0);
        prop_assert_eq!(coefficient_of_variation(&rates), 0.0);
    }

    #[test]
    fn posterior_variance_stays_bounded(
        assignments in proptest::collection::vec(any::<bool>(), 1..100),
        active in 1usize..12,
    ) {
        let config = SchedulerConfig::default();
        let ideal = config.ideal_rate(active);
        let mut state = initial_state(ideal, date(2025, 6, 2), &config);

        let mut week = date(2025, 6, 2);
        for assigned in assignments {
            update_state(&mut state, assigned, week, ideal, &config);
            prop_assert!(state.posterior_variance >= config.variance_floor);
            prop_assert!(state.posterior_variance <= config.variance_ceiling);
            prop_assert!(state.posterior_mean >= 0.0);
            week = add_weeks(week, 1);
        }
    }

    #[test]
    fn vanishing_temperature_recovers_priority_order(
        raw in proptest::collection::vec(0.01f64..100.0, 3..10),
        seed in any::<u64>(),
        k in 1usize..4,
    ) {
        let candidates: Vec<Candidate> = raw
            .iter()
            .enumerate()
            .map(|(i, priority)| Candidate {
                id: format!("c{}", i),
                // Offset by index to keep priorities strictly distinct.
                priority: priority + i as f64 * 1e-6,
                experienced: false,
                accumulated: 0,
            })
            .collect();
        let k = k.min(candidates.len());

        let mut expected: Vec<&Candidate> = candidates.iter().collect();
        expected.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap());
        let expected_ids: Vec<String> =
            expected.iter().take(k).map(|c| c.id.clone()).collect();

        let mut rng = ScheduleRng::seed_from(seed);
        let selection = select_team(
            &candidates,
            &SelectionRequest {
                team_size: k,
                require_mentor: false,
                avoid_consecutive: false,
                previous_main_ids: &[],
                temperature: 1e-12,
            },
            &mut rng,
        );

        prop_assert_eq!(selection.ids, expected_ids);
    }
}

#[rstest]
#[case(ConfidenceLevel::P68, ConfidenceLevel::P95)]
#[case(ConfidenceLevel::P95, ConfidenceLevel::P99)]
fn wider_levels_give_wider_intervals(
    #[case] narrow: ConfidenceLevel,
    #[case] wide: ConfidenceLevel,
) {
    let config = SchedulerConfig::default();
    let state = initial_state(0.05, date(2025, 6, 2), &config);

    let narrow_interval = rota_core::scheduler::confidence_interval(&state, narrow);
    let wide_interval = rota_core::scheduler::confidence_interval(&state, wide);
    assert!(wide_interval.1 > narrow_interval.1);
    assert!(wide_interval.0 <= narrow_interval.0);
}

#[rstest]
#[case(date(2025, 6, 2), date(2025, 6, 2))] // Monday fixed point
#[case(date(2025, 6, 5), date(2025, 6, 2))] // Thursday
#[case(date(2025, 6, 8), date(2025, 6, 2))] // Sunday folds backwards
fn monday_normalization(#[case] input: NaiveDate, #[case] expected: NaiveDate) {
    assert_eq!(monday_of(input), expected);
}
