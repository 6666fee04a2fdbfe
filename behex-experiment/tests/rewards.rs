use behex_core::random::{flip, js_round};
use behex_experiment::config::RewardBiasConfig;
use behex_experiment::reward::bandit::{draw_outcome, ProbabilityTable};
use behex_experiment::reward::clock::{compute_reward, reward_curve, ClockCondition, MAX_RT_MS};
use behex_experiment::reward::gamble::{build_design, resolve_choice};
use behex_experiment::reward::gershman::{draw_value, OptionKind};
use behex_experiment::reward::reward_bias::{settle, DeferredCounts, RewardSchedule, Settlement, Side};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn certain_gain_never_loses() {
    let table = ProbabilityTable {
        gain: vec![vec![1.0; 5]; 4],
        loss: vec![vec![0.0; 5]; 4],
    };
    let mut rng = StdRng::seed_from_u64(1);
    for trial in 0..5 {
        let o = draw_outcome(&table, 2, trial, &mut rng).unwrap();
        assert_eq!((o.is_gain, o.is_loss), (1, 0));
        assert_eq!(o.reward(), 1);
        assert_eq!(o.stimulus(), Some("gain.svg"));
    }
    assert!(draw_outcome(&table, 2, 5, &mut rng).is_err());
}

#[test]
fn missed_scheduled_reward_is_paid_later() {
    let mut owed = DeferredCounts::default();
    assert_eq!(settle(false, true, Side::Rich, &mut owed), Settlement::Deferred);
    assert_eq!(owed.get(Side::Rich), 1);
    assert_eq!(settle(true, false, Side::Rich, &mut owed), Settlement::PaidDeferred);
    assert_eq!(owed.get(Side::Rich), 0);
}

#[test]
fn schedule_rewards_configured_counts_per_side() {
    let config = RewardBiasConfig::default();
    let mut rng = StdRng::seed_from_u64(3);
    let s = RewardSchedule::build(&config, true, &mut rng).unwrap();
    assert_eq!(s.len(), config.n_trials);
    assert_eq!(s.rich.len(), config.n_rich_reward);
    assert_eq!(s.poor.len(), config.n_poor_reward);
    assert!(s.rich.is_disjoint(&s.poor));
    let right = s.target_right.iter().filter(|&&r| r).count();
    assert_eq!(right, config.n_trials / 2);
}

#[test]
fn clock_curves_stay_in_probability_range() {
    for condition in ClockCondition::ALL {
        let curve = reward_curve(condition).unwrap();
        assert_eq!(curve.len(), 50);
        assert!(curve.iter().all(|row| (0.0..=1.0).contains(&row.prob)), "{condition}");
    }
    assert!(compute_reward(MAX_RT_MS + 1, ClockCondition::Cev).is_err());
}

#[test]
fn safe_gamble_pays_the_sure_amount() {
    let mut rng = StdRng::seed_from_u64(4);
    let design = build_design(&mut rng);
    assert_eq!(design.len(), 45);
    for d in &design {
        assert_eq!(resolve_choice(d, false, 0.5, &mut rng), d.safe);
        let risky = resolve_choice(d, true, 0.5, &mut rng);
        assert!(risky == d.gain || risky == d.loss);
    }
}

#[test]
fn safe_option_pays_its_mean() {
    let mut rng = StdRng::seed_from_u64(5);
    assert_eq!(draw_value(OptionKind::Safe, 12.5, 16.0, &mut rng), js_round(12.5));
    assert_eq!(draw_value(OptionKind::Safe, -12.5, 16.0, &mut rng), -12);
}

proptest! {
    #[test]
    fn degenerate_flips_are_certain(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        prop_assert_eq!(flip(&mut rng, 0.0), 0);
        prop_assert_eq!(flip(&mut rng, 1.0), 1);
    }

    #[test]
    fn clock_probability_is_bounded(rt in 0u64..=MAX_RT_MS, idx in 0usize..4) {
        let r = compute_reward(rt, ClockCondition::ALL[idx]).unwrap();
        prop_assert!((0.0..=1.0).contains(&r.prob));
    }

    #[test]
    fn deferred_rewards_are_paid_on_later_correct_trials(steps in proptest::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 0..60)) {
        let mut owed = DeferredCounts::default();
        // Reference ledger of rewards owed per side: [rich, poor].
        let mut model = [0u32; 2];
        let mut paid = 0i64;
        let mut expected = 0i64;
        let mut scheduled_total = 0i64;
        for (correct, scheduled, rich) in steps {
            let side = if rich { Side::Rich } else { Side::Poor };
            let ix = usize::from(!rich);
            paid += settle(correct, scheduled, side, &mut owed).reward();

            scheduled_total += i64::from(scheduled);
            if correct {
                if scheduled || model[ix] > 0 {
                    expected += 1;
                }
                model[ix] = model[ix].saturating_sub(1);
            } else if scheduled {
                model[ix] += 1;
            }
            prop_assert_eq!([owed.rich, owed.poor], model);
        }
        prop_assert_eq!(paid, expected);
        // Every payment and every outstanding debt is backed by a scheduled trial.
        prop_assert!(paid + i64::from(owed.rich + owed.poor) <= scheduled_total);
    }
}
