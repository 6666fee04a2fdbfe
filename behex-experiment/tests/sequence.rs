use behex_core::ExperimentError;
use behex_experiment::sequence::{count_switches, repeat_positions, repetitions_for, SequenceGenerator};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn eight_switches_alternate_every_digit() {
    let generator = SequenceGenerator::new(10).unwrap();
    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..50 {
        let seq = generator.generate(8, &mut rng).unwrap();
        assert_eq!(seq.len(), 10);
        assert_eq!(count_switches(&seq), 8);
        assert!(repeat_positions(&seq).is_empty());
    }
}

#[test]
fn switch_counts_outside_one_to_eight_are_rejected() {
    let generator = SequenceGenerator::new(10).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    for n in [-1, 0, 9, 100] {
        match generator.generate(n, &mut rng) {
            Err(ExperimentError::SwitchesOutOfRange { requested, min, max }) => {
                assert_eq!((requested, min, max), (n, 1, 8));
            }
            other => panic!("expected SwitchesOutOfRange for {n}, got {other:?}"),
        }
    }
}

proptest! {
    #[test]
    fn generated_sequences_match_their_design(n in 1i64..=8, length in 9usize..=10, seed in any::<u64>()) {
        let generator = SequenceGenerator::new(length).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let seq = generator.generate(n, &mut rng).unwrap();
        prop_assert_eq!(seq.len(), length);
        prop_assert!(seq.iter().all(|d| (1..=9).contains(d)));
        prop_assert_eq!(count_switches(&seq) as i64, n);
        let repeats = repeat_positions(&seq);
        prop_assert_eq!(repeats.len(), repetitions_for(n as u32).unwrap());
        prop_assert!(!repeats.contains(&1));
        prop_assert!(repeats.windows(2).all(|w| w[1] - w[0] > 1));
    }
}
