//! Risky-choice design: 45 risky/safe pairings over mixed, gain-only and
//! loss-only gambles.

use behex_core::combinatorics::cross_product;
use behex_core::random::{flip, shuffle};
use rand::RngCore;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GambleKind {
    Mixed,
    Gain,
    Loss,
}

impl GambleKind {
    pub fn name(&self) -> &'static str {
        match self {
            GambleKind::Mixed => "mixed",
            GambleKind::Gain => "gain",
            GambleKind::Loss => "loss",
        }
    }
}

/// A 50/50 gamble between `gain` and `loss` against a sure `safe` amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GambleDesign {
    pub gain: i64,
    pub loss: i64,
    pub safe: i64,
    pub kind: GambleKind,
    /// Expected value of the risky option minus the safe one.
    pub ev: f64,
}

pub fn build_mixed() -> Vec<GambleDesign> {
    cross_product(&[4i64, 5, 6], &[-1, -3, -5, -7, -9])
        .into_iter()
        .map(|(gain, loss)| GambleDesign {
            gain,
            loss,
            safe: 0,
            kind: GambleKind::Mixed,
            ev: 0.5 * (gain + loss) as f64,
        })
        .collect()
}

pub fn build_gains() -> Vec<GambleDesign> {
    cross_product(&[1i64, 2, 3], &[2, 3, 4, 5, 6])
        .into_iter()
        .map(|(safe, gain)| GambleDesign {
            gain,
            loss: 0,
            safe,
            kind: GambleKind::Gain,
            ev: 0.5 * gain as f64 - safe as f64,
        })
        .collect()
}

pub fn build_losses() -> Vec<GambleDesign> {
    cross_product(&[-1i64, -2, -3], &[-2, -3, -4, -5, -6])
        .into_iter()
        .map(|(safe, loss)| GambleDesign {
            gain: 0,
            loss,
            safe,
            kind: GambleKind::Loss,
            ev: 0.5 * loss as f64 - safe as f64,
        })
        .collect()
}

pub fn build_design(rng: &mut dyn RngCore) -> Vec<GambleDesign> {
    let mut all = build_mixed();
    all.extend(build_gains());
    all.extend(build_losses());
    shuffle(rng, all)
}

/// Amount received for a choice. The risky option pays its gain with
/// probability `p_gain`, else its loss.
pub fn resolve_choice(design: &GambleDesign, chose_risky: bool, p_gain: f64, rng: &mut dyn RngCore) -> i64 {
    if !chose_risky {
        return design.safe;
    }
    if flip(rng, p_gain) == 1 {
        design.gain
    } else {
        design.loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn forty_five_cells() {
        let mut rng = StdRng::seed_from_u64(45);
        let d = build_design(&mut rng);
        assert_eq!(d.len(), 45);
        for kind in [GambleKind::Mixed, GambleKind::Gain, GambleKind::Loss] {
            assert_eq!(d.iter().filter(|g| g.kind == kind).count(), 15);
        }
    }

    #[test]
    fn expected_values() {
        let m = build_mixed();
        assert_eq!(m[0], GambleDesign { gain: 4, loss: -1, safe: 0, kind: GambleKind::Mixed, ev: 1.5 });
        let g = build_gains();
        assert_eq!((g[0].safe, g[0].gain, g[0].ev), (1, 2, 0.0));
        let l = build_losses();
        assert_eq!((l[14].safe, l[14].loss, l[14].ev), (-3, -6, 0.0));
    }

    #[test]
    fn safe_is_deterministic_risky_is_one_of_two() {
        let mut rng = StdRng::seed_from_u64(2);
        let d = build_mixed()[7];
        for _ in 0..100 {
            assert_eq!(resolve_choice(&d, false, 0.5, &mut rng), d.safe);
            let r = resolve_choice(&d, true, 0.5, &mut rng);
            assert!(r == d.gain || r == d.loss);
        }
        assert_eq!(resolve_choice(&d, true, 1.0, &mut rng), d.gain);
        assert_eq!(resolve_choice(&d, true, 0.0, &mut rng), d.loss);
    }
}
