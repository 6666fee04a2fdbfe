use behex_core::phase::Phase;

/// How an Effort trial ended, money-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffortPayout {
    /// Main phase, offer accepted and completed well enough.
    Paid(i64),
    /// Too many errors; the offer is lost.
    Forfeited,
    Rejected,
    /// Demo or calibration, nothing at stake.
    Unpaid,
}

impl EffortPayout {
    pub fn reward(&self) -> i64 {
        match self {
            EffortPayout::Paid(r) => *r,
            _ => 0,
        }
    }
}

pub fn payout<P: Phase>(
    phase: P,
    accepted: Option<bool>,
    n_errors: u32,
    offered: i64,
    max_errors: u32,
) -> EffortPayout {
    if !phase.pays_out() {
        return EffortPayout::Unpaid;
    }
    match accepted {
        Some(false) => EffortPayout::Rejected,
        _ if n_errors > max_errors => EffortPayout::Forfeited,
        _ => EffortPayout::Paid(offered),
    }
}
