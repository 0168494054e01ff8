//! Deterministic pseudorandom sampling
//!
//! Every draw is a pure function of `(scenario_id, year, stream, employee_id)`.
//! No mutable generator state is threaded anywhere; re-running the same
//! scenario always produces the same draws.

use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

/// Named draw streams. Each stream is independent: drawing from `HireMonth`
/// for an employee never perturbs their `TerminationSelection` draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    TerminationSelection,
    TerminationDate,
    NewHireTerminationSelection,
    NewHireTerminationDate,
    HireDate,
    HireDepartment,
    HireJobLevel,
    HireCompensation,
    PromotionDraw,
    PromotionJitter,
    PromotionEffectiveDate,
    RaiseMonth,
    RaiseDay,
    EligibilityWaiver,
    EnrollmentSelection,
    EnrollmentRate,
    OptOut,
    AutoEscalation,
    HceSampling,
}

impl Stream {
    fn tag(&self) -> &'static str {
        match self {
            Stream::TerminationSelection => "termination_selection",
            Stream::TerminationDate => "term_date",
            Stream::NewHireTerminationSelection => "nh_term_selection",
            Stream::NewHireTerminationDate => "nh_term_date",
            Stream::HireDate => "hire_date",
            Stream::HireDepartment => "hire_department",
            Stream::HireJobLevel => "hire_job_level",
            Stream::HireCompensation => "hire_compensation",
            Stream::PromotionDraw => "promotion",
            Stream::PromotionJitter => "promotion_jitter",
            Stream::PromotionEffectiveDate => "promotion_effective_date",
            Stream::RaiseMonth => "raise_month",
            Stream::RaiseDay => "raise_day",
            Stream::EligibilityWaiver => "eligibility_waiver",
            Stream::EnrollmentSelection => "enrollment_selection",
            Stream::EnrollmentRate => "enrollment_rate",
            Stream::OptOut => "opt_out",
            Stream::AutoEscalation => "auto_escalation",
            Stream::HceSampling => "hce_sampling",
        }
    }
}

/// Fixed fraction of a `u64`'s mantissa-worth of bits used to build the
/// `[0,1)` draw: `53` matches an `f64` mantissa so every representable
/// fraction is reachable and no float ever rounds to exactly `1.0`.
const MANTISSA_BITS: u32 = 53;

/// Draw a uniform value in `[0, 1)` for the given coordinates.
///
/// Deterministic and stateless: same inputs always produce the same output,
/// in any process, on any machine, in any order.
pub fn u(scenario_id: &str, year: i32, stream: Stream, employee_id: &str) -> f64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    scenario_id.hash(&mut hasher);
    0u8.hash(&mut hasher); // field separator
    year.hash(&mut hasher);
    0u8.hash(&mut hasher);
    stream.tag().hash(&mut hasher);
    0u8.hash(&mut hasher);
    employee_id.hash(&mut hasher);

    let bits = hasher.finish() >> (64 - MANTISSA_BITS);
    bits as f64 / (1u64 << MANTISSA_BITS) as f64
}
