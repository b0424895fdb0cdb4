//! Business constants with compliance weight. Values are fixed; change them only with sign-off.

/// SLA milestone offsets from entity creation, in days.
pub const SLA_MILESTONE_DAYS: [i64; 4] = [3, 7, 10, 14];

/// Inactivity window after which an active seller is marked dormant.
pub const DORMANCY_DAYS: i64 = 90;

/// Cooling period imposed on a rejected seller.
pub const COOLING_PERIOD_MONTHS: u32 = 6;

pub const KYC_VALIDITY_MONTHS: u32 = 12;
pub const KYC_EXPIRY_WARNING_DAYS: i64 = 30;

/// Recourse against the seller triggers once a repayment is overdue by more than this.
pub const RECOURSE_THRESHOLD_DAYS: i64 = 7;
pub const CRITICAL_OVERDUE_DAYS: i64 = 30;
pub const REPAYMENT_REMINDER_DAYS: i64 = 3;

/// ₹1 crore. Deals above this need founder sign-off before funding.
pub const HIGH_VALUE_DEAL_THRESHOLD: f64 = 10_000_000.0;

/// Hours an approval level may wait before the escalation sweep acts on it.
pub const APPROVAL_STALE_HOURS: i64 = 48;

pub const RISK_LOW_MIN_SCORE: u8 = 80;
pub const RISK_MEDIUM_MIN_SCORE: u8 = 50;
