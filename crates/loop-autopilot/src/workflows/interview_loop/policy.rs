use serde::{Deserialize, Serialize};

const DEFAULT_SLOT_GRANULARITY_MINUTES: u32 = 15;

/// Solver knobs. Every field has a default so partial payloads stay valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingPolicy {
    pub slot_granularity_minutes: u32,
    pub enforce_business_hours: bool,
    pub max_days_span: u32,
    pub solver_timeout_ms: u64,
    pub max_search_iterations: u64,
    pub max_solutions_to_return: usize,
    pub prefer_single_day: bool,
    /// Reject placements that overlap a non-cancelled existing booking.
    pub reject_existing_booking_conflicts: bool,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: DEFAULT_SLOT_GRANULARITY_MINUTES,
            enforce_business_hours: true,
            max_days_span: 2,
            solver_timeout_ms: 5_000,
            max_search_iterations: 50_000,
            max_solutions_to_return: 5,
            prefer_single_day: true,
            reject_existing_booking_conflicts: false,
        }
    }
}

impl SchedulingPolicy {
    /// Applies request overrides on top of this policy.
    pub fn merged(&self, overrides: Option<&SchedulingPolicyOverrides>) -> Self {
        let Some(overrides) = overrides else {
            return self.clone().sanitized();
        };

        Self {
            slot_granularity_minutes: overrides
                .slot_granularity_minutes
                .unwrap_or(self.slot_granularity_minutes),
            enforce_business_hours: overrides
                .enforce_business_hours
                .unwrap_or(self.enforce_business_hours),
            max_days_span: overrides.max_days_span.unwrap_or(self.max_days_span),
            solver_timeout_ms: overrides
                .solver_timeout_ms
                .unwrap_or(self.solver_timeout_ms),
            max_search_iterations: overrides
                .max_search_iterations
                .unwrap_or(self.max_search_iterations),
            max_solutions_to_return: overrides
                .max_solutions_to_return
                .unwrap_or(self.max_solutions_to_return),
            prefer_single_day: overrides.prefer_single_day.unwrap_or(self.prefer_single_day),
            reject_existing_booking_conflicts: overrides
                .reject_existing_booking_conflicts
                .unwrap_or(self.reject_existing_booking_conflicts),
        }
        .sanitized()
    }

    /// A zero granularity would never advance the slot cursor.
    fn sanitized(mut self) -> Self {
        if self.slot_granularity_minutes == 0 {
            self.slot_granularity_minutes = DEFAULT_SLOT_GRANULARITY_MINUTES;
        }
        self
    }
}

/// Partial policy carried on a request; unset fields fall back to the configured policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingPolicyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_granularity_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_business_hours: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_days_span: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_search_iterations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_solutions_to_return: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_single_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_existing_booking_conflicts: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_supplied_fields() {
        let base = SchedulingPolicy::default();
        let overrides = SchedulingPolicyOverrides {
            max_days_span: Some(1),
            prefer_single_day: Some(false),
            ..SchedulingPolicyOverrides::default()
        };

        let merged = base.merged(Some(&overrides));

        assert_eq!(merged.max_days_span, 1);
        assert!(!merged.prefer_single_day);
        assert_eq!(merged.slot_granularity_minutes, base.slot_granularity_minutes);
        assert_eq!(merged.max_search_iterations, base.max_search_iterations);
    }

    #[test]
    fn zero_granularity_falls_back_to_default() {
        let overrides = SchedulingPolicyOverrides {
            slot_granularity_minutes: Some(0),
            ..SchedulingPolicyOverrides::default()
        };

        let merged = SchedulingPolicy::default().merged(Some(&overrides));
        assert_eq!(merged.slot_granularity_minutes, 15);
    }

    #[test]
    fn partial_policy_payload_deserializes() {
        let policy: SchedulingPolicy =
            serde_json::from_str(r#"{ "max_solutions_to_return": 2 }"#).expect("parses");

        assert_eq!(policy.max_solutions_to_return, 2);
        assert!(policy.enforce_business_hours);
        assert!(!policy.reject_existing_booking_conflicts);
    }
}
