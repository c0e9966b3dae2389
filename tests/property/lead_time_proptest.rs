//! Property-based tests for renewal scheduling

use caresync::client::auth::{compute_fire_delay, Credential};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn test_fire_delay_is_remaining_minus_lead(remaining in -3_600i64..86_400, lead in 0u64..7_200) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let expires_at = now + ChronoDuration::seconds(remaining);

        let delay = compute_fire_delay(expires_at, now, Duration::from_secs(lead));

        let expected = (remaining - lead as i64).max(0) as u64;
        prop_assert_eq!(delay, Duration::from_secs(expected));
    }

    #[test]
    fn test_due_exactly_when_delay_is_zero(remaining in -600i64..3_600, lead in 0u64..1_800) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let credential = Credential {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: now + ChronoDuration::seconds(remaining),
        };
        let lead = Duration::from_secs(lead);

        prop_assert_eq!(
            credential.is_within_renewal_window(now, lead),
            remaining <= lead.as_secs() as i64
        );
    }

    #[test]
    fn test_later_expiry_never_fires_earlier(
        remaining in 0i64..86_400,
        extra in 0i64..86_400,
        lead in 0u64..7_200,
    ) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let lead = Duration::from_secs(lead);
        let sooner = compute_fire_delay(now + ChronoDuration::seconds(remaining), now, lead);
        let later = compute_fire_delay(now + ChronoDuration::seconds(remaining + extra), now, lead);
        prop_assert!(later >= sooner);
    }
}
