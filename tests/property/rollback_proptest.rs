//! Property-based tests for optimistic mutation rollback

use caresync::client::sync::MutationCoordinator;
use caresync::shared::error::SyncError;
use caresync::shared::WriteAck;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Sequential applies: every failure restores the value held before that call
    #[test]
    fn test_failed_apply_restores_prior_value(
        initial in 0u64..10_000,
        steps in prop::collection::vec((0u64..10_000, any::<bool>()), 1..20),
    ) {
        let final_value = runtime().block_on(async move {
            let coordinator = MutationCoordinator::new("price", initial);
            let mut expected = initial;

            for (value, succeeds) in steps {
                let before = coordinator.value();
                let result = coordinator
                    .apply(value, |_| async move {
                        if succeeds {
                            Ok(WriteAck::default())
                        } else {
                            Err(SyncError::transport("connection reset"))
                        }
                    })
                    .await;

                if succeeds {
                    assert!(result.is_ok());
                    expected = value;
                } else {
                    assert_eq!(coordinator.value(), before);
                }
                assert!(!coordinator.is_pending());
            }
            (coordinator.value(), expected)
        });

        prop_assert_eq!(final_value.0, final_value.1);
    }
}
