//! Property-based tests and fuzz-style decoding tests using proptest.
//!
//! Property tests verify option codec agreement, storage timestamp rules
//! under arbitrary save sequences, and snapshot completeness for arbitrary
//! page sizes. Fuzz tests verify that option decoding and record
//! deserialization handle arbitrary input without panicking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use periodic_tasks::provider::{
    Pagination, PeriodicTaskConfigProvider, ProviderConfig, StorageConfigProvider,
};
use periodic_tasks::store::memory::InMemoryTaskStorage;
use periodic_tasks::store::{Filter, PeriodicTaskStorage};
use periodic_tasks::types::parse::{format_duration, parse_duration};
use periodic_tasks::{OptionType, PeriodicTask, SchedulerOption, TaskOption};

// ─── Arbitrary Strategies ───────────────────────────────────────────────────

fn arb_option_type() -> impl Strategy<Value = OptionType> {
    prop_oneof![
        Just(OptionType::Queue),
        Just(OptionType::Timeout),
        Just(OptionType::Deadline),
        Just(OptionType::Unique),
        Just(OptionType::ProcessAt),
        Just(OptionType::ProcessIn),
        Just(OptionType::TaskId),
        Just(OptionType::Retention),
        Just(OptionType::Group),
        Just(OptionType::MaxRetry),
        "[a-z]{1,12}".prop_map(|s| OptionType::from(s.as_str())),
    ]
}

fn arb_pagination() -> impl Strategy<Value = Pagination> {
    prop_oneof![Just(Pagination::Offset), Just(Pagination::Keyset)]
}

/// (id index, enabled flag) pairs; ids repeat so saves update as well as insert.
fn arb_save_sequence() -> impl Strategy<Value = Vec<(u8, Option<bool>)>> {
    prop::collection::vec((0u8..8, proptest::option::of(any::<bool>())), 1..40)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

// ─── Property Tests: Option Codec ───────────────────────────────────────────

proptest! {
    /// Formatted durations parse back to the same value.
    #[test]
    fn formatted_durations_parse_back(nanos in 0u64..=10_000_000_000_000u64) {
        let duration = Duration::from_nanos(nanos);
        prop_assert_eq!(parse_duration(&format_duration(duration)), Ok(duration));
    }

    /// A bare integer is a nanosecond count.
    #[test]
    fn bare_integers_are_nanoseconds(nanos in 0u64..=u64::from(u32::MAX)) {
        prop_assert_eq!(parse_duration(&nanos.to_string()), Ok(Duration::from_nanos(nanos)));
    }

    /// `unique` and `uniqueness-window` decode identically.
    #[test]
    fn uniqueness_aliases_agree(secs in 0u64..1_000_000) {
        let value = format!("{secs}s");
        let canonical = TaskOption::new("unique", value.clone()).decode();
        let alias = TaskOption::new("uniqueness-window", value).decode();
        prop_assert_eq!(canonical.clone(), alias);
        prop_assert_eq!(canonical, Ok(SchedulerOption::Unique(Duration::from_secs(secs))));
    }

    /// Any retry count fitting u32 decodes, whatever the option type's
    /// spelling, unless the type is a known non-retry option.
    #[test]
    fn unknown_types_decode_as_max_retry(kind in "[a-z]{3,10}", count in any::<u32>()) {
        let option = TaskOption::new(kind.as_str(), count.to_string());
        if matches!(option.kind, OptionType::Other(_) | OptionType::MaxRetry) {
            prop_assert_eq!(option.decode(), Ok(SchedulerOption::MaxRetry(count)));
        }
    }

    /// Decoding arbitrary values never panics and a success has the same kind.
    #[test]
    fn fuzz_option_decode(kind in arb_option_type(), value in "\\PC{0,40}") {
        let option = TaskOption::new(kind.clone(), value);
        if let Ok(decoded) = option.decode() {
            let expected = match kind {
                OptionType::Other(_) => OptionType::MaxRetry,
                other => other,
            };
            prop_assert_eq!(decoded.kind(), expected);
        }
    }

    /// Arbitrary JSON never panics the record deserializer.
    #[test]
    fn fuzz_record_deserialization(s in "\\PC{0,256}") {
        let _ = serde_json::from_str::<PeriodicTask>(&s);
    }
}

// ─── Property Tests: Storage and Snapshot Invariants ────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// For arbitrary save sequences: created_at is written once, updated_at
    /// never precedes it, and the last explicit enabled flag wins.
    #[test]
    fn save_sequences_keep_timestamp_invariants(saves in arb_save_sequence()) {
        runtime().block_on(async {
            let storage = InMemoryTaskStorage::new();
            let mut created: HashMap<String, _> = HashMap::new();
            let mut enabled: HashMap<String, Option<bool>> = HashMap::new();

            for (n, flag) in &saves {
                let id = format!("t{n}");
                let mut task = PeriodicTask::new(id.clone(), "* * * * *", "job");
                if let Some(flag) = flag {
                    task = task.with_enabled(*flag);
                }
                storage.save(&mut task).await.unwrap();

                if created.contains_key(&id) {
                    prop_assert!(task.created_at.is_none(), "re-save of {} must update", id);
                } else {
                    prop_assert!(task.created_at.is_some(), "first save of {} must insert", id);
                    created.insert(id.clone(), task.created_at);
                }
                if flag.is_some() {
                    enabled.insert(id.clone(), *flag);
                } else {
                    enabled.entry(id.clone()).or_insert(None);
                }
            }

            for (id, first_created) in &created {
                let stored = storage.find_by_id(id).await.unwrap();
                prop_assert_eq!(&stored.created_at, first_created);
                prop_assert!(stored.updated_at >= stored.created_at);
                prop_assert_eq!(stored.enabled, enabled[id]);
            }
            Ok(())
        })?;
    }

    /// Every enabled record appears in the snapshot exactly once, for any
    /// page size and either paging mode.
    #[test]
    fn snapshot_contains_each_enabled_record_once(
        flags in prop::collection::vec(proptest::option::of(any::<bool>()), 0..60),
        page_size in 1u64..25,
        pagination in arb_pagination(),
    ) {
        runtime().block_on(async {
            let storage: Arc<dyn PeriodicTaskStorage> = Arc::new(InMemoryTaskStorage::new());
            let mut expected = HashSet::new();
            for (i, flag) in flags.iter().enumerate() {
                let mut task = PeriodicTask::new(format!("t{i:03}"), format!("{i} * * * *"), "job");
                if let Some(flag) = flag {
                    task = task.with_enabled(*flag);
                }
                if *flag == Some(true) {
                    expected.insert(task.cron_expr.clone());
                }
                storage.save(&mut task).await.unwrap();
            }

            let provider = StorageConfigProvider::new(Arc::clone(&storage))
                .with_config(ProviderConfig { page_size, pagination })
                .unwrap();
            let configs = provider.get_configs().await.unwrap();

            let seen: Vec<String> = configs.into_iter().map(|c| c.cronspec).collect();
            let unique: HashSet<String> = seen.iter().cloned().collect();
            prop_assert_eq!(seen.len(), unique.len(), "duplicate snapshot entries");
            prop_assert_eq!(&unique, &expected);
            prop_assert_eq!(
                storage.count(&Filter::enabled()).await.unwrap(),
                expected.len() as u64
            );
            Ok(())
        })?;
    }
}
