//! Property-based tests using proptest
//!
//! Key canonicalization, status mapping and the cache rename rules checked
//! against randomized inputs.

use finsync::api::http::ApiResponse;
use finsync::api::normalize::decode_error;
use finsync::cache::{aggregate_key, Cache, CacheKey, CacheSynchronizer, Mutation};
use finsync::resource::{aggregates_keyed_by, canonicalize_key};
use finsync::{ErrorKind, Generation, ResourceKind};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_generation() -> impl Strategy<Value = Generation> {
    prop_oneof![Just(Generation::Legacy), Just(Generation::Modern)]
}

/// Account names as users type them
fn arb_account_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_-]{0,12}"
}

mod canonical_key {
    use super::*;

    proptest! {
        #[test]
        fn output_uses_url_safe_charset(name in ".{0,40}") {
            let key = canonicalize_key(&name);
            prop_assert!(key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
        }

        #[test]
        fn canonicalization_is_idempotent(name in ".{0,40}") {
            let once = canonicalize_key(&name);
            prop_assert_eq!(canonicalize_key(&once), once);
        }

        #[test]
        fn safe_lowercase_names_are_unchanged(name in "[a-z0-9_-]{1,30}") {
            prop_assert_eq!(canonicalize_key(&name), name);
        }
    }
}

mod status_mapping {
    use super::*;

    fn expected_kind(status: u16) -> ErrorKind {
        match status {
            400 => ErrorKind::Validation,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Unknown,
        }
    }

    proptest! {
        #[test]
        fn empty_error_body_uses_fallback(status in 300u16..600, generation in arb_generation()) {
            let err = decode_error(&ApiResponse::new(status, ""), generation);
            prop_assert_eq!(err.kind, expected_kind(status));
            prop_assert_eq!(err.status, status);
            prop_assert_eq!(err.message, format!("HTTP error! Status: {}", status));
        }

        #[test]
        fn message_survives_either_generation(
            status in prop_oneof![Just(400u16), Just(404), Just(409), Just(500)],
            message in "[a-zA-Z][a-zA-Z ]{0,39}",
            generation in arb_generation(),
        ) {
            let body = match generation {
                Generation::Legacy => json!({"response": message}),
                Generation::Modern => json!({"error": message}),
            };
            let err = decode_error(&ApiResponse::new(status, body.to_string()), generation);
            prop_assert_eq!(err.message, message.trim());
        }
    }
}

mod rename {
    use super::*;

    fn account(name: &str) -> Value {
        json!({"accountNameOwner": name, "accountType": "credit"})
    }

    fn owned_by(items: &[Value], name: &str) -> usize {
        items
            .iter()
            .filter(|item| item["accountNameOwner"].as_str() == Some(name))
            .count()
    }

    proptest! {
        #[test]
        fn renamed_account_is_addressable_only_by_new_name(
            old in arb_account_name(),
            new in arb_account_name(),
            generation in arb_generation(),
        ) {
            let other = "zz_other_account";
            prop_assume!(old != new && old != other && new != other);
            prop_assume!(canonicalize_key(&old) != canonicalize_key(&new));

            let (totals_kind, totals_def) = aggregates_keyed_by(ResourceKind::Account)[0];
            let totals_old = aggregate_key(totals_kind, totals_def, &old, generation);
            let totals_new = aggregate_key(totals_kind, totals_def, &new, generation);
            let txns_old = CacheKey::scoped(ResourceKind::Transaction, ResourceKind::Account, old.as_str());
            let txns_new = CacheKey::scoped(ResourceKind::Transaction, ResourceKind::Account, new.as_str());

            let cache = Cache::new();
            cache.store(CacheKey::list(ResourceKind::Account), json!([account(&old), account(other)]));
            cache.store(CacheKey::detail(ResourceKind::Account, old.as_str()), account(&old));
            cache.store(totals_old.clone(), json!({"totals": 42.0}));
            cache.store(
                txns_old.clone(),
                json!([{"guid": "t1", "accountNameOwner": old, "amount": 1.0}]),
            );

            CacheSynchronizer::new(&cache, generation)
                .sync(
                    ResourceKind::Account,
                    &Mutation::Update { before: account(&old), after: account(&new) },
                )
                .unwrap();

            let accounts = cache.items(&CacheKey::list(ResourceKind::Account)).unwrap();
            prop_assert_eq!(owned_by(&accounts, &old), 0);
            prop_assert_eq!(owned_by(&accounts, &new), 1);
            prop_assert_eq!(owned_by(&accounts, other), 1);

            prop_assert!(!cache.contains(&CacheKey::detail(ResourceKind::Account, old.as_str())));
            prop_assert!(cache.contains(&CacheKey::detail(ResourceKind::Account, new.as_str())));

            prop_assert!(!cache.contains(&totals_old));
            prop_assert_eq!(cache.get(&totals_new).unwrap().value, json!({"totals": 42.0}));

            prop_assert!(!cache.contains(&txns_old));
            let txns = cache.items(&txns_new).unwrap();
            prop_assert_eq!(owned_by(&txns, &new), txns.len());
        }

        #[test]
        fn repeated_creates_never_duplicate(names in prop::collection::vec("[a-e]{1,2}", 1..30)) {
            let cache = Cache::new();
            cache.store(CacheKey::list(ResourceKind::Category), json!([]));
            let sync = CacheSynchronizer::new(&cache, Generation::Modern);

            for name in &names {
                sync.sync(ResourceKind::Category, &Mutation::Create { after: json!({"categoryName": name}) })
                    .unwrap();
            }

            let items = cache.items(&CacheKey::list(ResourceKind::Category)).unwrap();
            let mut distinct = names.clone();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(items.len(), distinct.len());
        }
    }
}
