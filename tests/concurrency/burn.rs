use std::sync::Arc;

use pasteguard::{
    BurnCounter, CreatePaste, GuardConfig, GuardError, ManualClock, PasteService, PasteStore,
    ViewOutcome,
};

use crate::common::{burn_paste, race, Backend, THREADS};

fn exactly_n_views_granted(backend: Backend, views: u32) {
    backend
        .handle(0)
        .insert_paste(&burn_paste("hot", views))
        .unwrap();

    let backend = Arc::new(backend);
    let b = backend.clone();
    let outcomes = race(THREADS, move |i| {
        BurnCounter::new(b.handle(i)).consume_view("hot").unwrap()
    });

    let granted: Vec<u32> = outcomes
        .iter()
        .filter_map(|o| match o {
            ViewOutcome::Revealed { remaining } => Some(*remaining),
            _ => None,
        })
        .collect();
    assert_eq!(granted.len(), views as usize);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == ViewOutcome::Destroyed)
            .count(),
        THREADS - views as usize
    );

    // Each remaining count was handed out exactly once.
    let mut sorted = granted.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..views).collect::<Vec<_>>());

    let stored = backend.handle(0).get_paste("hot").unwrap().unwrap();
    assert_eq!(stored.remaining_views, Some(0));
}

#[test]
fn memory_grants_exactly_n_views() {
    exactly_n_views_granted(Backend::memory(), 3);
}

#[test]
fn memory_single_view_race() {
    exactly_n_views_granted(Backend::memory(), 1);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_grants_exactly_n_views_across_connections() {
    exactly_n_views_granted(Backend::sqlite(), 3);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_max_views_race() {
    exactly_n_views_granted(Backend::sqlite(), 10);
}

/// Several service instances (one per connection) racing to read one
/// burn-after-read paste.
fn service_views_race(backend: Backend) {
    let clock = Arc::new(ManualClock::default());
    let config = GuardConfig::new("2a".repeat(32), "k".repeat(32));
    let services: Vec<Arc<PasteService>> = (0..backend.handles())
        .map(|i| {
            Arc::new(PasteService::new(&config, backend.handle(i), clock.clone()).unwrap())
        })
        .collect();

    let created = services[0]
        .create(
            "creator",
            CreatePaste {
                content: "read me twice".into(),
                burn_after_read: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

    let id = created.id.clone();
    let results = race(THREADS, move |i| services[i % services.len()].view(&id));

    let mut revealed = 0;
    for result in &results {
        match result {
            Ok(read) => {
                assert_eq!(read.content, "read me twice");
                revealed += 1;
            }
            Err(GuardError::Destroyed) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(revealed, 2);
}

#[test]
fn memory_service_reveals_exactly_n_times() {
    service_views_race(Backend::memory());
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_service_reveals_exactly_n_times() {
    service_views_race(Backend::sqlite());
}
