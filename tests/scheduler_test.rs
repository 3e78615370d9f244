//! Scheduler admission, lookup, deletion and worker behaviour.

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{wait_for_terminal, wait_until, SpyHttpClient};
use fetch_scheduler::core::{FetchError, Scheduler, SchedulerError, TaskRegistry, TaskStatus};
use fetch_scheduler::infra::InMemoryRegistry;
use uuid::Uuid;

fn make_scheduler(
    capacity: usize,
    workers: usize,
    client: Arc<SpyHttpClient>,
) -> (Scheduler, Arc<InMemoryRegistry>) {
    let registry = Arc::new(InMemoryRegistry::new());
    let scheduler = Scheduler::new(capacity, workers, registry.clone(), client).unwrap();
    (scheduler, registry)
}

fn empty_client() -> Arc<SpyHttpClient> {
    Arc::new(SpyHttpClient::responding(200, ""))
}

#[test]
fn test_given_error_on_task_creation_returns_error() {
    let (scheduler, registry) = make_scheduler(10, num_cpus::get(), empty_client());

    let err = scheduler
        .schedule("http://192.168.0.%31/", "GET", HashMap::new())
        .unwrap_err();

    assert!(matches!(err, SchedulerError::InvalidUrl(_)));
    assert!(registry.is_empty());
    scheduler.close();
}

#[test]
fn test_given_new_task_when_scheduler_overloaded_returns_error() {
    let (scheduler, registry) = make_scheduler(0, 0, empty_client());

    let err = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap_err();

    assert_eq!(err, SchedulerError::ServiceOverloaded);
    assert!(registry.is_empty());
}

#[test]
fn test_zero_capacity_rejects_even_with_idle_workers() {
    let (scheduler, registry) = make_scheduler(0, 4, empty_client());
    // Give workers time to park on the queue.
    thread::sleep(Duration::from_millis(20));

    for _ in 0..10 {
        let err = scheduler
            .schedule("http://google.ru", "GET", HashMap::new())
            .unwrap_err();
        assert_eq!(err, SchedulerError::ServiceOverloaded);
    }
    assert!(registry.is_empty());
    scheduler.close();
}

#[test]
fn test_full_queue_rejects_and_discards_task() {
    let (scheduler, registry) = make_scheduler(1, 0, empty_client());

    let admitted = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();
    let err = scheduler
        .schedule("http://google.ru/second", "GET", HashMap::new())
        .unwrap_err();

    assert_eq!(err, SchedulerError::ServiceOverloaded);
    assert_eq!(registry.len(), 1);
    assert_eq!(admitted.status(), TaskStatus::Ready);
    assert_eq!(scheduler.stats().queued_tasks, 1);
}

#[test]
fn test_given_scheduler_new_task_stores_it() {
    let (scheduler, registry) = make_scheduler(1, 4, empty_client());

    let task = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();

    assert!(registry.find(&task.id()).is_some());
    scheduler.close();
}

#[test]
fn test_returns_all_current_tasks() {
    let (scheduler, _registry) = make_scheduler(1, 4, empty_client());

    scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();

    assert_eq!(scheduler.find_all().len(), 1);
    scheduler.close();
}

#[test]
fn test_find_all_includes_every_status() {
    let (scheduler, _registry) = make_scheduler(4, 0, empty_client());

    for _ in 0..3 {
        scheduler
            .schedule("http://google.ru", "GET", HashMap::new())
            .unwrap();
    }

    let tasks = scheduler.find_all();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.status() == TaskStatus::Ready));
}

#[test]
fn test_given_not_existing_id_returns_error() {
    let (scheduler, _registry) = make_scheduler(1, 4, empty_client());

    let err = scheduler.find_by_id(&Uuid::new_v4()).unwrap_err();

    assert_eq!(err, SchedulerError::TaskNotFound);
    scheduler.close();
}

#[test]
fn test_given_real_id_returns_task() {
    let (scheduler, _registry) = make_scheduler(1, 4, empty_client());

    let task = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();
    let found = scheduler.find_by_id(&task.id()).unwrap();

    assert_eq!(found.id(), task.id());
    scheduler.close();
}

#[test]
fn test_delete_existing_task() {
    let (scheduler, _registry) = make_scheduler(1, 4, empty_client());

    let task = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();
    scheduler.delete(&task.id());

    assert_eq!(
        scheduler.find_by_id(&task.id()).unwrap_err(),
        SchedulerError::TaskNotFound
    );
    scheduler.close();
}

#[test]
fn test_delete_unknown_id_is_noop() {
    let (scheduler, registry) = make_scheduler(2, 0, empty_client());
    scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();

    let unknown = Uuid::new_v4();
    scheduler.delete(&unknown);

    assert_eq!(
        scheduler.find_by_id(&unknown).unwrap_err(),
        SchedulerError::TaskNotFound
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_scheduled_task_reaches_finished() {
    let client = Arc::new(SpyHttpClient::responding(200, "some text there"));
    let (scheduler, _registry) = make_scheduler(4, 2, client.clone());

    let task = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();
    let state = wait_for_terminal(&scheduler.find_by_id(&task.id()).unwrap());

    assert_eq!(state.status(), TaskStatus::Finished);
    assert!(state.error().is_none());
    let outcome = state.outcome().unwrap();
    assert_eq!(outcome.status_code, 200);
    assert_eq!(outcome.body, "some text there");
    assert_eq!(client.releases(), 1);

    scheduler.close();
    assert_eq!(scheduler.stats().finished_tasks, 1);
}

#[test]
fn test_transport_failure_reaches_failed() {
    let client = Arc::new(SpyHttpClient::failing_send("no route to host"));
    let (scheduler, _registry) = make_scheduler(4, 2, client);

    let task = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();
    let state = wait_for_terminal(&task);

    assert_eq!(state.status(), TaskStatus::Failed);
    assert!(matches!(state.error(), Some(FetchError::Transport(_))));
    assert!(state.outcome().is_none());
    scheduler.close();
}

#[test]
fn test_task_ids_are_unique() {
    let (scheduler, registry) = make_scheduler(64, 0, empty_client());

    let ids: HashSet<_> = (0..64)
        .map(|_| {
            scheduler
                .schedule("http://google.ru", "GET", HashMap::new())
                .unwrap()
                .id()
        })
        .collect();

    assert_eq!(ids.len(), 64);
    assert_eq!(registry.len(), 64);
}

#[test]
fn test_single_worker_executes_in_admission_order() {
    let client = Arc::new(SpyHttpClient::responding(200, "ok"));
    let (scheduler, _registry) = make_scheduler(16, 1, client.clone());

    let urls: Vec<String> = (0..8).map(|i| format!("http://example.com/{i}")).collect();
    for url in &urls {
        scheduler.schedule(url, "GET", HashMap::new()).unwrap();
    }
    scheduler.close();

    assert_eq!(client.requested_urls(), urls);
}

#[test]
fn test_delete_cancels_in_flight_fetch() {
    let client = Arc::new(SpyHttpClient::hanging());
    let (scheduler, _registry) = make_scheduler(2, 1, client);

    let task = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        task.status() == TaskStatus::InProgress
    }));

    scheduler.delete(&task.id());
    let state = wait_for_terminal(&task);

    assert_eq!(
        state.error(),
        Some(&FetchError::Transport("request cancelled".into()))
    );
    assert!(scheduler.find_by_id(&task.id()).is_err());
    scheduler.close();
}

#[test]
fn test_delete_during_body_read_releases_body() {
    let client = Arc::new(SpyHttpClient::hanging_body_read());
    let (scheduler, _registry) = make_scheduler(2, 1, Arc::clone(&client));

    let task = scheduler
        .schedule("http://google.ru", "GET", HashMap::new())
        .unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.reads() == 1));

    scheduler.delete(&task.id());
    let state = wait_for_terminal(&task);

    assert_eq!(
        state.error(),
        Some(&FetchError::Transport("request cancelled".into()))
    );
    assert_eq!(client.releases(), 1);
    scheduler.close();
}

#[test]
fn test_close_runs_remaining_queued_tasks() {
    let client = Arc::new(SpyHttpClient::responding(200, "ok"));
    let (scheduler, _registry) = make_scheduler(32, 2, client.clone());

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            scheduler
                .schedule("http://google.ru", "GET", HashMap::new())
                .unwrap()
        })
        .collect();
    scheduler.close();

    assert!(tasks.iter().all(|t| t.status() == TaskStatus::Finished));
    assert_eq!(client.calls(), 20);
    assert_eq!(client.releases(), 20);
    assert_eq!(
        scheduler
            .schedule("http://google.ru", "GET", HashMap::new())
            .unwrap_err(),
        SchedulerError::Shutdown
    );
}

#[test]
fn test_find_all_concurrent_with_schedule_and_delete() {
    let client = Arc::new(SpyHttpClient::responding(200, "ok"));
    let (scheduler, _registry) = make_scheduler(1024, 2, client);
    let scheduler = Arc::new(scheduler);

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                for i in 0..50 {
                    let task = scheduler
                        .schedule("http://google.ru", "GET", HashMap::new())
                        .unwrap();
                    if i % 2 == 0 {
                        scheduler.delete(&task.id());
                    }
                }
            })
        })
        .collect();

    let reader = {
        let scheduler = Arc::clone(&scheduler);
        thread::spawn(move || {
            for _ in 0..200 {
                let tasks = scheduler.find_all();
                let unique: HashSet<_> = tasks.iter().map(|t| t.id()).collect();
                assert_eq!(unique.len(), tasks.len());
            }
        })
    };

    for producer in producers {
        producer.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(scheduler.find_all().len(), 100);
    scheduler.close();
}

#[tokio::test]
async fn test_drop_without_close_inside_async_context() {
    for _ in 0..200 {
        let client = Arc::new(SpyHttpClient::responding(200, "ok"));
        let (scheduler, _registry) = make_scheduler(4, 2, client);
        for _ in 0..4 {
            let _ = scheduler.schedule("http://google.ru", "GET", HashMap::new());
        }
        // Workers may still hold the I/O runtime; whoever releases it last shuts it down.
        drop(scheduler);
    }
}
