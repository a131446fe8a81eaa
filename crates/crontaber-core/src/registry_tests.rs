use super::*;
use crate::executor::ExecutionOutcome;
use crate::job::NewJob;
use crate::store::MemoryJobStore;
use async_trait::async_trait;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

/// Executor that records calls and optionally takes its time.
#[derive(Default)]
struct RecordingExecutor {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl RecordingExecutor {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, command: &str, _options: &ExecOptions) -> ExecutionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        ExecutionOutcome {
            failed: self.fail,
            stdout: command.to_string(),
            exit_code: Some(if self.fail { 1 } else { 0 }),
            ..ExecutionOutcome::default()
        }
    }
}

struct Fixture {
    store: Arc<MemoryJobStore>,
    executor: Arc<RecordingExecutor>,
    registry: SchedulerRegistry,
}

fn fixture_with(executor: RecordingExecutor) -> Fixture {
    let store = Arc::new(MemoryJobStore::new());
    let executor = Arc::new(executor);
    let registry = SchedulerRegistry::new(store.clone(), executor.clone());
    Fixture {
        store,
        executor,
        registry,
    }
}

fn fixture() -> Fixture {
    fixture_with(RecordingExecutor::default())
}

async fn create(store: &MemoryJobStore, frequency: &str, max_executions: Option<u32>) -> Job {
    store
        .create_job(NewJob {
            name: "test".to_string(),
            command: "echo tick".to_string(),
            frequency: frequency.to_string(),
            auto_start: true,
            max_executions,
            ..NewJob::default()
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_arm_registers_armed_timer() {
    let f = fixture();
    let job = create(&f.store, "@daily", None).await;

    let timer = f.registry.arm(&job).unwrap();
    assert_eq!(timer.job_id(), job.id);
    assert_eq!(timer.state(), TimerState::Armed);
    assert!(!timer.is_busy());
    assert_eq!(f.registry.len(), 1);

    let next = timer.next_run().unwrap();
    assert!(next > Utc::now());
    assert!(next <= Utc::now() + chrono::Duration::hours(24));
}

#[tokio::test]
async fn test_arm_invalid_schedule_registers_nothing() {
    let f = fixture();
    let job = create(&f.store, "not a cron", None).await;

    assert!(f.registry.arm(&job).is_err());
    assert!(f.registry.is_empty());
    assert!(f.registry.find(&job.id).is_none());
}

#[tokio::test]
async fn test_arm_replaces_previous_timer() {
    let f = fixture();
    let mut job = create(&f.store, "@daily", None).await;

    let first = f.registry.arm(&job).unwrap();
    job.frequency = "@hourly".to_string();
    let second = f.registry.arm(&job).unwrap();

    assert!(first.is_stopped());
    assert!(!second.is_stopped());
    assert_eq!(f.registry.len(), 1);
    assert!(Arc::ptr_eq(&f.registry.find(&job.id).unwrap(), &second));
    assert_eq!(second.schedule().expression(), "@hourly");
}

#[tokio::test]
async fn test_fire_records_execution() {
    let f = fixture();
    let job = create(&f.store, "@daily", None).await;
    let timer = f.registry.arm(&job).unwrap();

    let execution = timer.fire().await;
    assert!(!execution.outcome.failed);
    assert_eq!(execution.outcome.stdout, "echo tick");
    assert!(execution.finished_at >= execution.started_at);
    assert_eq!(timer.fire_count(), 1);
    assert!(!timer.is_busy());

    let stored = f.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.executions.len(), 1);
    assert_eq!(stored.executions[0], execution);
    assert_eq!(timer.state(), TimerState::Armed);
}

#[tokio::test]
async fn test_fire_records_failure_as_data() {
    let f = fixture_with(RecordingExecutor::failing());
    let job = create(&f.store, "@daily", None).await;
    let timer = f.registry.arm(&job).unwrap();

    timer.fire().await;

    let stored = f.store.get_job(&job.id).await.unwrap().unwrap();
    assert!(stored.executions[0].outcome.failed);
    assert_eq!(stored.executions[0].outcome.exit_code, Some(1));
}

#[tokio::test]
async fn test_max_executions_retires_timer() {
    let f = fixture();
    let job = create(&f.store, "@daily", Some(2)).await;
    let timer = f.registry.arm(&job).unwrap();

    timer.fire().await;
    assert!(!timer.is_stopped());
    timer.fire().await;
    assert!(timer.is_stopped());
    assert!(timer.next_run().is_none());

    // Retired timers stay registered until disarmed.
    assert_eq!(f.registry.len(), 1);
    let stored = f.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.executions.len(), 2);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let f = fixture();
    let job = create(&f.store, "@hourly", None).await;
    let timer = f.registry.arm(&job).unwrap();

    assert!(f.registry.pause(&job.id));
    assert!(timer.is_paused());
    assert!(timer.next_run().is_none());

    assert!(f.registry.resume(&job.id));
    assert_eq!(timer.state(), TimerState::Armed);
    assert!(timer.next_run().unwrap() > Utc::now());
}

#[tokio::test]
async fn test_resume_does_not_revive_stopped_timer() {
    let f = fixture();
    let job = create(&f.store, "@hourly", None).await;
    let timer = f.registry.arm(&job).unwrap();

    assert!(f.registry.stop(&job.id));
    assert!(f.registry.resume(&job.id));
    assert!(timer.is_stopped());
}

#[tokio::test]
async fn test_unknown_ids_return_false() {
    let f = fixture();
    assert!(!f.registry.pause("missing"));
    assert!(!f.registry.resume("missing"));
    assert!(!f.registry.stop("missing"));
    assert!(f.registry.remove("missing").is_none());
}

#[tokio::test]
async fn test_remove_stops_and_unregisters() {
    let f = fixture();
    let job = create(&f.store, "@hourly", None).await;
    let timer = f.registry.arm(&job).unwrap();

    let removed = f.registry.remove(&job.id).unwrap();
    assert!(Arc::ptr_eq(&removed, &timer));
    assert!(timer.is_stopped());
    assert!(f.registry.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_everything() {
    let f = fixture();
    let a = create(&f.store, "@hourly", None).await;
    let b = create(&f.store, "@daily", None).await;
    let timer_a = f.registry.arm(&a).unwrap();
    let timer_b = f.registry.arm(&b).unwrap();

    f.registry.shutdown();
    assert!(f.registry.is_empty());
    assert!(timer_a.is_stopped());
    assert!(timer_b.is_stopped());
}

#[tokio::test]
async fn test_busy_while_firing() {
    let f = fixture_with(RecordingExecutor::slow(Duration::from_millis(300)));
    let job = create(&f.store, "@daily", None).await;
    let timer = f.registry.arm(&job).unwrap();

    let firing = {
        let timer = timer.clone();
        tokio::spawn(async move { timer.fire().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(timer.is_busy());

    firing.await.unwrap();
    assert!(!timer.is_busy());
}

#[tokio::test]
async fn test_fires_never_overlap() {
    let f = fixture_with(RecordingExecutor::slow(Duration::from_millis(100)));
    let job = create(&f.store, "@daily", None).await;
    let timer = f.registry.arm(&job).unwrap();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let timer = timer.clone();
            tokio::spawn(async move { timer.fire().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(f.executor.calls(), 3);
    assert_eq!(f.executor.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(timer.fire_count(), 3);
}

#[tokio::test]
async fn test_timer_fires_on_schedule() {
    let f = fixture();
    let job = create(&f.store, "* * * * * *", None).await;
    let timer = f.registry.arm(&job).unwrap();

    let mut fired = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if timer.fire_count() > 0 {
            fired = true;
            break;
        }
    }
    assert!(fired, "timer did not fire within 5 seconds");

    f.registry.remove(&job.id);
    let stored = f.store.get_job(&job.id).await.unwrap().unwrap();
    assert!(!stored.executions.is_empty());
}

#[tokio::test]
async fn test_stopped_timer_does_not_fire() {
    let f = fixture();
    let job = create(&f.store, "* * * * * *", None).await;
    f.registry.arm(&job).unwrap();
    f.registry.stop(&job.id);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(f.executor.calls(), 0);
}

#[tokio::test]
async fn test_self_retires_after_scheduled_fires() {
    let f = fixture();
    let job = create(&f.store, "* * * * * *", Some(1)).await;
    let timer = f.registry.arm(&job).unwrap();

    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if timer.is_stopped() {
            break;
        }
    }
    assert!(timer.is_stopped());
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(f.executor.calls(), 1);
}
