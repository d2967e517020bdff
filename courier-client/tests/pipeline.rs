mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{RecordingBackend, ScriptedMessenger, shared};
use courier_client::{
    InvocationError, JobError, JobInput, PipelineConfig, RpcError, SendPipeline, SendingState,
    StateStore,
};
use courier_ingest::{IngestError, SendMode, Table};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn contacts() -> Table {
    courier_ingest::ingest("contacts.csv", b"phone,name\n555,Ann\n,Bob\n777,\n").unwrap()
}

fn lines(n: usize) -> Table {
    let text: Vec<String> = (1..=n).map(|i| format!("item {i}")).collect();
    courier_ingest::ingest_text(&text.join("\n"))
}

fn flood(secs: u32) -> InvocationError {
    RpcError::flood_wait(secs).into()
}

fn recording_store() -> (Arc<RecordingBackend>, StateStore) {
    let backend = Arc::new(RecordingBackend::default());
    (backend.clone(), StateStore::new(backend))
}

fn assert_finished(store: &StateStore) -> SendingState {
    let stored = store.load_sending().unwrap();
    assert!(!stored.is_sending, "job still marked as sending");
    assert!(!stored.should_stop, "stop flag left behind");
    assert!(!stored.is_paused);
    stored
}

// ─── Iteration ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn column_mode_sends_every_cell() {
    let m = shared(ScriptedMessenger::new());
    let store = StateStore::in_memory();
    let p = SendPipeline::new(m.clone(), store.clone(), PipelineConfig::default());

    let state = p.run(&contacts(), "@bot", SendMode::Columns).await.unwrap();

    assert_eq!(m.sent_texts(), ["555", "777", "Ann", "Bob"]);
    assert!(m.sent.lock().unwrap().iter().all(|(to, _)| to == "@bot"));
    assert_eq!((state.sent_count, state.failed_count), (4, 0));
    assert_eq!((state.current_message, state.total_messages), (4, 4));
    assert_eq!(state.last_message_sent, "Bob");
    assert_eq!(state.send_mode, Some(SendMode::Columns));

    let stored = assert_finished(&store);
    assert_eq!(stored.sent_count, 4);
    assert_eq!(stored.current_recipient, "@bot");
    assert_eq!(m.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn row_mode_composes_labelled_rows() {
    let m = shared(ScriptedMessenger::new());
    let p = SendPipeline::new(m.clone(), StateStore::in_memory(), PipelineConfig::default());

    let state = p.run(&contacts(), "@bot", SendMode::Rows).await.unwrap();

    assert_eq!(m.sent_texts(), ["phone: 555 | name: Ann", "name: Bob", "phone: 777"]);
    assert_eq!(state.total_messages, 3);
}

#[tokio::test(start_paused = true)]
async fn single_column_rows_are_bare() {
    let m = shared(ScriptedMessenger::new());
    let p = SendPipeline::new(m.clone(), StateStore::in_memory(), PipelineConfig::default());

    p.run_job(JobInput::Text("5551234\n\n5559876\n".into()), "@bot", SendMode::Rows)
        .await
        .unwrap();

    assert_eq!(m.sent_texts(), ["5551234", "5559876"]);
}

#[tokio::test(start_paused = true)]
async fn delay_follows_each_successful_send() {
    let m = shared(ScriptedMessenger::new());
    let config = PipelineConfig { delay: Duration::from_secs(10), ..Default::default() };
    let p = SendPipeline::new(m.clone(), StateStore::in_memory(), config);

    let started = Instant::now();
    p.run(&lines(3), "@bot", SendMode::Rows).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(30));
}

// ─── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn flood_wait_is_retried_once_after_padding() {
    let m = shared(ScriptedMessenger::new().fail("777", vec![flood(30)]));
    let p = SendPipeline::new(m.clone(), StateStore::in_memory(), PipelineConfig::default());

    let started = Instant::now();
    let state = p.run(&contacts(), "@bot", SendMode::Columns).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(31));
    assert!(started.elapsed() < Duration::from_secs(40));
    assert_eq!(m.sent_texts(), ["555", "777", "Ann", "Bob"]);
    assert_eq!((state.sent_count, state.failed_count), (4, 0));
}

#[tokio::test(start_paused = true)]
async fn second_flood_wait_counts_as_failure() {
    let m = shared(ScriptedMessenger::new().fail("777", vec![flood(5), flood(5)]));
    let p = SendPipeline::new(m.clone(), StateStore::in_memory(), PipelineConfig::default());

    let state = p.run(&contacts(), "@bot", SendMode::Columns).await.unwrap();

    assert_eq!(m.sent_texts(), ["555", "Ann", "Bob"]);
    assert_eq!((state.sent_count, state.failed_count), (3, 1));
    assert_eq!(state.current_message, 4);
}

#[tokio::test(start_paused = true)]
async fn failed_retry_after_flood_wait_is_not_retried_again() {
    let m = shared(ScriptedMessenger::new().fail("Ann", vec![flood(3), InvocationError::Dropped]));
    let p = SendPipeline::new(m.clone(), StateStore::in_memory(), PipelineConfig::default());

    let started = Instant::now();
    let state = p.run(&contacts(), "@bot", SendMode::Columns).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(started.elapsed() < Duration::from_secs(8));
    assert_eq!(m.attempts.load(std::sync::atomic::Ordering::SeqCst), 5);
    assert_eq!(m.sent_texts(), ["555", "777", "Bob"]);
    assert_eq!((state.sent_count, state.failed_count, state.current_message), (3, 1, 4));
}

#[tokio::test(start_paused = true)]
async fn other_errors_are_not_retried() {
    let m = shared(
        ScriptedMessenger::new().fail("Ann", vec![InvocationError::PeerNotFound("@bot".into())]),
    );
    let p = SendPipeline::new(m.clone(), StateStore::in_memory(), PipelineConfig::default());

    let started = Instant::now();
    let state = p.run(&contacts(), "@bot", SendMode::Columns).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(m.attempts.load(std::sync::atomic::Ordering::SeqCst), 4);
    assert_eq!((state.sent_count, state.failed_count), (3, 1));
}

#[tokio::test(start_paused = true)]
async fn counts_never_exceed_progress() {
    let m = shared(
        ScriptedMessenger::new()
            .fail("item 2", vec![InvocationError::Dropped])
            .fail("item 4", vec![flood(3), flood(3)])
            .fail("item 5", vec![flood(3)]),
    );
    let (backend, store) = recording_store();
    let config = PipelineConfig { cooldown_every: 2, cooldown: Duration::from_secs(6), ..Default::default() };
    let p = SendPipeline::new(m.clone(), store.clone(), config);

    p.run(&lines(6), "@bot", SendMode::Rows).await.unwrap();

    let history = backend.sending_history();
    assert!(history.len() > 6);
    for s in &history {
        assert!(s.sent_count + s.failed_count <= s.current_message, "{s:?}");
        assert!(s.current_message <= s.total_messages, "{s:?}");
    }
    let last = assert_finished(&store);
    assert_eq!((last.sent_count, last.failed_count), (4, 2));
}

#[tokio::test(start_paused = true)]
async fn unauthorized_session_aborts_and_cleans_up() {
    let m = shared(ScriptedMessenger { unauthorized: true, ..Default::default() });
    let store = StateStore::in_memory();
    let p = SendPipeline::new(m.clone(), store.clone(), PipelineConfig::default());

    let err = p.run(&contacts(), "@bot", SendMode::Columns).await.unwrap_err();

    assert!(matches!(err, JobError::Unauthorized), "{err}");
    assert!(m.sent_texts().is_empty());
    assert_finished(&store);
    assert_eq!(m.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn ingestion_failure_touches_nothing() {
    let m = shared(ScriptedMessenger::new());
    let store = StateStore::in_memory();
    let p = SendPipeline::new(m.clone(), store.clone(), PipelineConfig::default());

    let input = JobInput::File { filename: "numbers.json".into(), bytes: b"[]".to_vec() };
    let err = p.run_job(input, "@bot", SendMode::Columns).await.unwrap_err();

    assert!(matches!(err, JobError::Ingest(IngestError::UnsupportedExtension { .. })), "{err}");
    assert_eq!(store.load_sending().unwrap(), SendingState::default());
    assert_eq!(m.disconnects(), 0);
}

// ─── Cooldown ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cooldown_counts_down_in_persisted_ticks() {
    let m = shared(ScriptedMessenger::new());
    let (backend, store) = recording_store();
    let config = PipelineConfig {
        cooldown_every: 2,
        cooldown:       Duration::from_secs(12),
        ..Default::default()
    };
    let p = SendPipeline::new(m.clone(), store.clone(), config);

    let started = Instant::now();
    let state = p.run(&lines(3), "@bot", SendMode::Rows).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(12));
    assert_eq!(state.sent_count, 3);
    let countdown: Vec<u64> = backend
        .sending_history()
        .iter()
        .filter(|s| s.is_paused)
        .map(|s| s.pause_countdown)
        .collect();
    assert_eq!(countdown, [12, 7, 2, 0]);
    assert_finished(&store);
}

#[tokio::test(start_paused = true)]
async fn default_cooldown_every_hundred_sends() {
    let m = shared(ScriptedMessenger::new());
    let (backend, store) = recording_store();
    let p = SendPipeline::new(m.clone(), store, PipelineConfig::default());

    let started = Instant::now();
    let state = p.run(&lines(101), "@bot", SendMode::Rows).await.unwrap();

    assert_eq!(state.sent_count, 101);
    assert!(started.elapsed() >= Duration::from_secs(120));
    let pause = backend
        .sending_history()
        .into_iter()
        .find(|s| s.is_paused)
        .expect("a cooldown was persisted");
    assert_eq!((pause.sent_count, pause.pause_countdown), (100, 120));
}

// ─── Stopping ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_token_halts_within_one_unit() {
    let token = CancellationToken::new();
    let t = token.clone();
    let m = shared(ScriptedMessenger::new().on_send(move |n| {
        if n == 2 {
            t.cancel();
        }
    }));
    let store = StateStore::in_memory();
    let p = SendPipeline::new(m.clone(), store.clone(), PipelineConfig::default())
        .with_stop_token(token);

    let state = p.run(&lines(5), "@bot", SendMode::Rows).await.unwrap();

    assert_eq!(m.sent_texts(), ["item 1", "item 2"]);
    assert_eq!((state.sent_count, state.current_message, state.total_messages), (2, 2, 5));
    let stored = assert_finished(&store);
    assert_eq!(stored.sent_count, 2);
    assert_eq!(stored.current_message, 2);
}

#[tokio::test(start_paused = true)]
async fn stop_through_the_store_is_not_overwritten() {
    let store = StateStore::in_memory();
    let s = store.clone();
    let m = shared(ScriptedMessenger::new().on_send(move |n| {
        if n == 1 {
            assert!(s.request_stop().unwrap());
        }
    }));
    let p = SendPipeline::new(m.clone(), store.clone(), PipelineConfig::default());

    let state = p.run(&contacts(), "@bot", SendMode::Columns).await.unwrap();

    assert_eq!(m.sent_texts(), ["555"]);
    assert_eq!(state.sent_count, 1);
    assert_finished(&store);
    assert!(!store.request_stop().unwrap(), "nothing left to stop");
}

#[tokio::test(start_paused = true)]
async fn stop_cuts_the_cooldown_short() {
    let token = CancellationToken::new();
    let m = shared(ScriptedMessenger::new());
    let (backend, store) = recording_store();
    let config = PipelineConfig { cooldown_every: 1, ..Default::default() };
    let p = SendPipeline::new(m.clone(), store.clone(), config).with_stop_token(token.clone());

    let t = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        t.cancel();
    });
    let started = Instant::now();
    let state = p.run(&lines(3), "@bot", SendMode::Rows).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(state.sent_count, 1);
    let paused: Vec<u64> = backend
        .sending_history()
        .iter()
        .filter(|s| s.is_paused)
        .map(|s| s.pause_countdown)
        .collect();
    assert_eq!(paused, [120, 115]);
    let stored = assert_finished(&store);
    assert_eq!(stored.pause_countdown, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_between_columns_leaves_the_next_column_untouched() {
    let store = StateStore::in_memory();
    let s = store.clone();
    let m = shared(ScriptedMessenger::new().on_send(move |n| {
        if n == 2 {
            assert!(s.request_stop().unwrap());
        }
    }));
    let p = SendPipeline::new(m.clone(), store.clone(), PipelineConfig::default());

    let state = p.run(&contacts(), "@bot", SendMode::Columns).await.unwrap();

    assert_eq!(m.sent_texts(), ["555", "777"]);
    assert_eq!((state.sent_count, state.current_message, state.total_messages), (2, 2, 4));
    assert_eq!(state.current_item, "777");
    assert_finished(&store);
}

#[tokio::test(start_paused = true)]
async fn stop_ends_only_the_job_it_hit() {
    let m = shared(ScriptedMessenger::new());
    let store = StateStore::in_memory();
    let p = SendPipeline::new(m.clone(), store.clone(), PipelineConfig::default());

    p.stop_token().cancel();
    let first = p.run(&lines(3), "@bot", SendMode::Rows).await.unwrap();
    assert_eq!(first.sent_count, 0);
    assert!(!p.stop_token().is_cancelled());

    let second = p.run(&lines(3), "@bot", SendMode::Rows).await.unwrap();

    assert_eq!(m.sent_texts(), ["item 1", "item 2", "item 3"]);
    assert_eq!((second.sent_count, second.current_message, second.total_messages), (3, 3, 3));
    assert_finished(&store);
}

#[tokio::test(start_paused = true)]
async fn job_after_a_mid_run_stop_sends_everything() {
    let token = CancellationToken::new();
    let t = token.clone();
    let m = shared(ScriptedMessenger::new().on_send(move |n| {
        if n == 2 {
            t.cancel();
        }
    }));
    let store = StateStore::in_memory();
    let p = SendPipeline::new(m.clone(), store.clone(), PipelineConfig::default())
        .with_stop_token(token.clone());

    let first = p.run(&lines(4), "@bot", SendMode::Rows).await.unwrap();
    assert_eq!(first.sent_count, 2);

    let second = p.run(&lines(4), "@bot", SendMode::Rows).await.unwrap();

    assert!(token.is_cancelled());
    assert_eq!(second.sent_count, 4);
    assert_eq!(m.sent_texts().len(), 6);
    assert_finished(&store);
}
