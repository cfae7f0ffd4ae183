//! End-to-end pipeline tests: the supervisor driven with a scripted watch
//! source, plus one run against the real `notify` backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use folder_watch::{
    ChangeEvent, ChangeKind, EventProcessor, FolderEntry, FolderSpec, NotifySource,
    RawNotification, RawSink, RenameSide, RunReport, Supervisor, WatchError, WatchSource,
    register,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Watch source whose notifications are pushed by the test, keyed by folder path.
#[derive(Default)]
struct ScriptedSource {
    sinks: Mutex<HashMap<PathBuf, RawSink>>,
}

impl WatchSource for ScriptedSource {
    type Handle = ();

    fn watch(&self, path: &Path, sink: RawSink) -> Result<(), WatchError> {
        self.sinks.lock().unwrap().insert(path.to_path_buf(), sink);
        Ok(())
    }
}

/// Records every consumed event.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<ChangeEvent>>>);

impl EventProcessor for Recorder {
    fn process(&self, _worker: usize, event: &ChangeEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

impl Recorder {
    fn events(&self) -> Vec<ChangeEvent> {
        self.0.lock().unwrap().clone()
    }

    /// Poll until `pred` holds for the recorded events or `limit` elapses.
    async fn wait_for(&self, limit: Duration, pred: impl Fn(&[ChangeEvent]) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if pred(&self.events()) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        pred(&self.events())
    }
}

struct Running<S: WatchSource> {
    supervisor: Arc<Supervisor<S, Recorder>>,
    quit: oneshot::Sender<()>,
    task: JoinHandle<RunReport>,
}

fn start<S: WatchSource>(
    supervisor: Supervisor<S, Recorder>,
    folders: Vec<FolderSpec>,
) -> Running<S> {
    let supervisor = Arc::new(supervisor);
    let (quit, quit_rx) = oneshot::channel::<()>();
    let task = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move {
            supervisor
                .run(folders, async move {
                    let _ = quit_rx.await;
                })
                .await
        }
    });
    Running {
        supervisor,
        quit,
        task,
    }
}

impl<S: WatchSource> Running<S> {
    async fn stop(self) -> RunReport {
        let _ = self.quit.send(());
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("pipeline did not shut down in time")
            .expect("supervisor task panicked")
    }
}

async fn sink_for(source: &ScriptedSource, path: &Path) -> RawSink {
    for _ in 0..200 {
        if let Some(sink) = source.sinks.lock().unwrap().get(path).cloned() {
            return sink;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no watch registered for {}", path.display());
}

fn folder(path: &str, name: &str) -> FolderSpec {
    FolderSpec {
        path: PathBuf::from(path),
        name: name.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Scripted source
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_created_file_is_consumed() {
    let source = Arc::new(ScriptedSource::default());
    let recorder = Recorder::default();
    let running = start(
        Supervisor::new(SharedSource(Arc::clone(&source)), recorder.clone()).with_consumers(2),
        vec![folder("/tmp/watched", "A")],
    );

    let sink = sink_for(&source, Path::new("/tmp/watched")).await;
    sink.notify(RawNotification::Created("/tmp/watched/x.txt".into()));

    assert!(
        recorder
            .wait_for(Duration::from_secs(2), |evs| !evs.is_empty())
            .await
    );
    let report = running.stop().await;

    let events = recorder.events();
    assert_eq!(events, vec![ChangeEvent::created("A", "/tmp/watched/x.txt")]);
    assert_eq!(events[0].kind(), ChangeKind::Created);
    assert_eq!(events[0].old_path(), None);
    assert_eq!(report.producers_spawned, 1);
}

#[tokio::test]
async fn test_rename_is_consumed_once_with_both_paths() {
    let source = Arc::new(ScriptedSource::default());
    let recorder = Recorder::default();
    let running = start(
        Supervisor::new(SharedSource(Arc::clone(&source)), recorder.clone()).with_consumers(3),
        vec![folder("/tmp/watched", "A")],
    );

    let sink = sink_for(&source, Path::new("/tmp/watched")).await;
    sink.notify(RawNotification::Renamed {
        from: "/tmp/watched/a.txt".into(),
        to: "/tmp/watched/b.txt".into(),
    });

    assert!(
        recorder
            .wait_for(Duration::from_secs(2), |evs| !evs.is_empty())
            .await
    );
    running.stop().await;

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), ChangeKind::Renamed);
    assert_eq!(events[0].path(), Path::new("/tmp/watched/b.txt"));
    assert_eq!(events[0].old_path(), Some(Path::new("/tmp/watched/a.txt")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_event_reaches_exactly_one_consumer() {
    let source = Arc::new(ScriptedSource::default());
    let recorder = Recorder::default();
    let running = start(
        Supervisor::new(SharedSource(Arc::clone(&source)), recorder.clone()).with_consumers(4),
        vec![folder("/w/a", "A"), folder("/w/b", "B")],
    );

    let a = sink_for(&source, Path::new("/w/a")).await;
    let b = sink_for(&source, Path::new("/w/b")).await;
    for i in 0..300 {
        a.notify(RawNotification::Changed(format!("/w/a/{i}").into()));
        b.notify(RawNotification::Deleted(format!("/w/b/{i}").into()));
    }

    assert!(
        recorder
            .wait_for(Duration::from_secs(5), |evs| evs.len() >= 600)
            .await
    );
    let report = running.stop().await;

    let events = recorder.events();
    assert_eq!(events.len(), 600);
    assert_eq!(events.iter().filter(|e| e.folder() == "A").count(), 300);
    assert!(
        events
            .iter()
            .all(|e| e.old_path().is_none() && e.kind() != ChangeKind::Renamed)
    );
    assert_eq!(report.producers_spawned, 2);
    assert_eq!(report.consumers_spawned, 4);
}

#[tokio::test]
async fn test_no_valid_folders_consumers_idle_until_quit() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    let folders = register(&[FolderEntry {
        path: Some(missing.to_string_lossy().into_owned()),
        name: Some("ghost".to_string()),
    }]);
    assert!(folders.is_empty());

    let source = Arc::new(ScriptedSource::default());
    let running = start(
        Supervisor::new(SharedSource(Arc::clone(&source)), Recorder::default()).with_consumers(2),
        folders,
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!running.task.is_finished(), "run ended before quit");
    assert!(!running.supervisor.token().is_cancelled());

    let report = running.stop().await;
    assert_eq!(report.producers_spawned, 0);
    assert_eq!(report.consumers_spawned, 2);
    assert_eq!(report.timed_out, 0);
}

#[tokio::test]
async fn test_quit_during_event_burst_finishes_promptly() {
    let source = Arc::new(ScriptedSource::default());
    let recorder = Recorder::default();
    let running = start(
        Supervisor::new(SharedSource(Arc::clone(&source)), recorder.clone())
            .with_consumers(1)
            .with_shutdown_timeout(Duration::from_secs(2)),
        vec![folder("/w/a", "A")],
    );

    let sink = sink_for(&source, Path::new("/w/a")).await;
    for i in 0..20_000 {
        sink.notify(RawNotification::Changed(format!("/w/a/{i}").into()));
    }

    let report = running.stop().await;
    assert_eq!(report.timed_out, 0);
    assert_eq!(report.producers_failed, 0);
    assert!(recorder.events().len() <= 20_000);
}

#[tokio::test]
async fn test_rename_halves_from_each_platform_become_one_rename() {
    let source = Arc::new(ScriptedSource::default());
    let recorder = Recorder::default();
    let running = start(
        Supervisor::new(SharedSource(Arc::clone(&source)), recorder.clone()).with_consumers(2),
        vec![folder("/w/win", "W"), folder("/w/mac", "M")],
    );

    let half = |side, path: &str| RawNotification::RenameHalf {
        side,
        path: path.into(),
        tracker: None,
    };

    let win = sink_for(&source, Path::new("/w/win")).await;
    win.notify(half(RenameSide::From, "/w/win/a.txt"));
    win.notify(half(RenameSide::To, "/w/win/b.txt"));

    let mac = sink_for(&source, Path::new("/w/mac")).await;
    mac.notify(half(RenameSide::Unknown, "/w/mac/a.txt"));
    mac.notify(half(RenameSide::Unknown, "/w/mac/b.txt"));

    assert!(
        recorder
            .wait_for(Duration::from_secs(2), |evs| evs.len() == 2)
            .await
    );
    // Nothing more once the pairing window has passed.
    tokio::time::sleep(Duration::from_millis(300)).await;
    running.stop().await;

    let mut events = recorder.events();
    events.sort_by(|a, b| a.folder().cmp(b.folder()));
    assert_eq!(
        events,
        vec![
            ChangeEvent::renamed("M", "/w/mac/a.txt", "/w/mac/b.txt"),
            ChangeEvent::renamed("W", "/w/win/a.txt", "/w/win/b.txt"),
        ]
    );
}

/// Lets the test keep a handle on a source the supervisor owns.
struct SharedSource(Arc<ScriptedSource>);

impl WatchSource for SharedSource {
    type Handle = ();

    fn watch(&self, path: &Path, sink: RawSink) -> Result<(), WatchError> {
        self.0.watch(path, sink)
    }
}

// ---------------------------------------------------------------------------
// Real notify backend
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_notify_backend_reports_create_and_rename() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let recorder = Recorder::default();

    let running = start(
        Supervisor::new(NotifySource, recorder.clone()).with_consumers(2),
        vec![FolderSpec {
            path: root.clone(),
            name: "A".to_string(),
        }],
    );
    // Give the backend time to register the watch.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let created = root.join("x.txt");
    std::fs::write(&created, "hello").unwrap();
    assert!(
        recorder
            .wait_for(Duration::from_secs(5), |evs| evs
                .iter()
                .any(|e| e.kind() == ChangeKind::Created && e.path() == created))
            .await,
        "no Created event for {}, got {:?}",
        created.display(),
        recorder.events()
    );

    let from = root.join("a.txt");
    let to = root.join("b.txt");
    std::fs::write(&from, "a").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::rename(&from, &to).unwrap();

    assert!(
        recorder
            .wait_for(Duration::from_secs(5), |evs| evs
                .iter()
                .any(|e| e.kind() == ChangeKind::Renamed))
            .await,
        "no Renamed event, got {:?}",
        recorder.events()
    );
    let report = running.stop().await;

    let renames: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| e.kind() == ChangeKind::Renamed)
        .collect();
    assert_eq!(renames.len(), 1);
    assert_eq!(renames[0].folder(), "A");
    assert_eq!(renames[0].path(), to);
    assert_eq!(renames[0].old_path(), Some(from.as_path()));
    assert_eq!(report.producers_failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_notify_backend_reports_moves_in_and_out() {
    let dir = tempfile::tempdir().unwrap();
    let outer = dir.path().canonicalize().unwrap();
    let root = outer.join("watched");
    std::fs::create_dir(&root).unwrap();
    let recorder = Recorder::default();

    let running = start(
        Supervisor::new(NotifySource, recorder.clone()).with_consumers(2),
        vec![FolderSpec {
            path: root.clone(),
            name: "A".to_string(),
        }],
    );
    tokio::time::sleep(Duration::from_millis(300)).await;

    let outside = outer.join("incoming.txt");
    let inside = root.join("incoming.txt");
    std::fs::write(&outside, "x").unwrap();
    std::fs::rename(&outside, &inside).unwrap();

    assert!(
        recorder
            .wait_for(Duration::from_secs(5), |evs| evs
                .iter()
                .any(|e| e.kind() == ChangeKind::Created && e.path() == inside))
            .await,
        "no Created event for a file moved in, got {:?}",
        recorder.events()
    );

    std::fs::rename(&inside, outer.join("outgoing.txt")).unwrap();

    assert!(
        recorder
            .wait_for(Duration::from_secs(5), |evs| evs
                .iter()
                .any(|e| e.kind() == ChangeKind::Deleted && e.path() == inside))
            .await,
        "no Deleted event for a file moved out, got {:?}",
        recorder.events()
    );
    let report = running.stop().await;

    assert!(
        recorder
            .events()
            .iter()
            .all(|e| e.kind() != ChangeKind::Renamed),
        "a move across the folder boundary is not a rename: {:?}",
        recorder.events()
    );
    assert_eq!(report.producers_failed, 0);
}
