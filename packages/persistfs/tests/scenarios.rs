//! End-to-end startup scenarios, asserting on the diagnostic log.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use persistfs::{InitContext, InitError, InitState, Initializer, VolumeConfig};
use persistfs_host::testing::DeferredSyncFs;
use persistfs_host::{
    Bytes, Capability, CapabilityRegistry, HostEnv, HostFilesystem, MemFs, MemoryDurableStore,
};
use tracing::Level;

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Index of the first line containing `needle`.
    fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|line| line.contains(needle))
    }
}

fn capture() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer({
            let buffer = buffer.clone();
            move || buffer.clone()
        })
        .with_max_level(Level::INFO)
        .with_ansi(false)
        .without_time()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

fn counted(env: impl CapabilityRegistry + 'static) -> (Arc<AtomicUsize>, InitContext) {
    let calls = Arc::new(AtomicUsize::new(0));
    let ctx = InitContext::new(env, {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    });
    (calls, ctx)
}

#[tokio::test]
async fn scenario_a_sync_succeeds() {
    let (logs, _guard) = capture();
    let fs = MemFs::new();
    let env = HostEnv::empty()
        .with_filesystem(fs.clone())
        .with_durable_storage(MemoryDurableStore::with_entries([("save.dat", "level=4")]));
    let (calls, ctx) = counted(env);

    let report = Initializer::new(ctx).run().await.unwrap();
    assert_eq!(report.files, 1);

    let mounting = logs.position("mounting").expect("mount start logged");
    let synced = logs
        .position("fs sync to great succ.")
        .expect("sync success logged");
    assert!(mounting < synced);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let volume = VolumeConfig::default().mount_path;
    assert_eq!(
        fs.read_file(&volume.join("save.dat").unwrap()).unwrap(),
        Bytes::from_static(b"level=4")
    );
}

#[tokio::test]
async fn scenario_b_capability_absent() {
    let (logs, _guard) = capture();
    let fs = MemFs::new();
    let env = HostEnv::empty().with_filesystem(fs.clone());
    let (calls, ctx) = counted(env);
    let init = Initializer::new(ctx);
    let state = init.state();

    let err = init.run().await.unwrap_err();
    assert!(matches!(
        err,
        InitError::EnvironmentUnavailable {
            missing: Capability::DurableStorage
        }
    ));

    assert!(logs.position("FS or IDBFS is not available").is_some());
    assert!(logs.position("mounting").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.get(), InitState::Failed);
    assert!(!fs.exists(&VolumeConfig::default().mount_path));
}

#[tokio::test]
async fn scenario_c_sync_reports_error() {
    let (logs, _guard) = capture();
    let store = MemoryDurableStore::new();
    store.fail_loads_with("quota exceeded");
    let env = HostEnv::empty()
        .with_filesystem(MemFs::new())
        .with_durable_storage(store);
    let (calls, ctx) = counted(env);

    let err = Initializer::new(ctx).run().await.unwrap_err();
    assert!(matches!(err, InitError::SyncFailure { .. }));

    let mounting = logs.position("mounting").expect("mount start logged");
    let failed = logs.position("error syncing").expect("sync failure logged");
    assert!(mounting < failed);
    assert!(logs.lines()[failed].contains("quota exceeded"));
    assert!(logs.position("fs sync to great succ.").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn load_never_observed_before_completion() {
    let (deferred, mut syncs) = DeferredSyncFs::new(MemFs::new());
    let env = HostEnv::empty()
        .with_filesystem(deferred)
        .with_durable_storage(MemoryDurableStore::new());
    let (calls, ctx) = counted(env);

    let handle = Initializer::new(ctx).start();
    let request = syncs.next().await.unwrap();

    // Let every other task run; nothing may call load while the sync is parked.
    for _ in 0..10 {
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    request.run().await;
    handle.wait().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn host_that_never_calls_back_fails_the_sync() {
    let (deferred, mut syncs) = DeferredSyncFs::new(MemFs::new());
    let env = HostEnv::empty()
        .with_filesystem(deferred)
        .with_durable_storage(MemoryDurableStore::new());
    let (calls, ctx) = counted(env);

    let handle = Initializer::new(ctx).start();
    syncs.next().await.unwrap().abandon();

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, InitError::SyncFailure { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn second_process_start_restores_saved_state() {
    let dir = tempfile::tempdir().unwrap();

    // First session: nothing saved yet, then the application saves.
    let env = HostEnv::local_disk(dir.path()).unwrap();
    let fs = env.filesystem().unwrap();
    let (calls, ctx) = counted(env);
    let report = Initializer::new(ctx).run().await.unwrap();
    assert_eq!(report.files, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let save = VolumeConfig::default().mount_path.join("save.dat").unwrap();
    fs.write_file(&save, Bytes::from_static(b"level=5"))
        .await
        .unwrap();

    // Second session: a fresh namespace over the same durable directory.
    let env = HostEnv::local_disk(dir.path()).unwrap();
    let fs = env.filesystem().unwrap();
    let loaded = Arc::new(Mutex::new(None));
    let ctx = InitContext::new(env, {
        let fs = fs.clone();
        let save = save.clone();
        let loaded = loaded.clone();
        move || {
            *loaded.lock().unwrap() = fs.read_file(&save).ok();
        }
    });

    Initializer::new(ctx).run().await.unwrap();
    assert_eq!(
        loaded.lock().unwrap().clone(),
        Some(Bytes::from_static(b"level=5"))
    );
}
