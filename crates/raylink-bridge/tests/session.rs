use std::sync::Arc;
use std::time::Duration;

use raylink_bridge::{
    BridgeError, CallKind, EngineWorker, LoopState, Session, SessionConfig, SessionError,
    StopReason, Worker, WorkerOptions,
};
use raylink_engine::{ModuleBytes, ModuleLoader, ModuleSource, RenderOptions};

/// Counts frames at offset 8 and pool workers at offset 4; traps if the render options cannot be
/// read.
const ENGINE_WAT: &str = r#"
(module
  (import "env" "memory" (memory 1 16 shared))
  (import "env" "render_options_len" (func $options_len (result i32)))
  (import "env" "render_options_read" (func $options_read (param i32 i32) (result i32)))

  (func (export "init_thread_pool") (param $threads i32)
    (i32.atomic.store (i32.const 0) (local.get $threads)))

  (func (export "pool_worker") (param $index i32)
    (drop (i32.atomic.rmw.add (i32.const 4) (i32.const 1))))

  (func (export "render_image")
    (if (i32.ne
          (call $options_read (i32.const 1024) (call $options_len))
          (call $options_len))
      (then unreachable))
    (drop (i32.atomic.rmw.add (i32.const 8) (i32.const 1))))

  (func (export "start"))
)
"#;

fn source(wat: &str) -> ModuleSource {
    ModuleSource::Bytes(ModuleBytes::from_bytes(wat.as_bytes()).unwrap())
}

fn config(module: ModuleSource) -> SessionConfig {
    SessionConfig {
        module,
        options: RenderOptions::demo(64, 48),
        worker: WorkerOptions {
            parallelism: Some(2),
            ..WorkerOptions::default()
        },
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bootstrap_sequence_succeeds_and_keeps_rendering() {
    let session = Session::bootstrap(config(source(ENGINE_WAT))).await.unwrap();
    let mut monitor = session.monitor();

    assert!(monitor.frames() >= 1);
    assert!(monitor.wait_for_frames(10).await);
    assert_eq!(session.memory().pages(), 1);

    session.shutdown().await.unwrap();
    assert_eq!(monitor.state(), LoopState::Stopped(StopReason::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_init_does_not_resize_the_shared_memory() {
    let options: Arc<str> = RenderOptions::default().to_json().unwrap().into();
    let module = source(ENGINE_WAT);
    let primary = ModuleLoader::new(module.load().unwrap(), Arc::clone(&options))
        .load(None)
        .unwrap();
    let memory = primary.memory().clone();
    let before = memory.size_bytes();

    let (worker, client) = Worker::spawn(WorkerOptions::default(), {
        let module = module.clone();
        move || EngineWorker::new(module, options)
    })
    .unwrap();

    client.init(memory.clone()).await.unwrap();
    assert_eq!(memory.size_bytes(), before);

    client.init_thread_pool().await.unwrap();
    client.render_image().await.unwrap();
    assert_eq!(memory.size_bytes(), before);

    worker.terminate().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_with_a_different_module_fails_init() {
    let options: Arc<str> = Arc::from("{}");
    let primary = ModuleLoader::new(source(ENGINE_WAT).load().unwrap(), Arc::clone(&options))
        .load(None)
        .unwrap();

    let other = source(&ENGINE_WAT.replace("(func (export \"start\"))", ""));
    let (worker, client) =
        Worker::spawn(WorkerOptions::default(), move || EngineWorker::new(other, options))
            .unwrap();

    let err = client.init(primary.memory().clone()).await.unwrap_err();
    match err {
        BridgeError::Remote { call, message } => {
            assert_eq!(call, CallKind::Init);
            assert!(message.contains("digest"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    worker.terminate().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trapping_first_frame_fails_the_bootstrap() {
    let trapping = ENGINE_WAT.replace(
        "(drop (i32.atomic.rmw.add (i32.const 8) (i32.const 1))))",
        "unreachable)",
    );
    let err = Session::bootstrap(config(source(&trapping)))
        .await
        .err()
        .expect("first frame traps");

    assert!(
        matches!(
            err,
            SessionError::Bridge(BridgeError::Remote {
                call: CallKind::RenderImage,
                ..
            })
        ),
        "{err}"
    );
}

#[tokio::test]
async fn invalid_options_are_rejected_before_anything_loads() {
    let mut options = RenderOptions::demo(64, 48);
    options.width = 0;
    let err = Session::bootstrap(SessionConfig {
        options,
        ..config(source(ENGINE_WAT))
    })
    .await
    .err()
    .expect("invalid options");

    assert!(matches!(err, SessionError::Options(_)), "{err}");
}

#[tokio::test]
async fn shutdown_stops_the_loop_within_a_bounded_time() {
    let session = Session::bootstrap(config(source(ENGINE_WAT))).await.unwrap();
    let mut monitor = session.monitor();
    assert!(monitor.wait_for_frames(3).await);

    tokio::time::timeout(Duration::from_secs(10), session.shutdown())
        .await
        .expect("shutdown completed")
        .unwrap();
    assert!(monitor.state().is_stopped());
}
