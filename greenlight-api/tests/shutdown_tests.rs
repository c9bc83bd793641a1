/// Graceful shutdown against a real listener
///
/// The coordinator is triggered through an injected future, so no process
/// signal is involved. The router uses a pool that never connects.

mod common;

use greenlight_api::app::build_router;
use greenlight_api::shutdown::{Coordinator, Phase};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const TASKS: usize = 8;

async fn healthcheck(addr: std::net::SocketAddr) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /v1/healthcheck HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_shutdown_drains_background_tasks_and_refuses_connections() {
    let state = common::offline_state();
    let background = state.background.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let coordinator = Coordinator::new(Duration::from_secs(5), background.clone());
    let mut phases = coordinator.subscribe();

    let (trigger, signal) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(coordinator.serve(listener, build_router(state), async move {
        let _ = signal.await;
    }));

    assert!(healthcheck(addr).await.starts_with("HTTP/1.1 200"));

    // Background work that cannot finish until released
    let (release, released) = tokio::sync::watch::channel(false);
    let completed = Arc::new(AtomicUsize::new(0));
    for _ in 0..TASKS {
        let mut released = released.clone();
        let completed = completed.clone();
        background.spawn("held", async move {
            released.wait_for(|go| *go).await?;
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    assert_eq!(background.in_flight(), TASKS);

    trigger.send(()).unwrap();
    phases.wait_for(|phase| *phase == Phase::Draining).await.unwrap();

    // The listener closes while background work is still pending
    let refused = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if TcpStream::connect(addr).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(refused.is_ok(), "listener still accepting after shutdown signal");
    assert!(!serving.is_finished());
    assert_eq!(background.in_flight(), TASKS);

    release.send(true).unwrap();
    serving.await.unwrap().unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), TASKS);
    assert_eq!(background.in_flight(), 0);
    assert_eq!(*phases.borrow(), Phase::Stopped);
}
