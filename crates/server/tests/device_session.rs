//! End-to-end device session tests over real TCP.
//!
//! Drives the server exactly the way the signal-head firmware does:
//! register, upload a frame in acknowledged chunks, poll the output
//! vector, exit.

use phase_scheduler::SchedulerConfig;
use server::{run_with_listener, ServerConfig};
use signal_protocol::{send_frame, MessageStream, ACK};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

async fn start_server(data_root: &Path) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        data_root: data_root.to_path_buf(),
        scheduler: SchedulerConfig {
            tick_interval_ms: 50,
            ..SchedulerConfig::default()
        },
        ..ServerConfig::default()
    };
    tokio::spawn(async move {
        let _ = run_with_listener(listener, config).await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> MessageStream<TcpStream> {
    MessageStream::new(TcpStream::connect(addr).await.unwrap())
}

#[tokio::test]
async fn full_device_session_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path()).await;

    let mut device = connect(addr).await;
    device.send_text("east").await.unwrap();
    assert_eq!(device.recv().await.unwrap(), b"1");

    // upload a frame: header plus two acknowledged 512-byte chunks
    let frame: Vec<u8> = (0..1024u32).map(|i| (i * 7 % 256) as u8).collect();
    device.send_text("/send_image").await.unwrap();
    assert_eq!(device.recv().await.unwrap(), ACK.as_bytes());
    send_frame(&mut device, &frame).await.unwrap();

    // give the scheduler a few ticks to commit phase 0
    tokio::time::sleep(Duration::from_millis(250)).await;

    // east faces the north/south green, so it polls red
    device.send_text("/get_led").await.unwrap();
    assert_eq!(device.recv().await.unwrap(), b"0 0 0 1");

    device.send_text("/exit").await.unwrap();
    assert_eq!(device.recv().await.unwrap(), ACK.as_bytes());

    // the stored frame carries the full payload
    let site = dir.path().join("1");
    let stored = std::fs::read_dir(&site)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .find(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.starts_with("east") && name.ends_with(".jpg")
        })
        .expect("stored frame file");
    assert_eq!(std::fs::read(stored.path()).unwrap(), frame);

    // the aggregated decision record was published
    assert!(site.join("global.txt").is_file());
}

#[tokio::test]
async fn duplicate_registration_is_silently_refused() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path()).await;

    let mut first = connect(addr).await;
    first.send_text("east").await.unwrap();
    assert_eq!(first.recv().await.unwrap(), b"1");

    let mut second = connect(addr).await;
    second.send_text("east").await.unwrap();
    // no reply of any kind, the connection just closes
    assert!(second.recv().await.unwrap().is_empty());

    // the first session keeps serving
    first.send_text("/get_led").await.unwrap();
    let reply = first.recv().await.unwrap();
    assert_eq!(reply.iter().filter(|&&b| b == b' ').count(), 3);
}

#[tokio::test]
async fn unknown_identity_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path()).await;

    let mut device = connect(addr).await;
    device.send_text("zenith").await.unwrap();
    assert!(device.recv().await.unwrap().is_empty());
}
