//! Full-cycle tests against loopback HTTP stubs.
//!
//! The stubs stand in for Cloudinary and the collection backend, so the
//! whole capture -> upload -> measure -> post path runs for real, minus
//! hardware and network.

use agos_edge::camera::Camera;
use agos_edge::monitor::MonitorLoop;
use agos_edge::sensor::{DistanceSensor, MOCK_BAND_CM};
use agos_edge::uploader::ImageUploader;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Minimal HTTP/1.1 stub. Answers every request with `status` + `body` and
/// forwards each request body to `tx`.
async fn spawn_stub(
    status: &'static str,
    body: &'static str,
    tx: mpsc::UnboundedSender<String>,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];

                let (headers_end, content_length, chunked) = loop {
                    let n = stream.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                        let content_length = head
                            .lines()
                            .find_map(|line| {
                                line.strip_prefix("content-length:")
                                    .and_then(|v| v.trim().parse::<usize>().ok())
                            })
                            .unwrap_or(0);
                        let chunked = head.contains("transfer-encoding: chunked");
                        break (pos + 4, content_length, chunked);
                    }
                };

                if chunked {
                    while !buf.ends_with(b"0\r\n\r\n") {
                        let n = stream.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                    }
                } else {
                    while buf.len() < headers_end + content_length {
                        let n = stream.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }

                let _ = tx.send(String::from_utf8_lossy(&buf[headers_end..]).to_string());

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn temp_frame_files() -> BTreeSet<PathBuf> {
    std::fs::read_dir(std::env::temp_dir())
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with("agos-frame-"))
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn mock_monitor(upload_base: &str, server_url: String) -> MonitorLoop {
    let camera = Camera::detect(true, false, PathBuf::from("no-placeholder.jpg")).await;
    let sensor = DistanceSensor::new(true);
    let uploader = ImageUploader::new(
        "testcloud".to_string(),
        "key".to_string(),
        "secret".to_string(),
    )
    .with_api_base(upload_base);

    MonitorLoop::new(
        camera,
        sensor,
        uploader,
        server_url,
        1,
        Arc::new(AtomicBool::new(false)),
    )
}

/// The scenarios share the process-wide temp dir, so they run sequentially
/// inside one test body to keep the leftover-file assertions exact.
#[tokio::test]
async fn test_cycle_scenarios() {
    let frames_before = temp_frame_files();

    // Full success: upload returns a URL, the backend receives one reading
    {
        let (upload_tx, _upload_rx) = mpsc::unbounded_channel();
        let upload_base = spawn_stub(
            "200 OK",
            r#"{"secure_url":"https://res.cloudinary.test/agos/frame.jpg"}"#,
            upload_tx,
        )
        .await;

        let (backend_tx, mut backend_rx) = mpsc::unbounded_channel();
        let backend = spawn_stub("200 OK", r#"{"ok":true}"#, backend_tx).await;

        let monitor = mock_monitor(&upload_base, format!("{}/data", backend)).await;
        monitor.run_cycle().await;

        let posted = backend_rx.try_recv().expect("backend should receive one reading");
        assert!(backend_rx.try_recv().is_err(), "exactly one POST per cycle");

        let reading: serde_json::Value = serde_json::from_str(&posted).unwrap();
        assert_eq!(reading["sensor_device_id"], 1);
        assert_eq!(reading["signal_strength"], 100);
        let distance = reading["raw_distance_cm"].as_f64().unwrap();
        assert!((MOCK_BAND_CM.0..=MOCK_BAND_CM.1).contains(&distance));
        let timestamp = reading["timestamp"].as_str().unwrap();
        assert_eq!(timestamp.len(), 20);
        assert!(timestamp.ends_with('Z'));
    }

    // Upload response without secure_url: no backend POST for that cycle
    {
        let (upload_tx, _upload_rx) = mpsc::unbounded_channel();
        let upload_base = spawn_stub("200 OK", r#"{"public_id":"agos/frame"}"#, upload_tx).await;

        let (backend_tx, mut backend_rx) = mpsc::unbounded_channel();
        let backend = spawn_stub("200 OK", r#"{"ok":true}"#, backend_tx).await;

        let monitor = mock_monitor(&upload_base, format!("{}/data", backend)).await;
        monitor.run_cycle().await;

        assert!(
            backend_rx.try_recv().is_err(),
            "a failed upload must suppress the backend POST"
        );
    }

    // Upload transport fault (nothing listening): same suppression
    {
        let (backend_tx, mut backend_rx) = mpsc::unbounded_channel();
        let backend = spawn_stub("200 OK", r#"{"ok":true}"#, backend_tx).await;

        let monitor = mock_monitor("http://127.0.0.1:1", format!("{}/data", backend)).await;
        monitor.run_cycle().await;

        assert!(backend_rx.try_recv().is_err());
    }

    // Cleanup invariant: no cycle above left its temp frame behind
    let frames_after = temp_frame_files();
    let leftovers: Vec<_> = frames_after.difference(&frames_before).collect();
    assert!(leftovers.is_empty(), "leftover temp frames: {:?}", leftovers);
}

#[tokio::test]
async fn test_uploader_returns_secure_url() {
    let dir = tempfile::tempdir().unwrap();
    let frame = dir.path().join("frame.jpg");
    std::fs::write(&frame, b"\xFF\xD8fake\xFF\xD9").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let base = spawn_stub(
        "200 OK",
        r#"{"secure_url":"https://res.cloudinary.test/agos/frame.jpg"}"#,
        tx,
    )
    .await;

    let uploader = ImageUploader::new(
        "testcloud".to_string(),
        "key".to_string(),
        "secret".to_string(),
    )
    .with_api_base(base);

    let url = uploader.upload(&frame).await.unwrap();
    assert_eq!(url, "https://res.cloudinary.test/agos/frame.jpg");

    // The multipart body carries the signed parameters
    let request_body = rx.try_recv().unwrap();
    assert!(request_body.contains("name=\"api_key\""));
    assert!(request_body.contains("name=\"signature\""));
    assert!(request_body.contains("name=\"folder\""));
    assert!(request_body.contains("agos"));
}

#[tokio::test]
async fn test_uploader_rejects_error_status() {
    let dir = tempfile::tempdir().unwrap();
    let frame = dir.path().join("frame.jpg");
    std::fs::write(&frame, b"\xFF\xD8fake\xFF\xD9").unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let base = spawn_stub("500 Internal Server Error", r#"{"error":"boom"}"#, tx).await;

    let uploader = ImageUploader::new(
        "testcloud".to_string(),
        "key".to_string(),
        "secret".to_string(),
    )
    .with_api_base(base);

    let err = uploader.upload(&frame).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("frame.jpg"), "error names the file: {}", message);
    assert!(message.contains("500"), "error carries the status: {}", message);
}
