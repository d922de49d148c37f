use mc_runner::error::Error;
use mc_runner::status::codec;
use mc_runner::{SlpProbe, StatusProbe};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

const STATUS_JSON: &str = r#"{
    "version": {"name": "Paper 1.21.4", "protocol": 769},
    "players": {"max": 20, "online": 1, "sample": [{"name": "Alex", "id": "ec561538-f3fd-461d-aff5-086b22154bce"}]},
    "description": {"text": "A Minecraft Server"}
}"#;

/// Answer one status exchange the way a Minecraft server does.
async fn serve_status_once(listener: TcpListener, json: &'static str) {
    let (mut stream, _) = listener.accept().await.unwrap();

    let (id, handshake) = codec::read_packet(&mut stream).await.unwrap();
    assert_eq!(id, codec::HANDSHAKE_ID);
    // Protocol -1, then the host we were asked for
    assert_eq!(&handshake[..5], &[0xff, 0xff, 0xff, 0xff, 0x0f]);
    assert_eq!(codec::read_string(&handshake[5..]).unwrap(), "127.0.0.1");
    assert_eq!(handshake.last(), Some(&1));

    let (id, request) = codec::read_packet(&mut stream).await.unwrap();
    assert_eq!(id, codec::STATUS_REQUEST_ID);
    assert!(request.is_empty());

    let mut payload = Vec::new();
    codec::write_string(&mut payload, json);
    stream
        .write_all(&codec::frame(codec::STATUS_RESPONSE_ID, &payload))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_probe_reads_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve_status_once(listener, STATUS_JSON));

    let report = SlpProbe::new(Duration::from_secs(5))
        .probe("127.0.0.1", port)
        .await;

    assert_eq!(report.version.as_deref(), Some("Paper 1.21.4"));
    assert_eq!(report.online, Some(1));
    assert_eq!(report.max, Some(20));
    assert_eq!(report.sample, Some(vec!["Alex".to_string()]));

    server.await.unwrap();
}

#[tokio::test]
async fn test_probe_unreachable_port_is_unknown() {
    // Reserve a port, then free it so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let report = SlpProbe::new(Duration::from_secs(2))
        .probe("127.0.0.1", port)
        .await;
    assert!(report.is_unknown());
}

#[tokio::test]
async fn test_probe_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Hold the connection open without answering
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(stream);
    });

    let probe = SlpProbe::new(Duration::from_millis(200));
    let started = tokio::time::Instant::now();
    let result = probe.query("127.0.0.1", port).await;

    assert!(matches!(result, Err(Error::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(2));

    server.abort();
}

#[tokio::test]
async fn test_probe_malformed_reply_is_unknown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve_status_once(listener, "this is not json"));

    let report = SlpProbe::new(Duration::from_secs(5))
        .probe("127.0.0.1", port)
        .await;
    assert!(report.is_unknown());

    server.await.unwrap();
}
