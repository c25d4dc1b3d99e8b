//! Server end-to-end tests
//!
//! Starts a real server on a random port and talks to it over HTTP, both
//! with a plain reqwest client and with the bundled conversion client.

mod common;

use std::time::Duration;

use bc_client::{ClientSession, ConversionCounter, ConvertClient, Converter, MemorySink, TokenBalance, UploadFile};
use bc_core::config::ClientConfig;
use common::{TestHarness, FAILING_SCRIPT, PREFIX_SCRIPT};
use reqwest::multipart::{Form, Part};

fn client_config(addr: std::net::SocketAddr, state_dir: &std::path::Path) -> ClientConfig {
    ClientConfig {
        server_url: format!("http://{addr}"),
        char_delay_ms: 0,
        state_dir: state_dir.to_path_buf(),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn test_upload_over_http() {
    let (harness, addr) = TestHarness::with_server(PREFIX_SCRIPT).await;

    let part = Part::bytes(b"track bytes".to_vec())
        .file_name("track.mp3")
        .mime_str("audio/mpeg")
        .unwrap();
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/convert"))
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "audio/opus");
    assert!(response.headers().contains_key("x-request-id"));
    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..], b"OPUStrack bytes");

    let leftover = harness.wait_for_empty_scratch().await;
    assert!(leftover.is_empty(), "scratch files left behind: {leftover:?}");
}

#[tokio::test]
async fn test_concurrent_uploads_do_not_collide() {
    let (harness, addr) = TestHarness::with_server(PREFIX_SCRIPT).await;
    let client = ConvertClient::new(&format!("http://{addr}"));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let payload = format!("payload-{i}").into_bytes();
            let file = UploadFile {
                name: format!("track-{i}.mp3"),
                mime: "audio/mpeg".into(),
                data: payload.clone(),
            };
            let artifact = client.convert(&file).await.unwrap();
            (payload, artifact.data)
        }));
    }

    for task in tasks {
        let (payload, data) = task.await.unwrap();
        let mut expected = b"OPUS".to_vec();
        expected.extend_from_slice(&payload);
        assert_eq!(data, expected);
    }

    assert!(harness.wait_for_empty_scratch().await.is_empty());
}

#[tokio::test]
async fn test_client_reports_server_errors() {
    let (_harness, addr) = TestHarness::with_server(FAILING_SCRIPT).await;
    let client = ConvertClient::new(&format!("http://{addr}"));
    let file = UploadFile {
        name: "track.mp3".into(),
        mime: "audio/mpeg".into(),
        data: b"audio".to_vec(),
    };

    let err = client.convert(&file).await.unwrap_err();
    match err {
        bc_core::Error::Remote { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "conversion failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_converter_saves_and_counts() {
    let (harness, addr) = TestHarness::with_server(PREFIX_SCRIPT).await;
    let input = harness.dir().join("song.mp3");
    std::fs::write(&input, b"song").unwrap();
    let state_dir = harness.dir().join("state");
    let out_dir = harness.dir().join("out");

    let config = client_config(addr, &state_dir);
    let sink = MemorySink::new();
    let converter = Converter::new(&config, ClientSession::from_config(&config), sink.clone())
        .with_output_dir(&out_dir);

    let report = converter.convert(&input).await.unwrap();
    assert_eq!(report.output_path, out_dir.join("beatscoin.opus"));
    assert_eq!(std::fs::read(&report.output_path).unwrap(), b"OPUSsong");
    assert_eq!(report.input_bytes, 4);
    assert_eq!(report.output_bytes, 8);
    assert_eq!(report.count, 1);
    assert_eq!(report.balance, 0);

    let log = sink.contents();
    assert!(log.starts_with("File name: song.mp3\nFormat: audio/mpeg\nInitial size: 0.00 KB\n"));
    assert!(log.contains("Beatscoin processing..."));
    assert!(log.contains("Final size: 0.01 KB"));
    assert!(log.ends_with("Download complete\n"));

    assert_eq!(ConversionCounter::load(&state_dir).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_line_follows_save_on_worker_threads() {
    let (harness, addr) = TestHarness::with_server(PREFIX_SCRIPT).await;
    let input = harness.dir().join("song.mp3");
    std::fs::write(&input, b"song").unwrap();

    let config = client_config(addr, &harness.dir().join("state"));
    let sink = MemorySink::new();
    let converter = Converter::new(&config, ClientSession::from_config(&config), sink.clone())
        .with_output_dir(harness.dir().join("out"));

    let report = converter.convert(&input).await.unwrap();
    assert!(report.output_path.exists());
    assert!(sink.contents().ends_with("Download complete\n"));
    assert_eq!(converter.session().count(), 1);
}

#[tokio::test]
async fn test_converter_failure_leaves_state_alone() {
    let (harness, addr) = TestHarness::with_server(FAILING_SCRIPT).await;
    let input = harness.dir().join("song.mp3");
    std::fs::write(&input, b"song").unwrap();
    let state_dir = harness.dir().join("state");
    let out_dir = harness.dir().join("out");

    let config = client_config(addr, &state_dir);
    let session = ClientSession::from_config(&config);
    let sink = MemorySink::new();
    let converter = Converter::new(&config, session.clone(), sink.clone())
        .with_output_dir(&out_dir)
        .with_char_delay(Duration::from_millis(5));

    let err = converter.convert(&input).await.unwrap_err();
    assert!(matches!(err, bc_core::Error::Remote { status: 500, .. }));

    assert!(!out_dir.join("beatscoin.opus").exists());
    assert_eq!(session.count(), 0);
    assert_eq!(session.balance(), 5);
    assert!(!sink.contents().contains("Download complete"));
    assert_eq!(ConversionCounter::load(&state_dir).count(), 0);
}

#[tokio::test]
async fn test_converter_refuses_without_tokens() {
    let (harness, addr) = TestHarness::with_server(PREFIX_SCRIPT).await;
    let input = harness.dir().join("song.mp3");
    std::fs::write(&input, b"song").unwrap();

    let config = client_config(addr, &harness.dir().join("state"));
    let session = ClientSession::new(TokenBalance::new(0), ConversionCounter::load(&config.state_dir));
    let converter = Converter::new(&config, session, MemorySink::new());

    let err = converter.convert(&input).await.unwrap_err();
    assert!(matches!(err, bc_core::Error::InsufficientTokens { balance: 0, cost: 5 }));
    assert!(!harness.encoder_ran());
}

#[tokio::test]
async fn test_each_conversion_gets_its_own_file() {
    let (harness, addr) = TestHarness::with_server(PREFIX_SCRIPT).await;
    let a = harness.dir().join("a.mp3");
    let b = harness.dir().join("b.mp3");
    std::fs::write(&a, b"first").unwrap();
    std::fs::write(&b, b"second").unwrap();

    let config = ClientConfig {
        starting_tokens: 10,
        ..client_config(addr, &harness.dir().join("state"))
    };
    let out = harness.dir().join("out");
    let converter = Converter::new(&config, ClientSession::from_config(&config), MemorySink::new())
        .with_output_dir(&out);

    let first = converter.convert(&a).await.unwrap();
    let second = converter.convert(&b).await.unwrap();

    assert_eq!(first.output_path, out.join("beatscoin.opus"));
    assert_eq!(second.output_path, out.join("beatscoin (1).opus"));
    assert_eq!(std::fs::read(&first.output_path).unwrap(), b"OPUSfirst");
    assert_eq!(std::fs::read(&second.output_path).unwrap(), b"OPUSsecond");
    assert_eq!(second.count, 2);
    assert_eq!(second.balance, 0);
}

#[tokio::test]
async fn test_second_conversion_needs_a_top_up() {
    let (harness, addr) = TestHarness::with_server(PREFIX_SCRIPT).await;
    let input = harness.dir().join("song.mp3");
    std::fs::write(&input, b"song").unwrap();

    let config = client_config(addr, &harness.dir().join("state"));
    let converter = Converter::new(&config, ClientSession::from_config(&config), MemorySink::new())
        .with_output_dir(harness.dir().join("out"));

    converter.convert(&input).await.unwrap();
    assert!(converter.convert(&input).await.is_err());

    converter.session().credit(5);
    let report = converter.convert(&input).await.unwrap();
    assert_eq!(report.count, 2);
}
