// tests/helper_client_tests.rs
//! Helper client and session against a loopback HTTP helper

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use preview_core::dummy_backend::DummyHost;
use preview_core::{
    FontStore, HelperClient, HelperSession, HostFont, PreviewConfig, PreviewError,
    PreviewOrchestrator, PreviewService, VisibleItem,
};

const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR4nGNgYAAAAAMAASsJTYQAAAAASUVORK5CYII=";

const CATALOG: &str = r#"{"fonts": [
    {"name": "Nanum Gothic", "family": "Nanum Gothic", "style": "Regular",
     "postScriptName": "NanumGothic", "forceBitmap": true, "aliases": ["나눔고딕"]},
    {"name": "Missing Font", "forceBitmap": true, "apply": false},
    {"family": "no name"}
]}"#;

/// Requests seen by the fake helper: (method, path, body)
type Log = Arc<Mutex<Vec<(String, String, String)>>>;

struct FakeHelper {
    url: String,
    log: Log,
}

impl FakeHelper {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let log: Log = Arc::default();
        let server_log = Arc::clone(&log);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let log = Arc::clone(&server_log);
                thread::spawn(move || handle(stream, log));
            }
        });
        Self { url, log }
    }

    fn paths(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(_, path, _)| path.clone()).collect()
    }

    fn bodies_for(&self, path: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p, _)| p == path)
            .map(|(_, _, body)| body.clone())
            .collect()
    }
}

fn handle(stream: TcpStream, log: Log) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).unwrap();
    let body = String::from_utf8_lossy(&body).to_string();

    let path = target.split('?').next().unwrap_or_default().to_string();
    log.lock().unwrap().push((method, target.clone(), body.clone()));

    let (status, reply) = route(&path, &target, &body);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reply.len(),
        reply
    );
    let mut stream = stream;
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn route(path: &str, target: &str, body: &str) -> (&'static str, String) {
    match path {
        "/ping" => ("200 OK", r#"{"status": "ok"}"#.to_string()),
        "/fonts" => ("200 OK", CATALOG.to_string()),
        "/batch-preview" => {
            let request: serde_json::Value = serde_json::from_str(body).unwrap();
            let previews: Vec<serde_json::Value> = request["fonts"]
                .as_array()
                .unwrap()
                .iter()
                .filter(|font| font["name"] != "Missing Font")
                .map(|font| {
                    serde_json::json!({
                        "requestId": font["requestId"],
                        "image": PIXEL,
                        "fontName": font["name"],
                    })
                })
                .collect();
            ("200 OK", serde_json::json!({ "previews": previews }).to_string())
        }
        _ if path.starts_with("/preview/") => {
            assert!(target.contains("size=18"));
            ("200 OK", serde_json::json!({ "image": PIXEL }).to_string())
        }
        _ => ("404 Not Found", "{}".to_string()),
    }
}

fn host_font(name: &str, ps: &str) -> HostFont {
    HostFont {
        name: Some(name.to_string()),
        family: Some(name.to_string()),
        style: Some("Regular".to_string()),
        post_script_name: Some(ps.to_string()),
        ..HostFont::default()
    }
}

#[test]
fn test_client_endpoints() {
    let helper = FakeHelper::start();
    let client = HelperClient::new(helper.url.clone(), Duration::from_secs(5));
    assert!(!client.is_ready());
    assert!(client.wait_until_ready(Duration::from_secs(5), Duration::from_millis(20)));
    assert!(client.is_ready());

    let catalog = client.fetch_catalog();
    assert_eq!(catalog.len(), 2);
    assert!(catalog.contains("nanumgothic"));
    assert!(catalog.contains("나눔고딕"));

    let image = client.fetch_preview("Nanum Gothic", "가나다", 18).unwrap();
    assert_eq!(image.extension(), "png");
    assert!(helper.paths().iter().any(|p| p.starts_with("/preview/Nanum%20Gothic?")));
}

#[test]
fn test_status_error_maps_to_helper_status() {
    let helper = FakeHelper::start();
    let client = HelperClient::new(format!("{}/missing", helper.url), Duration::from_secs(5));
    match client.try_fetch_catalog() {
        Err(PreviewError::HelperStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected result: {:?}", other.map(|c| c.len())),
    }
}

#[test]
fn test_session_drives_full_cycle() {
    let helper = FakeHelper::start();
    let config = PreviewConfig::default().with_ready_timeout(5000, 20);
    let mut session = HelperSession::new(config.clone());
    assert!(session.attach(&helper.url));
    assert!(session.is_ready());
    assert_eq!(session.catalog().len(), 2);

    let host = DummyHost::with_fonts(vec![
        host_font("Nanum Gothic", "NanumGothic"),
        host_font("Nanum Gothic", "NanumGothic"),
        host_font("Missing Font", "MissingFont"),
    ]);
    let mut store = FontStore::new();
    store.load_from_host(&host).unwrap();
    assert_eq!(store.merge_catalog(session.catalog()), 3);
    assert!(!store.get("font-2").unwrap().can_apply);

    let mut orchestrator = PreviewOrchestrator::new(config, store);
    orchestrator.set_service(session.service());
    orchestrator.set_visible_items(vec![
        VisibleItem::new("font-0", 320),
        VisibleItem::new("font-1", 320),
        VisibleItem::new("font-2", 320),
    ]);

    let report = orchestrator.run_cycle().unwrap();
    assert_eq!(report.requested, 2);
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);

    let batch: serde_json::Value =
        serde_json::from_str(&helper.bodies_for("/batch-preview")[0]).unwrap();
    assert_eq!(batch["fonts"].as_array().unwrap().len(), 2);
    assert_eq!(batch["size"], 24);
    assert_eq!(batch["fonts"][0]["key"], "nanumgothic");

    // Known failure is not requested again
    assert!(orchestrator.run_cycle().is_none());
    assert_eq!(helper.bodies_for("/batch-preview").len(), 1);

    session.stop();
    assert!(!session.is_ready());
    assert!(session.catalog().is_empty());
}
