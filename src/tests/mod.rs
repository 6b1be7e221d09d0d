//! End-to-end tests that drive the real HTTP clients against a local stub
//! server and render through a PBM sink.


use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimal HTTP/1.1 responder bound to an ephemeral localhost port.
///
/// Every request target (path plus query) is recorded; the handler maps it
/// to a status code and body.
pub struct StubServer {
    pub base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&str) -> (u16, Vec<u8>) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let seen = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let handler = handler.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let head = String::from_utf8_lossy(&head);
                    let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    seen.lock().unwrap().push(target.clone());

                    let (status, body) = handler(&target);
                    let header = format!(
                        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        StubServer { base, requests }
    }

    /// Request targets received so far, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// HTTP client that never routes through a system proxy
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// StopMonitoring body listing the given UTC arrival times, BOM-prefixed
/// the way the live feed sends it.
pub fn stop_monitoring_body(stop_id: &str, times: &[&str]) -> Vec<u8> {
    let visits: Vec<String> = times
        .iter()
        .map(|t| {
            format!(
                r#"{{"RecordedAtTime":"2024-01-01T20:30:00Z","MonitoredVehicleJourney":{{"LineRef":"30","MonitoredCall":{{"StopPointRef":"{stop_id}","AimedArrivalTime":"{t}","ExpectedArrivalTime":"{t}"}}}}}}"#
            )
        })
        .collect();
    let json = format!(
        r#"{{"ServiceDelivery":{{"ResponseTimestamp":"2024-01-01T20:30:00Z","ProducerRef":"SF","Status":true,"StopMonitoringDelivery":{{"version":"1.4","Status":true,"MonitoredStopVisit":[{}]}}}}}}"#,
        visits.join(",")
    );

    let mut body = b"\xEF\xBB\xBF".to_vec();
    body.extend_from_slice(json.as_bytes());
    body
}

/// WeatherAPI `current.json` body
pub fn current_weather_body(temp_f: f64, text: &str) -> Vec<u8> {
    format!(
        r#"{{"location":{{"name":"San Francisco","tz_id":"America/Los_Angeles"}},"current":{{"temp_c":20.4,"temp_f":{temp_f},"condition":{{"text":"{text}","code":1003}},"humidity":72}}}}"#
    )
    .into_bytes()
}
