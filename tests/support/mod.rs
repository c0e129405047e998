//! In-process server and fake upstream for the end-to-end tests

#![allow(dead_code)]

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::ext::ReasonPhrase;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use shimserve::config::{AppState, Config};
use shimserve::server;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub struct TestServer {
    pub addr: SocketAddr,
    pub root: TempDir,
    shutdown: Arc<Notify>,
}

/// Collected response
pub struct Reply {
    pub status: StatusCode,
    /// Non-canonical reason phrase, if the server sent one
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn header(&self, name: header::HeaderName) -> &str {
        self.headers
            .get(&name)
            .map_or("", |v| v.to_str().unwrap())
    }
}

impl TestServer {
    /// Serve `root` with `config` on an ephemeral loopback port
    pub async fn start(root: TempDir, mut config: Config) -> Self {
        config.site.root = root.path().to_str().unwrap().to_string();
        config.site.client_log_file = root
            .path()
            .join("browser.log")
            .to_str()
            .unwrap()
            .to_string();
        config.logging.access_log = false;

        let listener = server::create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(config).unwrap());
        let shutdown = Arc::new(Notify::new());
        tokio::spawn(server::run(listener, state, Arc::clone(&shutdown)));

        Self {
            addr,
            root,
            shutdown,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> Reply {
        self.request(Method::GET, path, headers, Bytes::new()).await
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Bytes,
    ) -> Reply {
        let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("http://{}{path}", self.addr));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = client.request(builder.body(Full::new(body)).unwrap()).await.unwrap();
        let status = response.status();
        let reason = response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned());
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        Reply {
            status,
            reason,
            headers,
            body,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

pub fn write_file(root: &Path, relative: &str, data: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, data).unwrap();
}

/// Byte pattern whose value at offset `i` is `i % 251`
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Upstream origin serving fixed bodies, honoring single ranges
pub struct FakeUpstream {
    pub addr: SocketAddr,
    /// (path, Range header) per request received
    pub seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl FakeUpstream {
    pub async fn start(files: HashMap<String, Bytes>) -> Self {
        Self::start_with_redirects(files, HashMap::new()).await
    }

    /// Like `start`, also answering each path in `redirects` with a 302 to its target
    pub async fn start_with_redirects(
        files: HashMap<String, Bytes>,
        redirects: HashMap<String, String>,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let files = Arc::new(files);
        let redirects = Arc::new(redirects);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_task = Arc::clone(&seen);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let files = Arc::clone(&files);
                let redirects = Arc::clone(&redirects);
                let seen = Arc::clone(&seen_task);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let reply = serve_fixture(&files, &redirects, &seen, &req);
                        async move { Ok::<_, Infallible>(reply) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, seen }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn range_seen_for(&self, path: &str) -> Option<Option<String>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, r)| r.clone())
    }
}

fn serve_fixture(
    files: &HashMap<String, Bytes>,
    redirects: &HashMap<String, String>,
    seen: &Mutex<Vec<(String, Option<String>)>>,
    req: &Request<Incoming>,
) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();
    let range = req
        .headers()
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    seen.lock().unwrap().push((path.clone(), range.clone()));

    if let Some(target) = redirects.get(&path) {
        return Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, target.as_str())
            .body(Full::new(Bytes::new()))
            .unwrap();
    }

    let Some(body) = files.get(&path) else {
        let mut response = Response::new(Full::new(Bytes::from_static(b"upstream says no")));
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
            .extensions_mut()
            .insert(ReasonPhrase::from_static(b"Nothing Here"));
        return response;
    };

    let total = body.len() as u64;
    match shimserve::http::parse_range_header(range.as_deref(), total) {
        Ok(Some(window)) => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, window.content_range())
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Full::new(Bytes::copy_from_slice(window.slice(body))))
            .unwrap(),
        Ok(None) => {
            let mut response = Response::new(Full::new(body.clone()));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/javascript"),
            );
            response
        }
        Err(unsatisfiable) => Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, unsatisfiable.content_range())
            .body(Full::new(Bytes::new()))
            .unwrap(),
    }
}

/// A port with nothing listening on it
pub fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
