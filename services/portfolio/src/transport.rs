use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    sync::{Arc, Mutex, mpsc},
    time::{Duration, Instant},
};

use routing::{AliasScope, StoreAlias, StoreRouter, active_alias};

use crate::{
    api::{
        PhotoApiResponse, json_escape, parse_photo_request, render_photo_list_json,
        render_photo_response_json,
    },
    store::{PhotoFilter, RoutedCatalog, Season, StoreError},
};

pub(crate) type SharedRuntime = Arc<Mutex<PortfolioRuntime>>;
const MAX_HTTP_BODY_BYTES: usize = 1024 * 1024;
const SOCKET_TIMEOUT_SECS: u64 = 5;
const DEFAULT_HTTP_WORKERS: usize = 4;

pub struct PortfolioRuntime {
    catalog: RoutedCatalog,
    http_requests_total: u64,
    routed_primary_total: u64,
    routed_secondary_total: u64,
    upload_success_total: u64,
    upload_failure_total: u64,
    started_at: Instant,
}

impl PortfolioRuntime {
    pub fn new(router: StoreRouter) -> Self {
        Self {
            catalog: RoutedCatalog::new(router),
            http_requests_total: 0,
            routed_primary_total: 0,
            routed_secondary_total: 0,
            upload_success_total: 0,
            upload_failure_total: 0,
            started_at: Instant::now(),
        }
    }

    pub fn catalog(&self) -> &RoutedCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut RoutedCatalog {
        &mut self.catalog
    }

    fn observe_routed(&mut self, alias: StoreAlias) {
        match alias {
            StoreAlias::Primary => self.routed_primary_total += 1,
            StoreAlias::Secondary => self.routed_secondary_total += 1,
        }
    }

    fn upload(
        &mut self,
        record: crate::store::PhotoRecord,
    ) -> Result<PhotoApiResponse, StoreError> {
        let photo_id = record.photo_id.clone();
        let (alias, photos_total) = self.catalog.insert_photo(record)?;
        self.observe_routed(alias);
        self.upload_success_total += 1;
        Ok(PhotoApiResponse {
            stored_photo_id: photo_id,
            store_alias: alias,
            photos_total,
        })
    }

    fn list(&mut self, filter: &PhotoFilter) -> (StoreAlias, Vec<crate::store::PhotoRecord>) {
        let (alias, photos) = self.catalog.list_photos(filter);
        self.observe_routed(alias);
        (alias, photos)
    }

    fn metrics_text(&self) -> String {
        format!(
            "# TYPE portfolio_http_requests_total counter\n\
portfolio_http_requests_total {}\n\
# TYPE portfolio_routed_primary_total counter\n\
portfolio_routed_primary_total {}\n\
# TYPE portfolio_routed_secondary_total counter\n\
portfolio_routed_secondary_total {}\n\
# TYPE portfolio_upload_success_total counter\n\
portfolio_upload_success_total {}\n\
# TYPE portfolio_upload_failure_total counter\n\
portfolio_upload_failure_total {}\n\
# TYPE portfolio_photos_primary_total gauge\n\
portfolio_photos_primary_total {}\n\
# TYPE portfolio_photos_secondary_total gauge\n\
portfolio_photos_secondary_total {}\n\
# TYPE portfolio_uptime_seconds gauge\n\
portfolio_uptime_seconds {:.4}\n",
            self.http_requests_total,
            self.routed_primary_total,
            self.routed_secondary_total,
            self.upload_success_total,
            self.upload_failure_total,
            self.catalog.store(StoreAlias::Primary).len(),
            self.catalog.store(StoreAlias::Secondary).len(),
            self.started_at.elapsed().as_secs_f64()
        )
    }

    fn routing_debug_json(&self) -> String {
        let config = self.catalog.router().config();
        format!(
            "{{\"default_alias\":\"{}\",\"mode_override\":{},\"active_alias\":{},\"resolved_alias\":\"{}\",\"primary_hosts\":{},\"secondary_hosts\":{}}}",
            config.default_alias.as_str(),
            config
                .mode_override
                .map(|alias| format!("\"{}\"", alias.as_str()))
                .unwrap_or_else(|| "null".to_string()),
            active_alias()
                .map(|alias| format!("\"{}\"", alias.as_str()))
                .unwrap_or_else(|| "null".to_string()),
            config.resolve_current_alias().as_str(),
            config.primary_hosts.len(),
            config.secondary_hosts.len()
        )
    }
}

pub fn serve_http(runtime: PortfolioRuntime, bind_addr: &str) -> std::io::Result<()> {
    serve_http_with_workers(runtime, bind_addr, DEFAULT_HTTP_WORKERS)
}

pub fn serve_http_with_workers(
    runtime: PortfolioRuntime,
    bind_addr: &str,
    worker_count: usize,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    let worker_count = worker_count.max(1);
    let runtime = Arc::new(Mutex::new(runtime));
    let (tx, rx) = mpsc::channel::<TcpStream>();
    let rx = Arc::new(Mutex::new(rx));

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let runtime = Arc::clone(&runtime);
            let rx = Arc::clone(&rx);
            scope.spawn(move || {
                loop {
                    let stream = {
                        let guard = match rx.lock() {
                            Ok(guard) => guard,
                            Err(_) => break,
                        };
                        match guard.recv() {
                            Ok(stream) => stream,
                            Err(_) => break,
                        }
                    };
                    if let Err(err) = handle_connection(&runtime, stream) {
                        eprintln!("portfolio transport error: {err}");
                    }
                }
            });
        }

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if tx.send(stream).is_err() {
                        eprintln!("portfolio transport worker queue closed");
                        break;
                    }
                }
                Err(err) => eprintln!("portfolio transport accept error: {err}"),
            }
        }
        drop(tx);
    });

    Ok(())
}

pub fn handle_http_request_bytes(
    runtime: &Arc<Mutex<PortfolioRuntime>>,
    raw_request: &[u8],
) -> Result<Vec<u8>, String> {
    let request_text =
        std::str::from_utf8(raw_request).map_err(|_| "request must be valid UTF-8".to_string())?;
    let (header_block, body) = request_text
        .split_once("\r\n\r\n")
        .ok_or_else(|| "missing HTTP header terminator".to_string())?;

    let mut lines = header_block.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| "missing request line".to_string())?;
    let (method, target) = parse_request_line(request_line)?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| "invalid HTTP header".to_string())?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let content_length = match headers.get("content-length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| "invalid content-length header".to_string())?,
        None => 0,
    };
    if content_length > MAX_HTTP_BODY_BYTES {
        return Err(format!(
            "content-length exceeds max body size ({MAX_HTTP_BODY_BYTES} bytes)"
        ));
    }
    if content_length != body.len() {
        return Err("content-length does not match body size".to_string());
    }

    let request = HttpRequest {
        method,
        target,
        headers,
        body: body.as_bytes().to_vec(),
    };
    let response = route_request(runtime, &request);
    Ok(render_response_text(&response).into_bytes())
}

fn handle_connection(runtime: &SharedRuntime, mut stream: TcpStream) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)))?;
    stream.set_write_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)))?;

    let request = match read_http_request(&mut stream) {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(()),
        Err(err) => return write_response(&mut stream, HttpResponse::bad_request(&err)),
    };

    let response = route_request(runtime, &request);
    write_response(&mut stream, response)
}

/// The one hook point of the routing core: the Host header resolves the store
/// alias, the alias is held in a request scope for the whole handler, and the
/// scope guard restores the previous value on every exit path.
pub(crate) fn route_request(runtime: &SharedRuntime, request: &HttpRequest) -> HttpResponse {
    let alias = {
        let Ok(guard) = runtime.lock() else {
            return HttpResponse::internal_server_error(
                "failed to acquire portfolio runtime lock",
            );
        };
        let host = request.headers.get("host").map(String::as_str).unwrap_or("");
        guard.catalog.router().alias_for_host(host)
    };
    let _scope = AliasScope::enter(alias);
    handle_request(runtime, request)
}

pub(crate) fn handle_request(runtime: &SharedRuntime, request: &HttpRequest) -> HttpResponse {
    let (path, query) = split_target(&request.target);
    if let Ok(mut guard) = runtime.lock() {
        guard.http_requests_total += 1;
    }
    match (request.method.as_str(), path.as_str()) {
        ("GET", "/health") => HttpResponse::ok_json("{\"status\":\"ok\"}".to_string()),
        ("GET", "/metrics") => {
            let body = match runtime.lock() {
                Ok(rt) => rt.metrics_text(),
                Err(_) => "portfolio_metrics_unavailable 1\n".to_string(),
            };
            HttpResponse::ok_text(body)
        }
        ("GET", "/debug/routing") => match runtime.lock() {
            Ok(rt) => HttpResponse::ok_json(rt.routing_debug_json()),
            Err(_) => HttpResponse::internal_server_error(
                "failed to acquire portfolio runtime lock",
            ),
        },
        ("POST", "/v1/photos") => {
            if let Some(content_type) = request.headers.get("content-type")
                && !content_type
                    .to_ascii_lowercase()
                    .contains("application/json")
            {
                return HttpResponse::bad_request(
                    "content-type must include application/json for POST /v1/photos",
                );
            }
            let body = match std::str::from_utf8(&request.body) {
                Ok(body) => body,
                Err(_) => return HttpResponse::bad_request("request body must be valid UTF-8"),
            };
            let record = match parse_photo_request(body) {
                Ok(record) => record,
                Err(err) => return HttpResponse::bad_request(&err),
            };
            let mut guard = match runtime.lock() {
                Ok(guard) => guard,
                Err(_) => {
                    return HttpResponse::internal_server_error(
                        "failed to acquire portfolio runtime lock",
                    );
                }
            };
            match guard.upload(record) {
                Ok(resp) => HttpResponse::ok_json(render_photo_response_json(&resp)),
                Err(err) => {
                    guard.upload_failure_total += 1;
                    let (status, message) = map_store_error(&err);
                    HttpResponse::error_with_status(status, &message)
                }
            }
        }
        ("GET", "/v1/photos") => {
            let filter = match photo_filter_from_query(&query) {
                Ok(filter) => filter,
                Err(err) => return HttpResponse::bad_request(&err),
            };
            let mut guard = match runtime.lock() {
                Ok(guard) => guard,
                Err(_) => {
                    return HttpResponse::internal_server_error(
                        "failed to acquire portfolio runtime lock",
                    );
                }
            };
            let (alias, photos) = guard.list(&filter);
            HttpResponse::ok_json(render_photo_list_json(alias, &photos))
        }
        (_, "/v1/photos") => HttpResponse::method_not_allowed("only GET and POST are supported"),
        (_, "/health") | (_, "/metrics") | (_, "/debug/routing") => {
            HttpResponse::method_not_allowed("only GET is supported")
        }
        _ => HttpResponse::not_found("unknown path"),
    }
}

fn photo_filter_from_query(query: &HashMap<String, String>) -> Result<PhotoFilter, String> {
    let season = match query.get("season") {
        Some(raw) => Some(
            Season::parse(raw)
                .ok_or_else(|| "season must be one of: spring, summer, autumn, winter".to_string())?,
        ),
        None => None,
    };
    Ok(PhotoFilter {
        season,
        zone: query.get("zone").cloned().filter(|zone| !zone.is_empty()),
        tag: query.get("tag").cloned().filter(|tag| !tag.is_empty()),
    })
}

fn map_store_error(error: &StoreError) -> (u16, String) {
    match error {
        StoreError::Validation(message) => (400, format!("validation error: {message}")),
        StoreError::DuplicatePhoto(photo_id) => {
            (409, format!("photo already exists: {photo_id}"))
        }
    }
}

fn read_http_request(stream: &mut TcpStream) -> Result<Option<HttpRequest>, String> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    let bytes = reader
        .read_line(&mut request_line)
        .map_err(|e| e.to_string())?;
    if bytes == 0 {
        return Ok(None);
    }

    let (method, target) = parse_request_line(&request_line)?;

    let mut headers = HashMap::new();
    loop {
        let mut header_line = String::new();
        let bytes = reader
            .read_line(&mut header_line)
            .map_err(|e| e.to_string())?;
        if bytes == 0 || header_line == "\r\n" {
            break;
        }
        let (name, value) = header_line
            .split_once(':')
            .ok_or_else(|| "invalid HTTP header".to_string())?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let content_length = match headers.get("content-length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| "invalid content-length header".to_string())?,
        None => 0,
    };
    if content_length > MAX_HTTP_BODY_BYTES {
        return Err(format!(
            "content-length exceeds max body size ({MAX_HTTP_BODY_BYTES} bytes)"
        ));
    }
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).map_err(|e| e.to_string())?;
    }

    Ok(Some(HttpRequest {
        method,
        target,
        headers,
        body,
    }))
}

fn parse_request_line(line: &str) -> Result<(String, String), String> {
    let line = line.trim();
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| "missing HTTP method".to_string())?;
    let target = parts
        .next()
        .ok_or_else(|| "missing HTTP target".to_string())?;
    let version = parts
        .next()
        .ok_or_else(|| "missing HTTP version".to_string())?;
    if !version.starts_with("HTTP/1.") {
        return Err("unsupported HTTP version".to_string());
    }
    Ok((method.to_string(), target.to_string()))
}

fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = target
        .split_once('?')
        .map(|(path, query)| (path, Some(query)))
        .unwrap_or((target, None));
    let mut query = HashMap::new();
    if let Some(query_str) = query_str {
        for pair in query_str.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            query.insert(k.to_string(), v.to_string());
        }
    }
    (path.to_string(), query)
}

fn write_response(stream: &mut TcpStream, response: HttpResponse) -> std::io::Result<()> {
    stream.write_all(render_response_text(&response).as_bytes())?;
    stream.flush()
}

fn render_response_text(response: &HttpResponse) -> String {
    let status_text = match response.status {
        200 => "200 OK",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        405 => "405 Method Not Allowed",
        409 => "409 Conflict",
        500 => "500 Internal Server Error",
        _ => "500 Internal Server Error",
    };
    let body_len = response.body.len();
    format!(
        "HTTP/1.1 {status_text}\r\nContent-Type: {}\r\nContent-Length: {body_len}\r\nConnection: close\r\n\r\n{}",
        response.content_type, response.body
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpRequest {
    pub(crate) method: String,
    pub(crate) target: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    pub(crate) content_type: &'static str,
    pub(crate) body: String,
}

impl HttpResponse {
    fn ok_json(body: String) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body,
        }
    }

    fn ok_text(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4; charset=utf-8",
            body,
        }
    }

    fn bad_request(message: &str) -> Self {
        Self::error_body(400, message)
    }

    fn not_found(message: &str) -> Self {
        Self::error_body(404, message)
    }

    fn method_not_allowed(message: &str) -> Self {
        Self::error_body(405, message)
    }

    fn conflict(message: &str) -> Self {
        Self::error_body(409, message)
    }

    fn internal_server_error(message: &str) -> Self {
        Self::error_body(500, message)
    }

    fn error_with_status(status: u16, message: &str) -> Self {
        match status {
            400 => Self::bad_request(message),
            404 => Self::not_found(message),
            405 => Self::method_not_allowed(message),
            409 => Self::conflict(message),
            _ => Self::internal_server_error(message),
        }
    }

    fn error_body(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: format!("{{\"error\":\"{}\"}}", json_escape(message)),
        }
    }
}
