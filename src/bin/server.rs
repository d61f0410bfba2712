//! HTTP API server for the NL -> SQL -> segmentation pipeline
//! Simple HTTP server using tokio and basic HTTP handling

use mosaic_segments::config::Config;
use mosaic_segments::db;
use mosaic_segments::generator::SqlGenerator;
use mosaic_segments::llm::LlmClient;
use mosaic_segments::pipeline::QueryPipeline;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::init_pool(&config.database_url).await?;
    info!("Connected to database");

    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    );
    let pipeline = Arc::new(QueryPipeline::new(pool, SqlGenerator::new(Arc::new(llm))));

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Server listening on port {}", config.port);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("New connection from: {}", addr);
        let pipeline = pipeline.clone();
        tokio::spawn(handle_connection(stream, pipeline));
    }
}

async fn handle_connection(mut stream: TcpStream, pipeline: Arc<QueryPipeline>) {
    use tokio::time::{timeout, Duration};

    // Read request with timeout to prevent hanging
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut temp_buf).await {
                Ok(0) => break, // EOF
                Ok(n) => {
                    buffer.extend_from_slice(&temp_buf[..n]);
                    if let Ok(s) = std::str::from_utf8(&buffer) {
                        if s.contains("\r\n\r\n") {
                            if let Some(content_length) = extract_content_length(s) {
                                let headers_end = s.find("\r\n\r\n").unwrap() + 4;
                                if buffer.len() >= headers_end + content_length {
                                    break;
                                }
                            } else if n < temp_buf.len() {
                                break;
                            }
                        }
                    }
                    if buffer.len() > 1_000_000 {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read from stream: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    })
    .await;

    if read_result.is_err() {
        warn!("Request read timeout");
        return;
    }

    if buffer.is_empty() {
        return;
    }

    match String::from_utf8(buffer) {
        Ok(request) => {
            let response = handle_request(&request, &pipeline).await;
            if let Err(e) = stream.write_all(response.as_bytes()).await {
                error!("Failed to write response: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to parse request as UTF-8: {}", e);
        }
    }
}

fn extract_content_length(request: &str) -> Option<usize> {
    for line in request.lines() {
        if line.to_lowercase().starts_with("content-length:") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

fn extract_body(request: &str) -> &str {
    request
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("")
}

async fn handle_request(request: &str, pipeline: &QueryPipeline) -> String {
    let request_line = match request.lines().next() {
        Some(line) => line,
        None => return create_response(400, "Bad Request", "{}"),
    };

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", "{}");
    }

    let method = parts[0];
    let full_path = parts[1].to_string();

    let (path_str, query_string) = if let Some(query_start) = full_path.find('?') {
        (
            full_path[..query_start].to_string(),
            Some(full_path[query_start + 1..].to_string()),
        )
    } else {
        (full_path, None)
    };

    let mut normalized_path = path_str.trim_end_matches('/').to_string();
    if normalized_path.is_empty() {
        normalized_path = "/".to_string();
    }
    let path = normalized_path.as_str();

    info!("Request: {} {}", method, path);

    match (method, path) {
        ("OPTIONS", _) => create_response(204, "No Content", ""),
        ("GET", "/api/health") => {
            create_response(200, "OK", r#"{"status":"ok","service":"mosaic-segments"}"#)
        }
        ("GET", "/api/schema") => {
            let refresh = query_string
                .as_deref()
                .map(|q| q.contains("refresh=true"))
                .unwrap_or(false);
            match pipeline.introspector().get_schema(refresh).await {
                Ok(schema) => match serde_json::to_string(&schema) {
                    Ok(json) => create_response(200, "OK", &json),
                    Err(e) => error_response(500, &e.to_string()),
                },
                Err(e) => error_response(500, &e.to_string()),
            }
        }
        ("POST", "/api/query") => {
            let body = extract_body(request);
            match serde_json::from_str::<QueryRequest>(body) {
                Ok(req) => {
                    let outcome = pipeline.run(&req.query).await;
                    match serde_json::to_string(&outcome) {
                        Ok(json) => create_response(200, "OK", &json),
                        Err(e) => error_response(500, &e.to_string()),
                    }
                }
                Err(e) => error_response(400, &format!("Invalid request body: {}", e)),
            }
        }
        ("POST", "/api/segments/preview") => {
            let body = extract_body(request);
            match serde_json::from_str::<QueryRequest>(body) {
                Ok(req) => match pipeline.preview(&req.query).await {
                    Ok(preview) => match serde_json::to_string(&preview) {
                        Ok(json) => create_response(200, "OK", &json),
                        Err(e) => error_response(500, &e.to_string()),
                    },
                    Err(e) => error_response(500, &e.to_string()),
                },
                Err(e) => error_response(400, &format!("Invalid request body: {}", e)),
            }
        }
        _ => create_response(404, "Not Found", r#"{"error":"not found"}"#),
    }
}

fn error_response(status: u16, message: &str) -> String {
    let body = serde_json::json!({ "error": message }).to_string();
    let status_text = if status == 400 { "Bad Request" } else { "Internal Server Error" };
    create_response(status, status_text, &body)
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, PUT, DELETE, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
