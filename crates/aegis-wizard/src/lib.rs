//! Out-of-scope companion service: generates a ready-to-run
//! `docker-compose.yml` + README bundle for a given Aegis deployment. Not
//! part of the gateway's trust boundary — no crypto lives here.

use axum::{
    extract::Json,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::io::Write;

#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    pub backend_url: String,
    #[serde(default = "default_core_a_port")]
    pub core_a_port: u16,
    #[serde(default = "default_grpc_port")]
    pub core_b_grpc_port: u16,
    #[serde(default = "default_core_b_http_port")]
    pub core_b_http_port: u16,
    #[serde(default = "default_session_ttl")]
    pub session_ttl: u64,
}

fn default_core_a_port() -> u16 {
    8000
}
fn default_grpc_port() -> u16 {
    50051
}
fn default_core_b_http_port() -> u16 {
    8001
}
fn default_session_ttl() -> u64 {
    600
}

pub async fn generate_config(Json(config): Json<ConfigRequest>) -> Response {
    match build_zip(&config) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=aegis_config.zip".to_string(),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn build_zip(config: &ConfigRequest) -> anyhow::Result<Vec<u8>> {
    let compose = docker_compose_yaml(config);
    let readme = readme_text(config);

    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut cursor);
    let options: zip::write::FileOptions<'_, ()> =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    writer.start_file("docker-compose.yml", options)?;
    writer.write_all(compose.as_bytes())?;
    writer.start_file("README.txt", options)?;
    writer.write_all(readme.as_bytes())?;
    writer.finish()?;

    Ok(cursor.into_inner())
}

fn docker_compose_yaml(config: &ConfigRequest) -> String {
    format!(
        r#"version: "3.8"
services:
  aegis-core-b:
    image: aegis-core:latest
    command: ["/usr/local/bin/aegis-core-b"]
    ports:
      - "{grpc_port}:{grpc_port}"
      - "{core_b_http_port}:{core_b_http_port}"
    environment:
      TARGET_APP_URL: "{backend_url}"
      GRPC_PORT: "{grpc_port}"
      CORE_B_HTTP_PORT: "{core_b_http_port}"
      SESSION_TTL: "{session_ttl}"
    networks:
      - aegis-net
  aegis-core-a:
    image: aegis-core:latest
    command: ["/usr/local/bin/aegis-core-a"]
    ports:
      - "{core_a_port}:8000"
    environment:
      CORE_B_GRPC_TARGET: "aegis-core-b:{grpc_port}"
      CORE_B_HTTP_URL: "http://aegis-core-b:{core_b_http_port}"
      CORE_A_PORT: "8000"
    depends_on:
      - aegis-core-b
    networks:
      - aegis-net
networks:
  aegis-net:
    driver: bridge
"#,
        backend_url = config.backend_url,
        core_a_port = config.core_a_port,
        grpc_port = config.core_b_grpc_port,
        core_b_http_port = config.core_b_http_port,
        session_ttl = config.session_ttl,
    )
}

fn readme_text(config: &ConfigRequest) -> String {
    format!(
        "Aegis Deployment\n\n\
         1. Ensure you have Docker and Docker Compose installed.\n\
         2. Build the base image if you haven't:\n   \
            `docker build -t aegis-core:latest .` (from the root of the aegis-core repo)\n\
         3. Run the stack:\n   \
            `docker-compose up -d`\n\n\
         Your Aegis Core A is listening on port {}.\n\
         It forwards traffic securely to Core B, which sends it to {}.\n",
        config.core_a_port, config.backend_url
    )
}
