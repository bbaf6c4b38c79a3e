// Azure Blob Storage sink ("Put Blob" over the REST API)
//
// Authorisation is either a SAS query string or Shared Key, where the request
// is signed with HMAC-SHA256 over the canonical string-to-sign: verb, the
// eleven standard headers, canonicalised `x-ms-*` headers and the
// canonicalised resource `/{account}{path}`.
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info};

use super::connection::{StorageAuth, StorageConnection};
use super::BlobSink;
use crate::core::errors::{StorageError, StorageResult};

const API_VERSION: &str = "2021-08-06";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type HmacSha256 = Hmac<Sha256>;

pub struct AzureBlobSink {
    client: reqwest::Client,
    connection: StorageConnection,
}

impl AzureBlobSink {
    pub fn new(connection: StorageConnection) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(connection, client))
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, timeouts).
    pub fn with_client(connection: StorageConnection, client: reqwest::Client) -> Self {
        Self { client, connection }
    }

    pub fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        Self::new(StorageConnection::parse(connection_string)?)
    }

    /// URL path of `container/key`, percent-encoding each key segment but keeping `/`.
    fn blob_path(&self, container: &str, key: &str) -> String {
        let endpoint_path = endpoint_path(&self.connection.blob_endpoint);
        let encoded_key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}/{}", endpoint_path, urlencoding::encode(container), encoded_key)
    }
}

#[async_trait]
impl BlobSink for AzureBlobSink {
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let path = self.blob_path(container, key);
        let origin = endpoint_origin(&self.connection.blob_endpoint);
        let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let content_length = bytes.len();

        let url = match &self.connection.auth {
            StorageAuth::Sas(sas) => format!("{origin}{path}?{sas}"),
            StorageAuth::SharedKey { .. } => format!("{origin}{path}"),
        };

        // Content-Length is set by reqwest from the body
        let mut request = self
            .client
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("Content-Type", content_type);

        if let StorageAuth::SharedKey { account, key } = &self.connection.auth {
            let to_sign = string_to_sign(
                "PUT",
                content_length,
                content_type,
                &[
                    ("x-ms-blob-type", "BlockBlob"),
                    ("x-ms-date", &date),
                    ("x-ms-version", API_VERSION),
                ],
                account,
                &path,
            );
            let signature = sign(key, &to_sign)?;
            request = request.header("Authorization", format!("SharedKey {account}:{signature}"));
        }

        debug!("PUT {} ({} bytes)", path, content_length);
        let response = request.body(bytes).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                key: format!("{container}/{key}"),
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        info!("Uploaded {}/{} ({} bytes)", container, key, content_length);
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "azure blob storage at {} (account {})",
            self.connection.blob_endpoint,
            self.connection.account_label()
        )
    }
}

/// `scheme://host[:port]` part of an endpoint.
fn endpoint_origin(endpoint: &str) -> &str {
    let after_scheme = endpoint.find("://").map(|i| i + 3).unwrap_or(0);
    match endpoint[after_scheme..].find('/') {
        Some(i) => &endpoint[..after_scheme + i],
        None => endpoint,
    }
}

/// Path part of an endpoint (empty or starting with `/`, no trailing slash).
fn endpoint_path(endpoint: &str) -> &str {
    endpoint[endpoint_origin(endpoint).len()..].trim_end_matches('/')
}

/// Shared Key string-to-sign for a request without query parameters.
pub(crate) fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    account: &str,
    path: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    // VERB, Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range
    format!(
        "{verb}\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\n{canonical_headers}/{account}{path}"
    )
}

pub(crate) fn sign(key: &[u8], string_to_sign: &str) -> StorageResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::InvalidConnectionString(format!("unusable account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_sign_layout() {
        let s = string_to_sign(
            "PUT",
            42,
            "image/png",
            &[
                ("x-ms-version", "2021-08-06"),
                ("x-ms-blob-type", "BlockBlob"),
                ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ],
            "walls",
            "/pdf-images/annotated_a.png",
        );
        assert_eq!(
            s,
            "PUT\n\n\n42\n\nimage/png\n\n\n\n\n\n\n\
             x-ms-blob-type:BlockBlob\n\
             x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
             x-ms-version:2021-08-06\n\
             /walls/pdf-images/annotated_a.png"
        );
    }

    #[test]
    fn test_zero_length_is_blank() {
        let s = string_to_sign("PUT", 0, "image/png", &[], "a", "/c/k");
        assert!(s.starts_with("PUT\n\n\n\n\nimage/png\n"));
    }

    #[test]
    fn test_sign_is_deterministic_base64() {
        let a = sign(b"key", "payload").unwrap();
        let b = sign(b"key", "payload").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, sign(b"other", "payload").unwrap());
        // 32-byte digest → 44 base64 characters
        assert_eq!(a.len(), 44);
    }

    #[test]
    fn test_endpoint_split() {
        assert_eq!(
            endpoint_origin("https://walls.blob.core.windows.net"),
            "https://walls.blob.core.windows.net"
        );
        assert_eq!(endpoint_path("https://walls.blob.core.windows.net"), "");
        assert_eq!(
            endpoint_origin("http://127.0.0.1:10000/devstoreaccount1"),
            "http://127.0.0.1:10000"
        );
        assert_eq!(endpoint_path("http://127.0.0.1:10000/devstoreaccount1"), "/devstoreaccount1");
    }

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        uri: String,
        headers: axum::http::HeaderMap,
        body: Vec<u8>,
    }

    /// Local HTTP endpoint that records requests and answers with `status`/`reply`.
    async fn spawn_stub(
        status: axum::http::StatusCode,
        reply: String,
    ) -> (String, std::sync::Arc<parking_lot::Mutex<Vec<Captured>>>) {
        use axum::http::{HeaderMap, Method, Uri};

        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let captured = seen.clone();
        let app = axum::Router::new().fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, body: axum::body::Bytes| {
                let captured = captured.clone();
                let reply = reply.clone();
                async move {
                    captured.lock().push(Captured {
                        method: method.to_string(),
                        uri: uri.to_string(),
                        headers,
                        body: body.to_vec(),
                    });
                    (status, reply)
                }
            },
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/acct"), seen)
    }

    fn sink_for(connection_string: &str) -> AzureBlobSink {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        AzureBlobSink::with_client(StorageConnection::parse(connection_string).unwrap(), client)
    }

    #[tokio::test]
    async fn test_put_with_sas_sends_block_blob() {
        let (endpoint, seen) = spawn_stub(axum::http::StatusCode::CREATED, String::new()).await;
        let sink = sink_for(&format!("BlobEndpoint={endpoint};SharedAccessSignature=sv=x&sig=y"));

        sink.put("pdf-images", "annotated_a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(request.method, "PUT");
        assert_eq!(request.uri, "/acct/pdf-images/annotated_a.png?sv=x&sig=y");
        assert_eq!(request.headers["x-ms-blob-type"], "BlockBlob");
        assert_eq!(request.headers["x-ms-version"], API_VERSION);
        assert_eq!(request.headers["content-type"], "image/png");
        assert_eq!(request.headers["content-length"], "3");
        assert!(request.headers.contains_key("x-ms-date"));
        assert!(!request.headers.contains_key("authorization"));
        assert_eq!(request.body, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_put_with_shared_key_signs_request() {
        let (endpoint, seen) = spawn_stub(axum::http::StatusCode::CREATED, String::new()).await;
        let key = STANDARD.encode(b"secret-key");
        let sink = sink_for(&format!("BlobEndpoint={endpoint};AccountName=acct;AccountKey={key}"));

        sink.put("pdf-images", "annotated_b.png", vec![9; 10], "image/png")
            .await
            .unwrap();

        let seen = seen.lock();
        let request = &seen[0];
        assert_eq!(request.uri, "/acct/pdf-images/annotated_b.png");
        let date = request.headers["x-ms-date"].to_str().unwrap();
        let expected = string_to_sign(
            "PUT",
            10,
            "image/png",
            &[
                ("x-ms-blob-type", "BlockBlob"),
                ("x-ms-date", date),
                ("x-ms-version", API_VERSION),
            ],
            "acct",
            "/acct/pdf-images/annotated_b.png",
        );
        let signature = sign(b"secret-key", &expected).unwrap();
        assert_eq!(
            request.headers["authorization"].to_str().unwrap(),
            format!("SharedKey acct:{signature}")
        );
    }

    #[tokio::test]
    async fn test_put_rejection_is_typed_and_truncated() {
        let (endpoint, _) = spawn_stub(axum::http::StatusCode::FORBIDDEN, "x".repeat(2000)).await;
        let sink = sink_for(&format!("BlobEndpoint={endpoint};SharedAccessSignature=sv=x"));

        let err = sink
            .put("pdf-images", "annotated_c.png", vec![0], "image/png")
            .await
            .unwrap_err();

        match err {
            StorageError::Rejected { key, status, body } => {
                assert_eq!(key, "pdf-images/annotated_c.png");
                assert_eq!(status, 403);
                assert_eq!(body.len(), 512);
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_blob_path_encodes_segments() {
        let sink = AzureBlobSink::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(
            sink.blob_path("pdf-images", "annotated_page 1.png"),
            "/devstoreaccount1/pdf-images/annotated_page%201.png"
        );
        assert_eq!(
            sink.blob_path("pdf-images", "dir/a.png"),
            "/devstoreaccount1/pdf-images/dir/a.png"
        );
    }

    #[test]
    fn test_describe_hides_key() {
        let sink = AzureBlobSink::from_connection_string("AccountName=walls;AccountKey=c2VjcmV0").unwrap();
        let text = sink.describe();
        assert!(text.contains("walls"));
        assert!(!text.contains("c2VjcmV0"));
    }
}
