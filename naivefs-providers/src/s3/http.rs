//! S3 REST client
//!
//! Path-style requests signed with AWS Signature Version 4, which works for
//! AWS S3 as well as MinIO and other S3-compatible stores.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use naivefs_core::{FsError, FsResult};
use reqwest::{header, Client, Method, Response, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::client::{ObjectClient, ObjectConnector, ObjectInfo, ObjectListing};
use super::S3Config;

const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Builds [`HttpObjectClient`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

#[async_trait]
impl ObjectConnector for HttpConnector {
    async fn connect(&self, config: &S3Config) -> FsResult<Arc<dyn ObjectClient>> {
        Ok(Arc::new(HttpObjectClient::new(config)?))
    }
}

/// S3 client over HTTP(S)
pub struct HttpObjectClient {
    http: Client,
    base_url: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
}

impl HttpObjectClient {
    pub fn new(config: &S3Config) -> FsResult<Self> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(FsError::Config("S3 endpoint is empty".into()));
        }
        let base_url = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            let scheme = if config.use_ssl { "https" } else { "http" };
            format!("{}://{}", scheme, endpoint)
        };
        url::Url::parse(&base_url)
            .map_err(|e| FsError::Config(format!("Invalid S3 endpoint {}: {}", base_url, e)))?;

        let http = Client::builder()
            .build()
            .map_err(|e| FsError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            region: config.region.clone(),
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
        })
    }

    /// Build URL for an object, or for the bucket when `key` is empty
    fn object_url(&self, bucket: &str, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        if key.is_empty() {
            format!("{}/{}", self.base_url, bucket)
        } else {
            format!("{}/{}/{}", self.base_url, bucket, encoded.join("/"))
        }
    }

    /// Sign request with AWS Signature Version 4
    fn sign_request(
        &self,
        method: &Method,
        url: &str,
        headers: &mut BTreeMap<String, String>,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> FsResult<String> {
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        headers.insert("x-amz-date".to_string(), amz_date.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.to_string());

        let parsed = url::Url::parse(url).map_err(|e| FsError::InvalidPath(e.to_string()))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(FsError::InvalidPath(url.to_string())),
        };
        headers.insert("host".to_string(), host);

        let signed_headers = headers.keys().map(|s| s.as_str()).collect::<Vec<_>>().join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k.to_lowercase(), v.trim()))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.as_str(),
            parsed.path(),
            parsed.query().unwrap_or(""),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            sha256_hex(canonical_request.as_bytes())
        );

        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_access_key).as_bytes(),
            date_stamp.as_bytes(),
        );
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, b"s3");
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

        Ok(format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key_id, credential_scope, signed_headers, signature
        ))
    }

    /// Make signed request
    async fn request(&self, method: Method, url: &str, body: Option<Bytes>) -> FsResult<Response> {
        let payload_hash = match &body {
            Some(data) => sha256_hex(data),
            None => EMPTY_PAYLOAD_SHA256.to_string(),
        };

        let mut headers = BTreeMap::new();
        let auth = self.sign_request(&method, url, &mut headers, &payload_hash, Utc::now())?;

        let mut request = self.http.request(method, url);
        for (k, v) in &headers {
            request = request.header(k, v);
        }
        request = request.header(header::AUTHORIZATION, auth);
        if let Some(data) = body {
            request = request.body(data);
        }

        request.send().await.map_err(|e| FsError::Network(e.to_string()))
    }
}

impl HttpObjectClient {
    async fn head_bucket(&self, bucket: &str) -> FsResult<()> {
        let url = self.object_url(bucket, "");
        let response = self.request(Method::HEAD, &url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FsError::provider("s3", format!("NoSuchBucket: {}", bucket)));
        }
        check(response, bucket).await?;
        Ok(())
    }
}

/// Turn a non-success response into the matching error
async fn check(response: Response, key: &str) -> FsResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match xml_value(&body, "Code") {
        Some(code) => format!("{}: {}", status, code),
        None => status.to_string(),
    };
    Err(match status {
        StatusCode::NOT_FOUND if !message.contains("NoSuchBucket") => {
            FsError::NotFound(key.to_string())
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FsError::AuthFailed(message),
        _ => FsError::ProviderApi { provider: "s3".into(), message },
    })
}

#[async_trait]
impl ObjectClient for HttpObjectClient {
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> FsResult<()> {
        let url = self.object_url(bucket, key);
        let response = self.request(Method::PUT, &url, Some(data)).await?;
        check(response, key).await?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> FsResult<Bytes> {
        let url = self.object_url(bucket, key);
        let response = self.request(Method::GET, &url, None).await?;
        check(response, key)
            .await?
            .bytes()
            .await
            .map_err(|e| FsError::Network(e.to_string()))
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> FsResult<ObjectInfo> {
        let url = self.object_url(bucket, key);
        let response = self.request(Method::HEAD, &url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            // HEAD responses carry no error code, so ask the bucket itself
            self.head_bucket(bucket).await?;
            return Err(FsError::NotFound(key.to_string()));
        }
        let response = check(response, key).await?;
        let size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        Ok(ObjectInfo { key: key.to_string(), size })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> FsResult<()> {
        let url = self.object_url(bucket, key);
        let response = self.request(Method::DELETE, &url, None).await?;
        check(response, key).await?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> FsResult<ObjectListing> {
        let mut listing = ObjectListing::default();
        let mut continuation: Option<String> = None;

        loop {
            // query parameters in canonical (sorted) order
            let mut query = match &continuation {
                Some(token) => format!("continuation-token={}&", urlencoding::encode(token)),
                None => String::new(),
            };
            query.push_str("delimiter=%2F&list-type=2");
            if !prefix.is_empty() {
                query.push_str(&format!("&prefix={}", urlencoding::encode(prefix)));
            }
            let url = format!("{}?{}", self.object_url(bucket, ""), query);

            let response = self.request(Method::GET, &url, None).await?;
            let text = check(response, prefix)
                .await?
                .text()
                .await
                .map_err(|e| FsError::Network(e.to_string()))?;
            let page = parse_list_objects_v2(&text);

            listing.objects.extend(page.objects);
            listing.common_prefixes.extend(page.common_prefixes);
            match page.continuation_token {
                Some(token) if page.is_truncated => continuation = Some(token),
                _ => return Ok(listing),
            }
        }
    }
}

/// List objects result
#[derive(Debug, Default)]
struct ListObjectsPage {
    objects: Vec<ObjectInfo>,
    common_prefixes: Vec<String>,
    is_truncated: bool,
    continuation_token: Option<String>,
}

/// Parse ListObjectsV2 XML response
fn parse_list_objects_v2(xml: &str) -> ListObjectsPage {
    let objects = xml_blocks(xml, "Contents")
        .into_iter()
        .filter_map(|block| {
            let key = xml_value(block, "Key")?;
            let size = xml_value(block, "Size").and_then(|s| s.parse().ok()).unwrap_or(0);
            Some(ObjectInfo { key, size })
        })
        .collect();

    let common_prefixes = xml_blocks(xml, "CommonPrefixes")
        .into_iter()
        .filter_map(|block| xml_value(block, "Prefix"))
        .collect();

    ListObjectsPage {
        objects,
        common_prefixes,
        is_truncated: xml_value(xml, "IsTruncated").as_deref() == Some("true"),
        continuation_token: xml_value(xml, "NextContinuationToken"),
    }
}

/// Inner text of every `<tag>...</tag>` element, in document order
fn xml_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let start_tag = format!("<{}>", tag);
    let end_tag = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find(&start_tag) {
        let content_start = start + start_tag.len();
        match rest[content_start..].find(&end_tag) {
            Some(len) => {
                blocks.push(&rest[content_start..content_start + len]);
                rest = &rest[content_start + len + end_tag.len()..];
            }
            None => break,
        }
    }
    blocks
}

/// Extract and unescape the first value of an XML element
fn xml_value(xml: &str, tag: &str) -> Option<String> {
    xml_blocks(xml, tag).first().map(|raw| {
        raw.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    })
}

/// SHA-256 hash as hex string
fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
