//! AAE HTTP client
//!
//! The five operations the Exchange Driver's send-fun needs against either
//! cluster side: root/branch/clock fetches for the unfiltered `AllSync` path,
//! and range-scoped tree/clock fetches for the `Bucket`-scoped paths. The
//! trait is the seam the driver codes against; [`ReqwestAaeHttpClient`] is
//! the default implementation. Grounded on
//! `mofa-foundation/llm/anthropic.rs`'s `AnthropicProvider` (owns a
//! `reqwest::Client` built once with a configured timeout, one method per
//! endpoint, `post(...).json(&body).send().await`, status-check before
//! decoding the body).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::BucketId;
use crate::error::HttpClientError;
use crate::exchange::filter::{ModRange, TreeSize};
use crate::vclock::VClock;

/// `(bucket, key, vclock)` triple returned by clock-fetch endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyClock {
    /// Bucket the key belongs to.
    pub bucket: BucketId,
    /// Key within the bucket.
    pub key: Vec<u8>,
    /// The clock's wire form (decode with [`VClock::decode`] before use).
    pub vclock: Vec<u8>,
}

impl KeyClock {
    /// Decode this entry's wire-form clock.
    pub fn decode_clock(&self) -> Result<VClock, HttpClientError> {
        VClock::decode(&self.vclock)
    }
}

/// Key-range restriction for a range query. Only `All` ("all-keys") is used
/// by this coordinator; the type exists so the wire shape is explicit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum KeyRange {
    /// No key restriction.
    All,
}

/// The segment filter the HTTP client sends, after the driver has rewritten
/// the engine's `all`/`{segments, segList, treeSize}` shape into this one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SegmentFilter {
    /// Compare every segment.
    All,
    /// Compare only the listed segments, at the given tree granularity.
    Segments {
        /// Segment ids to compare.
        seg_list: Vec<u32>,
        /// Tree granularity to use for the comparison.
        tree_size: TreeSize,
    },
}

/// Hash function used to pre-hash tree leaves. Only `PreHash` is used.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum HashMethod {
    /// Pre-hash leaves before inserting into the tree (the only method this
    /// coordinator requests).
    PreHash,
}

/// The AAE HTTP surface the Exchange Driver calls against either side
/// (local or remote) of an exchange.
#[async_trait]
pub trait AaeHttpClient: Send + Sync {
    /// Liveness check before starting an exchange.
    async fn ping(&self) -> Result<(), HttpClientError>;

    /// Fetch the top-level Merkle root under `nval`.
    async fn merge_root(&self, nval: u32) -> Result<Vec<u8>, HttpClientError>;

    /// Fetch branch-level hashes for `branch_ids` under `nval`.
    async fn merge_branches(&self, nval: u32, branch_ids: Vec<u32>) -> Result<Vec<Vec<u8>>, HttpClientError>;

    /// Fetch `(bucket, key, vclock)` triples for `segment_ids` under `nval`.
    async fn fetch_clocks(&self, nval: u32, segment_ids: Vec<u32>) -> Result<Vec<KeyClock>, HttpClientError>;

    /// Build/import a tree over `bucket`'s `key_range`, restricted to
    /// `seg_filter` and `mod_range`, using `hash_method` for leaves.
    #[allow(clippy::too_many_arguments)]
    async fn range_tree(
        &self,
        bucket: BucketId,
        key_range: KeyRange,
        tree_size: TreeSize,
        seg_filter: SegmentFilter,
        mod_range: Option<ModRange>,
        hash_method: HashMethod,
    ) -> Result<Vec<u8>, HttpClientError>;

    /// Fetch `(bucket, key, vclock)` triples over `bucket`'s `key_range`,
    /// restricted to `seg_filter` and `mod_range`.
    async fn range_clocks(
        &self,
        bucket: BucketId,
        key_range: KeyRange,
        seg_filter: SegmentFilter,
        mod_range: Option<ModRange>,
    ) -> Result<Vec<KeyClock>, HttpClientError>;
}

/// Which scheme to address a cluster side with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP.
    Http,
    /// TLS-terminated HTTP.
    Https,
}

impl Protocol {
    fn as_scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// `reqwest`-backed [`AaeHttpClient`] against one cluster side's AAE
/// endpoints.
pub struct ReqwestAaeHttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestAaeHttpClient {
    /// Build a client addressing `protocol://ip:port`, with a fixed request
    /// timeout.
    pub fn new(protocol: Protocol, ip: &str, port: u16, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: format!("{}://{}:{}", protocol.as_scheme(), ip, port),
        }
    }

    async fn post_json<B: Serialize + Sync, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, HttpClientError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| HttpClientError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| HttpClientError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(HttpClientError::Request(format!("{status}: {text}")));
        }

        serde_json::from_str(&text).map_err(|e| HttpClientError::Decode(e.to_string()))
    }
}

#[derive(Serialize)]
struct MergeBranchesRequest {
    nval: u32,
    branch_ids: Vec<u32>,
}

#[derive(Serialize)]
struct FetchClocksRequest {
    nval: u32,
    segment_ids: Vec<u32>,
}

#[derive(Serialize)]
struct RangeTreeRequest {
    bucket: BucketId,
    key_range: KeyRange,
    tree_size: TreeSize,
    seg_filter: SegmentFilter,
    mod_range: Option<ModRange>,
    hash_method: HashMethod,
}

#[derive(Serialize)]
struct RangeClocksRequest {
    bucket: BucketId,
    key_range: KeyRange,
    seg_filter: SegmentFilter,
    mod_range: Option<ModRange>,
}

#[async_trait]
impl AaeHttpClient for ReqwestAaeHttpClient {
    async fn ping(&self) -> Result<(), HttpClientError> {
        let url = format!("{}/ping", self.base_url);
        self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| HttpClientError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| HttpClientError::Request(e.to_string()))?;
        Ok(())
    }

    async fn merge_root(&self, nval: u32) -> Result<Vec<u8>, HttpClientError> {
        self.post_json("/aae/merge_root", &nval).await
    }

    async fn merge_branches(&self, nval: u32, branch_ids: Vec<u32>) -> Result<Vec<Vec<u8>>, HttpClientError> {
        self.post_json("/aae/merge_branches", &MergeBranchesRequest { nval, branch_ids })
            .await
    }

    async fn fetch_clocks(&self, nval: u32, segment_ids: Vec<u32>) -> Result<Vec<KeyClock>, HttpClientError> {
        self.post_json("/aae/fetch_clocks", &FetchClocksRequest { nval, segment_ids })
            .await
    }

    async fn range_tree(
        &self,
        bucket: BucketId,
        key_range: KeyRange,
        tree_size: TreeSize,
        seg_filter: SegmentFilter,
        mod_range: Option<ModRange>,
        hash_method: HashMethod,
    ) -> Result<Vec<u8>, HttpClientError> {
        self.post_json(
            "/aae/range_tree",
            &RangeTreeRequest {
                bucket,
                key_range,
                tree_size,
                seg_filter,
                mod_range,
                hash_method,
            },
        )
        .await
    }

    async fn range_clocks(
        &self,
        bucket: BucketId,
        key_range: KeyRange,
        seg_filter: SegmentFilter,
        mod_range: Option<ModRange>,
    ) -> Result<Vec<KeyClock>, HttpClientError> {
        self.post_json(
            "/aae/range_clocks",
            &RangeClocksRequest {
                bucket,
                key_range,
                seg_filter,
                mod_range,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ReqwestAaeHttpClient {
        let url = server.uri();
        let (scheme, rest) = url.split_once("://").unwrap();
        let (host, port) = rest.split_once(':').unwrap();
        let protocol = if scheme == "https" { Protocol::Https } else { Protocol::Http };
        ReqwestAaeHttpClient::new(protocol, host, port.parse().unwrap(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn ping_succeeds_on_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.ping().await.is_ok());
    }

    #[tokio::test]
    async fn ping_fails_on_5xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.ping().await.is_err());
    }

    #[tokio::test]
    async fn merge_root_decodes_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/aae/merge_root"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let root = client.merge_root(3).await.unwrap();
        assert_eq!(root, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fetch_clocks_round_trips_key_clock_list() {
        let server = MockServer::start().await;
        let vclock = VClock::from_entries([("n1".to_string(), 1u64)]).encode();
        let body = vec![KeyClock {
            bucket: BucketId::new("b", "t"),
            key: b"k1".to_vec(),
            vclock,
        }];
        Mock::given(method("POST"))
            .and(path("/aae/fetch_clocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let got = client.fetch_clocks(3, vec![1, 2]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].key, b"k1");
        assert!(got[0].decode_clock().is_ok());
    }
}
