//! Typed HTTP client for node-to-node calls.
//!
//! One [`NodeClient`] is shared by every background loop; reqwest pools
//! connections per peer underneath. All methods take the peer's canonical
//! base URL and return decoded response bodies, mapping transport failures
//! to [`NetworkError::ConnectionFailed`] and non-2xx replies to
//! [`NetworkError::BadResponse`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use relaynet_messages::{
    BlocksResponse, CommitRequest, CommitResponse, HealthResponse, RegisterPeerRequest,
    RegisterPeerResponse, ReplicateRequest, ReplicateResponse, TipResponse, VoteResponse,
};
use relaynet_types::Block;

use crate::NetworkError;

/// Default whole-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default TCP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Cap on error body text carried into [`NetworkError::BadResponse`].
const DETAIL_CAP: usize = 200;

#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new() -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        Ok(Self { http })
    }

    // -- Registration / liveness -----------------------------------------------

    pub async fn register_peer(
        &self,
        base: &str,
        request: &RegisterPeerRequest,
    ) -> Result<RegisterPeerResponse, NetworkError> {
        self.post_json(base, "/api/register_peer", request, None).await
    }

    pub async fn health(&self, base: &str) -> Result<HealthResponse, NetworkError> {
        self.get_json(base, "/health").await
    }

    // -- Replication -----------------------------------------------------------

    /// Push one message replica. `timeout` bounds this single attempt so a
    /// slow peer cannot stall the whole replication fan-out.
    pub async fn replicate(
        &self,
        base: &str,
        request: &ReplicateRequest,
        timeout: Duration,
    ) -> Result<ReplicateResponse, NetworkError> {
        self.post_json(base, "/api/replicate", request, Some(timeout))
            .await
    }

    // -- Consensus -------------------------------------------------------------

    /// Send a block proposal and wait for the peer's vote. `timeout` is the
    /// vote collection window.
    pub async fn send_proposal(
        &self,
        base: &str,
        block: &Block,
        timeout: Duration,
    ) -> Result<VoteResponse, NetworkError> {
        self.post_json(base, "/api/proposal", block, Some(timeout))
            .await
    }

    pub async fn send_commit(
        &self,
        base: &str,
        request: &CommitRequest,
    ) -> Result<CommitResponse, NetworkError> {
        self.post_json(base, "/api/commit", request, None).await
    }

    // -- Chain sync ------------------------------------------------------------

    pub async fn chain_tip(&self, base: &str) -> Result<TipResponse, NetworkError> {
        self.get_json(base, "/api/chain/tip").await
    }

    pub async fn blocks_from(
        &self,
        base: &str,
        from: u64,
        count: usize,
    ) -> Result<BlocksResponse, NetworkError> {
        self.get_json(base, &format!("/api/blocks?from={from}&count={count}"))
            .await
    }

    // -- Plumbing --------------------------------------------------------------

    async fn post_json<B, T>(
        &self,
        base: &str,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, NetworkError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(format!("{base}{path}")).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        Self::decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
    ) -> Result<T, NetworkError> {
        let response = self
            .http
            .get(format!("{base}{path}"))
            .send()
            .await
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, NetworkError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NetworkError::BadResponse {
                status: status.as_u16(),
                detail: truncate_detail(detail),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

fn truncate_detail(mut detail: String) -> String {
    if detail.len() > DETAIL_CAP {
        let cut = detail
            .char_indices()
            .take_while(|(i, _)| *i <= DETAIL_CAP)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(DETAIL_CAP);
        detail.truncate(cut);
        detail.push('…');
    }
    detail
}
