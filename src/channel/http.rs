//! HTTP/JSON transport over reqwest.
//!
//! A stub posts JSON to the station's routes (see [`super::wire::paths`])
//! and waits for the reply, so the remote side effect has happened when
//! the call returns. Error replies carry an [`ErrorResponse`] and surface
//! as [`TraversalError::Remote`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::wire::{
    paths, Ack, DiscoveredResponse, EdgeViaRequest, ErrorResponse, PartitionResponse,
    VertexRequest, VertexViaRequest, WorkingResponse,
};
use super::{Connector, CoordinatorClient, MediatedSatelliteClient, PeerSatelliteClient};
use crate::error::{ChannelError, TraversalError, TraversalResult};
use crate::mediated::RunReport;
use crate::polling::SatelliteStatus;
use crate::types::{EdgeId, ElementCounts, IncidenceId, PartitionId, VertexId};
use crate::visitor::VisitEvent;

/// Connection pool settings for station stubs.
#[derive(Debug, Clone)]
pub struct HttpPoolConfig {
    /// Idle connections kept per station.
    pub pool_max_idle_per_host: usize,
    /// How long an idle connection is kept.
    pub pool_idle_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// TCP keepalive interval.
    pub tcp_keepalive: Option<Duration>,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 8,
            pool_idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(5),
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// Stub for a station reachable over HTTP.
///
/// No request timeout is set: a `run` call lasts as long as the traversal.
#[derive(Debug, Clone)]
pub struct HttpStation {
    host: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpStation {
    /// Create a stub for `host` (`host:port`, or a full `http://` URL).
    pub fn new(host: impl Into<String>, client: reqwest::Client) -> Self {
        let host = host.into();
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host)
        };
        Self {
            host,
            base_url,
            client,
        }
    }

    /// Hostname this stub talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    async fn call<Req, Resp>(&self, path: &str, body: &Req) -> TraversalResult<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Resp>()
                .await
                .map_err(|e| ChannelError::Decode(format!("{}: {}", url, e)).into());
        }

        let error = response
            .json::<ErrorResponse>()
            .await
            .map_err(|e| ChannelError::Decode(format!("{} ({}): {}", url, status, e)))?;
        tracing::debug!(
            host = %self.host,
            path = path,
            status = status.as_u16(),
            code = %error.code,
            "Station reported an error"
        );
        Err(TraversalError::Remote {
            station: self.host.clone(),
            message: format!("[{}] {}", error.code, error.error),
        })
    }
}

#[async_trait]
impl CoordinatorClient for HttpStation {
    async fn run(&self, start: VertexId) -> TraversalResult<RunReport> {
        self.call(paths::COORDINATOR_RUN, &VertexRequest { vertex: start })
            .await
    }

    async fn partition_id(&self) -> TraversalResult<PartitionId> {
        let response: PartitionResponse = self.call(paths::COORDINATOR_PARTITION, &Ack {}).await?;
        Ok(response.partition)
    }

    async fn test_and_process_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<bool> {
        let response: DiscoveredResponse = self
            .call(paths::COORDINATOR_TEST_EDGE, &EdgeViaRequest { edge, via })
            .await?;
        Ok(response.discovered)
    }

    async fn test_and_process_vertex(
        &self,
        vertex: VertexId,
        via: IncidenceId,
    ) -> TraversalResult<bool> {
        let response: DiscoveredResponse = self
            .call(paths::COORDINATOR_TEST_VERTEX, &VertexViaRequest { vertex, via })
            .await?;
        Ok(response.discovered)
    }

    async fn notify(&self, event: VisitEvent) -> TraversalResult<()> {
        let _: Ack = self.call(paths::COORDINATOR_NOTIFY, &event).await?;
        Ok(())
    }
}

#[async_trait]
impl MediatedSatelliteClient for HttpStation {
    async fn element_counts(&self) -> TraversalResult<ElementCounts> {
        self.call(paths::MEDIATED_COUNTS, &Ack {}).await
    }

    async fn process_root(&self, vertex: VertexId) -> TraversalResult<()> {
        let _: Ack = self.call(paths::MEDIATED_ROOT, &VertexRequest { vertex }).await?;
        Ok(())
    }

    async fn process_vertex(&self, vertex: VertexId) -> TraversalResult<()> {
        let _: Ack = self
            .call(paths::MEDIATED_VERTEX, &VertexRequest { vertex })
            .await?;
        Ok(())
    }

    async fn process_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<()> {
        let _: Ack = self
            .call(paths::MEDIATED_EDGE, &EdgeViaRequest { edge, via })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PeerSatelliteClient for HttpStation {
    async fn enqueue_root(&self, vertex: VertexId) -> TraversalResult<()> {
        let _: Ack = self.call(paths::PEER_ROOT, &VertexRequest { vertex }).await?;
        Ok(())
    }

    async fn test_and_enqueue_edge(&self, edge: EdgeId, via: IncidenceId) -> TraversalResult<bool> {
        let response: DiscoveredResponse = self
            .call(paths::PEER_TEST_EDGE, &EdgeViaRequest { edge, via })
            .await?;
        Ok(response.discovered)
    }

    async fn test_and_enqueue_vertex(
        &self,
        vertex: VertexId,
        via: IncidenceId,
    ) -> TraversalResult<bool> {
        let response: DiscoveredResponse = self
            .call(paths::PEER_TEST_VERTEX, &VertexViaRequest { vertex, via })
            .await?;
        Ok(response.discovered)
    }

    async fn is_working(&self) -> TraversalResult<bool> {
        let response: WorkingResponse = self.call(paths::PEER_WORKING, &Ack {}).await?;
        Ok(response.working)
    }

    async fn status(&self) -> TraversalResult<SatelliteStatus> {
        self.call(paths::PEER_STATUS, &Ack {}).await
    }

    async fn stop(&self) -> TraversalResult<()> {
        let _: Ack = self.call(paths::PEER_STOP, &Ack {}).await?;
        Ok(())
    }
}

/// Creates [`HttpStation`] stubs sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    /// Build a connector with the given pool settings.
    pub fn new(config: &HttpPoolConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .connect_timeout(config.connect_timeout)
            .tcp_keepalive(config.tcp_keepalive)
            .build()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Stub for `hostname`.
    pub fn station(&self, hostname: &str) -> HttpStation {
        HttpStation::new(hostname, self.client.clone())
    }
}

#[async_trait]
impl Connector<dyn CoordinatorClient> for HttpConnector {
    async fn connect(&self, hostname: &str) -> Result<Arc<dyn CoordinatorClient>, ChannelError> {
        Ok(Arc::new(self.station(hostname)))
    }
}

#[async_trait]
impl Connector<dyn MediatedSatelliteClient> for HttpConnector {
    async fn connect(
        &self,
        hostname: &str,
    ) -> Result<Arc<dyn MediatedSatelliteClient>, ChannelError> {
        Ok(Arc::new(self.station(hostname)))
    }
}

#[async_trait]
impl Connector<dyn PeerSatelliteClient> for HttpConnector {
    async fn connect(&self, hostname: &str) -> Result<Arc<dyn PeerSatelliteClient>, ChannelError> {
        Ok(Arc::new(self.station(hostname)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_from_hostname() {
        let client = reqwest::Client::new();
        assert_eq!(HttpStation::new("10.0.0.2:8001", client.clone()).base_url, "http://10.0.0.2:8001");
        assert_eq!(
            HttpStation::new("http://station-1:8001/", client).base_url,
            "http://station-1:8001"
        );
    }

    #[tokio::test]
    async fn test_unreachable_station_is_transport_error() {
        let connector = HttpConnector::new(&HttpPoolConfig {
            connect_timeout: Duration::from_millis(200),
            ..HttpPoolConfig::default()
        })
        .unwrap();
        let station = connector.station("127.0.0.1:9");
        let err = PeerSatelliteClient::is_working(&station).await.unwrap_err();
        assert!(matches!(err, TraversalError::Channel(ChannelError::Transport(_))));
    }
}
