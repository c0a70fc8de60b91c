use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Whether durable storage currently backs the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Storage reachable.
    Ok,
    /// Storage unreachable; scoring requests are refused until it returns.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `degraded` while storage is unreachable.
    pub status: HealthStatus,
    /// Channel scope this instance publishes and listens on.
    pub scope: String,
    /// Identifier stamped on relayed snapshots from this instance.
    pub instance_id: Uuid,
}
