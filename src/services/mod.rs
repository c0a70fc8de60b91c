/// Per-court fan-out of score snapshots.
pub mod broadcast_hub;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Court lifecycle: advancing to the next match and finishing the current one.
pub mod match_service;
/// Recording device start/stop client.
pub mod recorder_client;
/// Snapshot cache and cross-process distribution backends.
pub mod relay;
/// Retry policy shared by remote callers.
pub mod retry;
/// Point scoring operations.
pub mod score_service;
/// Server-Sent Events streams of court snapshots.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Viewer WebSocket sessions.
pub mod viewer_service;
/// Operations-hub webhook notifier.
pub mod webhook_client;

#[cfg(test)]
pub(crate) mod test_support;
