//! Request handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::Json;
use prometheus::TextEncoder;
use serde::{Deserialize, Serialize};

use jamscan_sync::SyncState;
use jamscan_types::{sort_for_display, BlockRecord, HeaderHash, Report};

use crate::error::ApiError;
use crate::pagination::{paginate, Page, PageQuery};
use crate::server::ApiState;

/// `GET /status` — liveness, sync state, the `now` signal, and store size.
pub async fn get_status(State(state): State<ApiState>) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.status.borrow().clone();
    let now = *state.now.borrow();
    Ok(Json(StatusResponse {
        endpoint: status.endpoint,
        state: status.state,
        connected: status.connected,
        now: now.as_millis(),
        last_resync: status.last_resync.map(|t| t.as_millis()),
        possible_gap: status.possible_gap,
        record_count: state.records.count()?,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub endpoint: String,
    pub state: SyncState,
    pub connected: bool,
    pub now: u64,
    pub last_resync: Option<u64>,
    pub possible_gap: bool,
    pub record_count: u64,
}

/// `GET /blocks` — newest first, paginated.
pub async fn list_blocks(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<BlockSummary>>, ApiError> {
    let mut records = state.records.list_all()?;
    sort_for_display(&mut records);
    let summaries: Vec<BlockSummary> = records.iter().map(BlockSummary::from_record).collect();
    Ok(Json(paginate(summaries, &query)))
}

#[derive(Debug, Serialize)]
pub struct BlockSummary {
    pub header_hash: String,
    pub slot: Option<u64>,
    pub created_at: Option<u64>,
    pub report_count: usize,
    pub has_state: bool,
}

impl BlockSummary {
    fn from_record(record: &BlockRecord) -> Self {
        Self {
            header_hash: record.header_hash.to_hex(),
            slot: record.block.as_ref().map(|b| b.header.slot),
            created_at: record.created_at().map(|t| t.as_millis()),
            report_count: record.reports().count(),
            has_state: record.state.is_some(),
        }
    }
}

/// `GET /blocks/:hash` — the full stored record.
pub async fn get_block(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> Result<Json<BlockRecord>, ApiError> {
    let hash = HeaderHash::from_hex(&hash).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    match state.records.get_by_hash(&hash)? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::NotFound(hash.to_hex())),
    }
}

/// `GET /reports` — work reports across blocks, newest blocks first.
pub async fn list_reports(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<ReportItem>>, ApiError> {
    let mut records = state.records.list_all()?;
    sort_for_display(&mut records);
    let items: Vec<ReportItem> = records
        .iter()
        .flat_map(|record| {
            record.reports().map(move |report| ReportItem {
                header_hash: record.header_hash.to_hex(),
                core_index: report.core_index,
                report: report.clone(),
            })
        })
        .collect();
    Ok(Json(paginate(items, &query)))
}

#[derive(Debug, Serialize)]
pub struct ReportItem {
    pub header_hash: String,
    pub core_index: u32,
    pub report: Report,
}

/// `GET /endpoints` — the persisted known set plus the active one.
pub async fn list_endpoints(
    State(state): State<ApiState>,
) -> Result<Json<EndpointsResponse>, ApiError> {
    let known = state
        .registry
        .list_known()?
        .into_iter()
        .map(|e| e.url)
        .collect();
    Ok(Json(EndpointsResponse {
        active: state.registry.active(),
        known,
    }))
}

#[derive(Debug, Serialize)]
pub struct EndpointsResponse {
    pub active: String,
    pub known: Vec<String>,
}

/// `POST /endpoints/active` — switch (or retry) the node endpoint.
pub async fn set_endpoint(
    State(state): State<ApiState>,
    Json(body): Json<SetEndpointRequest>,
) -> Result<StatusCode, ApiError> {
    if !body.url.starts_with("ws://") && !body.url.starts_with("wss://") {
        return Err(ApiError::BadRequest(format!(
            "not a websocket url: {}",
            body.url
        )));
    }
    state.registry.set_active(&body.url)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetEndpointRequest {
    pub url: String,
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn get_metrics(
    State(state): State<ApiState>,
) -> Result<([(header::HeaderName, &'static str); 1], String), ApiError> {
    let families = state.metrics.registry.gather();
    let body = TextEncoder::new()
        .encode_to_string(&families)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::watch;

    use jamscan_store::{BlockRecordStore, MemoryStore};
    use jamscan_sync::{EndpointRegistry, SyncMetrics, SyncStatus};
    use jamscan_types::{Block, Header, Timestamp};
    use serde_json::json;

    fn hash(byte: u8) -> HeaderHash {
        HeaderHash::new([byte; 32])
    }

    fn test_state(store: Arc<MemoryStore>) -> ApiState {
        let registry = Arc::new(
            EndpointRegistry::open(store.clone(), store.clone(), "ws://localhost:9999/ws")
                .expect("registry"),
        );
        let (_status_tx, status) = watch::channel(SyncStatus::idle(registry.active()));
        let (_now_tx, now) = watch::channel(Timestamp::from_millis(1_000));
        ApiState {
            records: store,
            registry,
            status,
            now,
            metrics: Arc::new(SyncMetrics::new()),
        }
    }

    fn seed_block(store: &MemoryStore, byte: u8, slot: u64, created_ms: u64) {
        let block = Block {
            header: Header {
                slot,
                ..Default::default()
            },
            ..Default::default()
        };
        store
            .upsert(&BlockRecord::draft(
                hash(byte),
                block,
                Timestamp::from_millis(created_ms),
            ))
            .unwrap();
    }

    #[tokio::test]
    async fn blocks_come_back_newest_first() {
        let store = Arc::new(MemoryStore::new());
        seed_block(&store, 1, 10, 100);
        seed_block(&store, 2, 11, 300);
        seed_block(&store, 3, 12, 200);

        let state = test_state(store);
        let Json(page) = list_blocks(State(state), Query(PageQuery::default()))
            .await
            .unwrap();

        let slots: Vec<_> = page.items.iter().map(|b| b.slot).collect();
        assert_eq!(slots, vec![Some(11), Some(12), Some(10)]);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn block_lookup_handles_found_missing_and_malformed() {
        let store = Arc::new(MemoryStore::new());
        seed_block(&store, 7, 70, 100);
        let state = test_state(store);

        let Json(record) = get_block(State(state.clone()), Path(hash(7).to_hex()))
            .await
            .unwrap();
        assert_eq!(record.block.unwrap().header.slot, 70);

        let missing = get_block(State(state.clone()), Path(hash(8).to_hex())).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        let malformed = get_block(State(state), Path("0xnope".to_string())).await;
        assert!(matches!(malformed, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn status_reports_record_count_and_now() {
        let store = Arc::new(MemoryStore::new());
        seed_block(&store, 1, 1, 50);
        let state = test_state(store);

        let Json(status) = get_status(State(state)).await.unwrap();
        assert_eq!(status.record_count, 1);
        assert_eq!(status.now, 1_000);
        assert!(!status.connected);
        assert!(!status.possible_gap);
    }

    #[tokio::test]
    async fn endpoint_switch_validates_scheme() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(store);

        let bad = set_endpoint(
            State(state.clone()),
            Json(SetEndpointRequest {
                url: "http://nope".to_string(),
            }),
        )
        .await;
        assert!(matches!(bad, Err(ApiError::BadRequest(_))));

        let ok = set_endpoint(
            State(state.clone()),
            Json(SetEndpointRequest {
                url: "ws://other:9999/ws".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(ok, StatusCode::NO_CONTENT);

        let Json(endpoints) = list_endpoints(State(state)).await.unwrap();
        assert_eq!(endpoints.active, "ws://other:9999/ws");
        assert_eq!(endpoints.known.len(), 2);
    }

    #[tokio::test]
    async fn reports_flatten_guarantees_across_blocks() {
        let store = Arc::new(MemoryStore::new());
        let block: Block = serde_json::from_value(json!({
            "header": {"slot": 5},
            "extrinsic": {"guarantees": [
                {"report": {"core_index": 0}, "slot": 5},
                {"report": {"core_index": 1}, "slot": 5}
            ]}
        }))
        .unwrap();
        store
            .upsert(&BlockRecord::draft(
                hash(9),
                block,
                Timestamp::from_millis(10),
            ))
            .unwrap();

        let state = test_state(store);
        let Json(page) = list_reports(State(state), Query(PageQuery::default()))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].core_index, 0);
        assert_eq!(page.items[1].core_index, 1);
    }
}
