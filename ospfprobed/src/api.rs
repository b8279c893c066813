//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use ospfprobe_core::instance::InstanceHandle;
use ospfprobe_packet::lsa::{Lsa, LsaTypeCode};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::config::Query;

#[derive(Clone)]
struct AppState {
    instance: InstanceHandle,
    start_time: DateTime<Utc>,
    start_instant: Instant,
}

/// Builds the read-only query-surface router (§6, §6a): exactly the four
/// routes below, no mutation routes anywhere. HTTP Basic auth middleware is
/// layered on when `username`/`password` are both configured.
pub fn router(instance: InstanceHandle, query: &Query) -> Router {
    let state = AppState {
        instance,
        start_time: Utc::now(),
        start_instant: Instant::now(),
    };

    let router = Router::new()
        .route("/lsdb", get(get_lsdb))
        .route("/lsdb/{lsa_type}", get(get_lsdb_typed))
        .route("/lsdb_summary", get(get_lsdb_summary))
        .route("/stats", get(get_stats))
        .route("/probe", get(get_probe))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match (&query.username, &query.password) {
        (Some(username), Some(password)) => {
            router.layer(tower_http::validate_request::ValidateRequestHeaderLayer::basic(
                username, password,
            ))
        }
        _ => router,
    }
}

async fn get_lsdb(State(state): State<AppState>) -> Json<Vec<Lsa>> {
    Json(state.instance.lsdb.snapshot().await)
}

async fn get_lsdb_typed(
    State(state): State<AppState>,
    Path(lsa_type): Path<String>,
) -> Result<Json<Vec<Lsa>>, StatusCode> {
    let type_code = parse_type_name(&lsa_type).ok_or(StatusCode::NOT_FOUND)?;
    let lsas = state
        .instance
        .lsdb
        .snapshot()
        .await
        .into_iter()
        .filter(|lsa| lsa.hdr.lsa_type.type_code() == Some(type_code))
        .collect();
    Ok(Json(lsas))
}

fn parse_type_name(name: &str) -> Option<LsaTypeCode> {
    match name {
        "router" => Some(LsaTypeCode::Router),
        "network" => Some(LsaTypeCode::Network),
        "summary_network" => Some(LsaTypeCode::SummaryNetwork),
        "summary_router" => Some(LsaTypeCode::SummaryRouter),
        "as_external" => Some(LsaTypeCode::AsExternal),
        "nssa" => Some(LsaTypeCode::Nssa),
        "opaque_link" => Some(LsaTypeCode::OpaqueLink),
        "opaque_area" => Some(LsaTypeCode::OpaqueArea),
        "opaque_as" => Some(LsaTypeCode::OpaqueAs),
        _ => None,
    }
}

#[derive(Default, Serialize)]
struct LsdbSummary {
    router: usize,
    network: usize,
    summary_network: usize,
    summary_router: usize,
    as_external: usize,
    nssa: usize,
    opaque_link: usize,
    opaque_area: usize,
    opaque_as: usize,
    total: usize,
}

async fn get_lsdb_summary(State(state): State<AppState>) -> Json<LsdbSummary> {
    let mut summary = LsdbSummary::default();
    for lsa in state.instance.lsdb.snapshot().await {
        summary.total += 1;
        match lsa.hdr.lsa_type.type_code() {
            Some(LsaTypeCode::Router) => summary.router += 1,
            Some(LsaTypeCode::Network) => summary.network += 1,
            Some(LsaTypeCode::SummaryNetwork) => summary.summary_network += 1,
            Some(LsaTypeCode::SummaryRouter) => summary.summary_router += 1,
            Some(LsaTypeCode::AsExternal) => summary.as_external += 1,
            Some(LsaTypeCode::Nssa) => summary.nssa += 1,
            Some(LsaTypeCode::OpaqueLink) => summary.opaque_link += 1,
            Some(LsaTypeCode::OpaqueArea) => summary.opaque_area += 1,
            Some(LsaTypeCode::OpaqueAs) => summary.opaque_as += 1,
            None => {}
        }
    }
    Json(summary)
}

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.instance.stats_snapshot())
}

#[derive(Serialize)]
struct ProbeInfo {
    router_id: Option<std::net::Ipv4Addr>,
    start_time: DateTime<Utc>,
    running_time_secs: u64,
}

async fn get_probe(State(state): State<AppState>) -> Json<ProbeInfo> {
    let snapshot = state.instance.snapshot().await;
    Json(ProbeInfo {
        router_id: snapshot.map(|s| s.router_id),
        start_time: state.start_time,
        running_time_secs: state.start_instant.elapsed().as_secs(),
    })
}
