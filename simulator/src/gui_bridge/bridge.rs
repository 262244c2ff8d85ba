use crate::gui_bridge::model::{BridgeModel, CostmapView, SweepSummary};
use serde::Serialize;
use serde_json::json;
use sonarcore::diagnostics::MetricsRecorder;
use sonarcore::interface::SensorKind;
use sonarcore::processing::{CfarConfig, DetectionEngine};
use sonarcore::telemetry::TelemetryHub;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{
    http::StatusCode,
    reply::{Json, WithStatus},
    Filter,
};

pub const DEFAULT_PORT: u16 = 9000;

pub fn bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Handles shared between the scan pipeline and the HTTP routes.
#[derive(Clone)]
pub struct BridgeState {
    pub model: Arc<RwLock<BridgeModel>>,
    pub detector: Arc<DetectionEngine>,
    pub hub: Arc<TelemetryHub>,
    pub metrics: Arc<MetricsRecorder>,
}

impl BridgeState {
    pub fn new(
        detector: Arc<DetectionEngine>,
        hub: Arc<TelemetryHub>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            model: Arc::new(RwLock::new(BridgeModel::default())),
            detector,
            hub,
            metrics,
        }
    }

    pub fn publish_sweep(&self, summary: SweepSummary, costmap: CostmapView) {
        if let Ok(mut model) = self.model.write() {
            model.sweeps_seen += 1;
            model.latest_sweep = Some(summary);
            model.latest_costmap = Some(costmap);
        }
    }
}

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(body), status)
}

fn error_reply(message: &str, status: StatusCode) -> WithStatus<Json> {
    json_reply(&json!({ "error": message }), status)
}

fn latest_sweep(state: &BridgeState) -> WithStatus<Json> {
    match state.model.read() {
        Ok(model) => match &model.latest_sweep {
            Some(summary) => json_reply(summary, StatusCode::OK),
            None => error_reply("no sweep completed yet", StatusCode::NOT_FOUND),
        },
        Err(_) => error_reply("bridge state unavailable", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn latest_costmap(state: &BridgeState) -> WithStatus<Json> {
    match state.model.read() {
        Ok(model) => match &model.latest_costmap {
            Some(costmap) => json_reply(costmap, StatusCode::OK),
            None => error_reply("no sweep completed yet", StatusCode::NOT_FOUND),
        },
        Err(_) => error_reply("bridge state unavailable", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn latest_telemetry(state: &BridgeState, kind: &str) -> WithStatus<Json> {
    let kind: SensorKind = match kind.parse() {
        Ok(kind) => kind,
        Err(err) => return error_reply(&err.to_string(), StatusCode::BAD_REQUEST),
    };
    match state.hub.latest(kind) {
        Some(record) => json_reply(&record, StatusCode::OK),
        None => error_reply(
            &format!("no {} samples buffered", kind),
            StatusCode::NOT_FOUND,
        ),
    }
}

fn update_cfar(state: &BridgeState, config: CfarConfig) -> WithStatus<Json> {
    match state.detector.update_parameters(config) {
        Ok(()) => json_reply(
            &json!({ "status": "ok", "config": state.detector.config() }),
            StatusCode::OK,
        ),
        Err(err) => {
            log::warn!(target: "bridge", "rejected CFAR update: {}", err);
            error_reply(&err.to_string(), StatusCode::BAD_REQUEST)
        }
    }
}

/// JSON routes: `GET /sweep`, `GET /costmap`, `GET /telemetry/<kind>/latest`, `GET /metrics`, `GET|POST /cfar`.
pub fn routes(
    state: BridgeState,
) -> impl Filter<Extract = (WithStatus<Json>,), Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());

    let sweep_route = warp::path("sweep")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: BridgeState| latest_sweep(&state));

    let costmap_route = warp::path("costmap")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: BridgeState| latest_costmap(&state));

    let telemetry_route = warp::path!("telemetry" / String / "latest")
        .and(warp::get())
        .and(state_filter.clone())
        .map(|kind: String, state: BridgeState| latest_telemetry(&state, &kind));

    let metrics_route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: BridgeState| json_reply(&state.metrics.snapshot(), StatusCode::OK));

    let cfar_get = warp::path("cfar")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: BridgeState| json_reply(&state.detector.config(), StatusCode::OK));

    let cfar_post = warp::path("cfar")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter)
        .map(|config: CfarConfig, state: BridgeState| update_cfar(&state, config));

    sweep_route
        .or(costmap_route)
        .unify()
        .or(telemetry_route)
        .unify()
        .or(metrics_route)
        .unify()
        .or(cfar_get)
        .unify()
        .or(cfar_post)
        .unify()
}

/// Hosts the JSON bridge on its own thread so the scan runtime stays single-threaded.
pub struct GuiBridge {
    state: BridgeState,
    addr: SocketAddr,
}

impl GuiBridge {
    pub fn new(state: BridgeState, addr: SocketAddr) -> Self {
        let filter = routes(state.clone());
        thread::spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!(target: "bridge", "failed to build bridge runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                warp::serve(filter).run(addr).await;
            });
        });

        Self { state, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn publish_status(&self, message: &str) {
        log::info!(target: "bridge", "{}", message);
    }

    pub fn sweeps_seen(&self) -> u64 {
        self.state
            .model
            .read()
            .map(|model| model.sweeps_seen)
            .unwrap_or_default()
    }
}
