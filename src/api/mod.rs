use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::core::{
    AGE_LIMIT, DEFAULT_DIVIDEND_TAX_RATE, DEFAULT_MAX_AGE, Event, EventKind, MONTHS_PER_YEAR,
    PeriodResult, Preset, PresetRegistry, ProjectionInputs, builtin_events, builtin_presets,
    run_projection_with_summary,
};
use crate::error::{Error, Result};
use crate::report::{
    AgeFilter, AnnualRow, ChartPoint, Summary, build_chart, build_rows, summarize,
};

const DEFAULT_AGE_NOW: u32 = 30;
const DEFAULT_RETIRE_AGE: u32 = 65;
const MIN_WEIGHT: u32 = 1;
const MAX_WEIGHT: u32 = 10;

/// Scenario as submitted by a client or stored in a file. Every field is
/// optional and falls back to [`Scenario::defaults`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioPayload {
    pub age_now: Option<u32>,
    pub age_retire: Option<u32>,
    pub max_age: Option<u32>,
    pub start_year: Option<i32>,
    pub initial_investment: Option<f64>,
    pub dividend_tax_rate: Option<f64>,
    pub presets: Option<Vec<Preset>>,
    pub events: Option<Vec<Event>>,
    pub filter_age_from: Option<u32>,
    pub filter_age_to: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectQuery {
    age_now: Option<u32>,
    age_retire: Option<u32>,
    max_age: Option<u32>,
    start_year: Option<i32>,
    initial_investment: Option<f64>,
    dividend_tax_rate: Option<f64>,
    filter_age_from: Option<u32>,
    filter_age_to: Option<u32>,
}

impl From<ProjectQuery> for ScenarioPayload {
    fn from(query: ProjectQuery) -> Self {
        Self {
            age_now: query.age_now,
            age_retire: query.age_retire,
            max_age: query.max_age,
            start_year: query.start_year,
            initial_investment: query.initial_investment,
            dividend_tax_rate: query.dividend_tax_rate,
            presets: None,
            events: None,
            filter_age_from: query.filter_age_from,
            filter_age_to: query.filter_age_to,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub age_now: u32,
    pub age_retire: u32,
    pub max_age: u32,
    pub start_year: i32,
    pub initial_investment: f64,
    pub dividend_tax_rate: f64,
    pub presets: Vec<Preset>,
    pub events: Vec<Event>,
    pub filter_age_from: Option<u32>,
    pub filter_age_to: Option<u32>,
}

impl Scenario {
    pub fn defaults() -> Self {
        Self {
            age_now: DEFAULT_AGE_NOW,
            age_retire: DEFAULT_RETIRE_AGE,
            max_age: DEFAULT_MAX_AGE,
            start_year: chrono::Local::now().year(),
            initial_investment: 0.0,
            dividend_tax_rate: DEFAULT_DIVIDEND_TAX_RATE,
            presets: Vec::new(),
            events: builtin_events(),
            filter_age_from: None,
            filter_age_to: None,
        }
    }

    pub fn from_payload(payload: ScenarioPayload) -> Self {
        let mut scenario = Self::defaults();

        if let Some(v) = payload.age_now {
            scenario.age_now = v;
        }
        if let Some(v) = payload.age_retire {
            scenario.age_retire = v;
        }
        if let Some(v) = payload.max_age {
            scenario.max_age = v;
        }
        if let Some(v) = payload.start_year {
            scenario.start_year = v;
        }
        if let Some(v) = payload.initial_investment {
            scenario.initial_investment = v;
        }
        if let Some(v) = payload.dividend_tax_rate {
            scenario.dividend_tax_rate = v;
        }
        if let Some(v) = payload.presets {
            scenario.presets = v;
        }
        if let Some(v) = payload.events {
            scenario.events = v;
        }
        scenario.filter_age_from = payload.filter_age_from;
        scenario.filter_age_to = payload.filter_age_to;

        scenario
    }

    pub fn age_filter(&self) -> AgeFilter {
        let from = self.filter_age_from.unwrap_or(self.age_now).min(AGE_LIMIT);
        let to = self.filter_age_to.unwrap_or(self.max_age).min(AGE_LIMIT);
        AgeFilter::new(from, to)
    }
}

pub fn scenario_from_json(json: &str) -> Result<Scenario> {
    let payload = serde_json::from_str::<ScenarioPayload>(json)?;
    Ok(Scenario::from_payload(payload))
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let json = std::fs::read_to_string(path).map_err(|source| Error::ScenarioRead {
        path: path.to_path_buf(),
        source,
    })?;
    scenario_from_json(&json)
}

pub fn build_inputs(scenario: &Scenario) -> Result<ProjectionInputs> {
    let start_age = scenario.age_now.min(AGE_LIMIT);
    let retire_age = scenario.age_retire.min(AGE_LIMIT);
    let max_age = scenario.max_age.min(AGE_LIMIT);

    if max_age < start_age {
        return Err(Error::invalid("maxAge", "must be >= ageNow"));
    }

    if !scenario.initial_investment.is_finite() {
        return Err(Error::invalid("initialInvestment", "must be a finite number"));
    }

    if !(0.0..=1.0).contains(&scenario.dividend_tax_rate) {
        return Err(Error::invalid("dividendTaxRate", "must be between 0 and 1"));
    }

    let mut seen = HashSet::new();
    for preset in &scenario.presets {
        if preset.id.trim().is_empty() {
            return Err(Error::invalid("presets", "preset id must not be empty"));
        }
        if !seen.insert(preset.id.as_str()) {
            return Err(Error::invalid(
                "presets",
                format!("duplicate preset id '{}'", preset.id),
            ));
        }
        if !preset.annual_return_pct.is_finite() || !preset.dividend_pct.is_finite() {
            return Err(Error::invalid(
                "presets",
                format!("preset '{}' has a non-finite rate", preset.id),
            ));
        }
    }

    let mut registry = PresetRegistry::with_builtins();
    for preset in &scenario.presets {
        registry.insert(Preset {
            builtin: false,
            ..preset.clone()
        });
    }

    let events = scenario
        .events
        .iter()
        .map(normalize_event)
        .collect::<Result<Vec<_>>>()?;

    Ok(ProjectionInputs {
        presets: registry.into_vec(),
        events,
        start_age,
        retire_age,
        max_age,
        start_year: scenario.start_year,
        dividend_tax_rate: scenario.dividend_tax_rate,
        initial_lump_sum: scenario.initial_investment,
    })
}

fn normalize_event(event: &Event) -> Result<Event> {
    if let Some(amount) = event.kind.amount() {
        if !amount.is_finite() {
            return Err(Error::invalid(
                "events",
                format!("event '{}' has a non-finite amount", event.id),
            ));
        }
    }

    let mut event = event.clone();
    event.age = event.age.min(AGE_LIMIT);
    event.month = event.month.clamp(1, MONTHS_PER_YEAR);
    if let EventKind::PortfolioChange { weight, .. } = &mut event.kind {
        *weight = (*weight).clamp(MIN_WEIGHT, MAX_WEIGHT);
    }
    Ok(event)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub start_year: i32,
    pub age_now: u32,
    pub age_retire: u32,
    pub max_age: u32,
    pub periods: Vec<PeriodResult>,
    pub rows: Vec<AnnualRow>,
    pub chart: Vec<ChartPoint>,
    pub summary: Summary,
}

pub fn project_scenario(scenario: &Scenario) -> Result<ProjectResponse> {
    let inputs = build_inputs(scenario)?;
    let registry = PresetRegistry::new(inputs.presets.clone());
    let result = run_projection_with_summary(&inputs);
    let filter = scenario.age_filter();

    let rows = build_rows(&result, &inputs.events, &registry, filter);
    let chart = build_chart(&result, filter);
    let summary = summarize(&result);

    Ok(ProjectResponse {
        start_year: inputs.start_year,
        age_now: inputs.start_age,
        age_retire: inputs.retire_age,
        max_age: inputs.max_age,
        periods: result.periods,
        rows,
        chart,
        summary,
    })
}

#[derive(Debug, Serialize)]
struct PresetsResponse {
    presets: Vec<Preset>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    info!("projection API listening on http://{addr}");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route("/api/presets", get(presets_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .fallback(not_found_handler)
}

async fn presets_handler() -> Response {
    json_response(
        StatusCode::OK,
        PresetsResponse {
            presets: builtin_presets(),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(query): Query<ProjectQuery>) -> Response {
    project_handler_impl(query.into()).await
}

async fn project_post_handler(Json(payload): Json<ScenarioPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: ScenarioPayload) -> Response {
    let scenario = Scenario::from_payload(payload);
    debug!(
        age_now = scenario.age_now,
        max_age = scenario.max_age,
        events = scenario.events.len(),
        "projection request"
    );

    match project_scenario(&scenario) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
