use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use mcsc_model::{
    Allowlist, BannedIp, BannedIpList, BannedPlayer, BannedPlayerList, LaunchArguments, Operator,
    OperatorList, PlayerRef, RuntimeProperties, ServerStatus,
};
use serde::{Deserialize, Serialize};

use crate::{api_error::ApiResult, state::AppState};

const DEFAULT_LOG_LIMIT: usize = 200;
const MAX_LOG_LIMIT: usize = 2000;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/restart", post(restart))
        .route("/allowlist", get(allowlist).put(set_allowlist))
        .route("/allowlist/add", post(allowlist_add))
        .route("/allowlist/remove", post(allowlist_remove))
        .route("/banned-ips", get(banned_ips).put(set_banned_ips))
        .route("/ban-ip", post(ban_ip))
        .route("/pardon-ip", post(pardon_ip))
        .route("/banned-players", get(banned_players).put(set_banned_players))
        .route("/ban", post(ban))
        .route("/pardon", post(pardon))
        .route("/ops", get(ops).put(set_ops))
        .route("/op", post(op))
        .route("/deop", post(deop))
        .route("/properties", get(properties).put(set_properties))
        .route("/args", get(args).put(set_args))
        .route("/versions", get(versions))
        .route("/version", post(set_version))
        .route("/command", post(command))
        .route("/save", post(save))
        .route("/logs", get(logs))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
    version: &'static str,
}

async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status(State(state): State<AppState>) -> Json<ServerStatus> {
    Json(state.controller.status().await)
}

async fn start(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<ServerStatus>)> {
    let status = state.controller.start().await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn stop(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<ServerStatus>)> {
    let status = state.controller.stop().await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn restart(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<ServerStatus>)> {
    let status = state.controller.restart().await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn allowlist(State(state): State<AppState>) -> ApiResult<Json<Allowlist>> {
    Ok(Json(state.controller.allowlist().await?))
}

async fn set_allowlist(
    State(state): State<AppState>,
    Json(players): Json<Allowlist>,
) -> ApiResult<StatusCode> {
    state.controller.set_allowlist(players).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn allowlist_add(
    State(state): State<AppState>,
    Json(player): Json<PlayerRef>,
) -> ApiResult<StatusCode> {
    state.controller.allow_player(player).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn allowlist_remove(
    State(state): State<AppState>,
    Json(player): Json<PlayerRef>,
) -> ApiResult<StatusCode> {
    state.controller.disallow_player(&player).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn banned_ips(State(state): State<AppState>) -> ApiResult<Json<BannedIpList>> {
    Ok(Json(state.controller.banned_ips().await?))
}

async fn set_banned_ips(
    State(state): State<AppState>,
    Json(bans): Json<BannedIpList>,
) -> ApiResult<StatusCode> {
    state.controller.set_banned_ips(bans).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ban_ip(
    State(state): State<AppState>,
    Json(ban): Json<BannedIp>,
) -> ApiResult<StatusCode> {
    state.controller.ban_ip(ban).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct PardonIpRequest {
    ip: String,
}

async fn pardon_ip(
    State(state): State<AppState>,
    Json(req): Json<PardonIpRequest>,
) -> ApiResult<StatusCode> {
    state.controller.pardon_ip(&req.ip).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn banned_players(State(state): State<AppState>) -> ApiResult<Json<BannedPlayerList>> {
    Ok(Json(state.controller.banned_players().await?))
}

async fn set_banned_players(
    State(state): State<AppState>,
    Json(bans): Json<BannedPlayerList>,
) -> ApiResult<StatusCode> {
    state.controller.set_banned_players(bans).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ban(
    State(state): State<AppState>,
    Json(ban): Json<BannedPlayer>,
) -> ApiResult<StatusCode> {
    state.controller.ban_player(ban).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pardon(
    State(state): State<AppState>,
    Json(player): Json<PlayerRef>,
) -> ApiResult<StatusCode> {
    state.controller.pardon_player(&player).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ops(State(state): State<AppState>) -> ApiResult<Json<OperatorList>> {
    Ok(Json(state.controller.operators().await?))
}

async fn set_ops(
    State(state): State<AppState>,
    Json(ops): Json<OperatorList>,
) -> ApiResult<StatusCode> {
    state.controller.set_operators(ops).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn op(State(state): State<AppState>, Json(op): Json<Operator>) -> ApiResult<StatusCode> {
    state.controller.op(op).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn deop(
    State(state): State<AppState>,
    Json(player): Json<PlayerRef>,
) -> ApiResult<StatusCode> {
    state.controller.deop(&player).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn properties(State(state): State<AppState>) -> ApiResult<Json<RuntimeProperties>> {
    Ok(Json(state.controller.properties().await?))
}

async fn set_properties(
    State(state): State<AppState>,
    Json(props): Json<RuntimeProperties>,
) -> StatusCode {
    state.controller.set_properties(props).await;
    StatusCode::NO_CONTENT
}

async fn args(State(state): State<AppState>) -> ApiResult<Json<LaunchArguments>> {
    Ok(Json(state.controller.arguments().await?))
}

async fn set_args(
    State(state): State<AppState>,
    Json(args): Json<LaunchArguments>,
) -> ApiResult<StatusCode> {
    state.controller.set_arguments(args).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn versions(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.controller.versions().await?))
}

#[derive(Debug, Deserialize)]
struct SetVersionQuery {
    version: String,
}

async fn set_version(
    State(state): State<AppState>,
    Query(q): Query<SetVersionQuery>,
) -> ApiResult<StatusCode> {
    state.controller.set_version(&q.version).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: String,
}

async fn command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> ApiResult<StatusCode> {
    state.controller.run_command(&req.command).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn save(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.controller.save_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    #[serde(default)]
    cursor: u64,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct LogsResponse {
    lines: Vec<String>,
    cursor: u64,
}

async fn logs(State(state): State<AppState>, Query(q): Query<LogsQuery>) -> Json<LogsResponse> {
    let limit = q.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let (lines, cursor) = state.controller.console_log(q.cursor, limit).await;
    Json(LogsResponse { lines, cursor })
}
