use crate::configuration::Ipmi;
use crate::error::Error;
use crate::home_assistant::DiscoveryBuilder;
use crate::ipmi::component::{Component, DeviceData};
use crate::ipmi::executor::CommandRunner;
use crate::ipmi::{device, fan, temperature};
use crate::publisher;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use log::{error, info, warn};
use rumqttc::{AsyncClient, ClientError};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Everything the HTTP handlers need
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn CommandRunner>,
    pub ipmi: Ipmi,

    /// Present when the MQTT side of the bridge is enabled
    pub mqtt: Option<MqttState>,
}

/// MQTT handle shared with the discovery endpoints
#[derive(Clone)]
pub struct MqttState {
    pub client: AsyncClient,
    pub discovery_prefix: String,
    pub device_data: Arc<DeviceData>,
    pub discovery: Arc<DiscoveryBuilder>,
}

/// Plain-text 400 response, the uniform error shape of the API
#[derive(Debug)]
struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("Request failed: {}", self.0);
        (StatusCode::BAD_REQUEST, self.0).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> ApiError {
        ApiError(err.to_string())
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> ApiError {
        ApiError(format!("mqtt publish failed: {err}"))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/fanspeed/all", get(all_fan_speeds))
        .route("/fanspeed/", get(first_fan_speed))
        .route("/fanspeed/set", post(set_fan_speed))
        .route("/fanspeed/set/{speed}", get(set_fan_speed_by_path))
        .route("/temperature/all", get(all_temperatures))
        .route("/dell/fan-control-override/", get(override_status))
        .route("/dell/fan-control-override/{action}", get(set_override))
        .route("/device/info", get(device_info))
        .route("/hass/discovery/do", put(do_discovery))
        .route("/hass/discovery/undo", put(undo_discovery))
        .with_state(state)
}

/// Serves the API until the process is torn down
pub async fn serve(state: AppState, port: u16) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("HTTP API listening on 0.0.0.0:{port}");
    axum::serve(listener, router(state)).await
}

async fn all_fan_speeds(State(state): State<AppState>) -> Result<Json<Vec<Component>>, ApiError> {
    Ok(Json(
        fan::get_fan_speeds(state.runner.as_ref(), &state.ipmi).await?,
    ))
}

/// The fan with sensor id 1 when present, the first reported one otherwise
async fn first_fan_speed(State(state): State<AppState>) -> Result<Json<Component>, ApiError> {
    let mut fans = fan::get_fan_speeds(state.runner.as_ref(), &state.ipmi).await?;

    // The parser never returns an empty list
    let index = fans
        .iter()
        .position(|fan| fan.entity().id == 1)
        .unwrap_or(0);
    Ok(Json(fans.swap_remove(index)))
}

async fn all_temperatures(State(state): State<AppState>) -> Result<Json<Vec<Component>>, ApiError> {
    Ok(Json(
        temperature::get_temperatures(state.runner.as_ref()).await?,
    ))
}

#[derive(Deserialize)]
struct SetFanSpeedBody {
    speed_pct: f64,
}

async fn set_fan_speed(
    State(state): State<AppState>,
    payload: Result<Json<SetFanSpeedBody>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError(rejection.body_text()))?;
    fan::set_fan_speed_percent(state.runner.as_ref(), body.speed_pct).await?;
    Ok("ok")
}

async fn set_fan_speed_by_path(
    State(state): State<AppState>,
    Path(speed): Path<String>,
) -> Result<&'static str, ApiError> {
    if speed == "auto" {
        fan::set_auto_fan_control(state.runner.as_ref()).await?;
        return Ok("ok");
    }

    let percent: f64 = speed
        .parse()
        .map_err(|_| Error::Validation(format!("speed must be a number or `auto`, got `{speed}`")))?;
    fan::set_fan_speed_percent(state.runner.as_ref(), percent).await?;
    Ok("ok")
}

async fn override_status(State(state): State<AppState>) -> Result<String, ApiError> {
    let status = fan::get_third_party_override(state.runner.as_ref()).await?;
    Ok(format!("Third party cards fan control override is {status}"))
}

async fn set_override(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> Result<String, ApiError> {
    match action.as_str() {
        "disable" => fan::disable_third_party_override(state.runner.as_ref()).await?,
        "enable" => fan::restore_third_party_override(state.runner.as_ref()).await?,
        _ => {
            return Err(Error::Validation(format!(
                "invalid action `{action}`. Valid values are `enable` or `disable`"
            ))
            .into());
        }
    }
    Ok(format!("Third party cards fan control override {action}d."))
}

/// Device info is best-effort metadata: a fetch failure yields a null body,
/// not an error response
async fn device_info(State(state): State<AppState>) -> Json<Value> {
    match device::get_device_info(state.runner.as_ref(), state.ipmi.device_name.as_deref()).await {
        Ok(info) => Json(serde_json::to_value(info).unwrap_or(Value::Null)),
        Err(err) => {
            error!("Could not read device info: {err}");
            Json(Value::Null)
        }
    }
}

async fn do_discovery(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let mqtt = mqtt_state(&state)?;
    publisher::publish_discovery(
        &mqtt.client,
        &mqtt.discovery_prefix,
        &mqtt.discovery,
        &mqtt.device_data.components,
    )
    .await?;
    Ok("ok")
}

async fn undo_discovery(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let mqtt = mqtt_state(&state)?;
    publisher::retract_discovery(
        &mqtt.client,
        &mqtt.discovery_prefix,
        &mqtt.discovery,
        &mqtt.device_data.components,
    )
    .await?;
    Ok("ok")
}

fn mqtt_state(state: &AppState) -> Result<&MqttState, ApiError> {
    state
        .mqtt
        .as_ref()
        .ok_or_else(|| ApiError(String::from("mqtt not connected")))
}
