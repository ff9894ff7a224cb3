//! HTTP handlers

use axum::Json;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::debug;

use super::AppState;
use super::help::HELP_PAGE;
use crate::crawl::crawl;
use crate::error::{RateLimitKind, ServiceError};
use crate::orchestrator::{Caller, ConversionOptions, ConversionRequest, ConversionResult};
use crate::utils::constants::{ERROR_SENTINEL, RATE_LIMIT_SENTINEL};
use crate::utils::parse_http_url;

const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Query parameters of the conversion endpoint. Flags are on only when
/// literally `true`.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertParams {
    pub url: Option<String>,
    pub subpages: Option<String>,
    pub nocache: Option<String>,
    #[serde(rename = "llmFilter")]
    pub llm_filter: Option<String>,
}

fn flag(value: Option<&String>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

impl ConvertParams {
    fn options(&self) -> ConversionOptions {
        ConversionOptions {
            bypass_cache: flag(self.nocache.as_ref()),
            apply_content_filter: flag(self.llm_filter.as_ref()),
            crawl_linked: flag(self.subpages.as_ref()),
        }
    }
}

/// Caller identity from the bearer token and the client address.
///
/// Proxy headers win over the socket address so that callers behind a
/// reverse proxy are limited individually.
pub fn caller_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    api_secret: Option<&str>,
) -> Caller {
    let privileged = match (api_secret, bearer_token(headers)) {
        (Some(secret), Some(token)) => !secret.is_empty() && token == secret,
        _ => false,
    };

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let ip = forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()));

    Caller { ip, privileged }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn json_response(status: StatusCode, results: &[ConversionResult]) -> Response {
    (status, Json(results)).into_response()
}

fn markdown_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static(MARKDOWN_CONTENT_TYPE))],
        body,
    )
        .into_response()
}

/// Error shape of a failed text-mode conversion
fn text_failure(result: ConversionResult) -> Response {
    let status = result.status_code();
    let message = result
        .error_details
        .clone()
        .unwrap_or_else(|| result.md.trim_start_matches(ERROR_SENTINEL).to_string());

    let err = if status == 429 {
        let kind = if result.md == RATE_LIMIT_SENTINEL {
            RateLimitKind::Platform
        } else {
            RateLimitKind::Upstream
        };
        ServiceError::RateLimited { kind, message }
    } else {
        ServiceError::Extraction {
            url: result.url,
            status,
            message,
        }
    };
    err.into_response()
}

/// `GET /?url=...`
pub async fn convert(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Query(params): Query<ConvertParams>,
) -> Response {
    if method != Method::GET {
        return ServiceError::MethodNotAllowed.into_response();
    }

    let Some(raw) = params.url.as_deref() else {
        return Html(HELP_PAGE).into_response();
    };
    let Some(url) = parse_http_url(raw) else {
        return ServiceError::Validation(raw.to_string()).into_response();
    };

    let request = ConversionRequest {
        url,
        options: params.options(),
        caller: caller_identity(
            &headers,
            peer.map(|ConnectInfo(addr)| addr),
            state.api_secret.as_deref(),
        ),
    };
    debug!(url = %request.url, options = ?request.options, "Conversion request");

    let in_flight = state.lifecycle.request_started().await;
    let response = respond(&state, &request, wants_json(&headers)).await;
    in_flight.finish().await;
    response
}

async fn respond(state: &AppState, request: &ConversionRequest, json: bool) -> Response {
    let ConversionRequest {
        url,
        options,
        caller,
    } = request;

    if options.crawl_linked {
        let outcome = crawl(&state.converter, url, options, caller, state.max_links).await;
        let seed_status = status_of(outcome.seed.status_code());
        return if json {
            json_response(seed_status, &outcome.into_documents())
        } else {
            let combined = outcome.into_combined();
            if combined.is_error() {
                text_failure(combined)
            } else {
                markdown_response(combined.md)
            }
        };
    }

    let result = state.converter.convert_one(url, options, caller).await.annotated();
    if json {
        json_response(status_of(result.status_code()), std::slice::from_ref(&result))
    } else if result.is_error() {
        text_failure(result)
    } else {
        markdown_response(result.md)
    }
}

/// `GET /health`. Reads state only; does not count as activity.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.lifecycle.state().await;
    Json(json!({ "status": "ok", "engine": engine }))
}
