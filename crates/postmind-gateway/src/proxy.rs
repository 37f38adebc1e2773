//! Reverse proxy: route resolution, path rewriting, identity injection.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::config::GatewayConfig;
use crate::middleware::{AuthenticatedUser, MAX_BODY_BYTES};
use crate::state::GatewayState;

/// Where a request is forwarded and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Upstream base URL.
    pub base_url: String,
    /// Rewritten path sent upstream.
    pub path: String,
    /// Whether gateway identity headers are injected.
    pub inject_identity: bool,
}

/// Map an incoming path to its upstream.
///
/// Rewrites:
/// - `GET /api/v1/integrations/email` → `GET /api/integrations/{user_id}`
/// - other `/api/v1/integrations/email...` → `/api/integrations`
/// - `/api/v1/reminders...` → `/api/v1/tasks` (collector upstream)
pub fn resolve_route(
    config: &GatewayConfig,
    method: &str,
    path: &str,
    user_id: Option<&str>,
) -> Option<ResolvedRoute> {
    if path == "/auth" || path.starts_with("/auth/") {
        return Some(ResolvedRoute {
            base_url: config.auth_url.clone(),
            path: path.to_string(),
            inject_identity: false,
        });
    }

    if path.starts_with("/api/v1/integrations/email") {
        let rewritten = if method == "GET" {
            format!("/api/integrations/{}", user_id.unwrap_or_default())
        } else {
            "/api/integrations".to_string()
        };
        return Some(ResolvedRoute {
            base_url: config.core_url.clone(),
            path: rewritten,
            inject_identity: true,
        });
    }

    if path.starts_with("/api/v1/reminders") {
        return Some(ResolvedRoute {
            base_url: config.collector_url.clone(),
            path: "/api/v1/tasks".to_string(),
            inject_identity: true,
        });
    }

    if path.starts_with("/api/v1/tasks") {
        return Some(ResolvedRoute {
            base_url: config.collector_url.clone(),
            path: path.to_string(),
            inject_identity: true,
        });
    }

    // Machine routes: /internal/{service}/rest-of-path.
    if let Some(rest) = path.strip_prefix("/internal/") {
        let (service, tail) = rest.split_once('/').unwrap_or((rest, ""));
        let base_url = match service {
            "auth" => config.auth_url.clone(),
            "core" => config.core_url.clone(),
            "collector" => config.collector_url.clone(),
            "analyzer" => config.analyzer_url.clone(),
            _ => return None,
        };
        return Some(ResolvedRoute {
            base_url,
            path: format!("/{tail}"),
            inject_identity: true,
        });
    }

    None
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}

/// Headers the gateway owns on identity-injected routes; client-supplied
/// values must not ride along.
fn is_identity_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "authorization" | "x-internal-token" | "x-user-id" | "x-forwarded-by"
    )
}

fn forwarded_headers(from: &HeaderMap, inject_identity: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in from {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if inject_identity && is_identity_header(name.as_str()) {
            continue;
        }
        headers.append(name, value.clone());
    }
    headers
}

fn bad_gateway() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": "Service unavailable" })),
    )
        .into_response()
}

/// Forward a request to its upstream service.
pub async fn proxy(State(state): State<GatewayState>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let user_id = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.0.clone());

    let Some(route) = resolve_route(&state.config, method.as_str(), &path, user_id.as_deref())
    else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "route not found" })),
        )
            .into_response();
    };

    let mut url = format!("{}{}", route.base_url, route.path);
    if let Some(query) = query {
        url.push('?');
        url.push_str(&query);
    }

    debug!(
        subsystem = "gateway",
        component = "proxy",
        method = %method,
        from = %path,
        to = %url,
        "Forwarding request"
    );

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Failed to read request body" })),
            )
                .into_response();
        }
    };

    let mut builder = state
        .client
        .request(method, &url)
        .headers(forwarded_headers(&parts.headers, route.inject_identity));

    if route.inject_identity {
        // Downstream services trust X-User-ID only alongside the shared
        // secret, so direct calls cannot spoof identity. Client-supplied
        // identity headers were dropped above.
        builder = builder
            .header(
                "Authorization",
                format!("Bearer {}", state.config.internal_token),
            )
            .header("X-Internal-Token", state.config.internal_token.as_str())
            .header("X-Forwarded-By", "api-gateway");
        if let Some(user_id) = &user_id {
            builder = builder.header("X-User-ID", user_id.as_str());
        }
    }

    let upstream = match builder.body(bytes.to_vec()).send().await {
        Ok(response) => response,
        Err(e) => {
            error!(
                subsystem = "gateway",
                component = "proxy",
                error = %e,
                to = %url,
                "Upstream request failed"
            );
            return bad_gateway();
        }
    };

    let status = upstream.status();
    let headers = upstream.headers().clone();
    let body = match upstream.bytes().await {
        Ok(b) => b,
        Err(_) => return bad_gateway(),
    };

    let mut response = Response::builder().status(status);
    for (name, value) in &headers {
        if !is_hop_by_hop(name.as_str()) {
            response = response.header(name, value);
        }
    }

    response
        .body(Body::from(body))
        .unwrap_or_else(|_| bad_gateway())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig {
            auth_url: "http://auth:8081".into(),
            core_url: "http://core:8082".into(),
            analyzer_url: "http://analyzer:8083".into(),
            collector_url: "http://collector:8084".into(),
            internal_token: "secret".into(),
            server_port: 8080,
        }
    }

    #[test]
    fn test_auth_routes_pass_through_unrewritten() {
        let route = resolve_route(&config(), "POST", "/auth/login", None).unwrap();
        assert_eq!(route.base_url, "http://auth:8081");
        assert_eq!(route.path, "/auth/login");
        assert!(!route.inject_identity);
    }

    #[test]
    fn test_get_integrations_substitutes_user_id() {
        let route = resolve_route(
            &config(),
            "GET",
            "/api/v1/integrations/email",
            Some("11111111-1111-1111-1111-111111111111"),
        )
        .unwrap();
        assert_eq!(
            route.path,
            "/api/integrations/11111111-1111-1111-1111-111111111111"
        );
        assert_eq!(route.base_url, "http://core:8082");
        assert!(route.inject_identity);
    }

    #[test]
    fn test_post_integrations_strips_version_prefix() {
        let route =
            resolve_route(&config(), "POST", "/api/v1/integrations/email", Some("u")).unwrap();
        assert_eq!(route.path, "/api/integrations");
    }

    #[test]
    fn test_delete_integration_also_rewrites() {
        let route = resolve_route(
            &config(),
            "DELETE",
            "/api/v1/integrations/email/123",
            Some("u"),
        )
        .unwrap();
        assert_eq!(route.path, "/api/integrations");
    }

    #[test]
    fn test_reminders_rewrite_to_tasks_on_collector() {
        let route = resolve_route(&config(), "GET", "/api/v1/reminders", Some("u")).unwrap();
        assert_eq!(route.base_url, "http://collector:8084");
        assert_eq!(route.path, "/api/v1/tasks");
    }

    #[test]
    fn test_tasks_pass_through() {
        let route = resolve_route(&config(), "GET", "/api/v1/tasks/abc", Some("u")).unwrap();
        assert_eq!(route.path, "/api/v1/tasks/abc");
        assert_eq!(route.base_url, "http://collector:8084");
    }

    #[test]
    fn test_internal_routes_by_service() {
        let route = resolve_route(&config(), "GET", "/internal/analyzer/health", None).unwrap();
        assert_eq!(route.base_url, "http://analyzer:8083");
        assert_eq!(route.path, "/health");

        assert!(resolve_route(&config(), "GET", "/internal/unknown/x", None).is_none());
    }

    #[test]
    fn test_unknown_route_is_none() {
        assert!(resolve_route(&config(), "GET", "/nope", None).is_none());
    }

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("content-length"));
        assert!(is_hop_by_hop("host"));
        assert!(!is_hop_by_hop("authorization"));
        assert!(!is_hop_by_hop("x-request-id"));
    }

    #[test]
    fn test_identity_headers_stripped_on_injected_routes() {
        let mut incoming = HeaderMap::new();
        incoming.insert("authorization", "Bearer user-token".parse().unwrap());
        incoming.insert("x-user-id", "spoofed".parse().unwrap());
        incoming.insert("x-request-id", "req-1".parse().unwrap());

        let forwarded = forwarded_headers(&incoming, true);
        assert!(forwarded.get("authorization").is_none());
        assert!(forwarded.get("x-user-id").is_none());
        assert_eq!(forwarded.get("x-request-id").unwrap(), "req-1");

        // Auth passthrough keeps the client's own bearer token.
        let passthrough = forwarded_headers(&incoming, false);
        assert_eq!(
            passthrough.get("authorization").unwrap(),
            "Bearer user-token"
        );
    }
}
