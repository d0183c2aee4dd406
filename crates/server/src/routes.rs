//! Route configuration.
//!
//! Every route is declared once in [`ROUTES`] together with whether it needs
//! credentials; the router is assembled from that table.

use crate::auth::{auth_middleware, trace_middleware};
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{MethodRouter, get, head, post};
use tower_http::trace::TraceLayer;

/// One entry of the route table.
pub struct RouteEntry {
    pub path: &'static str,
    pub requires_auth: bool,
    pub handler: fn() -> MethodRouter<AppState>,
}

/// All repository routes, plus the health probe.
pub const ROUTES: &[RouteEntry] = &[
    RouteEntry {
        path: "/-/health",
        requires_auth: false,
        handler: || get(handlers::health_check),
    },
    RouteEntry {
        path: "/{repo}",
        requires_auth: true,
        handler: repository_routes,
    },
    // restic appends a slash to the repository URL
    RouteEntry {
        path: "/{repo}/",
        requires_auth: true,
        handler: repository_routes,
    },
    RouteEntry {
        path: "/{repo}/config",
        requires_auth: true,
        handler: || {
            head(handlers::check_config)
                .get(handlers::get_config)
                .post(handlers::save_config)
        },
    },
    RouteEntry {
        path: "/{repo}/{type}",
        requires_auth: true,
        handler: listing_routes,
    },
    RouteEntry {
        path: "/{repo}/{type}/",
        requires_auth: true,
        handler: listing_routes,
    },
    RouteEntry {
        path: "/{repo}/{type}/{name}",
        requires_auth: true,
        handler: || {
            head(handlers::check_blob)
                .get(handlers::get_blob)
                .post(handlers::save_blob)
                .delete(handlers::delete_blob)
        },
    },
];

fn repository_routes() -> MethodRouter<AppState> {
    post(handlers::create_repository).delete(handlers::delete_repository)
}

fn listing_routes() -> MethodRouter<AppState> {
    get(handlers::list_blobs)
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new();
    for entry in ROUTES {
        let mut method_router = (entry.handler)();
        if entry.requires_auth {
            // route_layer: unmatched methods still answer 405 without credentials
            method_router = method_router.route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ));
        }
        router = router.route(entry.path, method_router);
    }

    // SECURITY: when enabled, restrict this endpoint to the scraper network.
    if state.config.server.metrics_enabled {
        router = router.route("/-/metrics", get(metrics_handler));
    }

    router
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_route_paths_are_unique() {
        let paths: HashSet<_> = ROUTES.iter().map(|entry| entry.path).collect();
        assert_eq!(paths.len(), ROUTES.len());
    }

    #[test]
    fn test_only_health_is_public() {
        let public: Vec<_> = ROUTES
            .iter()
            .filter(|entry| !entry.requires_auth)
            .map(|entry| entry.path)
            .collect();
        assert_eq!(public, vec!["/-/health"]);
    }

    #[test]
    fn test_slash_variants_require_auth() {
        for path in ["/{repo}", "/{repo}/{type}"] {
            let slashed = format!("{path}/");
            let plain = ROUTES.iter().find(|entry| entry.path == path).unwrap();
            let with_slash = ROUTES.iter().find(|entry| entry.path == slashed).unwrap();
            assert!(plain.requires_auth && with_slash.requires_auth);
        }
    }
}
