//! Request handling between a transport and the data layer.
//!
//! The transport decodes frames into [`Request`]s and hands them to
//! [`Gateway::handle`] together with the originating connection. `SUBSCRIBE`
//! and `UNSUBSCRIBE` manage live subscriptions; every other verb runs once
//! through the route's [`Controller`] and is answered directly.

mod route;
mod wire;

pub use route::{Context, Controller, ModelController, Route};
pub use wire::{Method, Request, Response};

use crate::error::{Result, SyncError};
use crate::subscriptions::{Connection, SnapshotSource, SubscriptionId, SubscriptionRegistry};
use crate::types::ConnectionId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Snapshot source re-running a route's `get` for a subscribed request.
struct RouteSnapshot {
    controller: Arc<dyn Controller>,
    ctx: Context,
}

impl SnapshotSource for RouteSnapshot {
    fn snapshot(&self) -> Result<serde_json::Value> {
        self.controller.get(&self.ctx)
    }
}

/// Exact-path router in front of the subscription registry.
pub struct Gateway {
    routes: Vec<Route>,
    registry: Arc<SubscriptionRegistry>,
}

impl Gateway {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            routes: Vec::new(),
            registry,
        }
    }

    /// Add a route. The first route registered for a path wins.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Handle one decoded request from `connection`.
    pub fn handle(&self, connection: &Arc<dyn Connection>, request: Request) -> Response {
        let Some(route) = self.routes.iter().find(|r| r.path == request.path) else {
            debug!(path = %request.path, method = %request.method, "no route, acknowledging");
            return Response::ack(&request);
        };

        match &request.method {
            Method::Subscribe => self.subscribe(connection, route, &request),
            Method::Unsubscribe => {
                let id = SubscriptionId::from(request.id.as_str());
                if !self.registry.unsubscribe(connection.id(), &id) {
                    debug!(subscription = %id, "unsubscribe for unknown id");
                }
                Response::ack(&request)
            }
            method => {
                let ctx = Context::new(request.query.clone(), request.body.clone());
                let controller = &route.controller;
                let result = match method {
                    Method::Get => controller.get(&ctx),
                    Method::Post => controller.post(&ctx),
                    Method::Patch => controller.patch(&ctx),
                    Method::Delete => controller.delete(&ctx),
                    _ => Err(SyncError::MethodNotAllowed),
                };

                match result {
                    Ok(body) => Response::ok(&request, body),
                    Err(e) => {
                        if e.is_client_error() {
                            debug!(
                                path = %request.path,
                                method = %request.method,
                                error = %e,
                                "request rejected"
                            );
                        } else {
                            warn!(
                                path = %request.path,
                                method = %request.method,
                                error = %e,
                                "request failed"
                            );
                        }
                        Response::error(&request, &e)
                    }
                }
            }
        }
    }

    /// Decode a text frame, handle it and encode the response.
    pub fn handle_text(&self, connection: &Arc<dyn Connection>, text: &str) -> Result<String> {
        let request: Request = serde_json::from_str(text)?;
        Ok(serde_json::to_string(&self.handle(connection, request))?)
    }

    /// Drop every subscription of a closed connection.
    pub fn connection_closed(&self, connection: ConnectionId) -> usize {
        self.registry.connection_closed(connection)
    }

    fn subscribe(
        &self,
        connection: &Arc<dyn Connection>,
        route: &Route,
        request: &Request,
    ) -> Response {
        let source = Arc::new(RouteSnapshot {
            controller: Arc::clone(&route.controller),
            ctx: Context::new(request.query.clone(), request.body.clone()),
        });

        match self.registry.subscribe(
            connection,
            SubscriptionId::from(request.id.as_str()),
            route.watches.clone(),
            source,
        ) {
            Ok(()) => Response::ack(request),
            Err(e) => {
                warn!(path = %request.path, error = %e, "subscribe failed");
                Response::error(request, &e)
            }
        }
    }
}
