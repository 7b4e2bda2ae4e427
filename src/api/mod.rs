// =============================================================================
// HTTP/WebSocket edge — thin control-plane surface over the Session Engine
// =============================================================================
//
// This module is deliberately small: it exposes only the four control-plane
// operations spec.md's external-interfaces section names (start/stop/pause/
// resume), a strategy-discovery endpoint, a health check, and the WebSocket
// upgrade route. It is demo wiring for the engine, not a reimplementation of
// a full brokerage API — no account/strategy/user persistence lives here.
// =============================================================================

pub mod auth;
pub mod rest;
pub mod ws;
