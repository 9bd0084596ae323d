// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) → Protected (primary session required)
//
// The session bridge decides which tier a path falls in. Protected handlers
// still re-read the session through the `SessionUser` extractor and go through
// the ownership guard before touching a single record.
pub mod public;    // /health, /anmelden, /abmelden, /api/auth/*, /api/bpa-public/*
pub mod protected; // /dashboard, /api/session, /api/:resource[/:id]
