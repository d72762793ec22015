//! Stateless OAuth2 popup authorization broker for browser-based CMS apps.
//!
//! Sits between a content-editing frontend and GitHub: `/auth` mints a
//! self-verifying anti-forgery state token and redirects to the provider,
//! `/callback` verifies the echoed token, exchanges the code, enriches the
//! result with a collaborator-permission check, and relays the outcome to the
//! opener window over postMessage. No server-side session storage anywhere.

pub mod config;
pub mod github;
pub mod relay;
pub mod routes;
pub mod state_token;
