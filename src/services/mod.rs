/// Typed client for the collaborator REST endpoints.
pub mod party_api;
/// The per-party realtime channel.
pub mod realtime;
/// Session runner driving the state machine, channel, and countdown.
pub mod session;
