// handlers/protected/mod.rs - Handlers that require a principal
//
// Every handler here takes a `Principal`, so a missing or invalid session is
// rejected with 401 before the handler body runs. Owned rows are always looked
// up by `(id, principal.id)`.

pub mod analytics;
pub mod audit;
pub mod mappings;
pub mod payment;
pub mod reports;
pub mod user;
