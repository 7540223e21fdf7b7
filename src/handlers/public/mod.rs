// handlers/public/mod.rs - Handlers reachable without a session
//
// Signup and login are guarded by the `auth` rate-limit scope; spreadsheet
// preview/export and the public payment endpoint by the `upload` scope.

pub mod auth;
pub mod files;
pub mod payment;
pub mod system;
