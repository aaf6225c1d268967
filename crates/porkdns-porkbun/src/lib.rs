// # Porkbun Registrar
//
// This crate keeps existing Porkbun DNS records pointed at the host's current
// public addresses.
//
// ## Behavior
//
// - Reads each managed record back once at startup and refuses to manage a
//   record that is missing or duplicated
// - Issues one edit per address change published for the record's family
// - Never creates records
// - Never retries: construction failures go back to the caller, edit
//   failures are logged and the record waits for the next change
//
// ## Security Requirements
//
// - The API key pair NEVER appears in logs or `Debug` output
// - All traffic goes through the shared rate-limited transport
//
// ## API Reference
//
// - Porkbun API v3: https://porkbun.com/api/json/v3/documentation
// - Retrieve: POST `/dns/retrieveByNameType/:domain/:type/:subdomain`
// - Edit: POST `/dns/editByNameType/:domain/:type/:subdomain`
// - Ping: POST `/ping`

pub mod api;
pub mod record;

pub use api::ping;
pub use record::{PorkbunRecord, SubscribedRecord};
