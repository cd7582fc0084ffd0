//! Service layer translating record operations into Google Sheets / Drive calls.
//! - `google` holds the upstream API clients behind traits, plus in-memory mocks.
//! - `records` holds the business operations and the sheet column schema.
//! - Errors are mapped to HTTP statuses by the server crate.

pub mod errors;
pub mod a1;
pub mod google;
pub mod records;
