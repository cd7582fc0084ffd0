//! Record operations over a spreadsheet: fetch, append, edit, delete, image links.

pub mod schema;
pub mod links;
pub mod domain;
pub mod service;

pub use domain::{AddInput, AddOutcome, DeleteInput, EditInput, ImageUpload, NewRow, ProductInput, SaveImageLinkInput};
pub use service::{find_row, RecordService, RecordSettings};
