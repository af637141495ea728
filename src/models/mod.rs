// Models module - Backend entity representations

pub mod auth;
pub mod qr_record;

pub use qr_record::{QrRecord, QrState};
