// Services module - Backend access, QR rendering and page logic

pub mod api_client;
pub mod card_renderer;
pub mod downloads;
pub mod listing;
pub mod qr_generator;
pub mod qr_issuer;
pub mod token_store;
