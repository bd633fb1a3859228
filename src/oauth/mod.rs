//! Mercado Livre OAuth 2.0 integration: authorization-code flow, CSRF state
//! tracking, and token exchange/refresh against the provider endpoints.

mod client;
mod flow;
mod state;

pub use client::{MlOAuthClient, TokenSet};
pub(crate) use client::urlencoding;
pub use flow::{exchange_code, handle_callback, initiate_authorization, persist_tokens, refresh};
pub use state::StateStore;
