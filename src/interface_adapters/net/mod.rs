// Network adapter modules split by client sockets vs lobby HTTP routes.

pub mod client;
pub mod internal;

pub use client::ws_handler;
pub use internal::create_lobby_handler;
