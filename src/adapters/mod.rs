// Adapters layer: concrete implementations for external systems (feed, Discord, disk).

pub mod discord;
pub mod interactions;
pub mod scriptblox;
pub mod store;

pub use discord::DiscordClient;
pub use scriptblox::ScriptBloxClient;
pub use store::JsonFileStore;
