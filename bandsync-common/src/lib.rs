//! # BandSync Common Library
//!
//! Shared code for the band-data sync engine including:
//! - Canonical entity models (songs, setlists, shows, practice sessions)
//! - Change notification payloads and the notification hub
//! - Date parsing and loose value coercion helpers
//! - Configuration loading
//! - Error types

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod time;
pub mod values;

pub use error::{Error, Result};
pub use events::{ChangeAction, ChangeNotification, EventBus, NotificationSource, SyncEvent};
pub use models::{Entity, EntityKind};
