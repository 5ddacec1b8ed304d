pub mod app;
pub mod catalog;
pub mod cli;
pub mod compose;
pub mod config;
pub mod drag;
pub mod pins;
pub mod recency;
pub mod storage;
pub mod ui;

pub use app::{App, PopupState, TabOpener};
pub use catalog::{Catalog, LinkDefinition, LinkId};
pub use compose::{compose, RenderRow};
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use drag::{DragEvent, DragOutcome, DragReorder};
pub use pins::{PinSet, PinSetManager, Placement};
pub use recency::RecencyTracker;
pub use storage::{StoreAdapter, StorageKey};
