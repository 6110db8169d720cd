// todo-plus/src/lib.rs

pub mod item;
pub mod language;
pub mod reminder;
pub mod scanner;
pub mod settings;
pub mod sidecar;
pub mod watch;
pub mod workspace;

pub use item::{TodoItem, generate_id, is_valid_id};
pub use language::{LanguageInfo, LanguageRegistry};
pub use reminder::{ReminderAction, ReminderEvent, ReminderInfo, ReminderScheduler, ReminderType};
pub use scanner::{ScanError, TodoScanner};
pub use settings::Settings;
pub use sidecar::{ConfigResolver, SIDECAR_FILE_NAME, SidecarDoc, SidecarRecord};
pub use watch::ScanTrigger;
pub use workspace::Workspace;
