// CRM layer - entry points the host application calls into.

#[path = "events.rs"]
pub mod events;

pub use events::LeadEventHandler;
