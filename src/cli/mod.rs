//! CLI command implementations.
//!
//! Each submodule implements one `haven` subcommand against a
//! [`ServiceContainer`](crate::services::ServiceContainer). Commands return
//! their rendered output; the binary decides where it goes.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `alert` | Send an emergency alert for a user at given coordinates |
//! | `contacts` | List, add or remove trusted contacts |
//! | `report` | Submit an incident report |
//! | `drill` | Run a full simulated SOS session against the configured backends |
//! | `config` | Show the effective configuration |
//!
//! # Example Usage
//!
//! ```bash
//! # Alert a user's contacts from a known position
//! haven alert --user 7f3c --lat 12.83 --lng 77.65
//!
//! # Manage contacts
//! haven contacts add --user 7f3c --name Asha --phone "98765 43210"
//!
//! # Rehearse a session with a 10 second hold
//! haven drill --user 7f3c --hold-secs 10
//! ```

mod alert;
mod config;
mod contacts;
mod drill;
mod report;

pub use alert::{AlertCommand, render_outcome};
pub use config::ConfigCommand;
pub use contacts::{ContactsAction, ContactsCommand};
pub use drill::{DrillCommand, DrillReport};
pub use report::ReportCommand;
