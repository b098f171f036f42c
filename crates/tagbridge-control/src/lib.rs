//! Tagbridge control: the selection engine behind a tag picker.
//!
//! The control edits one many-to-many relationship of one host record.
//! The picker reports the tag set the user wants; the control works out the
//! minimal links and unlinks, applies them through the host's store and
//! encodes the result for the host's bound output value.
//!
//! ```text
//!                 ┌──────────────────────── TagControl ───────────────────────┐
//!   picker ──────►│ on_change ──► SelectionDiff ──► link ∥ unlink (join-all)  │──► EntityStore
//!                 │                                                           │
//!   picker ◄──────│ on_resolve_suggestions ──► SuggestionResolver             │──► EntityStore
//!                 │                                                           │
//!                 │ initialize ──► MetadataResolver (memoized) ───────────────│──► MetadataProvider
//!                 │                                                           │
//!   host   ◄──────│ get_outputs ──► output::serialize ("TAGDATA:{…}")         │
//!                 └───────────────────────────────────────────────────────────┘
//! ```
//!
//! While the host record is unsaved nothing goes to the store: the selection
//! lives only in the output value until the host saves and reports an id
//! through `notify_new_data`.

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod metadata;
pub mod output;
pub mod selection;
pub mod suggest;

pub use config::{ControlConfig, OutputFormat};
pub use control::{ReconcileReport, TagControl};
pub use error::{ConfigError, ControlError, OutputError};
pub use events::{AssociationOp, ControlEvent, ControlEventHandler, ControlState};
pub use metadata::MetadataResolver;
pub use output::{is_tag_data, serialize, TagData, TAG_DATA_PREFIX};
pub use selection::{SelectionDiff, SelectionState};
pub use suggest::SuggestionResolver;
