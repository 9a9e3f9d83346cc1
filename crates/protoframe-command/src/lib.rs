//! Two-layer command model for protoframe.
//!
//! A command instantiated from a protocol keeps two layers:
//! - L1 ([`ProtocolLayer`]): a snapshot of the protocol's command template,
//!   replaced wholesale when the template changes
//! - L2 ([`CommandLayer`]): the user's overrides, never touched by a sync
//!
//! [`get_effective_command`] merges them into an [`ExecutableCommand`], and
//! [`prepare_command`] turns that into wire bytes.

pub mod error;
pub mod merge;
pub mod model;
pub mod params;
pub mod payload;
pub mod sync;

pub use error::{CommandError, Result};
pub use merge::get_effective_command;
pub use model::{
    CommandDefinition, CommandLayer, CommandParameter, CommandSource, CommandTemplate, CustomCommand, EnumOption,
    ExecutableCommand, LineEnding, ParameterApplication, ParameterEnhancement, ParameterType, PayloadMode, Protocol,
    ProtocolLayer, SavedCommand, Scripting,
};
pub use params::{
    format_parameter_value, resolve_parameter_values, substitute_parameters, validate_parameter_value,
    SubstitutionOutcome,
};
pub use payload::{encode_command_payload, prepare_command, EncodedPayload, PreparedCommand};
pub use sync::{
    command_needs_sync, command_sync_status, get_commands_sync_status, sync_all_commands, sync_protocol_layer,
    SyncReport, SyncStatus,
};
