use std::borrow::Cow;

use serde::Serialize;

use crate::model::{CommandDefinition, CommandTemplate, Protocol, ProtocolLayer, SavedCommand};

/// Relation of a saved command to its source protocol template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// User-authored; never synced.
    Custom,
    /// L1 matches the template.
    Synced,
    /// The template was edited after L1 was captured.
    Outdated,
    /// The protocol or template no longer exists. The command is kept as is.
    Orphaned,
}

/// Command ids grouped by [`SyncStatus`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub custom: Vec<String>,
    pub synced: Vec<String>,
    pub outdated: Vec<String>,
    pub orphaned: Vec<String>,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.custom.len() + self.synced.len() + self.outdated.len() + self.orphaned.len()
    }
}

fn source_template<'p>(layer: &ProtocolLayer, protocols: &'p [Protocol]) -> Option<(&'p Protocol, &'p CommandTemplate)> {
    let protocol = protocols.iter().find(|p| p.id == layer.protocol_id)?;
    let template = protocol.command(&layer.protocol_command_id)?;
    Some((protocol, template))
}

/// Classify one command against the known protocols.
pub fn command_sync_status(command: &SavedCommand, protocols: &[Protocol]) -> SyncStatus {
    let Some(layer) = command.protocol_layer() else {
        return SyncStatus::Custom;
    };
    match source_template(layer, protocols) {
        None => SyncStatus::Orphaned,
        Some((_, template)) if template.updated_at > layer.protocol_command_updated_at => SyncStatus::Outdated,
        Some(_) => SyncStatus::Synced,
    }
}

/// True when the command's template is strictly newer than its L1 copy.
pub fn command_needs_sync(command: &SavedCommand, protocols: &[Protocol]) -> bool {
    command_sync_status(command, protocols) == SyncStatus::Outdated
}

/// Refresh L1 from `protocol` if its template is newer.
///
/// Returns the command unchanged (borrowed) for CUSTOM commands, orphaned
/// templates and up-to-date layers. Otherwise returns an owned copy with a new
/// L1; the command layer is carried over untouched.
pub fn sync_protocol_layer<'a>(command: &'a SavedCommand, protocol: &Protocol) -> Cow<'a, SavedCommand> {
    let CommandDefinition::Protocol { protocol_layer } = &command.definition else {
        return Cow::Borrowed(command);
    };
    if protocol_layer.protocol_id != protocol.id {
        return Cow::Borrowed(command);
    }
    let Some(template) = protocol.command(&protocol_layer.protocol_command_id) else {
        tracing::debug!(command = %command.id, protocol = %protocol.id, "template missing; keeping last synced layer");
        return Cow::Borrowed(command);
    };
    if template.updated_at <= protocol_layer.protocol_command_updated_at {
        return Cow::Borrowed(command);
    }

    tracing::debug!(
        command = %command.id,
        protocol = %protocol.id,
        from = protocol_layer.protocol_command_updated_at,
        to = template.updated_at,
        "syncing protocol layer"
    );
    Cow::Owned(SavedCommand {
        id: command.id.clone(),
        definition: CommandDefinition::Protocol {
            protocol_layer: ProtocolLayer::from_template(protocol, template),
        },
        command_layer: command.command_layer.clone(),
    })
}

/// Classify every command.
pub fn get_commands_sync_status(commands: &[SavedCommand], protocols: &[Protocol]) -> SyncReport {
    let mut report = SyncReport::default();
    for command in commands {
        let bucket = match command_sync_status(command, protocols) {
            SyncStatus::Custom => &mut report.custom,
            SyncStatus::Synced => &mut report.synced,
            SyncStatus::Outdated => &mut report.outdated,
            SyncStatus::Orphaned => &mut report.orphaned,
        };
        bucket.push(command.id.clone());
    }
    report
}

/// Sync every outdated command in place. Returns how many were updated.
pub fn sync_all_commands(commands: &mut [SavedCommand], protocols: &[Protocol]) -> usize {
    let mut updated = 0;
    for command in commands.iter_mut() {
        let Some(layer) = command.protocol_layer() else {
            continue;
        };
        let Some(protocol) = protocols.iter().find(|p| p.id == layer.protocol_id) else {
            continue;
        };
        let synced = match sync_protocol_layer(command, protocol) {
            Cow::Owned(synced) => synced,
            Cow::Borrowed(_) => continue,
        };
        *command = synced;
        updated += 1;
    }
    if updated > 0 {
        tracing::debug!(updated, "protocol commands synced");
    }
    updated
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{CustomCommand, ParameterEnhancement};

    fn protocol(updated_at: u64, payload: &str) -> Protocol {
        serde_json::from_value(json!({
            "id": "at",
            "name": "AT modem",
            "version": "1",
            "commands": [{ "id": "csq", "name": "Signal", "payload": payload, "updatedAt": updated_at }]
        }))
        .unwrap()
    }

    fn customized(p: &Protocol) -> SavedCommand {
        let mut saved = SavedCommand::from_protocol("cmd-1", p, &p.commands[0]);
        saved.command_layer.custom_name = Some("Signal quality".into());
        saved
            .command_layer
            .parameter_enhancements
            .insert("x".into(), ParameterEnhancement::default());
        saved
    }

    #[test]
    fn same_timestamp_is_a_noop() {
        let p = protocol(100, "AT+CSQ");
        let saved = customized(&p);
        let synced = sync_protocol_layer(&saved, &p);
        assert!(matches!(synced, Cow::Borrowed(_)));
        assert!(std::ptr::eq(synced.as_ref(), &saved));
    }

    #[test]
    fn newer_template_replaces_l1_only() {
        let old = protocol(100, "AT+CSQ");
        let saved = customized(&old);
        let new = protocol(200, "AT+CSQ?");

        let synced = sync_protocol_layer(&saved, &new);
        let Cow::Owned(synced) = synced else {
            panic!("expected an updated command");
        };
        let layer = synced.protocol_layer().unwrap();
        assert_eq!(layer.payload, "AT+CSQ?");
        assert_eq!(layer.protocol_command_updated_at, 200);
        assert_eq!(synced.command_layer, saved.command_layer);
        assert_eq!(
            serde_json::to_vec(&synced.command_layer).unwrap(),
            serde_json::to_vec(&saved.command_layer).unwrap()
        );
    }

    #[test]
    fn older_template_or_orphan_is_a_noop() {
        let saved = customized(&protocol(100, "AT+CSQ"));
        assert!(matches!(sync_protocol_layer(&saved, &protocol(50, "X")), Cow::Borrowed(_)));

        let mut empty = protocol(300, "X");
        empty.commands.clear();
        assert!(matches!(sync_protocol_layer(&saved, &empty), Cow::Borrowed(_)));

        let custom = SavedCommand::custom("c", CustomCommand::default());
        assert!(matches!(sync_protocol_layer(&custom, &protocol(300, "X")), Cow::Borrowed(_)));
    }

    #[test]
    fn classifies_commands() {
        let p = protocol(100, "AT+CSQ");
        let synced = customized(&p);
        let mut outdated = customized(&p);
        outdated.id = "cmd-2".into();
        let mut orphan = SavedCommand::from_protocol("cmd-3", &p, &p.commands[0]);
        if let CommandDefinition::Protocol { protocol_layer } = &mut orphan.definition {
            protocol_layer.protocol_command_id = "gone".into();
        }
        let custom = SavedCommand::custom("cmd-4", CustomCommand::default());

        let newer = protocol(150, "AT+CSQ?");
        let mut commands = vec![synced, outdated, orphan, custom];
        assert!(command_needs_sync(&commands[0], std::slice::from_ref(&newer)));

        let report = get_commands_sync_status(&commands, std::slice::from_ref(&p));
        assert_eq!(report.synced, vec!["cmd-1", "cmd-2"]);
        assert_eq!(report.orphaned, vec!["cmd-3"]);
        assert_eq!(report.custom, vec!["cmd-4"]);
        assert_eq!(report.total(), 4);

        assert_eq!(sync_all_commands(&mut commands, std::slice::from_ref(&newer)), 2);
        let report = get_commands_sync_status(&commands, std::slice::from_ref(&newer));
        assert_eq!(report.synced.len(), 2);
        assert!(report.outdated.is_empty());
        assert_eq!(sync_all_commands(&mut commands, std::slice::from_ref(&newer)), 0);
    }
}
