use protoframe_codec::{ElementBinding, ElementConfig, MessageStructure};

use crate::model::{
    CommandDefinition, CommandLayer, CommandParameter, ExecutableCommand, ParameterApplication, ProtocolLayer,
    SavedCommand, Scripting,
};

/// Merge a saved command into the form that is actually sent.
///
/// CUSTOM commands use their own fields, with only the L2 name override applied.
/// PROTOCOL commands take payload, mode and encoding from L1 verbatim and layer
/// the L2 overrides on top.
pub fn get_effective_command(command: &SavedCommand) -> ExecutableCommand {
    let overrides = &command.command_layer;
    match &command.definition {
        CommandDefinition::Custom(custom) => ExecutableCommand {
            id: command.id.clone(),
            source: command.source(),
            name: overrides.custom_name.clone().unwrap_or_else(|| custom.name.clone()),
            description: custom.description.clone(),
            payload: custom.payload.clone(),
            mode: custom.mode,
            encoding: custom.encoding.clone(),
            line_ending: custom.line_ending,
            parameters: custom.parameters.clone(),
            validation: custom.validation.clone(),
            extract_variables: custom.extract_variables.clone(),
            regex_extractions: custom.regex_extractions.clone(),
            scripting: custom.scripting.clone(),
            framing: custom.framing.clone(),
            message_structure: custom.message_structure.clone(),
            bindings: custom.bindings.clone(),
        },
        CommandDefinition::Protocol { protocol_layer } => merge_layers(command, protocol_layer, overrides),
    }
}

fn merge_layers(command: &SavedCommand, l1: &ProtocolLayer, l2: &CommandLayer) -> ExecutableCommand {
    let parameters: Vec<CommandParameter> = l1
        .parameters
        .iter()
        .map(|param| {
            let mut param = param.clone();
            if let Some(enhancement) = l2.parameter_enhancements.get(&param.name) {
                if let Some(default) = &enhancement.custom_default {
                    param.default_value = Some(default.clone());
                }
                if let Some(label) = &enhancement.custom_label {
                    param.label = Some(label.clone());
                }
            }
            param
        })
        .collect();

    let mut bindings = l1.bindings.clone();
    for (name, enhancement) in &l2.parameter_enhancements {
        if let Some(ParameterApplication::Element { element_id, transform }) = &enhancement.application {
            bindings.retain(|b| &b.element_id != element_id);
            let mut binding = ElementBinding::new(element_id.clone(), name.clone());
            binding.transform = transform.clone();
            bindings.push(binding);
        }
    }

    // A timeout override only retunes an existing validation; it never creates one.
    let mut validation = l1.validation.clone();
    match (validation.as_mut(), l2.timeout_override) {
        (Some(validation), Some(timeout)) => validation.timeout = Some(timeout),
        (None, Some(timeout)) => {
            tracing::debug!(command = %command.id, timeout_ms = timeout, "timeout override ignored; template has no validation");
        }
        _ => {}
    }

    let mut extract_variables = l1.extract_variables.clone();
    extract_variables.extend(l2.additional_extractions.iter().cloned());

    let message_structure = l1
        .message_structure
        .as_ref()
        .map(|s| with_checksum_override(s, l2));

    ExecutableCommand {
        id: command.id.clone(),
        source: command.source(),
        name: l2.custom_name.clone().unwrap_or_else(|| l1.name.clone()),
        description: l2.custom_description.clone().or_else(|| l1.description.clone()),
        payload: l1.payload.clone(),
        mode: l1.mode,
        encoding: l1.encoding.clone(),
        line_ending: l1.line_ending,
        parameters,
        validation,
        extract_variables,
        regex_extractions: l1.regex_extractions.clone(),
        scripting: Scripting {
            pre_request_script: join_scripts(
                l1.scripting.pre_request_script.as_deref(),
                l2.scripting.pre_request_script.as_deref(),
            ),
            post_response_script: join_scripts(
                l1.scripting.post_response_script.as_deref(),
                l2.scripting.post_response_script.as_deref(),
            ),
        },
        framing: l2.framing_override.clone().or_else(|| l1.default_framing.clone()),
        message_structure,
        bindings,
    }
}

/// Protocol script first, then the user's.
fn join_scripts(protocol: Option<&str>, user: Option<&str>) -> Option<String> {
    let protocol = protocol.filter(|s| !s.trim().is_empty());
    let user = user.filter(|s| !s.trim().is_empty());
    match (protocol, user) {
        (Some(p), Some(u)) => Some(format!("{p}\n{u}")),
        (Some(s), None) | (None, Some(s)) => Some(s.to_string()),
        (None, None) => None,
    }
}

fn with_checksum_override(structure: &MessageStructure, l2: &CommandLayer) -> MessageStructure {
    let mut structure = structure.clone();
    if let Some(override_algorithm) = l2.checksum_override {
        for element in &mut structure.elements {
            if let ElementConfig::Checksum { algorithm, .. } = &mut element.config {
                *algorithm = override_algorithm;
            }
        }
    }
    structure
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use protoframe_codec::{ByteOrder, ChecksumAlgorithm, ElementSize, MessageElement};
    use protoframe_frame::FramingConfig;
    use protoframe_validate::{CommandValidation, ResponsePattern};
    use serde_json::json;

    use super::*;
    use crate::model::{CommandSource, CommandTemplate, CustomCommand, ParameterEnhancement, ParameterType, Protocol};

    fn protocol() -> Protocol {
        serde_json::from_value(json!({
            "id": "marlin",
            "name": "Marlin",
            "version": "2.1",
            "framing": { "strategy": "DELIMITER", "delimiter": "\\n" },
            "commands": [{
                "id": "move",
                "name": "Linear move",
                "payload": "G{code} X{x}",
                "parameters": [
                    { "name": "code", "type": "INTEGER", "required": true, "defaultValue": 0 },
                    { "name": "x", "type": "FLOAT", "label": "X" }
                ],
                "validation": { "mode": "PATTERN", "pattern": "ok", "timeout": 1000 },
                "extractVariables": [{ "extractions": [] }],
                "scripting": { "preRequestScript": "protocolHook()" },
                "updatedAt": 100
            }]
        }))
        .unwrap()
    }

    fn template(p: &Protocol) -> &CommandTemplate {
        &p.commands[0]
    }

    #[test]
    fn custom_command_uses_own_fields() {
        let mut saved = SavedCommand::custom(
            "c1",
            CustomCommand {
                name: "Ping".into(),
                payload: "AT".into(),
                description: Some("modem".into()),
                ..CustomCommand::default()
            },
        );
        saved.command_layer.custom_name = Some("My ping".into());
        saved.command_layer.custom_description = Some("ignored for custom".into());

        let effective = get_effective_command(&saved);
        assert_eq!(effective.source, CommandSource::Custom);
        assert_eq!(effective.name, "My ping");
        assert_eq!(effective.description.as_deref(), Some("modem"));
        assert_eq!(effective.payload, "AT");
    }

    #[test]
    fn protocol_command_without_overrides() {
        let p = protocol();
        let effective = get_effective_command(&SavedCommand::from_protocol("m1", &p, template(&p)));
        assert_eq!(effective.name, "Linear move");
        assert_eq!(effective.payload, "G{code} X{x}");
        assert_eq!(effective.framing, Some(FramingConfig::delimiter("\\n")));
        assert_eq!(effective.scripting.pre_request_script.as_deref(), Some("protocolHook()"));
        assert_eq!(effective.validation.and_then(|v| v.timeout()), Some(Duration::from_secs(1)));
    }

    #[test]
    fn command_layer_overrides_apply() {
        let p = protocol();
        let mut saved = SavedCommand::from_protocol("m1", &p, template(&p));
        let l2 = &mut saved.command_layer;
        l2.custom_name = Some("Jog X".into());
        l2.parameter_enhancements.insert(
            "x".into(),
            ParameterEnhancement {
                custom_default: Some(json!(10)),
                custom_label: Some("Distance".into()),
                application: None,
            },
        );
        l2.additional_extractions.push(ResponsePattern::default());
        l2.scripting.pre_request_script = Some("userHook()".into());
        l2.timeout_override = Some(250);
        l2.framing_override = Some(FramingConfig::timeout(Duration::from_millis(20)));

        let effective = get_effective_command(&saved);
        assert_eq!(effective.name, "Jog X");
        assert_eq!(effective.payload, "G{code} X{x}");
        let x = &effective.parameters[1];
        assert_eq!(x.param_type, ParameterType::Float);
        assert_eq!(x.default_value, Some(json!(10)));
        assert_eq!(x.label.as_deref(), Some("Distance"));
        assert_eq!(effective.parameters[0].default_value, Some(json!(0)));
        assert_eq!(effective.extract_variables.len(), 2);
        assert_eq!(
            effective.scripting.pre_request_script.as_deref(),
            Some("protocolHook()\nuserHook()")
        );
        assert_eq!(
            effective.validation,
            Some(CommandValidation::contains("ok").with_timeout(Duration::from_millis(250)))
        );
        assert_eq!(effective.framing, Some(FramingConfig::timeout(Duration::from_millis(20))));
    }

    #[test]
    fn element_application_and_checksum_override() {
        let mut p = protocol();
        p.message_structures.push(MessageStructure::new(
            "frame",
            ByteOrder::BigEndian,
            vec![
                MessageElement::new(
                    "v",
                    "value",
                    ElementSize::Fixed(1),
                    ElementConfig::Field {
                        data_type: protoframe_codec::DataType::Uint8,
                    },
                ),
                MessageElement::new(
                    "crc",
                    "crc",
                    ElementSize::Computed,
                    ElementConfig::Checksum {
                        algorithm: ChecksumAlgorithm::Mod256,
                        include_elements: vec!["v".into()],
                        byte_order: None,
                    },
                ),
            ],
        ));
        p.commands[0].message_structure_id = Some("frame".into());
        p.commands[0].bindings.push(ElementBinding::new("v", "code"));

        let mut saved = SavedCommand::from_protocol("m1", &p, template(&p));
        saved.command_layer.checksum_override = Some(ChecksumAlgorithm::Xor);
        saved.command_layer.parameter_enhancements.insert(
            "x".into(),
            ParameterEnhancement {
                application: Some(ParameterApplication::Element {
                    element_id: "v".into(),
                    transform: Some("value * 2".into()),
                }),
                ..ParameterEnhancement::default()
            },
        );

        let effective = get_effective_command(&saved);
        assert_eq!(
            effective.bindings,
            vec![ElementBinding::new("v", "x").with_transform("value * 2")]
        );
        let structure = effective.message_structure.unwrap();
        assert!(matches!(
            structure.elements[1].config,
            ElementConfig::Checksum {
                algorithm: ChecksumAlgorithm::Xor,
                ..
            }
        ));
    }

    #[test]
    fn timeout_override_without_validation_is_ignored() {
        let mut p = protocol();
        p.commands[0].validation = None;
        let mut saved = SavedCommand::from_protocol("m1", &p, template(&p));
        saved.command_layer.timeout_override = Some(250);

        let effective = get_effective_command(&saved);
        assert_eq!(effective.validation, None);
        assert!(effective.validation_request(&serde_json::Map::new()).is_none());
    }

    #[test]
    fn scripts_join_protocol_first() {
        assert_eq!(join_scripts(Some("a"), Some("b")).as_deref(), Some("a\nb"));
        assert_eq!(join_scripts(None, Some("b")).as_deref(), Some("b"));
        assert_eq!(join_scripts(Some("  "), None), None);
    }
}
