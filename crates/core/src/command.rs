//! The Presentation Command Model
//!
//! A presentation script is an ordered list of typed commands: narration
//! (`speak`) interleaved with canvas drawing instructions. The wire shape is
//! `{ "command": <name>, "payload": { ... }, "delay": <ms> }`, matching what
//! the player consumes. Payloads are a closed tagged union so malformed
//! generation output fails at the compiler boundary instead of at playback.

use serde::{Deserialize, Serialize};

/// Fallback pacing for visual commands that arrive without a `delay`.
///
/// Scripts produced by the compiler always carry an explicit delay; this only
/// applies to externally loaded scripts.
pub const DEFAULT_DELAY_MS: u64 = 500;

/// One cell entry written into a table by a `fillTable` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub row: u32,
    pub col: u32,
    pub text: String,
}

/// The kind-specific payload of a command.
///
/// Serialized adjacently tagged: the variant name under `command`, the fields
/// under `payload`. `session_end` keeps its original snake_case wire name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload")]
pub enum CommandBody {
    /// Narration. After the synthesis fan-out the payload carries the
    /// rendered audio; a failed synthesis leaves it unset (silent narration).
    #[serde(rename = "speak", rename_all = "camelCase")]
    Speak {
        text: String,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            with = "base64_audio"
        )]
        audio_content: Option<Vec<u8>>,
    },
    #[serde(rename = "createText", rename_all = "camelCase")]
    CreateText {
        x: f64,
        y: f64,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_size: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    #[serde(rename = "drawRectangle", rename_all = "camelCase")]
    DrawRectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    #[serde(rename = "drawCircle", rename_all = "camelCase")]
    DrawCircle {
        x: f64,
        y: f64,
        radius: f64,
        color: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Flattened (x, y) pairs: `[x1, y1, x2, y2, ...]`.
    #[serde(rename = "drawArrow", rename_all = "camelCase")]
    DrawArrow { points: Vec<f64>, color: String },
    #[serde(rename = "createTable", rename_all = "camelCase")]
    CreateTable {
        id: String,
        x: f64,
        y: f64,
        rows: u32,
        cols: u32,
        col_widths: Vec<f64>,
        row_height: f64,
        headers: Vec<String>,
    },
    /// References a table created earlier in the same script. `row` is
    /// 0-indexed over the data rows (the header row is not addressable).
    #[serde(rename = "fillTable", rename_all = "camelCase")]
    FillTable {
        table_id: String,
        row: u32,
        col: u32,
        text: String,
    },
    #[serde(rename = "clearCanvas")]
    ClearCanvas {},
    /// Terminal marker. Must be the last command when present.
    #[serde(rename = "session_end")]
    SessionEnd {},
    /// Forward compatibility: command names this build does not know about
    /// deserialize instead of failing the whole script. The compiler rejects
    /// them; the player logs and skips them.
    #[serde(other, deserialize_with = "ignore_payload")]
    Unknown,
}

/// Discards whatever payload accompanies an unrecognized command name so the
/// adjacently tagged enum can land on the unit [`CommandBody::Unknown`].
fn ignore_payload<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<(), D::Error> {
    serde::de::IgnoredAny::deserialize(deserializer)?;
    Ok(())
}

impl CommandBody {
    /// The wire name of this command kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandBody::Speak { .. } => "speak",
            CommandBody::CreateText { .. } => "createText",
            CommandBody::DrawRectangle { .. } => "drawRectangle",
            CommandBody::DrawCircle { .. } => "drawCircle",
            CommandBody::DrawArrow { .. } => "drawArrow",
            CommandBody::CreateTable { .. } => "createTable",
            CommandBody::FillTable { .. } => "fillTable",
            CommandBody::ClearCanvas {} => "clearCanvas",
            CommandBody::SessionEnd {} => "session_end",
            CommandBody::Unknown => "unknown",
        }
    }
}

/// One command in a presentation script.
///
/// `delay` is the pause in milliseconds *after* the command takes effect.
/// It is required on every visual command and ignored on `speak`, whose
/// effective duration is the rendered audio length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(flatten)]
    pub body: CommandBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

impl Command {
    pub fn new(body: CommandBody, delay: Option<u64>) -> Self {
        Self { body, delay }
    }

    /// Maps a named action from the generation capability into a command.
    ///
    /// The capability reports each command as a function call whose arguments
    /// carry the payload fields plus an inline `delay`; the delay is lifted
    /// into the envelope here. Unrecognized names map to
    /// [`CommandBody::Unknown`].
    pub fn from_action(name: &str, mut arguments: serde_json::Value) -> Option<Self> {
        let delay = arguments
            .as_object_mut()
            .and_then(|obj| obj.remove("delay"))
            .and_then(|v| v.as_u64());
        let envelope = serde_json::json!({
            "command": name,
            "payload": arguments,
        });
        let body: CommandBody = serde_json::from_value(envelope).ok()?;
        Some(Self { body, delay })
    }

    /// The narration text, if this is a `speak` command.
    pub fn narration_text(&self) -> Option<&str> {
        match &self.body {
            CommandBody::Speak { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// A structural defect found while validating a script.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScriptError {
    #[error("command {index}: fillTable references unknown table '{table_id}'")]
    DanglingTableReference { index: usize, table_id: String },
    #[error("command {index}: duplicate table id '{table_id}'")]
    DuplicateTableId { index: usize, table_id: String },
    #[error("command {index}: session_end is only valid as the final command")]
    MisplacedSessionEnd { index: usize },
    #[error("command {index} ({kind}): missing required delay")]
    MissingDelay { index: usize, kind: &'static str },
    #[error("command {index}: arrow needs an even number of coordinates, at least 4 (got {len})")]
    BadArrowPoints { index: usize, len: usize },
    #[error("command {index}: cell ({row}, {col}) is outside table '{table_id}'")]
    CellOutOfRange {
        index: usize,
        table_id: String,
        row: u32,
        col: u32,
    },
    #[error("command {index}: table '{table_id}' has {cols} columns but {col_widths} widths and {headers} headers")]
    TableShapeMismatch {
        index: usize,
        table_id: String,
        cols: u32,
        col_widths: usize,
        headers: usize,
    },
    #[error("command {index}: unknown command kind")]
    UnknownCommand { index: usize },
}

/// A finished, ordered, validated presentation script.
///
/// Construction through [`CommandScript::new`] enforces the script
/// invariants; this is the compiler-boundary check that turns malformed
/// generation output into a typed error instead of a playback surprise.
/// Deserialized scripts (external input) bypass validation by design — the
/// player handles their defects defensively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandScript(Vec<Command>);

impl CommandScript {
    pub fn new(commands: Vec<Command>) -> Result<Self, ScriptError> {
        validate(&commands)?;
        Ok(Self(commands))
    }

    /// Wraps commands without validating. For scripts assembled from parts
    /// that were each validated already, and for tests.
    pub fn from_validated(commands: Vec<Command>) -> Self {
        Self(commands)
    }

    pub fn commands(&self) -> &[Command] {
        &self.0
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The narration texts of every `speak` command, in order.
    pub fn transcript(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|c| c.narration_text().map(str::to_owned))
            .collect()
    }
}

fn validate(commands: &[Command]) -> Result<(), ScriptError> {
    use std::collections::HashMap;
    let mut tables: HashMap<&str, (u32, u32)> = HashMap::new();
    let last = commands.len().saturating_sub(1);

    for (index, command) in commands.iter().enumerate() {
        match &command.body {
            CommandBody::Speak { .. } => {}
            CommandBody::SessionEnd {} => {
                if index != last {
                    return Err(ScriptError::MisplacedSessionEnd { index });
                }
            }
            CommandBody::Unknown => {
                return Err(ScriptError::UnknownCommand { index });
            }
            body => {
                if command.delay.is_none() {
                    return Err(ScriptError::MissingDelay {
                        index,
                        kind: body.kind(),
                    });
                }
                match body {
                    CommandBody::DrawArrow { points, .. } => {
                        if points.len() < 4 || points.len() % 2 != 0 {
                            return Err(ScriptError::BadArrowPoints {
                                index,
                                len: points.len(),
                            });
                        }
                    }
                    CommandBody::CreateTable {
                        id,
                        rows,
                        cols,
                        col_widths,
                        headers,
                        ..
                    } => {
                        if col_widths.len() != *cols as usize || headers.len() != *cols as usize {
                            return Err(ScriptError::TableShapeMismatch {
                                index,
                                table_id: id.clone(),
                                cols: *cols,
                                col_widths: col_widths.len(),
                                headers: headers.len(),
                            });
                        }
                        if tables.insert(id, (*rows, *cols)).is_some() {
                            return Err(ScriptError::DuplicateTableId {
                                index,
                                table_id: id.clone(),
                            });
                        }
                    }
                    CommandBody::FillTable {
                        table_id, row, col, ..
                    } => match tables.get(table_id.as_str()) {
                        None => {
                            return Err(ScriptError::DanglingTableReference {
                                index,
                                table_id: table_id.clone(),
                            });
                        }
                        Some((rows, cols)) => {
                            // Data rows only: the header row occupies row 0
                            // of the drawn table.
                            if *row >= rows.saturating_sub(1) || *col >= *cols {
                                return Err(ScriptError::CellOutOfRange {
                                    index,
                                    table_id: table_id.clone(),
                                    row: *row,
                                    col: *col,
                                });
                            }
                        }
                    },
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

mod base64_audio {
    //! Serializes rendered narration audio as a base64 string under
    //! `audioContent`, the transport format the player expects.

    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn speak(text: &str) -> Command {
        Command::new(
            CommandBody::Speak {
                text: text.to_string(),
                audio_content: None,
            },
            None,
        )
    }

    fn table(id: &str, rows: u32, cols: u32) -> Command {
        Command::new(
            CommandBody::CreateTable {
                id: id.to_string(),
                x: 50.0,
                y: 50.0,
                rows,
                cols,
                col_widths: vec![100.0; cols as usize],
                row_height: 40.0,
                headers: (0..cols).map(|i| format!("H{i}")).collect(),
            },
            Some(1000),
        )
    }

    fn fill(table_id: &str, row: u32, col: u32, text: &str) -> Command {
        Command::new(
            CommandBody::FillTable {
                table_id: table_id.to_string(),
                row,
                col,
                text: text.to_string(),
            },
            Some(500),
        )
    }

    #[test]
    fn speak_wire_format_round_trips_with_base64_audio() {
        let command = Command::new(
            CommandBody::Speak {
                text: "Hello".to_string(),
                audio_content: Some(vec![1, 2, 3]),
            },
            None,
        );
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["command"], "speak");
        assert_eq!(value["payload"]["text"], "Hello");
        assert_eq!(value["payload"]["audioContent"], "AQID");
        assert!(value.get("delay").is_none());

        let back: Command = serde_json::from_value(value).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn speak_without_audio_omits_the_field() {
        let value = serde_json::to_value(speak("hi")).unwrap();
        assert!(value["payload"].get("audioContent").is_none());
    }

    #[test]
    fn create_table_uses_camel_case_payload_fields() {
        let value = serde_json::to_value(table("t1", 3, 2)).unwrap();
        assert_eq!(value["command"], "createTable");
        assert_eq!(value["payload"]["colWidths"], json!([100.0, 100.0]));
        assert_eq!(value["payload"]["rowHeight"], json!(40.0));
        assert_eq!(value["delay"], json!(1000));
    }

    #[test]
    fn session_end_keeps_its_snake_case_wire_name() {
        let command = Command::new(CommandBody::SessionEnd {}, None);
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["command"], "session_end");
        let back: Command = serde_json::from_value(value).unwrap();
        assert_eq!(back.body, CommandBody::SessionEnd {});
    }

    #[test]
    fn unknown_command_names_deserialize_instead_of_failing() {
        let value = json!({ "command": "hologram", "payload": { "x": 1 }, "delay": 250 });
        let command: Command = serde_json::from_value(value).unwrap();
        assert_eq!(command.body, CommandBody::Unknown);
        assert_eq!(command.delay, Some(250));
    }

    #[test]
    fn from_action_lifts_delay_out_of_the_arguments() {
        let command = Command::from_action(
            "drawCircle",
            json!({ "x": 10.0, "y": 20.0, "radius": 5.0, "color": "#333", "delay": 800 }),
        )
        .unwrap();
        assert_eq!(command.delay, Some(800));
        match command.body {
            CommandBody::DrawCircle { radius, .. } => assert_eq!(radius, 5.0),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn from_action_maps_unrecognized_names_to_unknown() {
        let command = Command::from_action("teleport", json!({ "delay": 100 })).unwrap();
        assert_eq!(command.body, CommandBody::Unknown);
    }

    #[test]
    fn valid_script_passes_validation() {
        let script = CommandScript::new(vec![
            speak("Let's compare."),
            table("t1", 3, 2),
            fill("t1", 0, 1, "x"),
            fill("t1", 1, 0, "y"),
            Command::new(CommandBody::SessionEnd {}, None),
        ]);
        assert!(script.is_ok());
    }

    #[test]
    fn fill_table_before_create_is_rejected() {
        let err = CommandScript::new(vec![fill("t1", 0, 0, "x"), table("t1", 3, 2)]).unwrap_err();
        assert_eq!(
            err,
            ScriptError::DanglingTableReference {
                index: 0,
                table_id: "t1".to_string()
            }
        );
    }

    #[test]
    fn fill_table_outside_data_rows_is_rejected() {
        // rows = 3 means 2 data rows; row index 2 is out of range.
        let err = CommandScript::new(vec![table("t1", 3, 2), fill("t1", 2, 0, "x")]).unwrap_err();
        assert!(matches!(err, ScriptError::CellOutOfRange { row: 2, .. }));
    }

    #[test]
    fn session_end_mid_script_is_rejected() {
        let err = CommandScript::new(vec![
            speak("a"),
            Command::new(CommandBody::SessionEnd {}, None),
            speak("b"),
        ])
        .unwrap_err();
        assert_eq!(err, ScriptError::MisplacedSessionEnd { index: 1 });
    }

    #[test]
    fn visual_command_without_delay_is_rejected() {
        let mut rect = Command::new(
            CommandBody::DrawRectangle {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                color: "#abc".to_string(),
                label: None,
            },
            None,
        );
        let err = CommandScript::new(vec![rect.clone()]).unwrap_err();
        assert!(matches!(err, ScriptError::MissingDelay { index: 0, .. }));

        rect.delay = Some(500);
        assert!(CommandScript::new(vec![rect]).is_ok());
    }

    #[test]
    fn odd_arrow_points_are_rejected() {
        let arrow = Command::new(
            CommandBody::DrawArrow {
                points: vec![0.0, 0.0, 10.0],
                color: "#333".to_string(),
            },
            Some(500),
        );
        let err = CommandScript::new(vec![arrow]).unwrap_err();
        assert_eq!(err, ScriptError::BadArrowPoints { index: 0, len: 3 });
    }

    #[test]
    fn duplicate_table_ids_are_rejected() {
        let err = CommandScript::new(vec![table("t1", 2, 2), table("t1", 2, 2)]).unwrap_err();
        assert!(matches!(err, ScriptError::DuplicateTableId { index: 1, .. }));
    }

    #[test]
    fn transcript_collects_speak_texts_in_order() {
        let script = CommandScript::new(vec![speak("one"), table("t", 2, 2), speak("two")]).unwrap();
        assert_eq!(script.transcript(), vec!["one", "two"]);
    }
}
