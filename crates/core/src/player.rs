//! Script Playback
//!
//! Playback is split in two layers. [`Player`] is a pure state machine:
//! `step()` applies exactly one command to the canvas and reports the
//! suspension the caller owes (play narration, or wait the command's delay)
//! as a [`StepEffect`]. [`run_player`] is the async driver that owns the
//! clock: it paces steps with `tokio::time::sleep`, plays narration through
//! an injected [`NarrationSink`], and applies control messages between
//! commands (and, for reset, mid-narration).
//!
//! The split keeps every ordering and canvas rule testable without time.

use crate::command::{Command, CommandBody, CommandScript, DEFAULT_DELAY_MS, TableCell};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One element drawn on the canvas, in creation order.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasObject {
    Text {
        x: f64,
        y: f64,
        text: String,
        font_size: Option<f64>,
        color: Option<String>,
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: String,
        label: Option<String>,
    },
    Circle {
        x: f64,
        y: f64,
        radius: f64,
        color: String,
        label: Option<String>,
    },
    Arrow {
        points: Vec<f64>,
        color: String,
    },
    Table {
        id: String,
        x: f64,
        y: f64,
        rows: u32,
        cols: u32,
        col_widths: Vec<f64>,
        row_height: f64,
        headers: Vec<String>,
        /// Grows one cell per `fillTable` command, in command order.
        cells: Vec<TableCell>,
    },
}

/// The drawn state of a session: ordered objects, cleared as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasModel {
    objects: Vec<CanvasObject>,
}

impl CanvasModel {
    pub fn objects(&self) -> &[CanvasObject] {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn push(&mut self, object: CanvasObject) {
        self.objects.push(object);
    }

    fn clear(&mut self) {
        self.objects.clear();
    }

    /// Appends a cell to the named table. Returns false when no such table
    /// exists on the canvas.
    fn fill_table(&mut self, table_id: &str, cell: TableCell) -> bool {
        for object in self.objects.iter_mut() {
            if let CanvasObject::Table { id, cells, .. } = object {
                if id == table_id {
                    cells.push(cell);
                    return true;
                }
            }
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Paused,
    Done,
}

/// The suspension one `step()` call hands back to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEffect {
    /// Play this narration to completion before the next step. `audio` of
    /// `None` is silent narration and costs no time.
    Narration {
        text: String,
        audio: Option<Vec<u8>>,
    },
    /// Hold the canvas as-is for this long.
    Wait(Duration),
    /// Playback finished; the snapshot is the final canvas for persistence.
    End { canvas: CanvasModel },
}

/// The playback state machine. Commands mutate the canvas and narration
/// only through cursor advancement; the cursor is strictly increasing while
/// playing and constant while paused.
#[derive(Debug, Default)]
pub struct Player {
    queue: Vec<Command>,
    cursor: usize,
    status: PlaybackStatus,
    canvas: CanvasModel,
    narration: Option<String>,
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the loaded script and returns to a clean `Idle` state.
    pub fn load(&mut self, script: CommandScript) {
        self.queue = script.into_commands();
        self.cursor = 0;
        self.status = PlaybackStatus::Idle;
        self.canvas.clear();
        self.narration = None;
        debug!(commands = self.queue.len(), "Script loaded");
    }

    /// Starts or resumes playback. From `Done` this is a replay: the canvas
    /// and cursor rewind to the start first.
    pub fn play(&mut self) {
        match self.status {
            PlaybackStatus::Idle | PlaybackStatus::Paused => {
                self.status = PlaybackStatus::Playing;
            }
            PlaybackStatus::Done => {
                self.reset();
                self.status = PlaybackStatus::Playing;
            }
            PlaybackStatus::Playing => {}
        }
    }

    pub fn pause(&mut self) {
        if self.status == PlaybackStatus::Playing {
            self.status = PlaybackStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.status == PlaybackStatus::Paused {
            self.status = PlaybackStatus::Playing;
        }
    }

    /// Rewinds to the start of the loaded script and clears the canvas.
    /// Idempotent; the script stays loaded.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.status = PlaybackStatus::Idle;
        self.canvas.clear();
        self.narration = None;
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// Index of the next command to apply.
    pub fn current_command_index(&self) -> usize {
        self.cursor
    }

    pub fn total_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn canvas(&self) -> &CanvasModel {
        &self.canvas
    }

    /// The text of the most recently applied `speak` command.
    pub fn current_narration(&self) -> Option<&str> {
        self.narration.as_deref()
    }

    /// Applies exactly one command and returns the suspension it requires.
    /// Returns `None` unless the player is `Playing`.
    pub fn step(&mut self) -> Option<StepEffect> {
        if self.status != PlaybackStatus::Playing {
            return None;
        }
        let Some(command) = self.queue.get(self.cursor).cloned() else {
            // A script without a trailing session_end still finishes.
            self.status = PlaybackStatus::Done;
            return Some(StepEffect::End {
                canvas: self.canvas.clone(),
            });
        };
        self.cursor += 1;
        let delay =
            Duration::from_millis(command.delay.unwrap_or(DEFAULT_DELAY_MS));

        let effect = match command.body {
            CommandBody::Speak {
                text,
                audio_content,
            } => {
                self.narration = Some(text.clone());
                StepEffect::Narration {
                    text,
                    audio: audio_content,
                }
            }
            CommandBody::CreateText {
                x,
                y,
                text,
                font_size,
                color,
            } => {
                self.canvas.push(CanvasObject::Text {
                    x,
                    y,
                    text,
                    font_size,
                    color,
                });
                StepEffect::Wait(delay)
            }
            CommandBody::DrawRectangle {
                x,
                y,
                width,
                height,
                color,
                label,
            } => {
                self.canvas.push(CanvasObject::Rectangle {
                    x,
                    y,
                    width,
                    height,
                    color,
                    label,
                });
                StepEffect::Wait(delay)
            }
            CommandBody::DrawCircle {
                x,
                y,
                radius,
                color,
                label,
            } => {
                self.canvas.push(CanvasObject::Circle {
                    x,
                    y,
                    radius,
                    color,
                    label,
                });
                StepEffect::Wait(delay)
            }
            CommandBody::DrawArrow { points, color } => {
                self.canvas.push(CanvasObject::Arrow { points, color });
                StepEffect::Wait(delay)
            }
            CommandBody::CreateTable {
                id,
                x,
                y,
                rows,
                cols,
                col_widths,
                row_height,
                headers,
            } => {
                self.canvas.push(CanvasObject::Table {
                    id,
                    x,
                    y,
                    rows,
                    cols,
                    col_widths,
                    row_height,
                    headers,
                    cells: Vec::new(),
                });
                StepEffect::Wait(delay)
            }
            CommandBody::FillTable {
                table_id,
                row,
                col,
                text,
            } => {
                // Compiled scripts cannot reach the dangling case; externally
                // loaded ones can, and playback must survive them.
                if !self.canvas.fill_table(&table_id, TableCell { row, col, text }) {
                    warn!(table_id, "fillTable references a table not on the canvas; skipping");
                }
                StepEffect::Wait(delay)
            }
            CommandBody::ClearCanvas {} => {
                self.canvas.clear();
                StepEffect::Wait(delay)
            }
            CommandBody::SessionEnd {} => {
                self.status = PlaybackStatus::Done;
                StepEffect::End {
                    canvas: self.canvas.clone(),
                }
            }
            CommandBody::Unknown => {
                warn!(index = self.cursor - 1, "Skipping unknown command during playback");
                StepEffect::Wait(Duration::ZERO)
            }
        };
        Some(effect)
    }
}

/// Where the driver sends narration for audible playback. Implementations
/// return when the narration has finished playing.
#[async_trait]
pub trait NarrationSink: Send + Sync {
    async fn play(&self, text: &str, audio: Option<&[u8]>);
}

/// Control messages for the playback driver.
#[derive(Debug)]
pub enum PlayerControl {
    Load(CommandScript),
    Play,
    Pause,
    Reset,
}

/// Drives a [`Player`] until the control channel closes.
///
/// While playing, controls are applied between commands, with two
/// exceptions during an in-flight narration: `Reset` interrupts it
/// mid-utterance; `Pause` lets it finish but stops the next command from
/// starting.
pub async fn run_player(
    mut controls: mpsc::Receiver<PlayerControl>,
    sink: Arc<dyn NarrationSink>,
) {
    let mut player = Player::new();
    loop {
        if player.status() != PlaybackStatus::Playing {
            match controls.recv().await {
                Some(control) => apply_control(&mut player, control),
                None => return,
            }
            continue;
        }

        // Pending controls win over the next step.
        match controls.try_recv() {
            Ok(control) => {
                apply_control(&mut player, control);
                continue;
            }
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => return,
        }

        match player.step() {
            Some(StepEffect::Narration { text, audio }) => {
                let mut narration = Box::pin(sink.play(&text, audio.as_deref()));
                loop {
                    tokio::select! {
                        _ = &mut narration => break,
                        control = controls.recv() => match control {
                            Some(PlayerControl::Reset) => {
                                player.reset();
                                break;
                            }
                            Some(control) => apply_control(&mut player, control),
                            None => return,
                        }
                    }
                }
            }
            Some(StepEffect::Wait(delay)) => {
                let sleep = tokio::time::sleep(delay);
                tokio::pin!(sleep);
                loop {
                    tokio::select! {
                        _ = &mut sleep => break,
                        control = controls.recv() => match control {
                            Some(PlayerControl::Reset) => {
                                player.reset();
                                break;
                            }
                            Some(control) => apply_control(&mut player, control),
                            None => return,
                        }
                    }
                }
            }
            Some(StepEffect::End { .. }) => {
                info!("Playback finished");
            }
            None => {}
        }
    }
}

fn apply_control(player: &mut Player, control: PlayerControl) {
    match control {
        PlayerControl::Load(script) => player.load(script),
        PlayerControl::Play => player.play(),
        PlayerControl::Pause => player.pause(),
        PlayerControl::Reset => player.reset(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use std::sync::Mutex;

    fn speak(text: &str) -> Command {
        Command::new(
            CommandBody::Speak {
                text: text.to_string(),
                audio_content: None,
            },
            None,
        )
    }

    fn text(content: &str, delay: Option<u64>) -> Command {
        Command::new(
            CommandBody::CreateText {
                x: 100.0,
                y: 100.0,
                text: content.to_string(),
                font_size: Some(24.0),
                color: None,
            },
            delay,
        )
    }

    fn table(id: &str) -> Command {
        Command::new(
            CommandBody::CreateTable {
                id: id.to_string(),
                x: 50.0,
                y: 50.0,
                rows: 3,
                cols: 2,
                col_widths: vec![100.0, 100.0],
                row_height: 40.0,
                headers: vec!["A".to_string(), "B".to_string()],
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
            Some(300),
        )
    }

    fn end() -> Command {
        Command::new(CommandBody::SessionEnd {}, None)
    }

    fn loaded(commands: Vec<Command>) -> Player {
        let mut player = Player::new();
        player.load(CommandScript::from_validated(commands));
        player
    }

    #[test]
    fn speak_text_end_scenario() {
        let mut player = loaded(vec![speak("Welcome"), text("Hello", Some(800)), end()]);
        player.play();

        assert_eq!(
            player.step(),
            Some(StepEffect::Narration {
                text: "Welcome".to_string(),
                audio: None
            })
        );
        assert_eq!(player.current_narration(), Some("Welcome"));

        assert_eq!(
            player.step(),
            Some(StepEffect::Wait(Duration::from_millis(800)))
        );
        assert_eq!(player.canvas().objects().len(), 1);

        match player.step() {
            Some(StepEffect::End { canvas }) => {
                assert_eq!(canvas.objects().len(), 1);
            }
            other => panic!("unexpected effect: {other:?}"),
        }
        assert_eq!(player.status(), PlaybackStatus::Done);
    }

    #[test]
    fn table_cells_match_fill_commands_in_order() {
        let mut player = loaded(vec![
            table("t1"),
            fill("t1", 0, 0, "a"),
            fill("t1", 0, 1, "b"),
            fill("t1", 1, 0, "c"),
        ]);
        player.play();
        while player.step().is_some() {
            if player.status() == PlaybackStatus::Done {
                break;
            }
        }

        match &player.canvas().objects()[0] {
            CanvasObject::Table { cells, .. } => {
                let texts: Vec<&str> = cells.iter().map(|c| c.text.as_str()).collect();
                assert_eq!(texts, vec!["a", "b", "c"]);
                assert_eq!(cells[2], TableCell { row: 1, col: 0, text: "c".to_string() });
            }
            other => panic!("unexpected object: {other:?}"),
        }
    }

    #[test]
    fn dangling_fill_table_is_a_no_op_and_playback_continues() {
        let mut player = loaded(vec![fill("ghost", 0, 0, "x"), text("after", Some(500)), end()]);
        player.play();

        assert_eq!(
            player.step(),
            Some(StepEffect::Wait(Duration::from_millis(300)))
        );
        assert!(player.canvas().is_empty());

        player.step();
        assert_eq!(player.canvas().objects().len(), 1);
        assert!(matches!(player.step(), Some(StepEffect::End { .. })));
    }

    #[test]
    fn cursor_is_strictly_increasing_while_playing_and_constant_while_paused() {
        let mut player = loaded(vec![speak("a"), speak("b"), speak("c"), end()]);
        player.play();

        let mut previous = player.current_command_index();
        player.step();
        assert!(player.current_command_index() > previous);
        previous = player.current_command_index();

        player.pause();
        assert_eq!(player.step(), None);
        assert_eq!(player.current_command_index(), previous);

        player.resume();
        player.step();
        assert!(player.current_command_index() > previous);
    }

    #[test]
    fn reset_is_idempotent_and_clears_everything() {
        let mut player = loaded(vec![speak("a"), text("x", Some(500)), end()]);
        player.play();
        player.step();
        player.step();

        player.reset();
        let after_first = (
            player.status(),
            player.current_command_index(),
            player.canvas().clone(),
            player.current_narration().map(str::to_owned),
        );
        player.reset();
        assert_eq!(player.status(), after_first.0);
        assert_eq!(player.current_command_index(), after_first.1);
        assert_eq!(player.canvas(), &after_first.2);
        assert_eq!(player.current_narration().map(str::to_owned), after_first.3);

        assert_eq!(player.status(), PlaybackStatus::Idle);
        assert_eq!(player.current_command_index(), 0);
        assert!(player.canvas().is_empty());
        assert_eq!(player.current_narration(), None);
        // The script is still loaded.
        assert_eq!(player.total_commands(), 3);
    }

    #[test]
    fn play_after_done_replays_from_the_start() {
        let mut player = loaded(vec![text("x", Some(500)), end()]);
        player.play();
        player.step();
        player.step();
        assert_eq!(player.status(), PlaybackStatus::Done);

        player.play();
        assert_eq!(player.status(), PlaybackStatus::Playing);
        assert_eq!(player.current_command_index(), 0);
        assert!(player.canvas().is_empty());
        assert_eq!(
            player.step(),
            Some(StepEffect::Wait(Duration::from_millis(500)))
        );
    }

    #[test]
    fn exhausted_queue_without_session_end_finishes() {
        let mut player = loaded(vec![speak("only")]);
        player.play();
        player.step();
        assert!(matches!(player.step(), Some(StepEffect::End { .. })));
        assert_eq!(player.status(), PlaybackStatus::Done);
    }

    #[test]
    fn clear_canvas_empties_the_canvas() {
        let mut player = loaded(vec![
            text("a", Some(500)),
            text("b", Some(500)),
            Command::new(CommandBody::ClearCanvas {}, Some(500)),
        ]);
        player.play();
        player.step();
        player.step();
        assert_eq!(player.canvas().objects().len(), 2);
        player.step();
        assert!(player.canvas().is_empty());
    }

    #[test]
    fn missing_delay_falls_back_to_the_default() {
        let mut player = loaded(vec![text("a", None)]);
        player.play();
        assert_eq!(
            player.step(),
            Some(StepEffect::Wait(Duration::from_millis(DEFAULT_DELAY_MS)))
        );
    }

    #[test]
    fn unknown_commands_are_skipped_without_waiting() {
        let mut player = loaded(vec![Command::new(CommandBody::Unknown, Some(900)), end()]);
        player.play();
        assert_eq!(player.step(), Some(StepEffect::Wait(Duration::ZERO)));
        assert!(matches!(player.step(), Some(StepEffect::End { .. })));
    }

    #[test]
    fn step_outside_playing_does_nothing() {
        let mut player = loaded(vec![speak("a")]);
        assert_eq!(player.step(), None);
        assert_eq!(player.current_command_index(), 0);
    }

    /// Records started/finished narrations, taking a fixed simulated time
    /// per utterance.
    struct RecordingSink {
        duration: Duration,
        started: Mutex<Vec<String>>,
        finished: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new(duration: Duration) -> Self {
            Self {
                duration,
                started: Mutex::new(Vec::new()),
                finished: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NarrationSink for RecordingSink {
        async fn play(&self, text: &str, _audio: Option<&[u8]>) {
            self.started.lock().unwrap().push(text.to_string());
            tokio::time::sleep(self.duration).await;
            self.finished.lock().unwrap().push(text.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn driver_plays_a_script_in_order() {
        let sink = Arc::new(RecordingSink::new(Duration::from_millis(200)));
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_player(rx, sink.clone()));

        let script = CommandScript::from_validated(vec![
            speak("first"),
            text("x", Some(500)),
            speak("second"),
            end(),
        ]);
        tx.send(PlayerControl::Load(script)).await.unwrap();
        tx.send(PlayerControl::Play).await.unwrap();

        // Closing the channel stops the driver, so keep it open until the
        // whole script has had time to play out.
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*sink.finished.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_interrupts_narration_mid_flight() {
        let sink = Arc::new(RecordingSink::new(Duration::from_secs(60)));
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_player(rx, sink.clone()));

        let script = CommandScript::from_validated(vec![speak("long"), end()]);
        tx.send(PlayerControl::Load(script)).await.unwrap();
        tx.send(PlayerControl::Play).await.unwrap();

        // Let the narration start, then reset well before it can finish.
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(PlayerControl::Reset).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*sink.started.lock().unwrap(), vec!["long"]);
        assert!(sink.finished.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_lets_narration_finish_but_holds_the_next_command() {
        let sink = Arc::new(RecordingSink::new(Duration::from_millis(300)));
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_player(rx, sink.clone()));

        let script = CommandScript::from_validated(vec![speak("one"), speak("two"), end()]);
        tx.send(PlayerControl::Load(script)).await.unwrap();
        tx.send(PlayerControl::Play).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(PlayerControl::Pause).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        // The in-flight narration completed; the second never started.
        assert_eq!(*sink.finished.lock().unwrap(), vec!["one"]);
        assert_eq!(*sink.started.lock().unwrap(), vec!["one"]);

        tx.send(PlayerControl::Play).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(tx);
        handle.await.unwrap();
        assert_eq!(*sink.finished.lock().unwrap(), vec!["one", "two"]);
    }
}
