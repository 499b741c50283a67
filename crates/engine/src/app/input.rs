use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Quit,
}

const ACTION_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Quit => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    actions: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn pressed(action: InputAction) -> Self {
        Self::empty().with_action_down(action, true)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn quit_requested(&self) -> bool {
        self.is_down(InputAction::Quit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPoll {
    Ready(InputSnapshot),
    Pending,
    Exhausted,
}

/// Supplies one snapshot per tick in which the active scene asked for input.
pub trait InputSource {
    fn poll(&mut self) -> InputPoll;
}

#[derive(Debug, Error)]
pub enum InputScriptError {
    #[error("failed to read input script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unknown input token '{token}' on line {line}")]
    UnknownToken { line: usize, token: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptStep {
    Press(InputAction),
    Wait,
}

fn parse_token(token: &str) -> Option<ScriptStep> {
    let step = match token.to_ascii_lowercase().as_str() {
        "up" | "w" => ScriptStep::Press(InputAction::MoveUp),
        "down" | "s" => ScriptStep::Press(InputAction::MoveDown),
        "left" | "a" => ScriptStep::Press(InputAction::MoveLeft),
        "right" | "d" => ScriptStep::Press(InputAction::MoveRight),
        "quit" | "q" => ScriptStep::Press(InputAction::Quit),
        "wait" | "." => ScriptStep::Wait,
        _ => return None,
    };
    Some(step)
}

/// Pre-recorded input: whitespace separated tokens, `#` starts a comment.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    steps: VecDeque<ScriptStep>,
}

impl ScriptedInput {
    pub fn parse(script: &str) -> Result<Self, InputScriptError> {
        let mut steps = VecDeque::new();
        for (line_index, raw_line) in script.lines().enumerate() {
            let line = raw_line.split('#').next().unwrap_or_default();
            for token in line.split_whitespace() {
                let step = parse_token(token).ok_or_else(|| InputScriptError::UnknownToken {
                    line: line_index + 1,
                    token: token.to_string(),
                })?;
                steps.push_back(step);
            }
        }
        Ok(Self { steps })
    }

    pub fn from_path(path: &Path) -> Result<Self, InputScriptError> {
        let raw = fs::read_to_string(path).map_err(|source| InputScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> InputPoll {
        match self.steps.pop_front() {
            Some(ScriptStep::Press(action)) => InputPoll::Ready(InputSnapshot::pressed(action)),
            Some(ScriptStep::Wait) => InputPoll::Ready(InputSnapshot::empty()),
            None => InputPoll::Exhausted,
        }
    }
}

/// Line-oriented keyboard input read on a background thread.
///
/// Every recognised character on a line becomes one press, so `ddw` queues
/// right, right, up.
pub struct StdinInput {
    receiver: Receiver<InputAction>,
}

impl StdinInput {
    pub fn spawn() -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("stdin-input".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(error) => {
                            warn!(error = %error, "stdin_read_failed");
                            break;
                        }
                    };
                    for action in actions_from_keys(&line) {
                        if sender.send(action).is_err() {
                            return;
                        }
                    }
                }
                debug!("stdin_closed");
            })?;
        Ok(Self { receiver })
    }
}

impl InputSource for StdinInput {
    fn poll(&mut self) -> InputPoll {
        match self.receiver.try_recv() {
            Ok(action) => InputPoll::Ready(InputSnapshot::pressed(action)),
            Err(TryRecvError::Empty) => InputPoll::Pending,
            Err(TryRecvError::Disconnected) => InputPoll::Exhausted,
        }
    }
}

fn actions_from_keys(line: &str) -> Vec<InputAction> {
    line.chars()
        .filter_map(|key| match key.to_ascii_lowercase() {
            'w' | 'k' => Some(InputAction::MoveUp),
            's' | 'j' => Some(InputAction::MoveDown),
            'a' | 'h' => Some(InputAction::MoveLeft),
            'd' | 'l' => Some(InputAction::MoveRight),
            'q' => Some(InputAction::Quit),
            _ => None,
        })
        .collect()
}
