//! Per-client session logic
//!
//! [`reduce`] is a pure function from the current [`SessionState`] and one
//! [`SessionEvent`] to the next state plus the side effects the
//! [`SessionController`] has to perform. Everything that touches the store
//! lives in the controller.

mod controller;

pub use controller::{SessionController, UserAction, SUMMARY_UNAVAILABLE};

use crate::error::QuizError;
use crate::types::{ParticipantId, Role, Room, RoomCode, RoomStatus};
use serde::Serialize;

/// Which screen the client should be showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Home,
    Lobby,
    Quiz,
    Results,
}

/// Everything a client renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub participant_id: ParticipantId,
    pub role: Option<Role>,
    pub view: View,
    /// Mirror of the last observed room snapshot
    pub room: Option<Room>,
    pub room_code: Option<RoomCode>,
    pub current_question_index: usize,
    pub selected_answer: Option<String>,
    pub remaining_seconds: u32,
    pub submission_locked: bool,
    /// The last question was answered; waiting for the room to finish
    pub awaiting_results: bool,
    pub finished: bool,
    pub error: Option<String>,
    pub summary: Option<String>,
    pub summary_pending: bool,
}

impl SessionState {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            role: None,
            view: View::Home,
            room: None,
            room_code: None,
            current_question_index: 0,
            selected_answer: None,
            remaining_seconds: 0,
            submission_locked: false,
            awaiting_results: false,
            finished: false,
            error: None,
            summary: None,
            summary_pending: false,
        }
    }

    /// Options of the question currently on screen
    pub fn current_options(&self) -> Option<&[String]> {
        self.room
            .as_ref()?
            .questions
            .get(self.current_question_index)
            .map(|q| q.options.as_slice())
    }

    fn home(&self) -> Self {
        Self::new(self.participant_id.clone())
    }

    fn enter_question(&mut self, index: usize, timer_seconds: u32) {
        self.view = View::Quiz;
        self.current_question_index = index;
        self.selected_answer = None;
        self.remaining_seconds = timer_seconds;
        self.submission_locked = false;
        self.awaiting_results = false;
    }

    /// Reconcile against an authoritative snapshot
    fn apply_snapshot(&mut self, room: Room) {
        self.role = Some(if room.is_host(&self.participant_id) {
            Role::Host
        } else {
            Role::Player
        });

        match room.status {
            RoomStatus::Lobby => {}
            RoomStatus::InProgress => {
                if self.view != View::Quiz && !self.finished {
                    self.enter_question(0, room.timer_seconds);
                }
            }
            RoomStatus::Finished => {
                if !self.finished {
                    self.finished = true;
                    self.view = View::Results;
                    self.selected_answer = None;
                    self.remaining_seconds = 0;
                    self.submission_locked = true;
                    self.awaiting_results = false;
                }
            }
        }

        self.room = Some(room);
    }
}

/// Inputs to the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A create or join succeeded
    Entered(Room),
    Snapshot(Room),
    RoomRemoved,
    Tick,
    SelectAnswer(String),
    SubmitSelected,
    AnswerRecorded { question_index: usize },
    SubmissionFailed { message: String },
    Failed(String),
    DismissError,
    LeftRoom,
    SummaryRequested,
    SummaryReady(String),
}

/// Work the controller performs on behalf of the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Subscribe(RoomCode),
    Unsubscribe,
    SubmitAnswer {
        question_index: usize,
        answer: Option<String>,
    },
    RequestSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(state: SessionState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Compute the next session state
pub fn reduce(state: &SessionState, event: SessionEvent) -> Transition {
    let mut next = state.clone();

    match event {
        SessionEvent::Entered(room) => {
            let code = room.code.clone();
            let mut entered = state.home();
            entered.view = View::Lobby;
            entered.room_code = Some(code.clone());
            entered.apply_snapshot(room);
            Transition::new(entered).with(Effect::Subscribe(code))
        }

        SessionEvent::Snapshot(room) => {
            // Late delivery for a room we already left
            if next.room_code.as_ref() != Some(&room.code) {
                return Transition::new(next);
            }
            next.apply_snapshot(room);
            Transition::new(next)
        }

        SessionEvent::RoomRemoved => {
            let mut home = state.home();
            if let Some(code) = &state.room_code {
                home.error = Some(QuizError::NotFound(code.to_string()).user_message());
            }
            Transition::new(home).with(Effect::Unsubscribe)
        }

        SessionEvent::Tick => {
            let counting = next.view == View::Quiz && !next.submission_locked;
            if !counting || next.remaining_seconds == 0 {
                return Transition::new(next);
            }
            next.remaining_seconds -= 1;
            if next.remaining_seconds > 0 {
                return Transition::new(next);
            }
            next.submission_locked = true;
            next.selected_answer = None;
            let question_index = next.current_question_index;
            Transition::new(next).with(Effect::SubmitAnswer {
                question_index,
                answer: None,
            })
        }

        SessionEvent::SelectAnswer(text) => {
            let selectable = next.view == View::Quiz
                && !next.submission_locked
                && next.remaining_seconds > 0
                && next
                    .current_options()
                    .is_some_and(|options| options.contains(&text));
            if selectable {
                next.selected_answer = Some(text);
            }
            Transition::new(next)
        }

        SessionEvent::SubmitSelected => {
            if next.view != View::Quiz || next.submission_locked {
                return Transition::new(next);
            }
            // With the countdown at zero only the timeout can be retried
            let answer = if next.remaining_seconds == 0 {
                None
            } else {
                match next.selected_answer.clone() {
                    Some(answer) => Some(answer),
                    None => return Transition::new(next),
                }
            };
            next.submission_locked = true;
            let question_index = next.current_question_index;
            Transition::new(next).with(Effect::SubmitAnswer {
                question_index,
                answer,
            })
        }

        SessionEvent::AnswerRecorded { question_index } => {
            if next.finished || question_index != next.current_question_index {
                return Transition::new(next);
            }
            let Some(room) = next.room.as_ref() else {
                return Transition::new(next);
            };
            let timer_seconds = room.timer_seconds;
            if room.last_question_index() == Some(question_index) {
                next.awaiting_results = true;
                next.submission_locked = true;
            } else {
                next.enter_question(question_index + 1, timer_seconds);
            }
            Transition::new(next)
        }

        SessionEvent::SubmissionFailed { message } => {
            next.error = Some(message);
            if !next.finished {
                next.submission_locked = false;
            }
            Transition::new(next)
        }

        SessionEvent::Failed(message) => {
            next.error = Some(message);
            Transition::new(next)
        }

        SessionEvent::DismissError => {
            next.error = None;
            Transition::new(next)
        }

        SessionEvent::LeftRoom => {
            let had_room = state.room_code.is_some();
            let transition = Transition::new(state.home());
            if had_room {
                transition.with(Effect::Unsubscribe)
            } else {
                transition
            }
        }

        SessionEvent::SummaryRequested => {
            if next.view != View::Results || next.summary.is_some() || next.summary_pending {
                return Transition::new(next);
            }
            next.summary_pending = true;
            Transition::new(next).with(Effect::RequestSummary)
        }

        SessionEvent::SummaryReady(text) => {
            if next.view == View::Results {
                next.summary = Some(text);
                next.summary_pending = false;
            }
            Transition::new(next)
        }
    }
}
