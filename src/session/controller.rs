use super::{reduce, Effect, SessionEvent, SessionState, View};
use crate::error::QuizError;
use crate::llm::{PerformanceData, PerformanceSummarizer, QuestionGenerator};
use crate::state::{RoomRequest, RoomService};
use crate::store::{RoomEvent, Subscription};
use crate::types::{Difficulty, ParticipantId, Role, RoomCode};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shown when the summarizer is missing or fails
pub const SUMMARY_UNAVAILABLE: &str = "Sorry, the performance summary is unavailable right now.";

/// Something the user did
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    CreateRoom {
        topic: String,
        difficulty: Difficulty,
        num_questions: usize,
        timer_seconds: u32,
        name: String,
    },
    JoinRoom {
        code: String,
        name: String,
    },
    StartQuiz,
    SelectAnswer(String),
    SubmitAnswer,
    RequestSummary,
    DismissError,
    ReturnHome,
}

/// Drives one client's [`SessionState`] against the room service
pub struct SessionController {
    state: SessionState,
    service: RoomService,
    generator: Option<Arc<dyn QuestionGenerator>>,
    summarizer: Option<Arc<dyn PerformanceSummarizer>>,
    subscription: Option<Subscription>,
    updates: watch::Sender<SessionState>,
}

impl SessionController {
    pub fn new(service: RoomService, participant_id: ParticipantId) -> Self {
        let state = SessionState::new(participant_id);
        let (updates, _) = watch::channel(state.clone());
        Self {
            state,
            service,
            generator: None,
            summarizer: None,
            subscription: None,
            updates,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn QuestionGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn PerformanceSummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Receiver that observes every published state
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.updates.subscribe()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Perform a user action, including any store calls it needs
    pub async fn handle_action(&mut self, action: UserAction) {
        tracing::debug!("{} -> {:?}", self.state.participant_id, action);

        match action {
            UserAction::CreateRoom {
                topic,
                difficulty,
                num_questions,
                timer_seconds,
                name,
            } => {
                let Some(generator) = self.generator.clone() else {
                    let err = QuizError::GenerationFailed("no question generator".to_string());
                    return self.fail(err).await;
                };
                let request = RoomRequest {
                    topic,
                    difficulty,
                    num_questions,
                    timer_seconds,
                    host_id: self.state.participant_id.clone(),
                    host_name: name,
                };
                match self
                    .service
                    .create_room_with_generator(generator.as_ref(), request)
                    .await
                {
                    Ok(room) => self.handle_event(SessionEvent::Entered(room)).await,
                    Err(e) => self.fail(e).await,
                }
            }

            UserAction::JoinRoom { code, name } => {
                let code = match RoomCode::parse(&code) {
                    Ok(code) => code,
                    Err(e) => return self.fail(e).await,
                };
                let participant_id = self.state.participant_id.clone();
                match self.service.join_room(&code, &participant_id, &name).await {
                    Ok(room) => self.handle_event(SessionEvent::Entered(room)).await,
                    Err(e) => self.fail(e).await,
                }
            }

            UserAction::StartQuiz => {
                let Some(room) = self.state.room.as_ref() else {
                    return;
                };
                if self.state.role != Some(Role::Host) {
                    return self.fail(QuizError::NotHost("start the quiz")).await;
                }
                if room.players.is_empty() {
                    let err = QuizError::InvalidInput("no players have joined".to_string());
                    return self.fail(err).await;
                }
                let code = room.code.clone();
                match self.service.start_quiz(&code).await {
                    Ok(room) => self.handle_event(SessionEvent::Snapshot(room)).await,
                    Err(e) => self.fail(e).await,
                }
            }

            UserAction::SelectAnswer(text) => {
                self.handle_event(SessionEvent::SelectAnswer(text)).await
            }
            UserAction::SubmitAnswer => self.handle_event(SessionEvent::SubmitSelected).await,
            UserAction::RequestSummary => {
                self.handle_event(SessionEvent::SummaryRequested).await
            }
            UserAction::DismissError => self.handle_event(SessionEvent::DismissError).await,
            UserAction::ReturnHome => self.handle_event(SessionEvent::LeftRoom).await,
        }
    }

    async fn fail(&mut self, err: QuizError) {
        tracing::warn!("{}: {}", self.state.participant_id, err);
        self.handle_event(SessionEvent::Failed(err.user_message()))
            .await
    }

    /// Feed one event through the reducer and carry out the resulting effects
    pub async fn handle_event(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let transition = reduce(&self.state, event);
            self.state = transition.state;
            for effect in transition.effects {
                if let Some(follow_up) = self.perform(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }

        self.publish();
    }

    /// Translate a store event into a reducer event
    pub async fn handle_room_event(&mut self, event: RoomEvent) {
        let event = match event {
            RoomEvent::Snapshot(room) => SessionEvent::Snapshot(room),
            RoomEvent::Removed => SessionEvent::RoomRemoved,
        };
        self.handle_event(event).await
    }

    /// One second of countdown
    pub async fn tick(&mut self) {
        self.handle_event(SessionEvent::Tick).await
    }

    /// Process every snapshot already delivered, without waiting
    pub async fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            self.handle_room_event(event).await;
            handled += 1;
        }
        handled
    }

    async fn perform(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::Subscribe(code) => {
                self.unsubscribe();
                match self.service.store().subscribe(&code).await {
                    Ok(subscription) => {
                        tracing::debug!(
                            "{} subscribed to room {}",
                            self.state.participant_id,
                            subscription.code()
                        );
                        self.subscription = Some(subscription);
                        None
                    }
                    Err(e) => Some(SessionEvent::Failed(QuizError::from(e).user_message())),
                }
            }

            Effect::Unsubscribe => {
                self.unsubscribe();
                None
            }

            Effect::SubmitAnswer {
                question_index,
                answer,
            } => {
                let code = self.state.room_code.clone()?;
                let participant_id = self.state.participant_id.clone();
                match self
                    .service
                    .submit_answer(&code, &participant_id, question_index, answer)
                    .await
                {
                    Ok(_) => Some(SessionEvent::AnswerRecorded { question_index }),
                    Err(e) => {
                        tracing::warn!("{}: {}", participant_id, e);
                        Some(SessionEvent::SubmissionFailed {
                            message: e.user_message(),
                        })
                    }
                }
            }

            Effect::RequestSummary => Some(SessionEvent::SummaryReady(self.summarize().await)),
        }
    }

    async fn summarize(&self) -> String {
        let (Some(summarizer), Some(room)) = (&self.summarizer, &self.state.room) else {
            return SUMMARY_UNAVAILABLE.to_string();
        };

        let role = self.state.role.unwrap_or(Role::Player);
        let data = match role {
            Role::Host => Some(PerformanceData::for_host(room)),
            Role::Player => PerformanceData::for_player(room, &self.state.participant_id),
        };
        let Some(data) = data else {
            return SUMMARY_UNAVAILABLE.to_string();
        };

        match summarizer.summarize(role, &room.topic, &data).await {
            Ok(text) => text,
            Err(e) => {
                let err = QuizError::SummaryFailed(e.to_string());
                tracing::warn!("{}", err);
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }

    fn unsubscribe(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    fn publish(&self) {
        self.updates.send_if_modified(|current| {
            if *current == self.state {
                false
            } else {
                *current = self.state.clone();
                true
            }
        });
    }

    /// Index of the question being answered, if the quiz view is showing
    fn question_on_screen(&self) -> Option<usize> {
        (self.state.view == View::Quiz).then_some(self.state.current_question_index)
    }

    /// Drive the session until the action channel closes
    pub async fn run(mut self, mut actions: mpsc::Receiver<UserAction>) {
        let period = Duration::from_secs(1);
        let mut countdown = interval_at(Instant::now() + period, period);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let before = self.question_on_screen();
            tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => self.handle_action(action).await,
                    None => break,
                },
                event = next_room_event(&mut self.subscription) => match event {
                    Some(event) => self.handle_room_event(event).await,
                    None => {
                        tracing::debug!("Room feed for {} closed", self.state.participant_id);
                        self.subscription = None;
                    }
                },
                _ = countdown.tick() => {
                    if self.state.view == View::Quiz {
                        self.tick().await;
                    }
                }
            }

            // Every question gets full seconds from the moment it is shown
            let after = self.question_on_screen();
            if after.is_some() && after != before {
                countdown.reset();
            }
        }

        self.unsubscribe();
        tracing::info!("Session for {} ended", self.state.participant_id);
    }
}

async fn next_room_event(subscription: &mut Option<Subscription>) -> Option<RoomEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResult};
    use crate::state::test_support::{new_room, question};
    use crate::store::{MemoryStore, RoomStore};
    use crate::types::{Question, RoomStatus};
    use async_trait::async_trait;

    struct Questions;

    #[async_trait]
    impl QuestionGenerator for Questions {
        async fn generate(
            &self,
            _topic: &str,
            _difficulty: Difficulty,
            num_questions: usize,
        ) -> LlmResult<Vec<Question>> {
            Ok((0..num_questions).map(question).collect())
        }
    }

    struct BrokenSummarizer;

    #[async_trait]
    impl PerformanceSummarizer for BrokenSummarizer {
        async fn summarize(
            &self,
            _role: Role,
            _topic: &str,
            _data: &PerformanceData,
        ) -> LlmResult<String> {
            Err(LlmError::Timeout(Duration::from_secs(1)))
        }
    }

    fn setup() -> (RoomService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (RoomService::new(store.clone()), store)
    }

    fn controller(service: &RoomService, id: &str) -> SessionController {
        SessionController::new(service.clone(), id.to_string())
            .with_generator(Arc::new(Questions))
    }

    fn create(name: &str) -> UserAction {
        UserAction::CreateRoom {
            topic: "Oceans".to_string(),
            difficulty: Difficulty::Medium,
            num_questions: 2,
            timer_seconds: 2,
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_room_enters_lobby_as_host() {
        let (service, store) = setup();
        let mut ada = controller(&service, "ada-id");

        ada.handle_action(create("Ada")).await;

        let state = ada.state();
        assert_eq!(state.view, View::Lobby);
        assert_eq!(state.role, Some(Role::Host));
        assert!(ada.is_subscribed());
        let code = state.room_code.clone().unwrap();
        assert_eq!(store.subscriber_count(&code).await, 1);
    }

    #[tokio::test]
    async fn test_join_unknown_room_stays_home() {
        let (service, _store) = setup();
        let mut bo = controller(&service, "bo-id");

        bo.handle_action(UserAction::JoinRoom {
            code: "zzzzz".to_string(),
            name: "Bo".to_string(),
        })
        .await;

        assert_eq!(bo.state().view, View::Home);
        assert_eq!(bo.state().error.as_deref(), Some("Room not found"));
        assert!(!bo.is_subscribed());

        bo.handle_action(UserAction::DismissError).await;
        assert_eq!(bo.state().error, None);
    }

    #[tokio::test]
    async fn test_only_host_may_start() {
        let (service, _store) = setup();
        let room = service.create_room(new_room(2)).await.unwrap();
        let mut bo = controller(&service, "bo-id");
        bo.handle_action(UserAction::JoinRoom {
            code: room.code.to_string(),
            name: "Bo".to_string(),
        })
        .await;

        bo.handle_action(UserAction::StartQuiz).await;

        assert_eq!(bo.state().view, View::Lobby);
        assert!(bo.state().error.as_deref().unwrap().contains("host"));
        let stored = service.get_room(&room.code).await.unwrap();
        assert_eq!(stored.status, RoomStatus::Lobby);
    }

    #[tokio::test]
    async fn test_countdown_expiry_submits_sentinel() {
        let (service, _store) = setup();
        let mut ada = controller(&service, "ada-id");
        ada.handle_action(create("Ada")).await;
        ada.handle_action(UserAction::StartQuiz).await;
        assert_eq!(ada.state().view, View::Quiz);

        ada.tick().await;
        ada.tick().await;

        assert_eq!(ada.state().current_question_index, 1);
        let code = ada.state().room_code.clone().unwrap();
        let stored = service.get_room(&code).await.unwrap();
        let answers = &stored.players["ada-id"].answers;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].answer_text, None);
        assert!(!answers[0].is_correct);
    }

    #[tokio::test]
    async fn test_return_home_cancels_subscription() {
        let (service, store) = setup();
        let mut ada = controller(&service, "ada-id");
        ada.handle_action(create("Ada")).await;
        let code = ada.state().room_code.clone().unwrap();

        ada.handle_action(UserAction::ReturnHome).await;

        assert_eq!(ada.state().view, View::Home);
        assert!(!ada.is_subscribed());
        assert_eq!(store.subscriber_count(&code).await, 0);
    }

    #[tokio::test]
    async fn test_room_deletion_surfaces_not_found() {
        let (service, store) = setup();
        let mut ada = controller(&service, "ada-id");
        ada.handle_action(create("Ada")).await;
        let code = ada.state().room_code.clone().unwrap();
        ada.pump().await;

        store.delete_room(&code).await.unwrap();
        ada.pump().await;

        assert_eq!(ada.state().view, View::Home);
        assert_eq!(ada.state().error.as_deref(), Some("Room not found"));
        assert!(!ada.is_subscribed());
    }

    #[tokio::test]
    async fn test_summary_failure_degrades_to_apology() {
        let (service, _store) = setup();
        let mut ada = controller(&service, "ada-id").with_summarizer(Arc::new(BrokenSummarizer));
        ada.handle_action(create("Ada")).await;
        ada.handle_action(UserAction::StartQuiz).await;
        for _ in 0..2 {
            ada.handle_action(UserAction::SelectAnswer(format!(
                "right {}",
                ada.state().current_question_index
            )))
            .await;
            ada.handle_action(UserAction::SubmitAnswer).await;
        }
        ada.pump().await;
        assert_eq!(ada.state().view, View::Results);

        ada.handle_action(UserAction::RequestSummary).await;
        assert_eq!(ada.state().summary.as_deref(), Some(SUMMARY_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_run_publishes_states_and_stops() {
        let (service, _store) = setup();
        let ada = controller(&service, "ada-id");
        let mut updates = ada.watch();
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(ada.run(rx));

        tx.send(create("Ada")).await.unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().view, View::Lobby);

        drop(tx);
        handle.await.unwrap();
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_question_gets_a_full_countdown() {
        let (service, store) = setup();
        let ada = controller(&service, "ada-id");
        let updates = ada.watch();
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(ada.run(rx));

        tx.send(create("Ada")).await.unwrap();
        tx.send(UserAction::StartQuiz).await.unwrap();
        settle().await;
        assert_eq!(updates.borrow().view, View::Quiz);
        assert_eq!(updates.borrow().remaining_seconds, 2);
        let code = updates.borrow().room_code.clone().unwrap();

        // Answer just before the first second elapses
        tokio::time::advance(Duration::from_millis(900)).await;
        settle().await;
        tx.send(UserAction::SelectAnswer("right 0".to_string())).await.unwrap();
        tx.send(UserAction::SubmitAnswer).await.unwrap();
        settle().await;
        assert_eq!(updates.borrow().current_question_index, 1);
        assert_eq!(updates.borrow().remaining_seconds, 2);

        // Past the old one-second boundary: nothing is taken off question 1
        tokio::time::advance(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(updates.borrow().remaining_seconds, 2);

        tokio::time::advance(Duration::from_millis(900)).await;
        settle().await;
        assert_eq!(updates.borrow().remaining_seconds, 1);
        let room = store.get_room(&code).await.unwrap();
        assert_eq!(room.players["ada-id"].answers.len(), 1);

        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        let room = store.get_room(&code).await.unwrap();
        let answers = &room.players["ada-id"].answers;
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[1].question_index, 1);
        assert_eq!(answers[1].answer_text, None);
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(updates.borrow().view, View::Results);

        drop(tx);
        handle.await.unwrap();
    }
}
