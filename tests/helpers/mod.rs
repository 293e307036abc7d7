//! Mock collaborators and HTTP helpers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use story_buddy::{
    app_state::AppState,
    db::{
        memory::InMemoryStore,
        store::{JobStore, PersistenceError, PersonaStore, TransitionOutcome},
    },
    models::{
        persona::Persona,
        request::StoryStatusResponse,
        story::{NewStory, Story, StoryContent, StoryStatus},
    },
    routes::{self, auth::OwnerResolver},
    services::{
        clock::ManualClock,
        dedup::DuplicateGuard,
        fun_facts::FunFactsService,
        jobs::StoryService,
        openai::{ImageSynthesis, TextCompletion, UpstreamError},
        orchestrator::{Collaborators, PipelineSettings, StoryPipeline},
        storage::{DisabledObjectStore, ObjectStore, StorageError},
    },
};

/// Raw model output used by most scenarios.
pub const STORY_OUTPUT: &str = "Title: T\n\nBody text.\n\nThe End!";

/// A well-formed breakdown answer.
pub const FOUR_PARTS: &str = "Setup\n---PART BREAK---\nDevelopment\n---PART BREAK---\nClimax\n---PART BREAK---\nResolution";

/// Three fun facts with some chatter around them.
pub const FUN_FACTS: &str = "Here you go!\nQ: Did you know owls can turn their heads?\nA: Yes! Almost all the way round.\nQ: Did you know snails sleep for days?\nA: Sleepy snails!\nQ: Did you know bees dance?\nA: They dance to share directions.";

pub const GUIDE: &str = "Benny is a small grey mouse with a red scarf.";

pub const CDN: &str = "https://cdn.test";

pub const JWT_SECRET: &str = "test-secret";

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn upstream_failure(what: &str) -> UpstreamError {
    UpstreamError::Status {
        status: 500,
        body: format!("{what} failed"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Story,
    Breakdown,
    Guide,
    FunFacts,
}

#[derive(Debug, Clone)]
pub struct TextCall {
    pub kind: CallKind,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text client answering by call kind. A `None` answer makes that call fail.
pub struct MockText {
    story: Option<String>,
    breakdown: Option<String>,
    guide: Option<String>,
    fun_facts: Option<String>,
    calls: Mutex<Vec<TextCall>>,
}

impl MockText {
    pub fn new(story: &str) -> Self {
        Self {
            story: Some(story.to_string()),
            breakdown: Some(FOUR_PARTS.to_string()),
            guide: Some(GUIDE.to_string()),
            fun_facts: Some(FUN_FACTS.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_story() -> Self {
        Self {
            story: None,
            ..Self::new(STORY_OUTPUT)
        }
    }

    pub fn with_breakdown(mut self, answer: Option<&str>) -> Self {
        self.breakdown = answer.map(str::to_string);
        self
    }

    pub fn with_guide(mut self, answer: Option<&str>) -> Self {
        self.guide = answer.map(str::to_string);
        self
    }

    pub fn with_fun_facts(mut self, answer: Option<&str>) -> Self {
        self.fun_facts = answer.map(str::to_string);
        self
    }

    pub fn calls(&self) -> Vec<TextCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<TextCall> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }
}

fn classify(system: &str) -> CallKind {
    if system.contains("storyteller") {
        CallKind::Story
    } else if system.contains("comic book artist") {
        CallKind::Guide
    } else if system.contains("friendly educator") {
        CallKind::FunFacts
    } else {
        CallKind::Breakdown
    }
}

#[async_trait]
impl TextCompletion for MockText {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, UpstreamError> {
        let kind = classify(system);
        self.calls.lock().unwrap().push(TextCall {
            kind,
            system: system.to_string(),
            user: user.to_string(),
            max_tokens,
            temperature,
        });

        let answer = match kind {
            CallKind::Story => &self.story,
            CallKind::Breakdown => &self.breakdown,
            CallKind::Guide => &self.guide,
            CallKind::FunFacts => &self.fun_facts,
        };
        answer.clone().ok_or_else(|| upstream_failure("text"))
    }
}

/// Image client returning a tiny PNG per panel, with optional per-panel
/// delays and one failing panel (1-based).
pub struct MockImages {
    fail_panel: Option<usize>,
    delays: [Duration; 4],
    prompts: Mutex<Vec<String>>,
}

impl MockImages {
    pub fn new() -> Self {
        Self {
            fail_panel: None,
            delays: [Duration::ZERO; 4],
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_panel(panel: usize) -> Self {
        Self {
            fail_panel: Some(panel),
            ..Self::new()
        }
    }

    pub fn with_delays_ms(mut self, delays: [u64; 4]) -> Self {
        self.delays = delays.map(Duration::from_millis);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// The prompt sent for `panel` (1-based).
    pub fn prompt_for(&self, panel: usize) -> Option<String> {
        self.prompts()
            .into_iter()
            .find(|p| panel_number(p) == panel)
    }
}

/// Reads the panel number out of a panel prompt.
pub fn panel_number(prompt: &str) -> usize {
    (1..=4)
        .find(|n| prompt.contains(&format!("image {n} of 4")))
        .unwrap_or(0)
}

#[async_trait]
impl ImageSynthesis for MockImages {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, UpstreamError> {
        let panel = panel_number(prompt);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(delay) = panel.checked_sub(1).and_then(|i| self.delays.get(i)) {
            sleep(*delay).await;
        }
        if self.fail_panel == Some(panel) {
            return Err(upstream_failure("image"));
        }

        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.push(panel as u8);
        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub key: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Object store that records uploads and can reject one panel (1-based).
#[derive(Default)]
pub struct RecordingObjects {
    fail_panel: Option<usize>,
    uploads: Mutex<Vec<Upload>>,
}

impl RecordingObjects {
    pub fn failing_panel(panel: usize) -> Self {
        Self {
            fail_panel: Some(panel),
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingObjects {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if let Some(panel) = self.fail_panel {
            if key.contains(&format!("_image_{panel}.")) {
                return Err(StorageError::Rejected(503));
            }
        }
        self.uploads.lock().unwrap().push(Upload {
            key: key.to_string(),
            content_type: content_type.to_string(),
            data,
        });
        Ok(format!("{CDN}/{key}"))
    }
}

/// Job store whose terminal content write always fails. With `creates` set,
/// placeholder creation fails too.
pub struct FailingWrites {
    pub store: InMemoryStore,
    pub creates: bool,
}

#[async_trait]
impl JobStore for FailingWrites {
    async fn create_placeholder(&self, new: &NewStory) -> Result<Uuid, PersistenceError> {
        if self.creates {
            return Err(PersistenceError::Unavailable("connection refused".to_string()));
        }
        self.store.create_placeholder(new).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>, PersistenceError> {
        self.store.get(id).await
    }

    async fn update_content(
        &self,
        _: Uuid,
        _: &StoryContent,
        _: StoryStatus,
    ) -> Result<bool, PersistenceError> {
        Err(PersistenceError::Unavailable("connection reset".to_string()))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: StoryStatus,
    ) -> Result<TransitionOutcome, PersistenceError> {
        self.store.update_status(id, status).await
    }

    async fn list_for_owner(
        &self,
        owner: &str,
        limit: i64,
    ) -> Result<Vec<Story>, PersistenceError> {
        self.store.list_for_owner(owner, limit).await
    }

    async fn count_new_for_owner(&self, owner: &str) -> Result<i64, PersistenceError> {
        self.store.count_new_for_owner(owner).await
    }
}

/// Persona store that is always down.
pub struct FailingPersonas;

#[async_trait]
impl PersonaStore for FailingPersonas {
    async fn get_active_persona(&self, _: &str) -> Result<Option<Persona>, PersistenceError> {
        Err(PersistenceError::Unavailable("persona table locked".to_string()))
    }
}

pub fn benny() -> Persona {
    Persona {
        name: "Benny".to_string(),
        personality_description: "brave mouse".to_string(),
        visual_description: Some("grey fur, red scarf".to_string()),
    }
}

/// A story service wired to mocks, plus handles to inspect them.
pub struct Harness {
    pub store: InMemoryStore,
    pub text: Arc<MockText>,
    pub images: Arc<MockImages>,
    pub objects: Arc<RecordingObjects>,
    pub clock: Arc<ManualClock>,
    pub pipeline: Arc<StoryPipeline>,
    pub service: Arc<StoryService>,
}

pub struct HarnessBuilder {
    text: MockText,
    images: MockImages,
    objects: RecordingObjects,
    settings: PipelineSettings,
    uploads_disabled: bool,
    failing_writes: bool,
    failing_creates: bool,
    failing_personas: bool,
}

impl HarnessBuilder {
    pub fn new(text: MockText) -> Self {
        Self {
            text,
            images: MockImages::new(),
            objects: RecordingObjects::default(),
            settings: PipelineSettings::default(),
            uploads_disabled: false,
            failing_writes: false,
            failing_creates: false,
            failing_personas: false,
        }
    }

    pub fn images(mut self, images: MockImages) -> Self {
        self.images = images;
        self
    }

    pub fn objects(mut self, objects: RecordingObjects) -> Self {
        self.objects = objects;
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn uploads_disabled(mut self) -> Self {
        self.uploads_disabled = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.failing_writes = true;
        self
    }

    pub fn failing_creates(mut self) -> Self {
        self.failing_writes = true;
        self.failing_creates = true;
        self
    }

    pub fn failing_personas(mut self) -> Self {
        self.failing_personas = true;
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = InMemoryStore::with_clock(clock.clone());
        let text = Arc::new(self.text);
        let images = Arc::new(self.images);
        let objects = Arc::new(self.objects);

        let jobs: Arc<dyn JobStore> = if self.failing_writes {
            Arc::new(FailingWrites {
                store: store.clone(),
                creates: self.failing_creates,
            })
        } else {
            Arc::new(store.clone())
        };
        let personas: Arc<dyn PersonaStore> = if self.failing_personas {
            Arc::new(FailingPersonas)
        } else {
            Arc::new(store.clone())
        };
        let object_store: Arc<dyn ObjectStore> = if self.uploads_disabled {
            Arc::new(DisabledObjectStore)
        } else {
            objects.clone()
        };

        let pipeline = Arc::new(StoryPipeline::new(
            Collaborators {
                text: text.clone(),
                images: images.clone(),
                objects: object_store,
                jobs: jobs.clone(),
                personas,
            },
            self.settings,
        ));
        let service = Arc::new(StoryService::new(
            jobs,
            Arc::new(DuplicateGuard::default()),
            clock.clone(),
            pipeline.clone(),
        ));

        Harness {
            store,
            text,
            images,
            objects,
            clock,
            pipeline,
            service,
        }
    }
}

pub fn harness(text: MockText) -> Harness {
    HarnessBuilder::new(text).build()
}

/// Serves the harness over HTTP on an ephemeral port and returns its base URL.
pub async fn serve(harness: &Harness) -> String {
    let state = AppState {
        stories: harness.service.clone(),
        fun_facts: Arc::new(FunFactsService::new(harness.text.clone())),
        db: None,
        auth: Arc::new(OwnerResolver::new(Some(JWT_SECRET))),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, routes::router(state, None))
            .await
            .expect("Test server error");
    });

    format!("http://{addr}")
}

/// Signs a bearer token for `user_id` with [`JWT_SECRET`].
pub fn bearer_token(user_id: i64) -> String {
    let claims = serde_json::json!({
        "user_id": user_id,
        "exp": Utc::now().timestamp() + 3600,
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}

/// Poll the status endpoint until the story leaves IN_PROGRESS.
pub async fn poll_story_status(
    client: &reqwest::Client,
    base_url: &str,
    story_id: Uuid,
    timeout_secs: u64,
) -> Result<StoryStatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 4; // Poll every 250ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/story/{}/status", base_url, story_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status = response.json::<StoryStatusResponse>().await?;
        if status.status != StoryStatus::InProgress {
            return Ok(status);
        }
        if attempt % 20 == 0 && attempt > 0 {
            println!("  ... still generating (attempt {}/{})", attempt, max_attempts);
        }
        sleep(Duration::from_millis(250)).await;
    }

    Err(format!("Story did not finish within {} seconds", timeout_secs).into())
}
