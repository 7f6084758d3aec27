//! In-memory tracker and chat doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use trakbot::bot::Bot;
use trakbot::channel::{Channel, IncomingMessage, Outbound};
use trakbot::commands::build_table;
use trakbot::config::BotConfig;
use trakbot::dispatch::CommandTable;
use trakbot::tracker::{
    Note, Project, Story, StoryAttrs, StoryFilter, StoryState, StoryType, Tracker,
    TrackerError, TrackerFactory,
};

/// Everything the fake tracker knows, shared by every handle.
#[derive(Default)]
pub struct World {
    pub projects: HashMap<u64, Project>,
    pub stories: Vec<Story>,
    pub notes: Vec<Note>,
    /// (project id, token) for every handle built.
    pub connects: Vec<(u64, String)>,
    next_id: u64,
}

impl World {
    pub fn add_project(&mut self, id: u64, name: &str) {
        self.projects.insert(
            id,
            Project {
                id,
                name: name.into(),
                iteration_length: Some(1),
                week_start_day: Some("Monday".into()),
            },
        );
    }

    pub fn add_story(&mut self, project_id: u64, id: u64, name: &str, state: StoryState) {
        self.stories.push(story(project_id, id, name, StoryType::Feature, state));
    }
}

pub fn story(project_id: u64, id: u64, name: &str, story_type: StoryType, state: StoryState) -> Story {
    Story {
        id,
        project_id,
        name: name.into(),
        description: None,
        story_type,
        current_state: state,
        estimate: None,
        labels: vec![],
        url: None,
    }
}

pub type SharedWorld = Arc<Mutex<World>>;

pub struct FakeTracker {
    project_id: u64,
    world: SharedWorld,
}

impl FakeTracker {
    fn ensure_project(&self, world: &World) -> Result<(), TrackerError> {
        if world.projects.contains_key(&self.project_id) {
            Ok(())
        } else {
            Err(TrackerError::NotFound(format!("project {}", self.project_id)))
        }
    }
}

#[async_trait]
impl Tracker for FakeTracker {
    fn project_id(&self) -> u64 {
        self.project_id
    }

    async fn fetch_project(&self) -> Result<Project, TrackerError> {
        let world = self.world.lock().unwrap();
        world
            .projects
            .get(&self.project_id)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(format!("project {}", self.project_id)))
    }

    async fn list_stories(&self, filter: &StoryFilter) -> Result<Vec<Story>, TrackerError> {
        let world = self.world.lock().unwrap();
        self.ensure_project(&world)?;
        let text = filter.text.as_deref().map(str::to_lowercase);
        Ok(world
            .stories
            .iter()
            .filter(|s| s.project_id == self.project_id)
            .filter(|s| filter.state.is_none_or(|state| s.current_state == state))
            .filter(|s| {
                text.as_deref()
                    .is_none_or(|t| s.name.to_lowercase().contains(t))
            })
            .cloned()
            .collect())
    }

    async fn find_story(&self, story_id: u64) -> Result<Story, TrackerError> {
        let world = self.world.lock().unwrap();
        world
            .stories
            .iter()
            .find(|s| s.project_id == self.project_id && s.id == story_id)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(format!("story {story_id}")))
    }

    async fn create_story(&self, attrs: &StoryAttrs) -> Result<Story, TrackerError> {
        let mut world = self.world.lock().unwrap();
        self.ensure_project(&world)?;
        world.next_id += 1;
        let mut created = story(
            self.project_id,
            9000 + world.next_id,
            attrs.name.as_deref().unwrap_or_default(),
            attrs.story_type.unwrap_or(StoryType::Feature),
            StoryState::Unscheduled,
        );
        created.url = Some(format!("https://tracker.test/story/show/{}", created.id));
        world.stories.push(created.clone());
        Ok(created)
    }

    async fn update_story(&self, story_id: u64, attrs: &StoryAttrs) -> Result<Story, TrackerError> {
        let mut world = self.world.lock().unwrap();
        let project_id = self.project_id;
        let story = world
            .stories
            .iter_mut()
            .find(|s| s.project_id == project_id && s.id == story_id)
            .ok_or_else(|| TrackerError::NotFound(format!("story {story_id}")))?;
        if let Some(name) = &attrs.name {
            story.name = name.clone();
        }
        if let Some(description) = &attrs.description {
            story.description = Some(description.clone());
        }
        if let Some(story_type) = attrs.story_type {
            story.story_type = story_type;
        }
        if let Some(state) = attrs.current_state {
            story.current_state = state;
        }
        if let Some(estimate) = attrs.estimate {
            story.estimate = Some(estimate);
        }
        if let Some(labels) = &attrs.labels {
            story.labels = labels.clone();
        }
        Ok(story.clone())
    }

    async fn create_note(&self, story_id: u64, text: &str) -> Result<Note, TrackerError> {
        let mut world = self.world.lock().unwrap();
        world.next_id += 1;
        let note = Note {
            id: world.next_id,
            story_id,
            text: text.into(),
        };
        world.notes.push(note.clone());
        Ok(note)
    }

    async fn deliver_finished_stories(&self) -> Result<Vec<Story>, TrackerError> {
        let mut world = self.world.lock().unwrap();
        self.ensure_project(&world)?;
        let project_id = self.project_id;
        let mut delivered = Vec::new();
        for story in world
            .stories
            .iter_mut()
            .filter(|s| s.project_id == project_id && s.current_state == StoryState::Finished)
        {
            story.current_state = StoryState::Delivered;
            delivered.push(story.clone());
        }
        Ok(delivered)
    }
}

pub struct FakeFactory {
    pub world: SharedWorld,
}

impl TrackerFactory for FakeFactory {
    fn connect(&self, project_id: u64, token: &str) -> Arc<dyn Tracker> {
        self.world
            .lock()
            .unwrap()
            .connects
            .push((project_id, token.to_owned()));
        Arc::new(FakeTracker {
            project_id,
            world: self.world.clone(),
        })
    }
}

/// Records everything sent. `run` delivers `script` and then returns.
#[derive(Default)]
pub struct RecordingChannel {
    pub script: Vec<IncomingMessage>,
    pub sent: Mutex<Vec<Outbound>>,
}

impl RecordingChannel {
    pub fn scripted(script: Vec<IncomingMessage>) -> Self {
        Self {
            script,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn take_sent(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(&self, tx: Sender<IncomingMessage>, cancel: CancellationToken) {
        for message in self.script.clone() {
            if cancel.is_cancelled() || tx.send(message).await.is_err() {
                return;
            }
        }
    }

    async fn send(&self, out: &Outbound) -> color_eyre::Result<()> {
        self.sent.lock().unwrap().push(out.clone());
        Ok(())
    }
}

/// A bot wired to the fake tracker and a recording channel.
pub struct Harness {
    pub bot: Bot,
    pub table: CommandTable,
    pub channel: RecordingChannel,
    pub world: SharedWorld,
}

impl Harness {
    pub fn new(storage: &Path) -> Self {
        Self::with_config(BotConfig {
            storage_dir: storage.to_path_buf(),
            ..BotConfig::default()
        })
    }

    pub fn with_config(config: BotConfig) -> Self {
        let world = SharedWorld::default();
        let table = build_table(&config.nick).unwrap();
        let bot = Bot::new(
            config,
            Arc::new(FakeFactory {
                world: world.clone(),
            }),
        );
        Self {
            bot,
            table,
            channel: RecordingChannel::default(),
            world,
        }
    }

    /// Dispatch `text` from `from` in `channel` and return what was sent.
    pub async fn say(&mut self, from: &str, channel: &str, text: &str) -> Vec<Outbound> {
        let message = IncomingMessage::new(from, channel, text);
        self.table
            .dispatch(&mut self.bot, &self.channel, &message)
            .await;
        self.channel.take_sent()
    }

    /// Texts of the messages and actions sent.
    pub async fn say_texts(&mut self, from: &str, channel: &str, text: &str) -> Vec<String> {
        self.say(from, channel, text)
            .await
            .into_iter()
            .filter_map(|out| match out {
                Outbound::Message { text, .. } | Outbound::Action { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}
