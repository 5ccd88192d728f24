use crate::loader::LoadOutcome;
use crate::{Topic, TopicCollection, normalize_query};
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    #[default]
    Collapsed,
    Expanded,
}

impl BlockState {
    pub fn flipped(self) -> Self {
        match self {
            BlockState::Collapsed => BlockState::Expanded,
            BlockState::Expanded => BlockState::Collapsed,
        }
    }

    /// Label of the header's toggle affordance for this state.
    pub fn toggle_label(self) -> &'static str {
        match self {
            BlockState::Collapsed => "Open",
            BlockState::Expanded => "Close",
        }
    }

    pub fn is_expanded(self) -> bool {
        self == BlockState::Expanded
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct BlockView {
    pub state: BlockState,
    pub visible: bool,
}

impl Default for BlockView {
    fn default() -> Self {
        Self {
            state: BlockState::Collapsed,
            visible: true,
        }
    }
}

/// Per-block view state plus the active search query, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    query: String,
    blocks: Vec<BlockView>,
}

impl ViewState {
    fn for_len(len: usize) -> Self {
        Self {
            query: String::new(),
            blocks: vec![BlockView::default(); len],
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn blocks(&self) -> &[BlockView] {
        &self.blocks
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Toggle(String),
    Focus(String),
    Filter(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ScrollAlign {
    Nearest,
    Center,
}

/// Side effect a host should perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    ScrollIntoView { anchor: String, align: ScrollAlign },
    Rerender,
}

impl Effect {
    /// Effect of toggling `id` into `next`: scroll only when the block opens.
    pub fn of_toggle(id: &str, next: BlockState) -> Self {
        if next.is_expanded() {
            Effect::ScrollIntoView {
                anchor: anchor(id),
                align: ScrollAlign::Nearest,
            }
        } else {
            Effect::None
        }
    }

    pub fn of_focus(id: &str) -> Self {
        Effect::ScrollIntoView {
            anchor: anchor(id),
            align: ScrollAlign::Center,
        }
    }

    /// Anchor to scroll to, if any.
    pub fn scroll_target(&self) -> Option<&str> {
        match self {
            Effect::ScrollIntoView { anchor, .. } => Some(anchor),
            Effect::None | Effect::Rerender => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTopic(pub String);

impl fmt::Display for UnknownTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no topic with id {:?}", self.0)
    }
}

impl std::error::Error for UnknownTopic {}

/// Where the catalog's topics came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Parsed from the configured source, local or remote.
    Loaded,
    Fallback,
    /// Nothing could be loaded; the page shows this notice instead of topics.
    Unavailable { notice: String },
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Loaded => "loaded",
            Provenance::Fallback => "fallback",
            Provenance::Unavailable { .. } => "unavailable",
        }
    }
}

pub const UNAVAILABLE_NOTICE: &str = "Could not load topics. Make sure data/topics.json exists.";

/// Owns the loaded topics and the state of every rendered block.
#[derive(Debug, Clone)]
pub struct Catalog {
    collection: TopicCollection,
    view: ViewState,
    provenance: Provenance,
}

impl Catalog {
    pub fn new(collection: TopicCollection) -> Self {
        Self::with_provenance(collection, Provenance::Loaded)
    }

    fn with_provenance(collection: TopicCollection, provenance: Provenance) -> Self {
        let view = ViewState::for_len(collection.len());
        Self {
            collection,
            view,
            provenance,
        }
    }

    pub fn from_outcome(outcome: LoadOutcome) -> Self {
        match outcome {
            LoadOutcome::Loaded(collection) => Self::new(collection),
            LoadOutcome::Fallback { collection, .. } => {
                Self::with_provenance(collection, Provenance::Fallback)
            }
            LoadOutcome::Unavailable(_) => Self::unavailable(UNAVAILABLE_NOTICE),
        }
    }

    pub fn unavailable(notice: impl Into<String>) -> Self {
        Self::with_provenance(
            TopicCollection::default(),
            Provenance::Unavailable {
                notice: notice.into(),
            },
        )
    }

    pub fn collection(&self) -> &TopicCollection {
        &self.collection
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn query(&self) -> &str {
        &self.view.query
    }

    pub fn dispatch(&mut self, event: Event) -> Result<Effect, UnknownTopic> {
        match event {
            Event::Toggle(id) => self.toggle(&id),
            Event::Focus(id) => self.focus(&id),
            Event::Filter(query) => Ok(self.filter(&query)),
        }
    }

    /// Flips one block between collapsed and expanded.
    pub fn toggle(&mut self, id: &str) -> Result<Effect, UnknownTopic> {
        let position = self.position(id)?;
        let block = &mut self.view.blocks[position];
        block.state = block.state.flipped();
        debug!(topic = id, state = ?block.state, "Toggled topic block");
        Ok(Effect::of_toggle(id, block.state))
    }

    /// Expands `id` and collapses every other block.
    pub fn focus(&mut self, id: &str) -> Result<Effect, UnknownTopic> {
        let position = self.position(id)?;
        for (index, block) in self.view.blocks.iter_mut().enumerate() {
            block.state = if index == position {
                BlockState::Expanded
            } else {
                BlockState::Collapsed
            };
        }
        debug!(topic = id, "Focused topic block");
        Ok(Effect::of_focus(id))
    }

    /// Hides every block whose topic does not match `query`.
    pub fn filter(&mut self, query: &str) -> Effect {
        let needle = normalize_query(query);
        let topics = self.collection.topics().iter();
        for (topic, block) in topics.zip(self.view.blocks.iter_mut()) {
            block.visible = topic.matches(&needle);
        }
        self.view.query = query.trim().to_string();
        Effect::Rerender
    }

    /// Expands `id` without touching other blocks.
    pub fn expand(&mut self, id: &str) -> Result<(), UnknownTopic> {
        let position = self.position(id)?;
        self.view.blocks[position].state = BlockState::Expanded;
        Ok(())
    }

    pub fn state_of(&self, id: &str) -> Option<BlockState> {
        self.collection
            .position(id)
            .map(|position| self.view.blocks[position].state)
    }

    pub fn is_visible(&self, id: &str) -> Option<bool> {
        self.collection
            .position(id)
            .map(|position| self.view.blocks[position].visible)
    }

    /// Topics paired with their block view, in collection order.
    pub fn blocks(&self) -> impl Iterator<Item = (&Topic, BlockView)> + '_ {
        self.collection
            .topics()
            .iter()
            .zip(self.view.blocks.iter().copied())
    }

    /// Topics matching the current query.
    pub fn visible_topics(&self) -> impl Iterator<Item = &Topic> + '_ {
        self.blocks()
            .filter(|(_, view)| view.visible)
            .map(|(topic, _)| topic)
    }

    pub fn expanded_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.blocks()
            .filter(|(_, view)| view.state.is_expanded())
            .map(|(topic, _)| topic.id.as_str())
    }

    fn position(&self, id: &str) -> Result<usize, UnknownTopic> {
        self.collection
            .position(id)
            .ok_or_else(|| UnknownTopic(id.to_string()))
    }
}

/// DOM id of the block rendered for topic `id`.
pub fn anchor(id: &str) -> String {
    format!("topic-{id}")
}
