//! HTML projection of a [`Catalog`].
//!
//! Templates rely on askama's HTML escaping for every user-supplied field.
//! Link URLs are percent-encoded with [`encode_href`] before that.

use crate::controller::{BlockState, BlockView, Catalog, Effect, Provenance, anchor};
use crate::Topic;
use askama::Template;
use percent_encoding::{AsciiSet, CONTROLS, NON_ALPHANUMERIC, utf8_percent_encode};
use std::borrow::Cow;

/// Characters of a description shown on a summary button before truncation.
pub const SUMMARY_CHARS: usize = 60;
const ELLIPSIS: char = '…';
const EMPTY_LINKS_PLACEHOLDER: &str = "No links yet.";

const URL_ATTR: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'`');
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encodes quotes, angle brackets, backtick, space and controls in a
/// link URL. The template escapes the result once more for the attribute.
pub fn encode_href(url: &str) -> String {
    utf8_percent_encode(url, URL_ATTR).to_string()
}

/// Cuts `text` to `limit` characters and appends `…` when anything was cut.
pub fn truncate_summary(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => Cow::Owned(format!("{}{ELLIPSIS}", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

/// How rendered affordances address controller events.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum LinkMode {
    /// Plain in-page anchors; used for static snapshots.
    #[default]
    Anchors,
    /// Links carry the current view state plus one event in the query string.
    Query,
}

/// Builds hrefs for buttons and block headers from the current view.
#[derive(Debug, Clone)]
pub struct LinkContext {
    mode: LinkMode,
    state: String,
}

impl LinkContext {
    pub fn new(catalog: &Catalog, mode: LinkMode) -> Self {
        Self {
            mode,
            state: state_query(catalog),
        }
    }

    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    /// Query string (without `?`) that restores the catalog's view.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Link for the header of a block currently in `state`.
    pub fn toggle_href(&self, id: &str, state: BlockState) -> String {
        self.event_href("toggle", id, &Effect::of_toggle(id, state.flipped()))
    }

    pub fn focus_href(&self, id: &str) -> String {
        self.event_href("focus", id, &Effect::of_focus(id))
    }

    /// The fragment comes from the effect the event will have, so only links
    /// that open a block scroll to it.
    fn event_href(&self, event: &str, id: &str, effect: &Effect) -> String {
        let fragment = effect
            .scroll_target()
            .map(|target| format!("#{}", encode_value(target)))
            .unwrap_or_default();
        match self.mode {
            LinkMode::Anchors => format!("#{}", encode_value(&anchor(id))),
            LinkMode::Query if self.state.is_empty() => {
                format!("?{event}={}{fragment}", encode_value(id))
            }
            LinkMode::Query => {
                format!("?{}&{event}={}{fragment}", self.state, encode_value(id))
            }
        }
    }
}

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

fn state_query(catalog: &Catalog) -> String {
    let mut parts = Vec::new();
    if !catalog.query().is_empty() {
        parts.push(format!("q={}", encode_value(catalog.query())));
    }
    parts.extend(
        catalog
            .expanded_ids()
            .map(|id| format!("open={}", encode_value(id))),
    );
    parts.join("&")
}

struct ButtonView {
    id: String,
    href: String,
    name: String,
    summary: String,
}

struct CardView {
    title: String,
    url_text: String,
    href: String,
}

struct BlockViewModel {
    id: String,
    name: String,
    description: String,
    toggle_href: String,
    toggle_label: &'static str,
    expanded: bool,
    visible: bool,
    cards: Vec<CardView>,
}

#[derive(Template)]
#[template(
    source = r#"{% for button in buttons %}<a class="topic-btn" role="button" href="{{ button.href }}" data-topic="{{ button.id }}"><span>{{ button.name }}</span><small class="small">{{ button.summary }}</small></a>
{% endfor %}"#,
    ext = "html"
)]
struct ButtonListTemplate {
    buttons: Vec<ButtonView>,
}

#[derive(Template)]
#[template(
    source = r#"{% for block in blocks %}<div class="topic-block" id="topic-{{ block.id }}"{% if !block.visible %} hidden{% endif %}>
  <a class="topic-header" href="{{ block.toggle_href }}">
    <div class="topic-title">
      <h3>{{ block.name }}</h3>
      <div class="topic-desc">{{ block.description }}</div>
    </div>
    <div class="topic-actions"><span class="toggle-btn">{{ block.toggle_label }}</span></div>
  </a>
  <div class="course-list{% if block.expanded %} open{% endif %}">
    {% if block.cards.is_empty() %}<p class="muted">{{ placeholder }}</p>
    {% else %}{% for card in block.cards %}<div class="course-card">
      <div class="course-meta">
        <h4>{{ card.title }}</h4>
        <p>{{ card.url_text }}</p>
      </div>
      <div class="course-cta"><a href="{{ card.href }}" target="_blank" rel="noopener noreferrer">Open</a></div>
    </div>
    {% endfor %}{% endif %}
  </div>
</div>
{% endfor %}"#,
    ext = "html"
)]
struct BlockListTemplate {
    blocks: Vec<BlockViewModel>,
    placeholder: &'static str,
}

#[derive(Template)]
#[template(
    source = r#"<p class="muted">{{ message }}</p>"#,
    ext = "html"
)]
struct NoticeTemplate {
    message: String,
}

/// Contents of the two host containers: `#topic-list` and `#topics-container`.
///
/// Every render call replaces the container it targets, so rendering the same
/// input twice leaves the shell unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageShell {
    topic_list: String,
    topics_container: String,
}

impl PageShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders the shell for the catalog's current view.
    pub fn for_catalog(
        catalog: &Catalog,
        links: &LinkContext,
    ) -> Result<Self, askama::Error> {
        let mut shell = Self::new();
        match catalog.provenance() {
            Provenance::Unavailable { notice } => shell.show_notice(notice)?,
            Provenance::Loaded | Provenance::Fallback => {
                shell.render_buttons(catalog.visible_topics(), links)?;
                shell.render_blocks(catalog.blocks(), links)?;
            }
        }
        Ok(shell)
    }

    pub fn topic_list(&self) -> &str {
        &self.topic_list
    }

    pub fn topics_container(&self) -> &str {
        &self.topics_container
    }

    /// One summary button per topic.
    pub fn render_buttons<'a, I>(
        &mut self,
        topics: I,
        links: &LinkContext,
    ) -> Result<(), askama::Error>
    where
        I: IntoIterator<Item = &'a Topic>,
    {
        let buttons = topics
            .into_iter()
            .map(|topic| ButtonView {
                id: topic.id.clone(),
                href: links.focus_href(&topic.id),
                name: topic.name.clone(),
                summary: truncate_summary(&topic.description, SUMMARY_CHARS).into_owned(),
            })
            .collect();
        self.topic_list = ButtonListTemplate { buttons }.render()?;
        Ok(())
    }

    /// One collapsible block per topic; filtered-out blocks are kept but hidden.
    pub fn render_blocks<'a, I>(
        &mut self,
        blocks: I,
        links: &LinkContext,
    ) -> Result<(), askama::Error>
    where
        I: IntoIterator<Item = (&'a Topic, BlockView)>,
    {
        let blocks = blocks
            .into_iter()
            .map(|(topic, view)| BlockViewModel {
                id: topic.id.clone(),
                name: topic.name.clone(),
                description: topic.description.clone(),
                toggle_href: links.toggle_href(&topic.id, view.state),
                toggle_label: view.state.toggle_label(),
                expanded: view.state.is_expanded(),
                visible: view.visible,
                cards: topic
                    .links
                    .iter()
                    .map(|link| CardView {
                        title: link.title.clone(),
                        url_text: link.url.clone(),
                        href: encode_href(&link.url),
                    })
                    .collect(),
            })
            .collect();
        self.topics_container = BlockListTemplate {
            blocks,
            placeholder: EMPTY_LINKS_PLACEHOLDER,
        }
        .render()?;
        Ok(())
    }

    /// Replaces the button list with `message` and clears the blocks.
    pub fn show_notice(&mut self, message: &str) -> Result<(), askama::Error> {
        self.topic_list = NoticeTemplate {
            message: message.to_string(),
        }
        .render()?;
        self.topics_container.clear();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub title: String,
    pub link_mode: LinkMode,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            title: "Topic Catalog".to_string(),
            link_mode: LinkMode::default(),
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{ title }}</title>
    <style>
      body { font-family: system-ui, sans-serif; margin: 0; background: #0b0f1a; color: #e6e9f2; }
      main { max-width: 960px; margin: 0 auto; padding: 2rem 1rem; }
      .muted, .small { color: #8a93a8; }
      #topic-list { display: flex; flex-wrap: wrap; gap: .5rem; margin: 1rem 0 2rem; }
      .topic-btn { display: flex; flex-direction: column; padding: .6rem .9rem; border-radius: 8px; background: #151b2b; color: inherit; text-decoration: none; }
      .topic-block { margin-bottom: 1rem; border-radius: 10px; background: #111727; animation: fade-in .3s ease-in; }
      .topic-header { display: flex; justify-content: space-between; align-items: center; padding: 1rem; color: inherit; text-decoration: none; }
      .course-list { display: none; padding: 0 1rem 1rem; gap: .5rem; }
      .course-list.open { display: grid; }
      .course-card { display: flex; justify-content: space-between; padding: .75rem; border-radius: 8px; background: #1a2236; }
      .course-cta a, .toggle-btn { color: #00eaff; }
      @keyframes fade-in { from { opacity: 0; } to { opacity: 1; } }
    </style>
  </head>
  <body>
    <main>
      <h1>{{ title }}</h1>
      {% if searchable %}<form method="get" role="search">
        <input id="topic-search" type="search" name="q" value="{{ query }}" placeholder="Search topics" />
        {% for id in open %}<input type="hidden" name="open" value="{{ id }}" />
        {% endfor %}
      </form>{% endif %}
      <nav id="topic-list">{{ topic_list|safe }}</nav>
      <section id="topics-container">{{ topics_container|safe }}</section>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct PageTemplate {
    title: String,
    searchable: bool,
    query: String,
    open: Vec<String>,
    topic_list: String,
    topics_container: String,
}

/// Renders the full page for the catalog's current view.
pub fn render_document(
    catalog: &Catalog,
    options: &PageOptions,
) -> Result<String, askama::Error> {
    let links = LinkContext::new(catalog, options.link_mode);
    let shell = PageShell::for_catalog(catalog, &links)?;
    PageTemplate {
        title: options.title.clone(),
        searchable: options.link_mode == LinkMode::Query,
        query: catalog.query().to_string(),
        open: catalog.expanded_ids().map(str::to_string).collect(),
        topic_list: shell.topic_list,
        topics_container: shell.topics_container,
    }
    .render()
}
