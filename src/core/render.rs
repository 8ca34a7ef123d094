//! Rendering of model text before it reaches the client.
//!
//! [`HtmlRenderer`] turns markdown into an HTML fragment: single newlines
//! become `<br />`, raw HTML in the model output is escaped, and event handler
//! attributes and `javascript:` links are stripped from the generated tags.

use pulldown_cmark::{Event, Options, Parser, html};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

static EVENT_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("valid event attribute pattern")
});

static SCRIPT_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*("\s*javascript:[^"]*"|'\s*javascript:[^']*')"#)
        .expect("valid script href pattern")
});

/// Output kind of a renderer, which decides the client envelope key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    /// Sent as `{"json": ...}`
    Html,
    /// Sent as `{"text": ...}`
    Plain,
}

pub trait MarkupRenderer: Send + Sync {
    fn render(&self, text: &str) -> String;

    fn format(&self) -> RenderFormat;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
    }
}

impl MarkupRenderer for HtmlRenderer {
    fn render(&self, text: &str) -> String {
        let events = Parser::new_ext(text, Self::options()).map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, events);
        sanitize(&out)
    }

    fn format(&self) -> RenderFormat {
        RenderFormat::Html
    }
}

/// Passes text through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl MarkupRenderer for PlainRenderer {
    fn render(&self, text: &str) -> String {
        text.to_string()
    }

    fn format(&self) -> RenderFormat {
        RenderFormat::Plain
    }
}

/// Strip event handlers and script links from every tag in `html`.
pub fn sanitize(html: &str) -> String {
    TAG.replace_all(html, |caps: &Captures<'_>| {
        let tag = EVENT_ATTRIBUTE.replace_all(&caps[0], "");
        SCRIPT_HREF.replace_all(&tag, r##"href="#""##).into_owned()
    })
    .into_owned()
}
