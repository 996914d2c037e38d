use handlebars::{no_escape, Handlebars};
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::warn;

use super::RenderSink;
use crate::config::Position;
use crate::errors::{AppError, AppResult};
use crate::notification::Notification;

const TEMPLATE_NAME: &str = "notification";

/// Default layout: the type as a bracketed header, then the message
pub const DEFAULT_TEMPLATE: &str = "{{#if type}}[{{type}}] {{/if}}{{message}}";

/// Manual renderer writing each notification as a line of text
///
/// The position hint maps to horizontal alignment inside `width` columns;
/// bottom positions are treated like their top counterparts.
pub struct TerminalSink {
    handlebars: Handlebars<'static>,
    position: Position,
    width: usize,
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalSink {
    pub fn new(template: Option<&str>, position: Position, width: usize) -> AppResult<Self> {
        Self::with_writer(template, position, width, Box::new(io::stdout()))
    }

    pub fn with_writer(
        template: Option<&str>,
        position: Position,
        width: usize,
        out: Box<dyn Write + Send>,
    ) -> AppResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(no_escape);
        handlebars
            .register_template_string(TEMPLATE_NAME, template.unwrap_or(DEFAULT_TEMPLATE))
            .map_err(|e| AppError::render_with_source("Invalid terminal template", e))?;

        Ok(Self {
            handlebars,
            position,
            width,
            out: Mutex::new(out),
        })
    }

    /// Render the template for one notification without alignment
    pub fn format(&self, notification: &Notification) -> AppResult<String> {
        self.handlebars
            .render(TEMPLATE_NAME, notification)
            .map_err(|e| AppError::render_with_source("Failed to render notification", e))
    }

    fn align(&self, line: &str) -> String {
        let len = line.chars().count();
        if len >= self.width {
            return line.to_string();
        }
        let pad = self.width - len;
        match self.position {
            Position::TopLeft | Position::BottomLeft => line.to_string(),
            Position::Top | Position::Bottom => format!("{}{}", " ".repeat(pad / 2), line),
            Position::TopRight | Position::BottomRight => format!("{}{}", " ".repeat(pad), line),
        }
    }
}

impl RenderSink for TerminalSink {
    fn render(&self, notification: &Notification) {
        let text = match self.format(notification) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to render notification {}: {}", notification.id, e);
                return;
            }
        };

        let Ok(mut out) = self.out.lock() else {
            return;
        };
        for line in text.lines() {
            if let Err(e) = writeln!(out, "{}", self.align(line)) {
                warn!("Failed to write notification {}: {}", notification.id, e);
                return;
            }
        }
        let _ = out.flush();
    }
}
