//! Scrolling event log widget

use std::collections::VecDeque;

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Lines kept for display
const LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Event,
    Error,
}

/// Bounded list of log lines, newest last
#[derive(Default)]
pub struct EventLog {
    lines: VecDeque<(LogLevel, String)>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, line: impl Into<String>) {
        self.push(LogLevel::Info, line.into());
    }

    pub fn event(&mut self, line: impl Into<String>) {
        self.push(LogLevel::Event, line.into());
    }

    pub fn error(&mut self, line: impl Into<String>) {
        self.push(LogLevel::Error, line.into());
    }

    fn push(&mut self, level: LogLevel, line: String) {
        if self.lines.len() == LOG_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back((level, line));
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Render the most recent lines that fit in `area`
pub fn render_log(frame: &mut Frame, area: Rect, log: &EventLog) {
    let block = Block::default().title(" Events ").borders(Borders::ALL);
    let visible = block.inner(area).height as usize;

    let items: Vec<ListItem> = log
        .lines
        .iter()
        .skip(log.len().saturating_sub(visible))
        .map(|(level, text)| {
            let color = match level {
                LogLevel::Info => Color::Gray,
                LogLevel::Event => Color::Cyan,
                LogLevel::Error => Color::Red,
            };
            ListItem::new(Line::styled(text.as_str(), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}
