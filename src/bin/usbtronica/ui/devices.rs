//! Controller list widget

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use usbtronica::{control::DeviceId, ControllerRegistry};

/// What the UI shows for one registered controller
pub struct ControllerSummary {
    pub kind: &'static str,
    pub devices: Vec<DeviceId>,
    pub can_scan: bool,
}

pub fn summarize(registry: &mut ControllerRegistry) -> Vec<ControllerSummary> {
    let mut summaries = Vec::with_capacity(registry.len());
    registry.for_each_mut(|kind, controller| {
        summaries.push(ControllerSummary {
            kind,
            devices: controller.devices().to_vec(),
            can_scan: controller.scanner().is_some(),
        });
    });
    summaries
}

pub fn render_devices(frame: &mut Frame, area: Rect, controllers: &[ControllerSummary]) {
    let block = Block::default().title(" Controllers ").borders(Borders::ALL);

    let lines: Vec<Line> = controllers
        .iter()
        .map(|c| {
            let (status, color) = if c.devices.is_empty() {
                ("waiting".to_string(), Color::Yellow)
            } else {
                let ids: Vec<String> = c.devices.iter().map(|d| d.to_string()).collect();
                (ids.join(" "), Color::Green)
            };
            let mut spans = vec![
                Span::styled(format!(" {:<16}", c.kind), Style::default().fg(Color::White)),
                Span::styled(status, Style::default().fg(color)),
            ];
            if c.can_scan {
                spans.push(Span::styled("  [F5 scan]", Style::default().fg(Color::DarkGray)));
            }
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
