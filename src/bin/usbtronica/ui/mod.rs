//! TUI module for usbtronica
//!
//! Drives the event loop: terminal input, controller polling, recording,
//! and drawing.

mod devices;
mod keys;
pub mod log;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    DefaultTerminal, Frame,
};
use tracing::info;
use usbtronica::{
    io::{output::AudioOutput, recorder::Recorder},
    synth::PlaybackSink,
    ControllerRegistry,
};

use crate::{
    app::{SharedEngine, SharedLog},
    input::KeyForwarder,
};

use devices::{render_devices, summarize};
use keys::render_keys;
use self::log::render_log;

/// UI application state
pub struct UiApp {
    registry: ControllerRegistry,
    engine: SharedEngine,
    log: SharedLog,
    keys: KeyForwarder,
    /// In-progress take from the input device
    recorder: Option<Recorder>,
    output: AudioOutput,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        registry: ControllerRegistry,
        engine: SharedEngine,
        log: SharedLog,
        keys: KeyForwarder,
        output: AudioOutput,
    ) -> Self {
        Self {
            registry,
            engine,
            log,
            keys,
            recorder: None,
            output,
            should_quit: false,
        }
    }

    /// Run the event loop until quit
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            let now = Instant::now();
            self.keys.expire(now);
            self.registry.poll_all(now);
            self.output.release_returned();

            if let Some(recorder) = &mut self.recorder {
                recorder.drain();
            }

            terminal.draw(|frame| self.render(frame))?;

            // Handle keyboard input (non-blocking, ~60fps)
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let pressed = key.kind == KeyEventKind::Press;
        match key.code {
            KeyCode::Esc if pressed => self.should_quit = true,
            KeyCode::Char('c') if pressed && key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::F(5) if pressed => self.scan(),
            KeyCode::Tab if pressed => self.toggle_recording(),
            KeyCode::Enter if pressed => self.play_buffer(),
            _ => self.keys.forward(key, Instant::now()),
        }
    }

    fn scan(&mut self) {
        let added = self.registry.scan_all();
        self.log
            .borrow_mut()
            .info(format!("Scan finished, {added} new device(s)"));
    }

    fn toggle_recording(&mut self) {
        match self.recorder.take() {
            Some(recorder) => {
                let buffer = recorder.finish();
                self.log.borrow_mut().info(format!(
                    "Recorded {:.2}s, now playing from the new take",
                    buffer.duration_secs()
                ));
                self.engine.borrow_mut().set_buffer(Arc::new(buffer));
            }
            None => match Recorder::start() {
                Ok(recorder) => {
                    self.log.borrow_mut().info("Recording... press Tab to stop");
                    self.recorder = Some(recorder);
                }
                Err(err) => self.log.borrow_mut().error(format!("Cannot record: {err}")),
            },
        }
    }

    /// Play the current buffer once, unpitched
    fn play_buffer(&mut self) {
        let mut engine = self.engine.borrow_mut();
        let Some(buffer) = engine.buffer().cloned() else {
            self.log.borrow_mut().error("Nothing recorded or loaded yet");
            return;
        };
        info!("previewing buffer");
        engine.sink_mut().start(Some(buffer), 1.0);
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        // Main layout: status, controllers + keys, log, help
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Status bar
                Constraint::Length(7), // Controllers and keys
                Constraint::Min(5),    // Event log
                Constraint::Length(1), // Help bar
            ])
            .split(area);

        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        self.render_status(frame, chunks[0]);

        let controllers = summarize(&mut self.registry);
        render_devices(frame, middle[0], &controllers);

        let active_notes = self.engine.borrow().active_notes();
        render_keys(frame, middle[1], &active_notes);

        render_log(frame, chunks[2], &self.log.borrow());

        let help = Paragraph::new(
            " [Q-I / 2-7] Play  [Tab] Record  [Enter] Play sample  [F5] Scan  [Esc] Quit",
        )
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title(" usbtronica ").borders(Borders::ALL);

        let engine = self.engine.borrow();
        let sample = match engine.buffer() {
            Some(buffer) => format!(
                "Sample: {:.2}s @ {:.1}kHz  ",
                buffer.duration_secs(),
                buffer.sample_rate() / 1000.0
            ),
            None => "Sample: none  ".to_string(),
        };
        let (record, record_color) = match &self.recorder {
            Some(recorder) => (format!("● REC {:.1}s  ", recorder.recorded_secs()), Color::Red),
            None => ("○ idle  ".to_string(), Color::DarkGray),
        };

        let line = Line::from(vec![
            Span::styled(sample, Style::default().fg(Color::Cyan)),
            Span::styled(record, Style::default().fg(record_color)),
            Span::styled(
                format!("Voices: {}  ", engine.active_count()),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                format!("{:.1}kHz", self.output.sample_rate() / 1000.0),
                Style::default().fg(Color::DarkGray),
            ),
        ]);

        frame.render_widget(Paragraph::new(line).block(block), area);
    }
}
