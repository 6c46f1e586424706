//! App - builds the controllers, engine and audio output, then runs the UI

use std::{
    cell::RefCell,
    io::stdout,
    path::PathBuf,
    rc::Rc,
    sync::Arc,
    time::{Duration, Instant},
};

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use crossterm::{
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute,
    terminal::supports_keyboard_enhancement,
};
use tracing::{info, warn};
use usbtronica::{
    io::{load_wav, output::AudioOutput, output::OutputHandle},
    Config, ControllerRegistry, VoiceEngine,
};

use crate::{
    input::KeyForwarder,
    ui::{log::EventLog, UiApp},
};

pub type SharedEngine = Rc<RefCell<VoiceEngine<OutputHandle>>>;
pub type SharedLog = Rc<RefCell<EventLog>>;

/// Main application builder
pub struct App {
    config: Config,
    sample: Option<PathBuf>,
    hold_timeout: Duration,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sample: None,
            hold_timeout: Duration::from_millis(600),
        }
    }

    /// WAV file to start with
    pub fn sample(mut self, sample: Option<PathBuf>) -> Self {
        self.sample = sample;
        self
    }

    pub fn hold_timeout(mut self, hold_timeout: Duration) -> Self {
        self.hold_timeout = hold_timeout;
        self
    }

    /// Run the application (takes over the terminal, plays audio)
    pub fn run(self) -> EyreResult<()> {
        let (output, handle) =
            AudioOutput::start(&self.config.engine).wrap_err("failed to start audio output")?;
        let engine: SharedEngine = Rc::new(RefCell::new(VoiceEngine::new(
            handle,
            self.config.engine.retrigger,
        )));
        let log: SharedLog = Rc::new(RefCell::new(EventLog::new()));

        if let Some(path) = &self.sample {
            let buffer = load_wav(path)
                .wrap_err_with(|| format!("failed to load sample {}", path.display()))?;
            log.borrow_mut().info(format!(
                "Loaded {} ({:.2}s)",
                path.display(),
                buffer.duration_secs()
            ));
            engine.borrow_mut().set_buffer(Arc::new(buffer));
        }

        let (mut registry, key_input) = ControllerRegistry::with_defaults(&self.config);
        subscribe_all(&mut registry, &engine, &log);
        registry.start_all(Instant::now());

        let mut terminal = ratatui::init();
        let reports_release = enable_release_reports();
        if !reports_release {
            log.borrow_mut().info(
                "Terminal cannot report key releases; notes stop when a key goes quiet",
            );
        }

        let keys = KeyForwarder::new(key_input, reports_release, self.hold_timeout);
        let mut ui = UiApp::new(registry, engine.clone(), log, keys, output);
        let result = ui.run(&mut terminal);

        if reports_release {
            if let Err(err) = execute!(stdout(), PopKeyboardEnhancementFlags) {
                warn!("failed to restore keyboard reporting: {err}");
            }
        }
        ratatui::restore();
        engine.borrow_mut().all_notes_off();
        result
    }
}

/// Hook the log and the engine up to every controller. The log listener is
/// subscribed first so an event is always logged before it sounds.
fn subscribe_all(registry: &mut ControllerRegistry, engine: &SharedEngine, log: &SharedLog) {
    registry.for_each_mut(|kind, controller| {
        info!(kind, "controller registered");
        log.borrow_mut().info(format!("Controller registered: {kind}"));

        let connect_log = log.clone();
        controller.on_connect(move |device_id| {
            connect_log
                .borrow_mut()
                .info(format!("connect {kind} device {device_id}"));
        });

        let event_log = log.clone();
        let engine = engine.clone();
        controller.on_control(move |device_id, event| {
            event_log
                .borrow_mut()
                .event(format!("{kind} {device_id}: {event}"));
            engine.borrow_mut().handle(event);
        });
    });
}

/// Ask the terminal for press/repeat/release reporting (kitty protocol)
fn enable_release_reports() -> bool {
    match supports_keyboard_enhancement() {
        Ok(true) => execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .map_err(|err| warn!("failed to enable key release reports: {err}"))
        .is_ok(),
        Ok(false) => false,
        Err(err) => {
            warn!("cannot query keyboard enhancement support: {err}");
            false
        }
    }
}
