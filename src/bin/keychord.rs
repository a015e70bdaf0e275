// Keychord CLI
// Drives the shortcut engine from a config file, a scripted replay or the terminal

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use parking_lot::Mutex;

use keychord_core::key::special_key_code;
use keychord_core::{into_callback, Action, Config, Dispatch, Engine, Invocation, KeyEvent};

/// How long the interactive loop waits for a key before polling timers
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Keyboard shortcut engine driver
#[derive(Parser, Debug)]
#[command(name = "keychord")]
#[command(author = "keychord contributors")]
#[command(version)]
#[command(about = "Bind keyboard shortcuts and sequences, then feed key events through them", long_about = None)]
struct Args {
    /// TOML configuration file (defaults to the user config directory)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// Replay scripted key events from a file
    #[arg(short, long, value_name = "SCRIPT", conflicts_with = "interactive")]
    replay: Option<PathBuf>,

    /// Read keys from the terminal until Ctrl+C
    #[arg(short, long)]
    interactive: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// One line of a replay script
#[derive(Debug, Clone)]
enum ScriptStep {
    Key(KeyEvent),
    Wait(Duration),
}

/// Main application state
struct Application {
    config: Config,
    engine: Engine,
    /// Commands run by fired bindings, drained after every event
    commands: Arc<Mutex<Vec<String>>>,
    /// Flag to signal the interactive loop to stop
    running: Arc<AtomicBool>,
}

impl Application {
    fn new(config: Config) -> Self {
        let mut engine = Engine::with_options(config.to_engine_options());
        let commands: Arc<Mutex<Vec<String>>> = Arc::default();

        let bound = config.install(&mut engine, |entry| {
            let sink = Arc::clone(&commands);
            let command = entry.command.clone();
            Some(into_callback(move |invocation: &Invocation<'_>| {
                log::debug!("'{}' ran command '{}'", invocation.combo, command);
                sink.lock().push(command.clone());
            }))
        });
        log::info!("bound {} combo(s)", bound);

        Self {
            config,
            engine,
            commands,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let origin = self
            .config
            .source_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string());
        println!("Configuration is valid ({})", origin);
        println!("  bind entries: {}", self.config.binds.len());
        println!("  bindings:     {}", self.engine.registry().len());
        println!("  keycodes:     {}", self.config.keycodes.len());
        println!(
            "  sequence timeout: {}ms",
            self.config.sequence_timeout.as_millis()
        );
        Ok(())
    }

    /// Feed a replay script through the engine on a virtual clock
    fn replay(&mut self, path: &Path) -> Result<()> {
        let script = fs::read_to_string(path)
            .with_context(|| format!("failed to read replay script {}", path.display()))?;
        let steps = parse_script(&script)?;

        let start = Instant::now();
        let mut clock = start;
        for step in steps {
            match step {
                ScriptStep::Wait(delay) => {
                    clock += delay;
                    if self.engine.poll_timers_at(clock) {
                        println!("{:>6}ms  timers expired", (clock - start).as_millis());
                    }
                }
                ScriptStep::Key(event) => {
                    let dispatch = self.engine.handle_at(&event, clock);
                    let at_ms = (clock - start).as_millis();
                    self.report(&mut io::stdout(), &event, &dispatch, at_ms, "\n")?;
                }
            }
        }
        Ok(())
    }

    /// Read keys from the terminal until Ctrl+C or a termination signal
    fn run_interactive(&mut self) -> Result<()> {
        self.install_signal_handler();

        print!("keychord is listening. Press Ctrl+C to exit.\r\n");
        io::stdout().flush()?;
        enable_raw_mode().context("failed to enable raw terminal mode")?;

        let start = Instant::now();
        let run_result = 'input: loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }

            match event::poll(INPUT_POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => {
                    self.engine.poll_timers();
                    continue;
                }
                Err(err) => break Err(err.into()),
            }

            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(err) => break Err(err.into()),
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break Ok(());
            }

            for event in terminal_events(key.code, key.modifiers) {
                let dispatch = self.engine.handle(&event);
                let at_ms = start.elapsed().as_millis();
                let reported = self.report(&mut io::stdout(), &event, &dispatch, at_ms, "\r\n");
                if let Err(err) = reported {
                    break 'input Err(err);
                }
            }
        };

        disable_raw_mode().context("failed to restore terminal")?;
        run_result
    }

    fn install_signal_handler(&self) {
        use signal_hook::iterator::Signals;
        let running = self.running.clone();

        std::thread::spawn(move || {
            match Signals::new([signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM]) {
                Ok(mut signals) => {
                    if signals.forever().next().is_some() {
                        running.store(false, Ordering::SeqCst);
                    }
                }
                Err(err) => log::warn!("failed to install signal handler: {}", err),
            }
        });
    }

    /// Write one line describing what an event did; silent when nothing matched
    fn report(
        &self,
        out: &mut impl Write,
        event: &KeyEvent,
        dispatch: &Dispatch,
        at_ms: u128,
        newline: &str,
    ) -> Result<()> {
        let commands: Vec<String> = self.commands.lock().drain(..).collect();
        if dispatch.is_empty() && commands.is_empty() {
            log::trace!("{} {}: nothing matched", event.action, event.code);
            return Ok(());
        }

        let mut line = format!("{:>6}ms  {:<8} {:>3}", at_ms, event.action, event.code);
        for sequence in &dispatch.advanced {
            line.push_str(&format!("  advanced '{}'", sequence));
        }
        for combo in &dispatch.fired {
            line.push_str(&format!("  fired '{}'", combo));
        }
        if !commands.is_empty() {
            line.push_str(&format!("  -> {}", commands.join(", ")));
        }
        if dispatch.prevent_default {
            line.push_str("  [stopped]");
        }
        write!(out, "{}{}", line, newline).context("failed to write report")?;
        out.flush().context("failed to flush report")?;
        Ok(())
    }
}

/// Parse a replay script
///
/// One step per line, `#` starts a comment:
///   down 71
///   press 103 shift
///   up 17 ctrl
///   wait 1200
fn parse_script(script: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();

    for (index, raw) in script.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or("");
        let value = parts
            .next()
            .with_context(|| format!("line {}: '{}' needs a value", line_no, verb))?;

        if verb == "wait" {
            let ms: u64 = value
                .parse()
                .with_context(|| format!("line {}: invalid wait '{}'", line_no, value))?;
            steps.push(ScriptStep::Wait(Duration::from_millis(ms)));
            continue;
        }

        let action = Action::parse(verb).with_context(|| format!("line {}", line_no))?;
        let code: u32 = value
            .parse()
            .with_context(|| format!("line {}: invalid key code '{}'", line_no, value))?;

        let mut event = KeyEvent::new(code, action);
        for flag in parts {
            event = match flag {
                "shift" => event.with_shift(),
                "alt" => event.with_alt(),
                "ctrl" => event.with_ctrl(),
                "meta" => event.with_meta(),
                other => bail!("line {}: unknown modifier '{}'", line_no, other),
            };
        }
        steps.push(ScriptStep::Key(event));
    }

    Ok(steps)
}

/// Translate a terminal key into the down/press/up events a keyboard
/// would have produced
fn terminal_events(code: KeyCode, modifiers: KeyModifiers) -> Vec<KeyEvent> {
    let flags = |event: KeyEvent| {
        let mut event = event;
        event.shift = modifiers.contains(KeyModifiers::SHIFT);
        event.alt = modifiers.contains(KeyModifiers::ALT);
        event.ctrl = modifiers.contains(KeyModifiers::CONTROL);
        event.meta = modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META);
        event
    };

    let named = |name: &str| {
        special_key_code(name)
            .map(|code| vec![flags(KeyEvent::down(code)), flags(KeyEvent::up(code))])
    };

    match code {
        KeyCode::Char(ch) => {
            let mut events = Vec::with_capacity(3);
            let physical = ch.is_ascii_alphanumeric().then(|| ch.to_ascii_uppercase() as u32);
            if let Some(code) = physical {
                events.push(flags(KeyEvent::down(code)));
            }
            if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER) {
                events.push(flags(KeyEvent::press_char(ch)));
            }
            if let Some(code) = physical {
                events.push(flags(KeyEvent::up(code)));
            }
            events
        }
        KeyCode::Enter => named("enter").unwrap_or_default(),
        KeyCode::Esc => named("esc").unwrap_or_default(),
        KeyCode::Tab => named("tab").unwrap_or_default(),
        KeyCode::Backspace => named("backspace").unwrap_or_default(),
        KeyCode::Delete => named("del").unwrap_or_default(),
        KeyCode::Insert => named("ins").unwrap_or_default(),
        KeyCode::Home => named("home").unwrap_or_default(),
        KeyCode::End => named("end").unwrap_or_default(),
        KeyCode::PageUp => named("pageup").unwrap_or_default(),
        KeyCode::PageDown => named("pagedown").unwrap_or_default(),
        KeyCode::Left => named("left").unwrap_or_default(),
        KeyCode::Right => named("right").unwrap_or_default(),
        KeyCode::Up => named("up").unwrap_or_default(),
        KeyCode::Down => named("down").unwrap_or_default(),
        KeyCode::F(n) => named(&format!("f{}", n)).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Config::load_default().context("failed to load default config"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = load_config(&args)?;
    let mut app = Application::new(config);

    if args.check_config {
        return app.validate();
    }

    if let Some(script) = &args.replay {
        return app.replay(script);
    }

    if args.interactive {
        return app.run_interactive();
    }

    bail!("nothing to do: pass --check-config, --replay <SCRIPT> or --interactive")
}
