use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use stillness::components::notification::ProgressNotice;
use stillness::components::selector::{
    format_clock, format_duration, parse_duration, DEFAULT_CUSTOM_SECONDS, QUICK_ADDS,
    QUICK_TIMERS,
};
use stillness::prelude::*;
use stillness::{ENGINE_NAME, VERSION as LIB_VERSION};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

const LOGO_TEXT: &str = r"
   ___  _   _  _  _
  / __|| |_(_)| || | _ _   ___  ___ ___
  \__ \|  _| || || || ' \ / -_)(_-<(_-<
  |___/ \__|_||_||_||_||_|\___|/__//__/
";

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.green().bold();
            let colored_rest = rest.green();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.green().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// Prints the progress notice whenever its title or buttons change.
#[derive(Default)]
struct ConsoleSurface {
    last: Mutex<Option<(String, Vec<NoticeAction>)>>,
}

impl ProgressSurface for ConsoleSurface {
    fn post(&self, notice: &ProgressNotice) {
        let shape = (notice.title.clone(), notice.actions.clone());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_ref() == Some(&shape) {
            return;
        }
        let buttons = notice
            .actions
            .iter()
            .map(|action| format!("[{}]", action.label()))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "\n<-- [NOTICE] {} | {} {}",
            notice.title.cyan().bold(),
            notice.text,
            buttons.dimmed()
        );
        *last = Some(shape);
    }

    fn clear(&self) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if last.take().is_some() {
            println!("\n<-- [NOTICE] {}", "cleared".dimmed());
        }
    }
}

/// Draws motor pulses on the terminal.
struct ConsoleHaptics;

impl HapticDevice for ConsoleHaptics {
    fn has_vibrator(&self) -> bool {
        true
    }

    fn motor_on(&self) {
        print!("{}", "≈".magenta().bold());
        std::io::stdout().flush().ok();
    }

    fn motor_off(&self) {
        print!("{}", "·".dimmed());
        std::io::stdout().flush().ok();
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );

    println!("{}", "-------------------------------------------------------------".dimmed());
    println!("{}", version_string);
    println!("{}", "-------------------------------------------------------------".dimmed());
}

/// Spawns the listeners that narrate what the engine and the view are doing.
fn spawn_event_listeners(bridge: &TimerBridge, is_watching: Arc<AtomicBool>) {
    let mut system_rx = bridge.engine().subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            println!("\n<-- [SYSTEM EVENT] {:?}", event);
        }
    });

    let mut timer_rx = bridge.engine().subscribe_timer_events();
    tokio::spawn(async move {
        while let Ok(event) = timer_rx.recv().await {
            if matches!(event, TimerEvent::Completed { .. }) {
                println!("\n<-- {}", "Session complete. Type 'dismiss' to silence.".green().bold());
            }
        }
    });

    // Live view (controlled by the shared flag)
    let mut view_rx = bridge.subscribe();
    tokio::spawn(async move {
        let mut last_line = String::new();
        while view_rx.changed().await.is_ok() {
            let view = *view_rx.borrow_and_update();
            if !is_watching.load(Ordering::Relaxed) {
                continue;
            }
            let line = render_view(&view);
            if line != last_line {
                println!("<-- [VIEW] {}", line);
                last_line = line;
            }
        }
    });
}

fn render_view(view: &ViewState) -> String {
    let phase = match view.phase() {
        TimerPhase::Idle => "idle".dimmed(),
        TimerPhase::Running => "running".green(),
        TimerPhase::Paused => "paused".yellow(),
        TimerPhase::Completed => "complete".cyan(),
    };
    format!(
        "{} / {} ({}) {:>3.0}%",
        format_clock(view.remaining).bold(),
        format_clock(view.total),
        phase,
        view.progress() * 100.0
    )
}

fn print_status(bridge: &TimerBridge) {
    let view = bridge.view();
    let selection = match view.selected_seconds {
        Some(seconds) => format_duration(seconds),
        None => "none".to_string(),
    };
    let preferences = bridge.preferences().current();
    println!("Timer:     {}", render_view(&view));
    println!("Selected:  {}", selection);
    println!(
        "Pattern:   {} ({})",
        preferences.vibration_pattern,
        if preferences.vibration_pattern.is_looping() { "continuous" } else { "auto-stop" }
    );
    println!("Theme:     {}", if preferences.dark_theme { "dark" } else { "light" });
    println!("Haptics:   {:?}", bridge.haptics().status());
}

fn print_patterns(bridge: &TimerBridge) {
    let selected = bridge.preferences().vibration_pattern();
    println!("Continuous (repeat until dismissed):");
    for pattern in VibrationPattern::continuous() {
        let marker = if pattern == selected { "*" } else { " " };
        println!("  {} {:<14} {}", marker, pattern.label(), pattern.key().dimmed());
    }
    println!("Auto-stop (play once):");
    for pattern in VibrationPattern::finite() {
        let marker = if pattern == selected { "*" } else { " " };
        println!("  {} {:<14} {}", marker, pattern.label(), pattern.key().dimmed());
    }
}

fn print_help() {
    let presets = QUICK_TIMERS.iter().map(|p| p.label).collect::<Vec<_>>().join("|");
    let adds = QUICK_ADDS.iter().map(|a| a.label).collect::<Vec<_>>().join(" ");
    println!("Available commands:");
    println!("  preset <{}>   - Selects a quick timer.", presets);
    println!("  set <DURATION>          - Selects a custom duration (e.g. 90, 5m, 1h30m).");
    println!("  set                     - Selects the default custom duration ({}).", format_duration(DEFAULT_CUSTOM_SECONDS));
    println!("  add <DURATION>          - Adds to the selection ({}).", adds);
    println!("  start | pause | resume  - Controls the countdown.");
    println!("  stop                    - Silences the alert and resets the timer.");
    println!("  dismiss                 - Dismisses a completed session.");
    println!("  notify <pause|resume|stop> - Presses a button on the progress notice.");
    println!("  status                  - Shows the current state.");
    println!("  watch <on|off>          - Prints the live view as it changes.");
    println!("  pattern list            - Lists vibration patterns.");
    println!("  pattern set <NAME>      - Selects the alert pattern.");
    println!("  pattern preview <NAME>  - Plays one pass of a pattern.");
    println!("  theme <dark|light>      - Switches the theme preference.");
    println!("  exit                    - Quits the shell.");
}

fn parse_pattern(args: &[&str]) -> Option<VibrationPattern> {
    if args.is_empty() {
        return None;
    }
    match args.join(" ").parse::<VibrationPattern>() {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            println!("Error: {}. Try 'pattern list'.", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = StillnessConfig::load(None)?;
    let engine = TimerEngine::with_surface(&config, Arc::new(ConsoleSurface::default()));
    let haptics = VibrationEngine::new(Arc::new(ConsoleHaptics));
    let preferences = Preferences::open(&config)?;

    let bridge = TimerBridge::new(engine.clone(), haptics, preferences);
    bridge.attach();

    // Create the shared flag for the live view listener.
    let is_watching = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&bridge, is_watching.clone());

    info!("{} is ready; the timer task starts with the first session.", ENGINE_NAME.cyan());

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();

                if let Some(command) = args.first() {
                    match *command {
                        "preset" => match args.get(1) {
                            Some(label) => match QUICK_TIMERS.iter().find(|p| p.label == *label) {
                                Some(preset) => {
                                    if bridge.select_exact(preset.seconds) {
                                        println!("--> Selected {}.", format_duration(preset.seconds));
                                    } else {
                                        println!("--> A session is running; stop it first.");
                                    }
                                }
                                None => println!("Error: unknown preset '{}'.", label),
                            },
                            None => println!("Usage: preset <LABEL>"),
                        },
                        "set" => {
                            let seconds = match args.get(1..).filter(|rest| !rest.is_empty()) {
                                Some(rest) => parse_duration(&rest.join(" ")),
                                None => Some(DEFAULT_CUSTOM_SECONDS),
                            };
                            match seconds {
                                Some(seconds) => {
                                    if bridge.select_exact(seconds) {
                                        let selected = bridge.view().selected_seconds.unwrap_or(seconds);
                                        println!("--> Selected {}.", format_duration(selected));
                                    } else {
                                        println!("--> A session is running; stop it first.");
                                    }
                                }
                                None => println!("Error: '{}' is not a valid duration.", args[1..].join(" ")),
                            }
                        }
                        "add" => match args.get(1..).and_then(|rest| parse_duration(&rest.join(" "))) {
                            Some(delta) => {
                                if bridge.add_seconds(delta) {
                                    let selected = bridge.view().selected_seconds.unwrap_or_default();
                                    println!("--> Selected {}.", format_duration(selected));
                                } else {
                                    println!("--> A session is running; stop it first.");
                                }
                            }
                            None => println!("Usage: add <DURATION>"),
                        },
                        "start" => {
                            if bridge.view().total.is_zero() {
                                println!("--> Select a duration first.");
                            } else {
                                bridge.start_timer();
                                println!("--> {}", render_view(&bridge.view()));
                            }
                        }
                        "pause" => {
                            bridge.pause_timer();
                            println!("--> {}", render_view(&bridge.view()));
                        }
                        "resume" => {
                            bridge.resume_timer();
                            println!("--> {}", render_view(&bridge.view()));
                        }
                        "stop" => {
                            bridge.stop_timer();
                            println!("--> {}", render_view(&bridge.view()));
                        }
                        "dismiss" => {
                            bridge.reset_after_completion();
                            println!("--> {}", render_view(&bridge.view()));
                        }
                        "notify" => {
                            let Some(action) = args.get(1).and_then(|word| NoticeAction::from_label(word)) else {
                                println!("Usage: notify <pause|resume|stop>");
                                continue;
                            };
                            let snapshot = bridge.engine().snapshot();
                            match ProgressNotice::from_snapshot(&snapshot) {
                                Some(notice) if notice.offers(action) => {
                                    if let Err(e) = bridge.engine().handle_notice_action(action) {
                                        println!("Error: {}", e);
                                    } else {
                                        println!("--> Pressed [{}].", action.label());
                                    }
                                }
                                Some(_) => println!(
                                    "The notice has no [{}] button right now.",
                                    action.label()
                                ),
                                None => println!("No progress notice is showing."),
                            }
                        }
                        "status" => print_status(&bridge),
                        "watch" => match args.get(1) {
                            Some(&"on") => {
                                is_watching.store(true, Ordering::Relaxed);
                                println!("--> Watching the live view.");
                            }
                            Some(&"off") => {
                                is_watching.store(false, Ordering::Relaxed);
                                println!("--> Stopped watching.");
                            }
                            _ => println!("Usage: watch <on|off>"),
                        },
                        "pattern" => match args.get(1) {
                            Some(&"list") => print_patterns(&bridge),
                            Some(&"set") => {
                                if let Some(pattern) = parse_pattern(&args[2..]) {
                                    match bridge.preferences().set_vibration_pattern(pattern) {
                                        Ok(()) => println!("--> Alert pattern is now {}.", pattern),
                                        Err(e) => println!("Error: could not save preference: {}", e),
                                    }
                                }
                            }
                            Some(&"preview") => {
                                if let Some(pattern) = parse_pattern(&args[2..]) {
                                    bridge.haptics().preview(pattern);
                                    println!("--> Previewing {}.", pattern);
                                }
                            }
                            _ => println!("Usage: pattern <list|set|preview> [NAME]"),
                        },
                        "theme" => {
                            let dark = match args.get(1) {
                                Some(&"dark") => Some(true),
                                Some(&"light") => Some(false),
                                _ => None,
                            };
                            match dark {
                                Some(dark) => match bridge.preferences().set_dark_theme(dark) {
                                    Ok(()) => println!("--> Theme set to {}.", args[1]),
                                    Err(e) => println!("Error: could not save preference: {}", e),
                                },
                                None => println!("Usage: theme <dark|light>"),
                            }
                        }
                        "help" => print_help(),
                        "exit" => break,
                        _ => println!("Unknown command: '{}'. Type 'help'.", line),
                    }
                }
            }
            Err(_) => {
                println!("Exiting stillshell...");
                break;
            }
        }
    }

    bridge.haptics().cancel();
    bridge.detach();
    engine.shutdown().await;
    Ok(())
}
