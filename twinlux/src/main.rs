use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use iced::keyboard::{self, Event as KeyboardEvent, Key};
use iced::widget::{button, column, container, progress_bar, row, slider, text, toggler};
use iced::{Element, Subscription, Task, Theme, time};
use log::info;
use twinlux_core::{
    AutoCurve, Channel, ControlState, ControllerConfig, DAY_MINUTES, HttpDevice, LightController,
    OperatingMode,
};

/// Control panel for a two-channel networked light.
#[derive(Parser, Debug)]
#[command(name = "twinlux")]
#[command(about = "Twinlux lighting controller")]
struct Args {
    /// Device host or URL (overrides the config file)
    #[arg(long, env = "TWINLUX_HOST")]
    host: Option<String>,

    /// Path to a JSON config file
    #[arg(long, default_value = "twinlux.json")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ControllerConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(host) = args.host {
        config = config.with_base_url(host_to_url(&host));
    }

    // The controller's timers and requests live on this runtime; the GUI
    // thread stays inside it so widget callbacks can spawn onto it.
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let _guard = runtime.enter();

    let device = Arc::new(HttpDevice::new(&config).context("failed to build HTTP client")?);
    info!("controlling device at {}", device.base_url());

    let controller = Arc::new(LightController::new(device, config));
    let session = controller.start();

    let result = iced::application(
        move || TwinluxApp::new(Arc::clone(&controller)),
        TwinluxApp::update,
        TwinluxApp::view,
    )
    .title("Twinlux")
    .subscription(TwinluxApp::subscription)
    .theme(TwinluxApp::theme)
    .run();

    info!("shutting down");
    session.shutdown();
    result.map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}

fn host_to_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

static CURVES: [AutoCurve; 3] = [AutoCurve::Blink, AutoCurve::Breathe, AutoCurve::Step];

struct TwinluxApp {
    controller: Arc<LightController>,
    error_message: Option<String>,

    // Last snapshot of the shared control state
    state: ControlState,
}

#[derive(Debug, Clone)]
enum Message {
    // Channel sliders
    LevelChanged(Channel, i32),

    // Power
    TogglePower,

    // Mode selection
    SelectManual,
    SelectCurve(AutoCurve),

    // Manual time override
    ToggleTimeOverride(bool),
    TimeSliderChanged(i32),

    // Once-per-second readout refresh
    Tick,

    // Keyboard event
    KeyboardEvent(KeyboardEvent),
}

impl TwinluxApp {
    fn new(controller: Arc<LightController>) -> Self {
        let state = controller.snapshot();
        Self {
            controller,
            error_message: None,
            state,
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        // Clear previous errors on new actions
        if !matches!(message, Message::Tick | Message::KeyboardEvent(_)) {
            self.error_message = None;
        }

        match message {
            Message::LevelChanged(channel, value) => {
                let value = value.clamp(0, 255) as u8;
                if let Err(e) = self.controller.set_level(channel, value) {
                    self.error_message = Some(e.to_string());
                }
            }

            Message::TogglePower => {
                self.controller.toggle_power();
            }

            Message::SelectManual => self.controller.select_manual(),

            Message::SelectCurve(curve) => {
                // a running automatic mode switches on its own
                let running = self.controller.snapshot().mode.is_automatic();
                self.controller.choose_curve(curve);
                if !running {
                    self.controller.select_automatic();
                }
            }

            Message::ToggleTimeOverride(enabled) => {
                if enabled {
                    let minutes = self.controller.snapshot().time_slider_minutes;
                    self.controller.enable_time_override(minutes as i64);
                } else {
                    self.controller.disable_time_override();
                }
            }

            Message::TimeSliderChanged(minutes) => {
                self.controller.move_time_slider(minutes as i64);
            }

            Message::Tick => {}

            Message::KeyboardEvent(event) => {
                if let KeyboardEvent::KeyPressed { key, modifiers, .. } = event
                    && modifiers.control()
                    && modifiers.shift()
                {
                    match key.as_ref() {
                        Key::Character(c) if c.eq_ignore_ascii_case("p") => {
                            return self.update(Message::TogglePower);
                        }
                        Key::Character(c) if c.eq_ignore_ascii_case("m") => {
                            return self.update(Message::SelectManual);
                        }
                        Key::Character(c) if c.eq_ignore_ascii_case("a") => {
                            let curve = self.state.auto_selection.clone();
                            return self.update(Message::SelectCurve(curve));
                        }
                        _ => {}
                    }
                }
            }
        }

        self.state = self.controller.snapshot();
        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let state = &self.state;
        let controls = state.enablement();

        let title = text("Twinlux").size(24);

        // Error/status message
        let status = text(self.error_message.as_deref().unwrap_or("")).size(14);

        // Power and mode readout
        let header = row![
            button(text(state.power_label())).on_press(Message::TogglePower),
            text(state.mode_label()).size(16),
        ]
        .spacing(15);

        // Channel sliders, replaced by a level bar while the device owns them
        let channels = column(Channel::ALL.map(|channel| {
            let value = state.level(channel);
            let label = text(format!(
                "CH{}: {}%{}",
                channel.number(),
                state.percent(channel),
                if controls.channel_sliders { "" } else { " (device)" }
            ))
            .size(16);
            let input: Element<'_, Message> = if controls.channel_sliders {
                slider(0..=255, value as i32, move |v| {
                    Message::LevelChanged(channel, v)
                })
                .step(1)
                .into()
            } else {
                progress_bar(0.0..=255.0, value as f32).into()
            };
            let entry: Element<'_, Message> = column![label, input].spacing(5).into();
            entry
        }))
        .spacing(10);

        // Mode buttons
        let mut modes = row![mode_button(
            "Manual",
            Message::SelectManual,
            state.mode == OperatingMode::Manual
        )]
        .spacing(10);
        for curve in &CURVES {
            let selected = state.mode == OperatingMode::Automatic(curve.clone());
            modes = modes.push(mode_button(
                curve.pretty_name(),
                Message::SelectCurve(curve.clone()),
                selected,
            ));
        }

        // Manual time override
        let override_toggle = toggler(state.time_override.active).label("Manual time");
        let override_toggle = if controls.time_toggle {
            override_toggle.on_toggle(Message::ToggleTimeOverride)
        } else {
            override_toggle
        };
        let time_section = column![
            override_toggle,
            text(format!("Time of day: {}", state.time_slider_label())).size(14),
            slider(
                0..=(DAY_MINUTES as i32 - 1),
                state.time_slider_minutes as i32,
                Message::TimeSliderChanged
            )
            .step(5),
        ]
        .spacing(5);

        // Live readouts
        let readouts = row![
            text(state.clock_readout.clone()).size(16),
            text(format!("Target: {}", state.cct_label())).size(16),
        ]
        .spacing(20);

        let shortcuts_hint =
            text("Shortcuts: Ctrl+Shift+P (power) | Ctrl+Shift+M (manual) | Ctrl+Shift+A (auto)")
                .size(12);

        // Main layout
        let content = column![
            title,
            status,
            header,
            channels,
            text("Mode:").size(16),
            modes,
            time_section,
            readouts,
            shortcuts_hint,
        ]
        .spacing(15)
        .padding(20);

        container(content).into()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            time::every(Duration::from_secs(1)).map(|_| Message::Tick),
            keyboard::listen().map(Message::KeyboardEvent),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn mode_button(label: &str, message: Message, selected: bool) -> Element<'_, Message> {
    let btn = button(text(label));
    if selected {
        // Selected state - don't allow clicking
        btn.into()
    } else {
        btn.on_press(message).into()
    }
}
