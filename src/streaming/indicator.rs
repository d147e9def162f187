//! "Thinking" indicator shown while waiting for the first response byte
//!
//! The indicator is a spawned task driven by an interval timer. It is
//! stopped through a cancellation token and then joined, so by the time
//! `stop()` returns the line it drew has been cleared and nothing else
//! will be written by it.

use colored::{Color, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Frame interval for the plain dots animation
pub const DOTS_INTERVAL: Duration = Duration::from_millis(500);

/// Frame interval for the spinner (10 FPS)
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(100);

/// Something that can draw one frame of the indicator and erase it again
pub trait IndicatorRenderer: Send + 'static {
    /// Time between frames
    fn interval(&self) -> Duration;

    /// Draw frame number `frame` (starting at zero)
    fn tick(&mut self, frame: usize);

    /// Erase whatever has been drawn
    fn clear(&mut self);
}

/// Indicator look, chosen by configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorStyle {
    /// `Thinking...` with rotating dots
    Dots,

    /// indicatif spinner using a named tick set
    Spinner(String),
}

/// Resolved indicator settings
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    pub enabled: bool,
    pub style: IndicatorStyle,
    pub color: Color,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            style: IndicatorStyle::Dots,
            color: Color::Yellow,
        }
    }
}

impl IndicatorConfig {
    /// Build a fresh renderer for one agent invocation.
    ///
    /// A disabled indicator still gets a renderer so cancellation is uniform.
    pub fn renderer(&self) -> Box<dyn IndicatorRenderer> {
        if !self.enabled {
            return Box::new(SilentRenderer);
        }
        match &self.style {
            IndicatorStyle::Dots => Box::new(DotsRenderer::new(self.color)),
            IndicatorStyle::Spinner(name) => Box::new(SpinnerRenderer::new(name, self.color)),
        }
    }
}

/// Renderer that draws nothing
#[derive(Debug, Default)]
pub struct SilentRenderer;

impl IndicatorRenderer for SilentRenderer {
    fn interval(&self) -> Duration {
        SPINNER_INTERVAL
    }

    fn tick(&mut self, _frame: usize) {}

    fn clear(&mut self) {}
}

/// `Thinking` followed by up to three dots
#[derive(Debug)]
pub struct DotsRenderer {
    color: Color,
    drawn: bool,
}

impl DotsRenderer {
    pub fn new(color: Color) -> Self {
        Self { color, drawn: false }
    }
}

impl IndicatorRenderer for DotsRenderer {
    fn interval(&self) -> Duration {
        DOTS_INTERVAL
    }

    fn tick(&mut self, frame: usize) {
        let dots = ".".repeat(frame % 4);
        let mut stdout = io::stdout();
        let _ = write!(stdout, "\r{}{:<3}", "Thinking".color(self.color), dots);
        let _ = stdout.flush();
        self.drawn = true;
    }

    fn clear(&mut self) {
        if !self.drawn {
            return;
        }
        let mut stdout = io::stdout();
        let _ = execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine));
        self.drawn = false;
    }
}

/// indicatif spinner, ticked by the indicator task rather than its own thread
pub struct SpinnerRenderer {
    bar: ProgressBar,
}

impl SpinnerRenderer {
    pub fn new(preset: &str, color: Color) -> Self {
        let style = ProgressStyle::with_template(&spinner_template(color))
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(tick_strings(preset));

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message("Thinking...".color(color).to_string());
        Self { bar }
    }
}

/// indicatif template with the spinner in the indicator color
fn spinner_template(color: Color) -> String {
    let name = match color {
        Color::Black | Color::BrightBlack => "black",
        Color::Red | Color::BrightRed => "red",
        Color::Green | Color::BrightGreen => "green",
        Color::Yellow | Color::BrightYellow => "yellow",
        Color::Blue | Color::BrightBlue => "blue",
        Color::Magenta | Color::BrightMagenta => "magenta",
        Color::Cyan | Color::BrightCyan => "cyan",
        Color::White | Color::BrightWhite => "white",
        Color::TrueColor { .. } => return "{spinner} {msg}".to_string(),
    };
    format!("{{spinner:.{}}} {{msg}}", name)
}

impl IndicatorRenderer for SpinnerRenderer {
    fn interval(&self) -> Duration {
        SPINNER_INTERVAL
    }

    fn tick(&mut self, _frame: usize) {
        self.bar.tick();
    }

    fn clear(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Tick sets for the spinner; the last entry is the finished frame.
fn tick_strings(preset: &str) -> &'static [&'static str] {
    match preset {
        "line" => &["-", "\\", "|", "/", " "],
        "arc" => &["◜", "◠", "◝", "◞", "◡", "◟", " "],
        "simpleDots" => &[".  ", ".. ", "...", "   ", " "],
        "bouncingBall" => &["( ●    )", "(  ●   )", "(   ●  )", "(    ● )", "(   ●  )", "(  ●   )", " "],
        "dots" => &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "],
        other => {
            tracing::debug!(preset = other, "Unknown spinner style, using dots");
            &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]
        }
    }
}

/// Handle to a running indicator task
pub struct ThinkingIndicator {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ThinkingIndicator {
    /// Spawn the indicator task. Must be called from within a tokio runtime.
    pub fn start(mut renderer: Box<dyn IndicatorRenderer>) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(renderer.interval());
            let mut frame = 0usize;

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        renderer.tick(frame);
                        frame = frame.wrapping_add(1);
                    }
                }
            }

            renderer.clear();
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Signal the task and wait until it has erased its output.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Thinking indicator task failed: {}", e);
            }
        }
    }
}

impl Drop for ThinkingIndicator {
    fn drop(&mut self) {
        // Dropped without stop(): cancel so the task clears itself and exits
        self.token.cancel();
    }
}
