use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use unicode_width::UnicodeWidthChar;

use crate::error::{KioskError, Result};
use crate::routes::{RouteEntry, RouteTable};
use crate::runtime::DisplayController;
use crate::runtime::bus::{SwitchBus, SwitchConsumer};
use crate::runtime::screens::{Surface, SurfaceError, SurfaceResult, ViewEngine};

const KEY_POLL_INTERVAL: Duration = Duration::from_millis(200);
const FALLBACK_SIZE: (u16, u16) = (80, 24);
const QUIT_HINT: &str = "Esc / Ctrl+Q to quit";

/// Presentation options for the terminal backend.
#[derive(Debug, Clone)]
pub struct TerminalSettings {
    pub background: Color,
    /// Full takeover: no footer chrome.
    pub kiosk: bool,
    pub hide_cursor: bool,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            background: Color::White,
            kiosk: false,
            hide_cursor: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TerminalSurface {
    key: String,
    resource: String,
    visible: bool,
    loaded: bool,
}

impl TerminalSurface {
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl Surface for TerminalSurface {
    fn begin_load(&mut self) -> SurfaceResult<()> {
        if self.resource.trim().is_empty() {
            return Err(SurfaceError::Load {
                key: self.key.clone(),
                reason: "empty resource".to_string(),
            });
        }
        self.loaded = true;
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Draws the visible surface as a full-screen card.
pub struct TerminalEngine<W: Write> {
    out: W,
    settings: TerminalSettings,
    footer: String,
    size: Option<(u16, u16)>,
}

impl<W: Write> TerminalEngine<W> {
    pub fn new(out: W, settings: TerminalSettings) -> Self {
        Self {
            out,
            settings,
            footer: QUIT_HINT.to_string(),
            size: None,
        }
    }

    /// Pin the drawing area instead of querying the terminal.
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.size = Some((width, height));
        self
    }

    /// List the available keys in the footer (ignored in kiosk mode).
    pub fn with_route_hint(mut self, routes: &RouteTable) -> Self {
        let keys = routes.key_list().join(" · ");
        self.footer = format!("{keys}  |  {QUIT_HINT}");
        self
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    fn size(&self) -> (u16, u16) {
        self.size
            .or_else(|| terminal::size().ok())
            .unwrap_or(FALLBACK_SIZE)
    }

    fn draw(&mut self, surface: &TerminalSurface) -> io::Result<()> {
        let (width, height) = self.size();
        let middle = height / 2;
        queue!(
            self.out,
            SetBackgroundColor(self.settings.background),
            SetForegroundColor(contrast_for(self.settings.background)),
            Clear(ClearType::All)
        )?;
        self.draw_centered(middle.saturating_sub(1), width, &surface.key)?;
        let detail = if surface.loaded {
            surface.resource.clone()
        } else {
            format!("{} (not loaded)", surface.resource)
        };
        self.draw_centered(middle + 1, width, &detail)?;
        if !self.settings.kiosk {
            let footer = self.footer.clone();
            self.draw_centered(height.saturating_sub(1), width, &footer)?;
        }
        queue!(self.out, ResetColor)?;
        self.out.flush()
    }

    fn draw_centered(&mut self, row: u16, width: u16, text: &str) -> io::Result<()> {
        let line = fit_to_width(text, width as usize);
        let col = (width as usize).saturating_sub(display_width(&line)) / 2;
        queue!(self.out, MoveTo(col as u16, row), Print(line))
    }
}

impl<W: Write> ViewEngine for TerminalEngine<W> {
    type Surface = TerminalSurface;

    fn create_surface(&mut self, entry: &RouteEntry) -> TerminalSurface {
        TerminalSurface {
            key: sanitize(&entry.key),
            resource: sanitize(&entry.resource),
            visible: false,
            loaded: false,
        }
    }

    fn present(&mut self, key: &str, surface: &TerminalSurface) -> SurfaceResult<()> {
        self.draw(surface).map_err(|err| SurfaceError::Present {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Owns the terminal for the lifetime of the display loop: alternate screen,
/// raw mode and a helper thread that turns quit keys into a bus shutdown.
pub struct TerminalDriver {
    controller: DisplayController<TerminalEngine<io::Stdout>>,
    bus: SwitchBus,
    settings: TerminalSettings,
}

impl TerminalDriver {
    pub fn new(
        controller: DisplayController<TerminalEngine<io::Stdout>>,
        bus: SwitchBus,
        settings: TerminalSettings,
    ) -> Self {
        Self {
            controller,
            bus,
            settings,
        }
    }

    /// Take over the terminal, preload every surface, call `on_ready`, then
    /// drain the bus until shutdown. The terminal is restored on every path.
    pub fn run<F>(
        mut self,
        routes: &RouteTable,
        consumer: &SwitchConsumer,
        on_ready: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut stdout = io::stdout();
        take_over(
            &mut stdout,
            &self.settings,
            terminal::enable_raw_mode,
            disable_raw_mode,
        )?;
        let result = self.run_inner(routes, consumer, on_ready);
        restore(&mut stdout, disable_raw_mode);
        result
    }

    fn run_inner<F>(
        &mut self,
        routes: &RouteTable,
        consumer: &SwitchConsumer,
        on_ready: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.controller.initialize(routes);
        let watcher = spawn_key_watcher(self.bus.clone())?;

        if let Err(err) = on_ready() {
            self.bus.shutdown();
            let _ = watcher.join();
            return Err(err);
        }

        self.controller.run(consumer);
        self.bus.shutdown();
        let _ = watcher.join();
        Ok(())
    }

}

fn disable_raw_mode() {
    terminal::disable_raw_mode().ok();
}

/// Enable raw mode and switch to the alternate screen. If the screen cannot
/// be prepared, raw mode is turned off again before the error is returned.
fn take_over<W, E, D>(out: &mut W, settings: &TerminalSettings, enable: E, disable: D) -> Result<()>
where
    W: Write,
    E: FnOnce() -> io::Result<()>,
    D: FnOnce(),
{
    enable().map_err(|err| KioskError::Terminal(err.to_string()))?;
    let prepared = execute!(out, EnterAlternateScreen, Clear(ClearType::All)).and_then(|_| {
        if settings.hide_cursor {
            execute!(out, Hide)?;
        }
        Ok(())
    });
    if let Err(err) = prepared {
        restore(out, disable);
        return Err(err.into());
    }
    Ok(())
}

fn restore<W: Write, D: FnOnce()>(out: &mut W, disable: D) {
    execute!(out, ResetColor, Show, LeaveAlternateScreen).ok();
    disable();
}

fn spawn_key_watcher(bus: SwitchBus) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("kiosk-keys".to_string())
        .spawn(move || {
            while !bus.is_shut_down() {
                match event::poll(KEY_POLL_INTERVAL) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) if is_quit_key(&key) => bus.shutdown(),
                        Ok(_) => {}
                        Err(_) => break,
                    },
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        })
}

/// Esc, Ctrl+Q, Ctrl+C and Super+Q close the kiosk.
pub fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('q') | KeyCode::Char('Q') => key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER),
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Pick black or white text for the given background.
fn contrast_for(background: Color) -> Color {
    match background {
        Color::Rgb { r, g, b } => {
            let luma = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
            if luma > 128_000 { Color::Black } else { Color::White }
        }
        Color::White | Color::Grey | Color::Yellow | Color::Cyan | Color::Green => Color::Black,
        _ => Color::White,
    }
}

// Config values end up on the terminal verbatim; escape sequences in them
// would be interpreted.
fn sanitize(text: &str) -> String {
    strip_ansi_escapes::strip_str(text)
        .chars()
        .filter(|ch| !ch.is_control())
        .collect()
}

fn display_width(text: &str) -> usize {
    text.chars().map(|ch| ch.width().unwrap_or(0)).sum()
}

fn fit_to_width(text: &str, max: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}
