// SPDX-License-Identifier: MIT
//
// tessera: demo of the rendering core.
//
// Wires the pieces together end to end:
//
//   tessera.toml → DriverConfig + QuantizerConfig
//   gradient     → ColorQuantizer → ScreenBuffer → AnsiDriver::update_screen
//   CSI 6n / CSI c / XTSMGRAPHICS round trips through the request correlator
//
// Usage: `tessera [config.toml]`. Without an argument `./tessera.toml` is
// used if present. Logs go to `$TMPDIR/tessera.log`, filtered by
// `TESSERA_LOG` (default `warn`); never to the terminal being drawn on.
//
// Keys: `q` or Escape quits, `r` re-runs the cursor query.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tessera_palette::{ColorQuantizer, QuantizerConfig, SixelSupport};
use tessera_term::driver::{AnsiDriver, ConsoleDriver};
use tessera_term::request::AnsiRequest;
use tessera_term::{
    Attribute, Cell, Color, DriverConfig, Error, Event, KeyCode, Rect, Result, ScreenBuffer, Size,
};

const DEFAULT_CONFIG: &str = "tessera.toml";
const LOG_ENV: &str = "TESSERA_LOG";

// ─── Settings ───────────────────────────────────────────────────────────────

/// The whole config file: `[driver]` and `[palette]` tables, both optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    driver: DriverConfig,
    palette: QuantizerConfig,
}

impl Settings {
    fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
                toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?
            }
            None => Self::default(),
        };
        settings.driver.apply_env();
        Ok(settings)
    }
}

fn config_path() -> Option<PathBuf> {
    std::env::args_os().nth(1).map(PathBuf::from).or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG);
        default.exists().then_some(default)
    })
}

fn init_logging() {
    let path = std::env::temp_dir().join("tessera.log");
    let Ok(file) = File::create(&path) else {
        return;
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

// ─── Drawing ────────────────────────────────────────────────────────────────

/// Hue sweep left to right, fading to dark toward the bottom.
fn gradient(size: Size) -> Vec<Vec<Color>> {
    let w = u32::from(size.cols.max(1));
    let h = u32::from(size.rows.max(1));
    (0..h)
        .map(|y| {
            (0..w)
                .map(|x| {
                    let t = x * 255 / w;
                    let fade = 255 - y * 200 / h;
                    let ch = |v: u32| u8::try_from(v * fade / 255).unwrap_or(u8::MAX);
                    Color::new(ch(t), ch(255 - t), ch(128))
                })
                .collect()
        })
        .collect()
}

struct Demo {
    quantizer: ColorQuantizer,
    buffer: ScreenBuffer,
    status: String,
}

impl Demo {
    fn new(palette: &QuantizerConfig, size: Size) -> Self {
        Self {
            quantizer: ColorQuantizer::from_config(palette),
            buffer: ScreenBuffer::new(size.cols, size.rows),
            status: String::new(),
        }
    }

    fn resize(&mut self, size: Size) {
        self.buffer.resize(size.cols, size.rows);
    }

    fn paint(&mut self) {
        let size = self.buffer.size();
        let art = Size {
            cols: size.cols,
            rows: size.rows.saturating_sub(1),
        };
        let pixels = gradient(art);
        self.quantizer.build_palette(&pixels);

        for (y, row) in (0u16..).zip(&pixels) {
            for (x, &c) in (0u16..).zip(row) {
                let bg = self.quantizer.nearest(c).unwrap_or(c);
                self.buffer.set(x, y, Cell::new(' ', Attribute::new(Color::WHITE, bg)));
            }
        }

        let line = format!(
            " {} colors | {} | q quits, r re-queries",
            self.quantizer.palette().len(),
            self.status
        );
        let bar = Attribute::new(Color::BLACK, Color::WHITE);
        self.buffer
            .fill_rect(Rect::new(0, i32::from(art.rows), size.cols, 1), ' ', bar);
        self.buffer.move_to(0, art.rows);
        self.buffer.set_attribute(bar);
        self.buffer.add_str(&line);
    }
}

fn describe_position<W: std::io::Write>(driver: &mut AnsiDriver<W>) -> String {
    driver.cursor_position_report().map_or_else(
        || "cursor: no reply".to_owned(),
        |(x, y)| format!("cursor: {x},{y}"),
    )
}

// ─── Main loop ──────────────────────────────────────────────────────────────

fn run(settings: Settings) -> Result<()> {
    let mut driver = AnsiDriver::stdout(settings.driver)?;
    let mut demo = Demo::new(&settings.palette, driver.size());

    let (_, da1) = driver.query(AnsiRequest::device_attributes());
    let mut sixel = SixelSupport::from_response(&da1);
    if sixel.supported {
        let (_, registers) = driver.query(AnsiRequest::sixel_color_registers());
        sixel = sixel.with_color_response(&registers);
    }
    info!(
        sixel = sixel.supported,
        registers = sixel.max_palette_colors,
        "device attributes"
    );

    demo.status = format!(
        "{} | sixel {}",
        describe_position(&mut driver),
        if sixel.supported { "yes" } else { "no" }
    );
    demo.paint();
    driver.update_screen(&mut demo.buffer)?;

    loop {
        let Some(event) = driver.read_input()? else {
            continue;
        };
        match event {
            Event::Key(key) => match key.code {
                KeyCode::Char('q') | KeyCode::Escape => break,
                KeyCode::Char('r') => {
                    demo.status = describe_position(&mut driver);
                    demo.paint();
                }
                _ => {}
            },
            Event::Resize(size) => {
                demo.resize(size);
                demo.paint();
            }
            _ => {}
        }
        driver.update_screen(&mut demo.buffer)?;
    }

    Ok(())
}

fn main() {
    init_logging();

    let settings = match Settings::load(config_path().as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tessera: {e}");
            process::exit(2);
        }
    };

    // The driver is dropped inside `run`, so the terminal is restored
    // before anything is printed here.
    if let Err(e) = run(settings) {
        warn!(error = %e, "demo failed");
        eprintln!("tessera: {e}");
        process::exit(1);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_tables_are_optional() {
        let s: Settings = toml::from_str("[palette]\nmax_colors = 16\n").unwrap();
        assert_eq!(s.palette.max_colors, 16);
        assert_eq!(s.driver, DriverConfig::default());
    }

    #[test]
    fn gradient_matches_size() {
        let g = gradient(Size { cols: 7, rows: 3 });
        assert_eq!(g.len(), 3);
        assert!(g.iter().all(|row| row.len() == 7));
    }

    #[test]
    fn paint_fills_the_buffer() {
        let mut demo = Demo::new(&QuantizerConfig::default(), Size { cols: 20, rows: 4 });
        demo.status = "ok".into();
        demo.paint();
        assert!(demo.buffer.any_dirty());
        assert!(demo.buffer.row_text(3).contains("colors"));
        assert!(demo.quantizer.palette().len() <= 256);
    }
}
