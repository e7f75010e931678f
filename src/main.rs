mod app;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use geoworld::config::Config;
use geoworld::geo::{data, ProjectionKind};
use ratatui::DefaultTerminal;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Extruded province map with data light pillars, in the terminal
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding china.json and series.json
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// JSON file overriding colours, pillar and camera settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Map projection (overrides the config file)
    #[arg(long, value_enum)]
    projection: Option<ProjectionKind>,

    /// Write logs here; the terminal belongs to the UI
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let mut config = Config::load_or_default(args.config.as_deref());
    if let Some(projection) = args.projection {
        config.projection = projection;
    }
    let map_data = data::load_all(&args.data_dir);

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, config, &map_data);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Logging stays off without a log file
fn init_logging(path: Option<&std::path::Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Moved => app.set_mouse_pos(mouse.column, mouse.row),
        MouseEventKind::ScrollUp => app.dolly_in(),
        MouseEventKind::ScrollDown => app.dolly_out(),
        // Press and release selects, press and drag orbits
        MouseEventKind::Down(MouseButton::Left) => {
            app.set_mouse_pos(mouse.column, mouse.row);
            app.begin_drag(mouse.column, mouse.row);
        }
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, config: Config, map_data: &data::MapData) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(config, map_data, size.width as usize, size.height as usize);
    let mut last_frame = Instant::now();

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        // ~60fps
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),

                    // Orbit
                    KeyCode::Left | KeyCode::Char('h') => app.rotate(1.0, 0.0),
                    KeyCode::Right | KeyCode::Char('l') => app.rotate(-1.0, 0.0),
                    KeyCode::Up | KeyCode::Char('k') => app.rotate(0.0, 1.0),
                    KeyCode::Down | KeyCode::Char('j') => app.rotate(0.0, -1.0),

                    KeyCode::Char('+') | KeyCode::Char('=') => app.dolly_in(),
                    KeyCode::Char('-') | KeyCode::Char('_') => app.dolly_out(),

                    KeyCode::Char('L') => app.toggle_labels(),
                    KeyCode::Char('p') | KeyCode::Char('P') => app.toggle_pillars(),
                    KeyCode::Char('a') | KeyCode::Char('A') => app.toggle_animation(),
                    KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(),
                    _ => {}
                },
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        let now = Instant::now();
        app.tick(now.duration_since(last_frame).as_secs_f64());
        last_frame = now;

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
