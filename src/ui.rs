use crate::app::App;
use geoworld::braille::BrailleCanvas;
use geoworld::interaction::Tooltip;
use geoworld::render::{MapLayers, ScreenText};
use geoworld::scene::Rgb;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame,
};

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r(), rgb.g(), rgb.b())
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " 中国 ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let layers = app.layers(inner.width as usize, inner.height as usize);
    let cursor_pos = app
        .mouse_pixel_pos()
        .map(|(px, py)| ((px / 2) as u16, (py / 4) as u16))
        .filter(|&(cx, cy)| cx < inner.width && cy < inner.height);

    frame.render_widget(MapWidget { layers, cursor_pos }, inner);

    if let Some(tooltip) = app.tooltip() {
        let anchor = app
            .cell_of(tooltip.anchor, inner.width, inner.height)
            .or(cursor_pos);
        if let Some((cx, cy)) = anchor {
            render_tooltip(frame, &tooltip, inner, cx, cy);
        }
    }
}

/// Braille layers with glyphs and labels overlaid
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    fn render_layer(canvas: &BrailleCanvas, fg: Color, area: Rect, buf: &mut Buffer) {
        let rows = canvas.height().min(area.height as usize);
        let cols = canvas.width().min(area.width as usize);
        for cy in 0..rows {
            for cx in 0..cols {
                if let Some(ch) = canvas.cell(cx, cy) {
                    buf[(area.x + cx as u16, area.y + cy as u16)]
                        .set_char(ch)
                        .set_fg(fg);
                }
            }
        }
    }

    /// Text clipped to `max_width` display columns; wide glyphs take two cells
    fn render_text(text: &ScreenText, max_width: usize, area: Rect, buf: &mut Buffer) {
        if text.y >= area.height || text.x >= area.width {
            return;
        }
        let style = Style::default().fg(color(text.color));
        let room = (area.width - text.x) as usize;
        buf.set_stringn(
            area.x + text.x,
            area.y + text.y,
            &text.text,
            room.min(max_width),
            style,
        );
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front in render order
        for layer in &self.layers.layers {
            Self::render_layer(&layer.canvas, color(layer.color), area, buf);
        }

        for glyph in &self.layers.glyphs {
            Self::render_text(glyph, 1, area, buf);
        }
        for label in &self.layers.labels {
            Self::render_text(label, 24, area, buf);
        }

        if let Some((cx, cy)) = self.cursor_pos {
            buf[(area.x + cx, area.y + cy)].set_char('╋').set_fg(Color::Red);
        }
    }
}

/// Boxed tooltip beside `(cx, cy)`, flipped to stay inside `area`
fn render_tooltip(frame: &mut Frame, tooltip: &Tooltip, area: Rect, cx: u16, cy: u16) {
    let text_width = std::iter::once(&tooltip.title)
        .chain(tooltip.lines.iter())
        .map(|s| Line::from(s.as_str()).width())
        .max()
        .unwrap_or(0) as u16;
    let width = (text_width + 2).min(area.width);
    let height = (tooltip.lines.len() as u16 + 3).min(area.height);
    if width < 3 || height < 3 {
        return;
    }

    let mut x = area.x + cx + 2;
    if x + width > area.x + area.width {
        x = (area.x + cx).saturating_sub(width + 1).max(area.x);
    }
    let mut y = area.y + cy;
    if y + height > area.y + area.height {
        y = (area.y + area.height).saturating_sub(height);
    }
    let rect = Rect::new(x, y, width, height);

    let mut lines = vec![Line::from(Span::styled(
        tooltip.title.clone(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))];
    lines.extend(
        tooltip
            .lines
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::White)))),
    );

    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        ),
        rect,
    );
}

/// Key hint whose colour shows the state
fn toggle_span(on: bool, text: &'static str) -> Span<'static> {
    Span::styled(
        text,
        Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
    )
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    frame.render_widget(Paragraph::new(status_line(app)), area);
}

fn status_line(app: &App) -> Line<'static> {
    let event = app.last_event.clone().unwrap_or_default();
    let position = app
        .hover_lon_lat()
        .map(|(lon, lat)| format!(" {lon:.2}°E {lat:.2}°N "))
        .unwrap_or_else(|| " ".to_string());

    Line::from(vec![
        Span::styled(" Camera: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.camera_info(), Style::default().fg(Color::Yellow)),
        Span::styled(position, Style::default().fg(Color::White)),
        toggle_span(app.renderer.settings.show_labels, "[L]abels "),
        toggle_span(app.show_pillars, "[p]illars "),
        toggle_span(app.animator.playing, "[a]nim "),
        Span::styled("| ", Style::default().fg(Color::DarkGray)),
        Span::styled(event, Style::default().fg(Color::Cyan)),
        Span::styled(
            " | hjkl:orbit +/-:dolly r:reset q:quit",
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoworld::config::Config;
    use geoworld::geo::data::{builtin_provinces, default_series, MapData};

    fn status_text(app: &App) -> String {
        status_line(app)
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect()
    }

    #[test]
    fn test_labels_hint_names_its_key() {
        let data = MapData {
            provinces: builtin_provinces(),
            series: default_series(),
        };
        let mut app = App::new(Config::default(), &data, 82, 43);
        assert!(status_text(&app).contains("[L]abels"));
        app.toggle_labels();
        let text = status_text(&app);
        assert!(text.contains("[L]abels"));
        assert!(!text.contains("[l]abels"));
    }

    fn symbols(buf: &Buffer, y: u16, width: u16) -> Vec<String> {
        (0..width).map(|x| buf[(x, y)].symbol().to_string()).collect()
    }

    #[test]
    fn test_cjk_label_takes_two_cells_per_glyph() {
        let area = Rect::new(0, 0, 12, 2);
        let mut buf = Buffer::empty(area);
        let label = ScreenText {
            x: 1,
            y: 1,
            text: "北京 2189".to_string(),
            color: Rgb(0xffffff),
        };
        MapWidget::render_text(&label, 24, area, &mut buf);

        let row = symbols(&buf, 1, 10);
        assert_eq!(row[1], "北");
        assert_eq!(row[3], "京");
        assert_eq!(row[5..].concat(), " 2189");
    }

    #[test]
    fn test_label_clipped_at_map_edge() {
        let area = Rect::new(0, 0, 6, 1);
        let mut buf = Buffer::empty(area);
        let label = ScreenText {
            x: 3,
            y: 0,
            text: "哈尔滨 1001".to_string(),
            color: Rgb(0xffffff),
        };
        MapWidget::render_text(&label, 24, area, &mut buf);

        // Only one wide glyph fits in the three remaining columns
        let row = symbols(&buf, 0, 6);
        assert_eq!(row[3], "哈");
        assert_eq!(row[5], " ");
    }
}
