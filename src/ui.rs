//! Layout and drawing: playfield, sidebar, pause overlay, row-clear flash.

use crate::game::{ARENA_HEIGHT, ARENA_WIDTH, GameState};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal columns per arena cell (cells are roughly square this way).
const CELL_WIDTH: u16 = 2;

const SIDEBAR_WIDTH: u16 = 22;

/// Duration of the row-clear flash (TachyonFX fade).
const ROW_FLASH_MS: u32 = 350;

/// Playfield size in terminal cells, border included.
fn playfield_pixel_size() -> (u16, u16) {
    (
        ARENA_WIDTH as u16 * CELL_WIDTH + 2,
        ARENA_HEIGHT as u16 + 2,
    )
}

/// Board rect without the border, given the playfield outer rect.
fn board_inner(playfield: Rect) -> Rect {
    Rect {
        x: playfield.x + 1,
        y: playfield.y + 1,
        width: (ARENA_WIDTH as u16 * CELL_WIDTH).min(playfield.width.saturating_sub(2)),
        height: (ARENA_HEIGHT as u16).min(playfield.height.saturating_sub(2)),
    }
}

/// Draw the game: centred playfield + sidebar, then overlays (pause, flash).
/// `flash_rows` are freshly swept arena rows; the fade effect in `row_flash`
/// is created on first sight of them and processed each frame until done.
pub fn draw(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    area: Rect,
    flash_rows: &[usize],
    row_flash: &mut Option<Effect>,
    flash_process_time: &mut Option<Instant>,
    now: Instant,
    show_game_over: bool,
) {
    let (pw, ph) = playfield_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;

    // Center horizontally
    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);

    // Center vertically
    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);

    let active_area = vert_chunks[1];

    let (playfield_area, sidebar_area) = {
        let inner = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
            .split(active_area);
        (inner[0], inner[1])
    };

    draw_playfield(frame, state, theme, playfield_area);
    draw_sidebar(frame, state, theme, sidebar_area, show_game_over);

    if !flash_rows.is_empty() {
        apply_row_flash(
            frame,
            board_inner(playfield_area),
            flash_rows,
            row_flash,
            flash_process_time,
            now,
        );
    }

    if state.is_paused() {
        draw_pause_overlay(frame, theme, area);
    }
}

fn draw_playfield(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" tetratui ", theme.title));
    block.render(area, frame.buffer_mut());
    let board = board_inner(area);

    let buf = frame.buffer_mut();

    // Settled arena cells; value 0 is background.
    for y in 0..ARENA_HEIGHT {
        for x in 0..ARENA_WIDTH {
            let value = state.arena().get(x, y);
            let color = if value == 0 {
                theme.bg
            } else {
                theme.piece_color(value)
            };
            paint_cell(buf, board, x as u16, y as u16, color);
        }
    }

    // Falling piece on top.
    let player = state.player();
    for (px, py, value) in player.matrix.occupied_cells() {
        let ax = player.x + px as i32;
        let ay = player.y + py as i32;
        if ax >= 0 && ay >= 0 {
            paint_cell(buf, board, ax as u16, ay as u16, theme.piece_color(value));
        }
    }
}

/// Paint one arena cell as CELL_WIDTH background-coloured columns.
fn paint_cell(
    buf: &mut ratatui::buffer::Buffer,
    board: Rect,
    cell_x: u16,
    cell_y: u16,
    color: Color,
) {
    let ry = board.y + cell_y;
    if ry >= board.y + board.height {
        return;
    }
    for dx in 0..CELL_WIDTH {
        let rx = board.x + cell_x * CELL_WIDTH + dx;
        if rx < board.x + board.width {
            buf[(rx, ry)].set_symbol(" ").set_style(Style::default().bg(color));
        }
    }
}

/// Build set of buffer (x, y) positions covered by the given arena rows.
fn flash_buffer_positions(board: Rect, rows: &[usize]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &row in rows {
        let ry = board.y + row as u16;
        if ry >= board.y + board.height {
            continue;
        }
        for rx in board.x..board.x + board.width {
            set.insert((rx, ry));
        }
    }
    set
}

/// Create or update the row-clear flash and process it (TachyonFX: swept rows
/// start white and fade back to the board over ROW_FLASH_MS).
fn apply_row_flash(
    frame: &mut Frame,
    board: Rect,
    rows: &[usize],
    row_flash: &mut Option<Effect>,
    flash_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let delta = flash_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *flash_process_time = Some(now);

    if row_flash.is_none() {
        let flash_set = flash_buffer_positions(board, rows);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            flash_set.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_from(Color::White, Color::White, (ROW_FLASH_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        *row_flash = Some(effect);
    }

    if let Some(effect) = row_flash {
        frame.render_effect(effect, board, tfx_delta);
    }
}

fn draw_sidebar(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    area: Rect,
    show_game_over: bool,
) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Stats (border + score, level, lines, speed)
            Constraint::Length(1), // gap
            Constraint::Length(9), // Controls
            Constraint::Length(1), // gap
            Constraint::Length(3), // Game-over notice
        ])
        .split(area);

    // --- Stats ---
    let progress = state.progress();
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Stats ", title_style));
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let stats_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(1)])
        .split(stats_inner);
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(progress.score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Level: ", title_style),
            Span::styled(progress.level.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Lines: ", title_style),
            Span::styled(progress.lines_cleared.to_string(), fg_style),
        ]),
    ];
    Paragraph::new(ratatui::text::Text::from(stats_lines))
        .render(stats_layout[0], frame.buffer_mut());

    // Speed bar: full when the drop interval has shrunk to its floor.
    let interval_ms = progress.drop_interval.as_millis() as f64;
    let ratio = ((1000.0 - interval_ms) / 900.0).clamp(0.0, 1.0);
    Gauge::default()
        .gauge_style(Style::default().fg(theme.title).bg(theme.bg))
        .ratio(ratio)
        .label(format!("{} ms", progress.drop_interval.as_millis()))
        .render(stats_layout[1], frame.buffer_mut());

    // --- Controls ---
    let controls_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Keys ", title_style));
    let controls_inner = controls_block.inner(chunks[2]);
    controls_block.render(chunks[2], frame.buffer_mut());
    let controls = vec![
        Line::from(Span::styled("←/→  move", fg_style)),
        Line::from(Span::styled("↑    rotate", fg_style)),
        Line::from(Span::styled("↓    soft drop", fg_style)),
        Line::from(Span::styled("Spc  hard drop", fg_style)),
        Line::from(Span::styled("P    pause", fg_style)),
        Line::from(Span::styled("Q    quit", fg_style)),
    ];
    Paragraph::new(ratatui::text::Text::from(controls))
        .render(controls_inner, frame.buffer_mut());

    // --- Game over notice (transient; the board has already reset) ---
    if show_game_over {
        let notice = Paragraph::new(vec![
            Line::from(Span::styled(
                " GAME OVER ",
                Style::default().fg(Color::White).bg(Color::Red),
            )),
            Line::from(Span::styled("board reset", fg_style)),
        ])
        .alignment(Alignment::Center);
        notice.render(chunks[4], frame.buffer_mut());
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}
