//! App: terminal init, main loop, frame delta and key handling.

use crate::game::{GameEvent, GameState, PieceSource, RandomSource, ScriptedSource};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::GameConfig;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Target frame budget; event polling blocks at most this long.
const FRAME_BUDGET: Duration = Duration::from_millis(16);

/// How long the game-over notice stays on the sidebar.
const GAME_OVER_NOTICE: Duration = Duration::from_secs(2);

pub struct App {
    config: GameConfig,
    theme: Theme,
    state: GameState,
    last_frame: Instant,
    /// Rows swept most recently; drives the TachyonFX flash until it is done.
    flash_rows: Vec<usize>,
    row_flash: Option<Effect>,
    flash_process_time: Option<Instant>,
    /// When the last game-over reset happened (shows the sidebar notice).
    game_over_at: Option<Instant>,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Result<Self> {
        let state = GameState::new(Self::piece_source(&config));
        Ok(Self {
            config,
            theme,
            state,
            last_frame: Instant::now(),
            flash_rows: Vec::new(),
            row_flash: None,
            flash_process_time: None,
            game_over_at: None,
        })
    }

    /// Scripted sequence wins over a seed; otherwise OS-seeded randomness.
    fn piece_source(config: &GameConfig) -> Box<dyn PieceSource> {
        match (&config.scripted, config.seed) {
            (Some(sequence), _) => Box::new(ScriptedSource::new(sequence.clone())),
            (None, Some(seed)) => Box::new(RandomSource::seeded(seed)),
            (None, None) => Box::new(RandomSource::from_os()),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let show_game_over = self
                .game_over_at
                .is_some_and(|t| now.duration_since(t) < GAME_OVER_NOTICE);

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &self.state,
                    &self.theme,
                    f.area(),
                    &self.flash_rows,
                    &mut self.row_flash,
                    &mut self.flash_process_time,
                    now,
                    show_game_over,
                )
            })?;

            // Retire the flash once it has faded out.
            if self.row_flash.as_ref().is_some_and(|e| e.done()) {
                self.row_flash = None;
                self.flash_process_time = None;
                self.flash_rows.clear();
            }

            // Elapsed frame time drives the drop timer; while paused the core
            // ignores it and progression freezes.
            let delta = now.duration_since(self.last_frame);
            self.last_frame = now;
            self.state.update(delta);

            for game_event in self.state.take_events() {
                match game_event {
                    GameEvent::RowCleared { row } => {
                        if self.config.animation {
                            // Restart the effect so it covers this sweep's rows.
                            self.row_flash = None;
                            self.flash_process_time = None;
                            self.flash_rows.push(row);
                        }
                    }
                    GameEvent::GameOver => self.game_over_at = Some(now),
                    // The sidebar reads score/level from the state each frame.
                    GameEvent::ScoreChanged { .. } => {}
                    // No audio handle in the terminal; nothing to play/pause.
                    GameEvent::PauseToggled { .. } => {}
                }
            }

            let timeout = FRAME_BUDGET.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        // Key repeats count as presses: rapid signals are
                        // handled as fast as they arrive.
                        if key.kind == KeyEventKind::Release {
                            continue;
                        }
                        match key_to_action(key) {
                            Action::Quit => return Ok(()),
                            Action::Pause => self.state.toggle_pause(),
                            Action::MoveLeft => self.state.move_left(),
                            Action::MoveRight => self.state.move_right(),
                            Action::RotateCw => self.state.rotate_cw(),
                            Action::SoftDrop => self.state.soft_drop(),
                            Action::HardDrop => self.state.hard_drop(),
                            Action::None => {}
                        }
                    }
                }
            }
        }
    }
}
