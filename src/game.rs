//! Game state: arena, falling piece, collision, rotation, row sweep, progression.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Arena size in cells. Fixed; the classic 12×20 well.
pub const ARENA_WIDTH: usize = 12;
pub const ARENA_HEIGHT: usize = 20;

/// Gravity interval at level 1; shrinks with each level down to the floor.
const INITIAL_DROP_INTERVAL: Duration = Duration::from_millis(1000);
const MIN_DROP_INTERVAL: Duration = Duration::from_millis(100);
const DROP_INTERVAL_STEP: Duration = Duration::from_millis(50);

/// Lines needed per level: level N is complete at N*10 total lines.
const LINES_PER_LEVEL: u32 = 10;

/// Base score for the first row of a sweep; doubles for each further row.
const ROW_SCORE_BASE: u32 = 10;

/// Tetromino kinds. Cell values in each shape matrix double as colour
/// indices (T=1, O=2, L=3, J=4, I=5, S=6, Z=7); 0 is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    T,
    O,
    L,
    J,
    I,
    S,
    Z,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown piece letter '{0}', expected one of T O L J I S Z")]
pub struct UnknownPieceError(pub char);

impl PieceKind {
    pub const ALL: [Self; 7] = [
        Self::T,
        Self::O,
        Self::L,
        Self::J,
        Self::I,
        Self::S,
        Self::Z,
    ];

    /// Canonical shape matrix for this kind (2×2, 3×3 or 4×4, always square).
    pub fn matrix(self) -> Matrix {
        let rows: Vec<Vec<u8>> = match self {
            Self::T => vec![vec![0, 0, 0], vec![1, 1, 1], vec![0, 1, 0]],
            Self::O => vec![vec![2, 2], vec![2, 2]],
            Self::L => vec![vec![0, 3, 0], vec![0, 3, 0], vec![0, 3, 3]],
            Self::J => vec![vec![0, 4, 0], vec![0, 4, 0], vec![4, 4, 0]],
            Self::I => vec![
                vec![0, 5, 0, 0],
                vec![0, 5, 0, 0],
                vec![0, 5, 0, 0],
                vec![0, 5, 0, 0],
            ],
            Self::S => vec![vec![0, 6, 6], vec![6, 6, 0], vec![0, 0, 0]],
            Self::Z => vec![vec![7, 7, 0], vec![0, 7, 7], vec![0, 0, 0]],
        };
        Matrix::from_rows(rows)
    }
}

impl TryFrom<char> for PieceKind {
    type Error = UnknownPieceError;

    fn try_from(letter: char) -> Result<Self, Self::Error> {
        match letter.to_ascii_uppercase() {
            'T' => Ok(Self::T),
            'O' => Ok(Self::O),
            'L' => Ok(Self::L),
            'J' => Ok(Self::J),
            'I' => Ok(Self::I),
            'S' => Ok(Self::S),
            'Z' => Ok(Self::Z),
            other => Err(UnknownPieceError(other)),
        }
    }
}

/// Rotation direction. Only clockwise is wired to input; counter-clockwise
/// exists for the wall-kick abort path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spin {
    Cw,
    Ccw,
}

impl Spin {
    fn reversed(self) -> Self {
        match self {
            Self::Cw => Self::Ccw,
            Self::Ccw => Self::Cw,
        }
    }
}

/// Rectangular grid of cells: 0 = empty, 1..=7 = colour index.
/// Rows are stored top-to-bottom; the deque makes the sweep's
/// remove-row / insert-at-top cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    width: usize,
    rows: VecDeque<Vec<u8>>,
}

impl Matrix {
    pub fn zeroed(width: usize, height: usize) -> Self {
        Self {
            width,
            rows: (0..height).map(|_| vec![0; width]).collect(),
        }
    }

    fn from_rows(rows: Vec<Vec<u8>>) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        debug_assert!(rows.iter().all(|r| r.len() == width));
        Self {
            width,
            rows: rows.into(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.rows[y][x]
    }

    #[inline]
    fn set(&mut self, x: usize, y: usize, value: u8) {
        self.rows[y][x] = value;
    }

    /// All non-empty cells as (x, y, value).
    pub fn occupied_cells(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        self.rows.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0)
                .map(move |(x, &v)| (x, y, v))
        })
    }

    /// Rotated copy. Index-mapped read from self into a fresh matrix, so the
    /// source is never aliased mid-rotation. Square matrices only.
    pub fn rotated(&self, spin: Spin) -> Self {
        let n = self.width;
        debug_assert_eq!(n, self.height(), "rotation requires a square matrix");
        let mut out = Self::zeroed(n, n);
        for y in 0..n {
            for x in 0..n {
                let value = match spin {
                    Spin::Cw => self.get(y, n - 1 - x),
                    Spin::Ccw => self.get(n - 1 - y, x),
                };
                out.set(x, y, value);
            }
        }
        out
    }

    fn row_full(&self, y: usize) -> bool {
        self.rows[y].iter().all(|&v| v != 0)
    }

    /// Remove row `y` and insert a fresh empty row at the top, keeping the
    /// total row count; everything above `y` shifts down by one.
    fn collapse_row(&mut self, y: usize) {
        let _ = self.rows.remove(y);
        self.rows.push_front(vec![0; self.width]);
    }

    fn fill_zero(&mut self) {
        for row in &mut self.rows {
            row.fill(0);
        }
    }
}

/// True if the piece matrix placed at offset (x, y) overlaps an occupied
/// arena cell or leaves the arena on any side. Off-grid coordinates are a
/// collision in their own right; nothing is ever read out of bounds.
pub fn collides(arena: &Matrix, piece: &Matrix, x: i32, y: i32) -> bool {
    for (px, py, _) in piece.occupied_cells() {
        let ax = x + px as i32;
        let ay = y + py as i32;
        if ax < 0 || ax >= arena.width() as i32 || ay < 0 || ay >= arena.height() as i32 {
            return true;
        }
        if arena.get(ax as usize, ay as usize) != 0 {
            return true;
        }
    }
    false
}

/// The falling piece: shape matrix plus its offset within the arena.
#[derive(Debug, Clone)]
pub struct Player {
    pub kind: PieceKind,
    pub matrix: Matrix,
    pub x: i32,
    pub y: i32,
}

impl Player {
    /// New piece horizontally centred at the top of the arena.
    fn spawn(kind: PieceKind) -> Self {
        let matrix = kind.matrix();
        let x = (ARENA_WIDTH / 2) as i32 - (matrix.width() / 2) as i32;
        Self {
            kind,
            matrix,
            x,
            y: 0,
        }
    }
}

/// Score, level and speed. Reset wholesale on game over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub score: u32,
    pub level: u32,
    pub lines_cleared: u32,
    pub drop_interval: Duration,
}

impl Progress {
    fn new() -> Self {
        Self {
            score: 0,
            level: 1,
            lines_cleared: 0,
            drop_interval: INITIAL_DROP_INTERVAL,
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

/// Discrete notifications for the presentation layer, drained per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Score/level display hook; fired once per cleared row and after the
    /// game-over reset.
    ScoreChanged { score: u32, level: u32 },
    /// Arena row index that was just swept (pre-shift), for the renderer flash.
    RowCleared { row: usize },
    /// A freshly spawned piece collided: the arena and progress were reset.
    GameOver,
    /// Pause flag flipped; an audio adapter may play/pause on this.
    PauseToggled { paused: bool },
}

/// Supplies the next piece kind on each spawn.
pub trait PieceSource: fmt::Debug {
    fn next_piece(&mut self) -> PieceKind;
}

/// Uniform independent draw per spawn (no bag).
#[derive(Debug)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PieceSource for RandomSource {
    fn next_piece(&mut self) -> PieceKind {
        use rand::Rng as _;
        PieceKind::ALL[self.rng.random_range(0..PieceKind::ALL.len())]
    }
}

/// Cycles a fixed sequence forever. Used by `--pieces` and tests.
#[derive(Debug)]
pub struct ScriptedSource {
    sequence: Vec<PieceKind>,
    next: usize,
}

impl ScriptedSource {
    /// The sequence must be non-empty; the CLI boundary enforces this.
    pub fn new(sequence: Vec<PieceKind>) -> Self {
        debug_assert!(!sequence.is_empty());
        Self { sequence, next: 0 }
    }
}

impl PieceSource for ScriptedSource {
    fn next_piece(&mut self) -> PieceKind {
        let kind = self.sequence[self.next % self.sequence.len()];
        self.next += 1;
        kind
    }
}

/// The whole game: arena, falling piece, progression, pause flag and the
/// pending event queue. All rules run through the methods here; there is no
/// other mutable game state anywhere.
#[derive(Debug)]
pub struct GameState {
    arena: Matrix,
    player: Player,
    progress: Progress,
    source: Box<dyn PieceSource>,
    drop_counter: Duration,
    paused: bool,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(mut source: Box<dyn PieceSource>) -> Self {
        let player = Player::spawn(source.next_piece());
        Self {
            arena: Matrix::zeroed(ARENA_WIDTH, ARENA_HEIGHT),
            player,
            progress: Progress::new(),
            source,
            drop_counter: Duration::ZERO,
            paused: false,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn arena(&self) -> &Matrix {
        &self.arena
    }

    #[inline]
    pub fn player(&self) -> &Player {
        &self.player
    }

    #[inline]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Drain pending events, oldest first.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advance the drop timer by the elapsed frame time. While paused the
    /// counter does not accumulate, freezing progression.
    pub fn update(&mut self, delta: Duration) {
        if self.paused {
            return;
        }
        self.drop_counter += delta;
        if self.drop_counter > self.progress.drop_interval {
            self.gravity_step();
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.events.push(GameEvent::PauseToggled {
            paused: self.paused,
        });
    }

    pub fn move_left(&mut self) {
        self.shift_player(-1);
    }

    pub fn move_right(&mut self) {
        self.shift_player(1);
    }

    fn shift_player(&mut self, dx: i32) {
        self.player.x += dx;
        if self.player_collides() {
            self.player.x -= dx;
        }
    }

    /// Single-row drop; locks the piece when the row below is taken.
    pub fn soft_drop(&mut self) {
        self.gravity_step();
    }

    /// Drop straight to the floor and lock immediately.
    pub fn hard_drop(&mut self) {
        while !self.player_collides() {
            self.player.y += 1;
        }
        self.player.y -= 1;
        self.lock_player();
        self.drop_counter = Duration::ZERO;
    }

    /// Clockwise rotation with wall kicks (the only rotation exposed to input).
    pub fn rotate_cw(&mut self) {
        self.rotate_player(Spin::Cw);
    }

    /// Rotate the piece, then hunt for a fitting horizontal position with an
    /// alternating, growing kick sequence (+1, -2, +3, -4, ...). Once the
    /// offset magnitude exceeds the piece width, give up: un-rotate and
    /// restore the original column, leaving the piece exactly as it was.
    fn rotate_player(&mut self, spin: Spin) {
        let original_x = self.player.x;
        self.player.matrix = self.player.matrix.rotated(spin);
        let width = self.player.matrix.width() as i32;
        let mut offset = 1;
        while self.player_collides() {
            self.player.x += offset;
            offset = -(offset + offset.signum());
            if offset.abs() > width {
                self.player.matrix = self.player.matrix.rotated(spin.reversed());
                self.player.x = original_x;
                return;
            }
        }
    }

    fn player_collides(&self) -> bool {
        collides(
            &self.arena,
            &self.player.matrix,
            self.player.x,
            self.player.y,
        )
    }

    fn gravity_step(&mut self) {
        self.player.y += 1;
        if self.player_collides() {
            self.player.y -= 1;
            self.lock_player();
        }
        self.drop_counter = Duration::ZERO;
    }

    /// Lock sequence: merge, spawn the replacement, then sweep. Spawn comes
    /// before the sweep, so a top-out resets the board before any rows from
    /// the final piece are scored.
    fn lock_player(&mut self) {
        self.merge_player();
        self.spawn_player();
        self.sweep();
    }

    /// Write the piece's cells into the arena. The caller has already
    /// confirmed the position is collision-free.
    fn merge_player(&mut self) {
        for (px, py, value) in self.player.matrix.occupied_cells() {
            let ax = (self.player.x + px as i32) as usize;
            let ay = (self.player.y + py as i32) as usize;
            self.arena.set(ax, ay, value);
        }
    }

    /// Next piece from the source, centred at the top. If it collides right
    /// away the stack has reached the spawn point: clear the arena, reset
    /// progression, and report the game over.
    fn spawn_player(&mut self) {
        self.player = Player::spawn(self.source.next_piece());
        if self.player_collides() {
            self.arena.fill_zero();
            self.progress = Progress::new();
            self.events.push(GameEvent::GameOver);
            self.events.push(GameEvent::ScoreChanged {
                score: self.progress.score,
                level: self.progress.level,
            });
        }
    }

    /// Sweep complete rows bottom-to-top. Each cleared row scores double the
    /// previous one within the same pass (10, 20, 40, 80) and advances the
    /// line counter; crossing level*10 lines bumps the level and tightens
    /// the drop interval by 50 ms down to the 100 ms floor.
    fn sweep(&mut self) {
        let mut row_score = ROW_SCORE_BASE;
        let mut y = ARENA_HEIGHT - 1;
        loop {
            if self.arena.row_full(y) {
                self.arena.collapse_row(y);
                self.progress.score += row_score;
                row_score *= 2;
                self.progress.lines_cleared += 1;
                if self.progress.lines_cleared >= self.progress.level * LINES_PER_LEVEL {
                    self.progress.level += 1;
                    self.progress.drop_interval = MIN_DROP_INTERVAL
                        .max(self.progress.drop_interval.saturating_sub(DROP_INTERVAL_STEP));
                }
                self.events.push(GameEvent::RowCleared { row: y });
                self.events.push(GameEvent::ScoreChanged {
                    score: self.progress.score,
                    level: self.progress.level,
                });
                // Content shifted down into this index; examine it again.
            } else if y == 0 {
                break;
            } else {
                y -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(kinds: &[PieceKind]) -> GameState {
        GameState::new(Box::new(ScriptedSource::new(kinds.to_vec())))
    }

    /// Fill a whole arena row with the given value.
    fn fill_row(state: &mut GameState, y: usize, value: u8) {
        for x in 0..ARENA_WIDTH {
            state.arena.set(x, y, value);
        }
    }

    #[test]
    fn test_in_bounds_placement_is_free() {
        let arena = Matrix::zeroed(ARENA_WIDTH, ARENA_HEIGHT);
        for kind in PieceKind::ALL {
            let piece = kind.matrix();
            assert!(!collides(&arena, &piece, 4, 4), "{kind:?} should fit");
        }
    }

    #[test]
    fn test_out_of_bounds_collides_on_every_side() {
        let arena = Matrix::zeroed(ARENA_WIDTH, ARENA_HEIGHT);
        // O is fully occupied 2×2: easiest to reason about edges.
        let piece = PieceKind::O.matrix();
        assert!(collides(&arena, &piece, -1, 0), "left");
        assert!(collides(&arena, &piece, ARENA_WIDTH as i32 - 1, 0), "right");
        assert!(
            collides(&arena, &piece, 0, ARENA_HEIGHT as i32 - 1),
            "bottom"
        );
        assert!(collides(&arena, &piece, 0, -1), "top");
        // Positions touching the walls are fine.
        assert!(!collides(&arena, &piece, 0, 0));
        assert!(!collides(
            &arena,
            &piece,
            ARENA_WIDTH as i32 - 2,
            ARENA_HEIGHT as i32 - 2
        ));
    }

    #[test]
    fn test_occupied_cell_collides() {
        let mut arena = Matrix::zeroed(ARENA_WIDTH, ARENA_HEIGHT);
        arena.set(5, 10, 3);
        let piece = PieceKind::O.matrix();
        assert!(collides(&arena, &piece, 5, 10));
        assert!(collides(&arena, &piece, 4, 9));
        assert!(!collides(&arena, &piece, 6, 10));
    }

    #[test]
    fn test_empty_piece_cells_do_not_collide() {
        let mut arena = Matrix::zeroed(ARENA_WIDTH, ARENA_HEIGHT);
        // T's top row is all zeros; a block behind it must not count.
        arena.set(5, 0, 1);
        let piece = PieceKind::T.matrix();
        assert!(!collides(&arena, &piece, 5, 0));
    }

    #[test]
    fn test_four_rotations_are_identity() {
        for kind in PieceKind::ALL {
            for spin in [Spin::Cw, Spin::Ccw] {
                let original = kind.matrix();
                let mut m = original.clone();
                for _ in 0..4 {
                    m = m.rotated(spin);
                }
                assert_eq!(m, original, "{kind:?} {spin:?}");
            }
        }
    }

    #[test]
    fn test_cw_then_ccw_is_identity() {
        for kind in PieceKind::ALL {
            let original = kind.matrix();
            assert_eq!(original.rotated(Spin::Cw).rotated(Spin::Ccw), original);
        }
    }

    #[test]
    fn test_rotation_maps_t_shape() {
        let m = PieceKind::T.matrix().rotated(Spin::Cw);
        let rows: Vec<Vec<u8>> = (0..3)
            .map(|y| (0..3).map(|x| m.get(x, y)).collect())
            .collect();
        assert_eq!(rows, vec![vec![0, 1, 0], vec![1, 1, 0], vec![0, 1, 0]]);
    }

    #[test]
    fn test_sweep_single_bottom_row() {
        let mut state = scripted(&[PieceKind::T]);
        fill_row(&mut state, ARENA_HEIGHT - 1, 7);
        // A marker above the full row must shift down with it.
        state.arena.set(3, ARENA_HEIGHT - 2, 4);
        state.sweep();

        assert_eq!(state.progress.score, 10);
        assert_eq!(state.progress.lines_cleared, 1);
        assert_eq!(state.arena.get(3, ARENA_HEIGHT - 1), 4);
        assert_eq!(state.arena.get(3, ARENA_HEIGHT - 2), 0);
        for x in 0..ARENA_WIDTH {
            assert_eq!(state.arena.get(x, 0), 0);
            if x != 3 {
                assert_eq!(state.arena.get(x, ARENA_HEIGHT - 1), 0);
            }
        }
    }

    #[test]
    fn test_sweep_doubles_score_per_row() {
        for (rows, expected) in [(1, 10), (2, 30), (3, 70), (4, 150)] {
            let mut state = scripted(&[PieceKind::T]);
            for i in 0..rows {
                fill_row(&mut state, ARENA_HEIGHT - 1 - i, 5);
            }
            state.sweep();
            assert_eq!(state.progress.score, expected, "{rows} rows");
            assert_eq!(state.progress.lines_cleared, rows as u32);
        }
    }

    #[test]
    fn test_sweep_skips_partial_rows() {
        let mut state = scripted(&[PieceKind::T]);
        fill_row(&mut state, ARENA_HEIGHT - 1, 2);
        state.arena.set(0, ARENA_HEIGHT - 1, 0);
        state.sweep();
        assert_eq!(state.progress.score, 0);
        assert_eq!(state.progress.lines_cleared, 0);
        assert_eq!(state.arena.get(1, ARENA_HEIGHT - 1), 2);
    }

    #[test]
    fn test_sweep_emits_display_events_per_row() {
        let mut state = scripted(&[PieceKind::T]);
        fill_row(&mut state, ARENA_HEIGHT - 1, 1);
        fill_row(&mut state, ARENA_HEIGHT - 2, 1);
        state.sweep();

        let events = state.take_events();
        let rows = events
            .iter()
            .filter(|e| matches!(e, GameEvent::RowCleared { .. }))
            .count();
        assert_eq!(rows, 2);
        let scores: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::ScoreChanged { score, .. } => Some(*score),
                _ => None,
            })
            .collect();
        assert_eq!(scores, vec![10, 30]);
    }

    #[test]
    fn test_level_up_at_ten_lines() {
        let mut state = scripted(&[PieceKind::T]);
        state.progress.lines_cleared = 9;
        fill_row(&mut state, ARENA_HEIGHT - 1, 6);
        state.sweep();

        assert_eq!(state.progress.lines_cleared, 10);
        assert_eq!(state.progress.level, 2);
        assert_eq!(state.progress.drop_interval, Duration::from_millis(950));
    }

    #[test]
    fn test_level_up_happens_once_per_threshold() {
        let mut state = scripted(&[PieceKind::T]);
        state.progress.lines_cleared = 10;
        state.progress.level = 2;
        fill_row(&mut state, ARENA_HEIGHT - 1, 6);
        state.sweep();
        // 11 lines is short of level 2's threshold of 20.
        assert_eq!(state.progress.level, 2);
    }

    #[test]
    fn test_drop_interval_floors_at_100ms() {
        let mut state = scripted(&[PieceKind::T]);
        state.progress.lines_cleared = 9;
        state.progress.drop_interval = Duration::from_millis(120);
        fill_row(&mut state, ARENA_HEIGHT - 1, 6);
        state.sweep();
        assert_eq!(state.progress.drop_interval, MIN_DROP_INTERVAL);

        state.progress.lines_cleared = 19;
        state.progress.level = 2;
        fill_row(&mut state, ARENA_HEIGHT - 1, 6);
        state.sweep();
        assert_eq!(state.progress.drop_interval, MIN_DROP_INTERVAL);
    }

    #[test]
    fn test_spawn_centres_each_kind() {
        // arenaWidth/2 - pieceWidth/2, integer division.
        assert_eq!(Player::spawn(PieceKind::T).x, 5);
        assert_eq!(Player::spawn(PieceKind::O).x, 5);
        assert_eq!(Player::spawn(PieceKind::I).x, 4);
        assert_eq!(Player::spawn(PieceKind::T).y, 0);
    }

    #[test]
    fn test_move_reverts_at_walls() {
        let mut state = scripted(&[PieceKind::O]);
        for _ in 0..ARENA_WIDTH {
            state.move_left();
        }
        assert_eq!(state.player.x, 0);
        for _ in 0..ARENA_WIDTH {
            state.move_right();
        }
        assert_eq!(state.player.x, (ARENA_WIDTH - 2) as i32);
    }

    #[test]
    fn test_move_reverts_on_stack() {
        let mut state = scripted(&[PieceKind::O]);
        // Wall of blocks directly left of the spawn column.
        for y in 0..ARENA_HEIGHT {
            state.arena.set(4, y, 1);
        }
        state.move_left();
        assert_eq!(state.player.x, 5);
    }

    #[test]
    fn test_hard_drop_of_o_piece_fills_bottom_corner() {
        let mut state = scripted(&[PieceKind::O, PieceKind::T]);
        assert_eq!(state.player.x, 5);
        state.hard_drop();

        for y in [ARENA_HEIGHT - 2, ARENA_HEIGHT - 1] {
            for x in [5, 6] {
                assert_eq!(state.arena.get(x, y), 2);
            }
        }
        assert_eq!(state.arena.occupied_cells().count(), 4);
        // Replacement piece is live at the top.
        assert_eq!(state.player.kind, PieceKind::T);
        assert_eq!(state.player.y, 0);
    }

    #[test]
    fn test_i_piece_completes_and_sweeps_row() {
        let mut state = scripted(&[PieceKind::I, PieceKind::T]);
        fill_row(&mut state, ARENA_HEIGHT - 1, 3);
        state.arena.set(0, ARENA_HEIGHT - 1, 0);

        // I occupies local column 1; shift so it drops down arena column 0.
        state.player.x = -1;
        state.hard_drop();

        assert_eq!(state.progress.score, 10);
        assert_eq!(state.progress.lines_cleared, 1);
        // Three I cells remain in column 0, shifted down one row by the sweep.
        assert_eq!(state.arena.get(0, ARENA_HEIGHT - 1), 5);
        assert_eq!(state.arena.get(0, ARENA_HEIGHT - 2), 5);
        assert_eq!(state.arena.get(0, ARENA_HEIGHT - 3), 5);
        assert_eq!(state.arena.get(0, ARENA_HEIGHT - 4), 0);
        // The completed row's filler is gone.
        assert_eq!(state.arena.get(1, ARENA_HEIGHT - 1), 0);
    }

    #[test]
    fn test_soft_drop_descends_and_locks() {
        let mut state = scripted(&[PieceKind::O, PieceKind::T]);
        state.soft_drop();
        assert_eq!(state.player.y, 1);
        for _ in 0..ARENA_HEIGHT {
            state.soft_drop();
        }
        assert_eq!(state.player.kind, PieceKind::T);
        assert_eq!(state.arena.get(5, ARENA_HEIGHT - 1), 2);
    }

    #[test]
    fn test_gravity_advances_once_per_interval() {
        let mut state = scripted(&[PieceKind::O]);
        state.update(Duration::from_millis(500));
        assert_eq!(state.player.y, 0);
        state.update(Duration::from_millis(501));
        assert_eq!(state.player.y, 1);
        // Counter was zeroed; another partial interval does nothing.
        state.update(Duration::from_millis(500));
        assert_eq!(state.player.y, 1);
    }

    #[test]
    fn test_pause_freezes_drop_accumulation() {
        let mut state = scripted(&[PieceKind::O]);
        state.toggle_pause();
        assert!(state.is_paused());
        state.update(Duration::from_secs(5));
        assert_eq!(state.player.y, 0);

        state.toggle_pause();
        assert!(!state.is_paused());
        state.update(Duration::from_millis(1001));
        assert_eq!(state.player.y, 1);

        let toggles: Vec<_> = state
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::PauseToggled { .. }))
            .collect();
        assert_eq!(
            toggles,
            vec![
                GameEvent::PauseToggled { paused: true },
                GameEvent::PauseToggled { paused: false },
            ]
        );
    }

    #[test]
    fn test_rotation_kicks_off_the_wall() {
        let mut state = scripted(&[PieceKind::I]);
        // Vertical I hugging the left wall: occupied column is local x=1.
        state.player.x = -1;
        state.player.y = 5;
        state.rotate_cw();
        // Rotated I lies along a full local row; the kick must leave it
        // entirely inside the arena.
        for (px, py, _) in state.player.matrix.occupied_cells() {
            let ax = state.player.x + px as i32;
            let ay = state.player.y + py as i32;
            assert!(ax >= 0 && ax < ARENA_WIDTH as i32, "x {ax}");
            assert!(ay >= 0 && ay < ARENA_HEIGHT as i32, "y {ay}");
        }
    }

    #[test]
    fn test_failed_rotation_leaves_piece_untouched() {
        let mut state = scripted(&[PieceKind::T]);
        // Pack every cell except the piece's own footprint.
        for y in 0..ARENA_HEIGHT {
            for x in 0..ARENA_WIDTH {
                state.arena.set(x, y, 1);
            }
        }
        for (px, py, _) in state.player.matrix.clone().occupied_cells() {
            let ax = (state.player.x + px as i32) as usize;
            let ay = (state.player.y + py as i32) as usize;
            state.arena.set(ax, ay, 0);
        }
        let before_matrix = state.player.matrix.clone();
        let before_x = state.player.x;

        state.rotate_cw();

        assert_eq!(state.player.matrix, before_matrix);
        assert_eq!(state.player.x, before_x);
    }

    #[test]
    fn test_spawn_collision_resets_game() {
        let mut state = scripted(&[PieceKind::O, PieceKind::O]);
        state.progress.score = 420;
        state.progress.level = 3;
        state.progress.lines_cleared = 23;
        state.progress.drop_interval = Duration::from_millis(900);
        // Block the spawn cells for the next O.
        state.arena.set(5, 0, 1);
        state.arena.set(6, 1, 1);

        state.spawn_player();

        assert_eq!(state.progress, Progress::default());
        assert_eq!(state.arena.occupied_cells().count(), 0);
        let events = state.take_events();
        assert!(events.contains(&GameEvent::GameOver));
        assert!(events.contains(&GameEvent::ScoreChanged { score: 0, level: 1 }));
    }

    #[test]
    fn test_top_out_resets_before_sweep_scores() {
        // Lock a piece that both blocks the next spawn and completes the
        // bottom row: the reset runs first, so the row is never scored.
        let mut state = scripted(&[PieceKind::O, PieceKind::O]);
        fill_row(&mut state, ARENA_HEIGHT - 1, 3);
        // Columns 5/6 stacked to the top force the O to lock at the spawn rows.
        for y in 2..ARENA_HEIGHT - 1 {
            state.arena.set(5, y, 3);
            state.arena.set(6, y, 3);
        }
        state.hard_drop();

        assert_eq!(state.progress.score, 0);
        assert_eq!(state.arena.occupied_cells().count(), 0);
        assert!(state.take_events().contains(&GameEvent::GameOver));
    }

    #[test]
    fn test_piece_letters_parse() {
        assert_eq!(PieceKind::try_from('T'), Ok(PieceKind::T));
        assert_eq!(PieceKind::try_from('z'), Ok(PieceKind::Z));
        assert_eq!(PieceKind::try_from('X'), Err(UnknownPieceError('X')));
    }

    #[test]
    fn test_scripted_source_cycles() {
        let mut source = ScriptedSource::new(vec![PieceKind::I, PieceKind::O]);
        let drawn: Vec<_> = (0..5).map(|_| source.next_piece()).collect();
        assert_eq!(
            drawn,
            vec![
                PieceKind::I,
                PieceKind::O,
                PieceKind::I,
                PieceKind::O,
                PieceKind::I,
            ]
        );
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let mut a = RandomSource::seeded(7);
        let mut b = RandomSource::seeded(7);
        for _ in 0..32 {
            assert_eq!(a.next_piece(), b.next_piece());
        }
    }

    #[test]
    fn test_shapes_are_square_with_kind_colours() {
        for (kind, value) in PieceKind::ALL.iter().zip(1u8..=7) {
            let m = kind.matrix();
            assert_eq!(m.width(), m.height(), "{kind:?}");
            assert!(m.occupied_cells().all(|(_, _, v)| v == value), "{kind:?}");
            assert_eq!(m.occupied_cells().count(), 4, "{kind:?}");
        }
    }
}
