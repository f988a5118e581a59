//! Tetratui — classic falling-block puzzle game in the terminal.

mod app;
mod game;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result, ensure};
use app::App;
use clap::{Parser, ValueEnum};
use game::PieceKind;

/// Options derived from CLI that affect game behaviour.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub seed: Option<u64>,
    pub scripted: Option<Vec<PieceKind>>,
    pub animation: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let scripted = args
        .pieces
        .as_deref()
        .map(parse_piece_letters)
        .transpose()
        .context("--pieces")?;
    let config = GameConfig {
        seed: args.seed,
        scripted,
        animation: !args.no_animation,
    };
    let mut app = App::new(config, theme)?;
    app.run()?;
    Ok(())
}

/// Classic falling-block puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "tetratui",
    version,
    about = "Classic falling-block puzzle in the terminal. Stack the pieces; clear full rows to score.",
    long_about = "Tetratui is a terminal rendition of the classic falling-block puzzle.\n\n\
        Move and rotate the falling piece; full rows are swept and scored, and the game \
        speeds up every ten lines. Topping out silently resets the board.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up        Rotate CW   Down       Soft drop\n  Enter/Space Hard drop   P          Pause      Q / Esc    Quit\n\n\
        CONTROLS (vim):\n  h/l         Move    k          Rotate CW   j          Soft drop\n\n\
        Use --theme to load a btop-style theme, --seed for a reproducible piece stream, \
        or --pieces to practise against a fixed spawn sequence."
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]=\"value\"). Uses the classic palette if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Seed for the piece spawner, for reproducible runs. Random if not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Fixed spawn sequence, e.g. "TJLO" (cycles forever). Overrides --seed.
    #[arg(long, value_name = "LETTERS")]
    pub pieces: Option<String>,

    /// Disable the row-clear flash animation.
    #[arg(long)]
    pub no_animation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

/// Parse a `--pieces` letter sequence. Unknown letters are rejected here, at
/// the boundary, so the core only ever sees valid kinds.
fn parse_piece_letters(letters: &str) -> Result<Vec<PieceKind>> {
    let letters = letters.trim();
    ensure!(!letters.is_empty(), "piece sequence is empty");
    letters
        .chars()
        .map(|c| PieceKind::try_from(c).map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_piece_letters() {
        let kinds = parse_piece_letters("tjLO").unwrap();
        assert_eq!(
            kinds,
            vec![PieceKind::T, PieceKind::J, PieceKind::L, PieceKind::O]
        );
    }

    #[test]
    fn test_parse_piece_letters_rejects_unknown() {
        assert!(parse_piece_letters("TX").is_err());
        assert!(parse_piece_letters("").is_err());
        assert!(parse_piece_letters("   ").is_err());
    }
}
