//! Pente engine CLI
//!
//! Analyze positions, let the engine play itself, or run the demo
//! scenarios that exercise the engine's tactical priorities.

use std::error::Error;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pente::{Engine, GameState, Player, Pos, SearchOptions, SearchResult, Searcher};

#[derive(Parser)]
#[command(name = "pente", version, about = "Pente AI engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search a serialized position and print the top variations
    Analyze {
        /// Position string, e.g. "19~9.9|9.10|6.6"
        position: String,
        #[arg(short, long, default_value_t = 6)]
        depth: u32,
        /// Number of variations to report
        #[arg(short = 'n', long, default_value_t = 3)]
        variations: usize,
        /// Time limit in milliseconds
        #[arg(short, long)]
        time_ms: Option<u64>,
        /// Report evaluations from the first player's perspective
        #[arg(long)]
        absolute: bool,
        /// Emit the results as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Engine plays itself from the empty board
    Selfplay {
        #[arg(short, long, default_value_t = 4)]
        depth: u32,
        /// Time limit per move in milliseconds
        #[arg(short, long)]
        time_ms: Option<u64>,
        /// Stop after this many moves even if the game is not over
        #[arg(short, long, default_value_t = 80)]
        max_moves: u32,
        #[arg(long, default_value_t = 19)]
        size: usize,
    },
    /// Run a few scripted scenarios showing the engine's priorities
    Demo,
    /// Print the feature values the evaluator sees for a position, as JSON
    Features {
        /// Position string, e.g. "19~9.9|9.10|6.6"
        position: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Analyze {
            position,
            depth,
            variations,
            time_ms,
            absolute,
            json,
        } => analyze(&position, depth, variations, time_ms, absolute, json),
        Command::Selfplay {
            depth,
            time_ms,
            max_moves,
            size,
        } => selfplay(depth, time_ms, max_moves, size),
        Command::Demo => {
            demo();
            Ok(())
        }
        Command::Features { position } => features(&position),
    }
}

fn analyze(
    position: &str,
    depth: u32,
    variations: usize,
    time_ms: Option<u64>,
    absolute: bool,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let game: GameState = position.parse()?;
    let options = SearchOptions {
        max_depth: depth,
        time_limit: time_ms.map(Duration::from_millis),
        n_variations: variations,
        absolute_eval: absolute,
        ..SearchOptions::default()
    };

    let mut searcher = Searcher::new();
    let size = game.size();
    let mut on_depth = |results: &[SearchResult]| {
        if let Some(top) = results.first() {
            eprintln!("  ... {} {}", top.eval, variation_text(top, size));
        }
    };
    let results = searcher.find_best_moves(&game, &options, Some(&mut on_depth));

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("{}", render_board(&game));
    println!(
        "{:?} to move, captures {}:{}",
        game.current_player(),
        game.captures(Player::Black),
        game.captures(Player::White),
    );
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} [{:?}] {}",
            i + 1,
            result.eval,
            result.eval_flag,
            variation_text(result, size),
        );
    }
    let stats = searcher.stats();
    println!(
        "nodes {} / tt hits {} / avg branch {:.1}",
        stats.nodes_visited,
        stats.tt_hits,
        stats.average_moves_generated(),
    );
    Ok(())
}

fn selfplay(
    depth: u32,
    time_ms: Option<u64>,
    max_moves: u32,
    size: usize,
) -> Result<(), Box<dyn Error>> {
    let mut game = GameState::new(size);
    let mut engine = Engine::new();
    let time_limit = time_ms.map(Duration::from_millis);

    while !game.is_over() && game.n_moves() < max_moves {
        let mover = game.current_player();
        let Some(pos) = engine.choose_move(&game, depth, time_limit) else {
            break;
        };
        if !game.make_move(pos.row as usize, pos.col as usize) {
            return Err(format!("engine chose illegal move {pos}").into());
        }
        println!(
            "{:3}. {:?} {}",
            game.n_moves(),
            mover,
            pos.to_standard_coords(size)
        );
    }

    println!("{}", render_board(&game));
    if game.is_over() {
        // the winner made the last move
        println!("winner: {:?}", game.current_player().opponent());
    } else {
        println!("stopped after {} moves", game.n_moves());
    }
    println!("position: {game}");
    Ok(())
}

fn features(position: &str) -> Result<(), Box<dyn Error>> {
    let game: GameState = position.parse()?;
    let dict = pente::position_feature_dict(&game);
    println!("{}", serde_json::to_string_pretty(&dict)?);
    Ok(())
}

fn demo() {
    println!("--- Empty board: open with the center ---");
    demo_search(&GameState::new(19), 2, Some(Pos::new(9, 9)));

    println!("\n--- Complete a pente ---");
    let mut game = GameState::new(19);
    for &(r, c) in &[
        (9, 9),
        (0, 0),
        (9, 10),
        (0, 2),
        (9, 11),
        (0, 4),
        (9, 12),
        (9, 8),
    ] {
        game.make_move(r, c);
    }
    demo_search(&game, 2, Some(Pos::new(9, 13)));

    println!("\n--- Defend against a pente threat ---");
    let mut game = GameState::new(19);
    for &(r, c) in &[(9, 9), (12, 12), (9, 10), (12, 13), (9, 11), (5, 5), (9, 12)] {
        game.make_move(r, c);
    }
    demo_search(&game, 2, None);
}

fn demo_search(game: &GameState, depth: u32, expected: Option<Pos>) {
    let mut searcher = Searcher::new();
    let options = SearchOptions {
        max_depth: depth,
        ..SearchOptions::default()
    };
    let results = searcher.find_best_moves(game, &options, None);
    match results.first().and_then(SearchResult::best_move) {
        Some(pos) => {
            println!("  engine plays {}", pos.to_standard_coords(game.size()));
            match expected {
                Some(want) if want == pos => println!("  expected {} - PASS", want),
                Some(want) => println!("  expected {} - DIFFERENT", want),
                None => {}
            }
        }
        None => println!("  no move found"),
    }
}

fn variation_text(result: &SearchResult, size: usize) -> String {
    result
        .best_variation
        .iter()
        .map(|p| p.to_standard_coords(size))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_board(game: &GameState) -> String {
    let size = game.size();
    let mut out = String::new();
    out.push_str("   ");
    for c in 0..size {
        out.push_str(&format!("{:2}", c));
    }
    out.push('\n');
    for r in 0..size {
        out.push_str(&format!("{:2} ", r));
        for c in 0..size {
            out.push_str(match game.get(r as i32, c as i32) {
                Some(Player::Black) => " X",
                Some(Player::White) => " O",
                None => " .",
            });
        }
        out.push('\n');
    }
    out
}
