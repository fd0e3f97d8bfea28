//! `water-sort`: generate, solve, survey and play water sort levels from the terminal.
//!
//! ```text
//! $ water-sort generate --level 31 --difficulty hard --seed 4
//! level 31 (hard): 15 colors, 2 empty bottles, 1 hidden per bottle
//! ?BFC ?AKL ?GIB ... . .
//!
//! $ water-sort solve AABB BBAA .
//! 3
//!
//! $ water-sort solve --json AABB BBAA .
//! {"Known":3}
//! ```

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use water_sort_engine::{
    ActionOutcome, Board, CAPACITY, Config, ControlAction, Difficulty, GameSession, LevelDescriptor,
    LevelGenerator, OptimalMoves, RepairOutcome, solve,
};

/// Water sort level generator and solver.
#[derive(Parser)]
#[command(about, long_about = None, version)]
struct Args {
    /// JSON file overriding the built-in tuning
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug messages
    #[arg(short, long, default_value_t = false, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate levels and print them as the player would see them
    Generate {
        #[arg(short, long, default_value_t = 1)]
        level: u32,
        #[arg(value_enum, short = 'f', long, default_value_t = Difficulty::Normal)]
        difficulty: Difficulty,
        #[arg(short, long)]
        seed: Option<u64>,
        /// Number of consecutive levels to generate
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
        /// One JSON object per level
        #[arg(long)]
        json: bool,
    },
    /// Print the optimal number of pours for a board, e.g. `AABB BBAA .`
    Solve {
        #[arg(required = true)]
        bottles: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate many levels in parallel and summarize their quality
    Survey {
        #[arg(short, long, default_value_t = 1)]
        level: u32,
        #[arg(value_enum, short = 'f', long, default_value_t = Difficulty::Normal)]
        difficulty: Difficulty,
        #[arg(short = 'n', long, default_value_t = 100)]
        count: u64,
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        json: bool,
    },
    /// Play on the terminal
    Play {
        #[arg(short, long, default_value_t = 1)]
        level: u32,
        #[arg(value_enum, short = 'f', long, default_value_t = Difficulty::Normal)]
        difficulty: Difficulty,
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Print the configuration in effect as JSON
    Config,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.debug {
        // SAFETY: no other thread is running yet
        unsafe {
            env::set_var("RUST_LOG", "debug");
        }
    }
    env_logger::init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    match args.command {
        Command::Generate {
            level,
            difficulty,
            seed,
            count,
            json,
        } => generate(&config, level, difficulty, seed, count, json)?,
        Command::Solve { bottles, json } => {
            let board: Board = bottles.join(" ").parse()?;
            let optimal = solve(&board, CAPACITY, &config.solver);
            if json {
                println!("{}", serde_json::to_string(&optimal)?);
            } else {
                println!("{optimal}");
            }
        }
        Command::Survey {
            level,
            difficulty,
            count,
            seed,
            json,
        } => survey(&config, level, difficulty, count, seed, json)?,
        Command::Play {
            level,
            difficulty,
            seed,
        } => play(config, level, difficulty, seed)?,
        Command::Config => {
            let mut out = io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &config)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn generator(config: &Config, seed: Option<u64>) -> LevelGenerator {
    match seed {
        Some(seed) => LevelGenerator::from_seed(seed, config.generator.clone()),
        None => LevelGenerator::from_entropy(config.generator.clone()),
    }
}

/// A generated level as printed by `generate --json`.
#[derive(Serialize)]
struct GeneratedLevel {
    #[serde(flatten)]
    descriptor: LevelDescriptor,
    board: String,
    masked: String,
    repair: RepairOutcome,
}

fn generate(
    config: &Config,
    level: u32,
    difficulty: Difficulty,
    seed: Option<u64>,
    count: u32,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut generator = generator(config, seed);
    let mut out = io::stdout().lock();
    for level in level.max(1)..level.max(1) + count {
        let generated = generator.generate(level, difficulty);
        if json {
            let line = GeneratedLevel {
                descriptor: generated.descriptor,
                board: generated.state.board().to_string(),
                masked: generated.state.masked().to_string(),
                repair: generated.repair,
            };
            serde_json::to_writer(&mut out, &line)?;
            writeln!(out)?;
            continue;
        }
        let d = generated.descriptor;
        writeln!(
            out,
            "level {} ({}): {} colors, {} empty bottles, {} hidden per bottle",
            d.level, d.difficulty, d.num_colors, d.num_empty_bottles, d.hidden_count
        )?;
        writeln!(out, "{}", generated.state.masked())?;
        if generated.repair.is_exhausted() {
            writeln!(out, "repair: {:?}", generated.repair)?;
        }
    }
    Ok(())
}

#[derive(Default, Serialize)]
struct SurveySummary {
    levels: u64,
    presolved: u64,
    repair_exhausted: u64,
    known: u64,
    unknown: u64,
    optimal_total: u64,
}

impl SurveySummary {
    fn merge(mut self, other: SurveySummary) -> SurveySummary {
        self.levels += other.levels;
        self.presolved += other.presolved;
        self.repair_exhausted += other.repair_exhausted;
        self.known += other.known;
        self.unknown += other.unknown;
        self.optimal_total += other.optimal_total;
        self
    }
}

fn survey(
    config: &Config,
    level: u32,
    difficulty: Difficulty,
    count: u64,
    seed: u64,
    json: bool,
) -> serde_json::Result<()> {
    let summary = (0..count)
        .into_par_iter()
        .map(|i| {
            let mut generator = LevelGenerator::from_seed(seed.wrapping_add(i), config.generator.clone());
            let generated = generator.generate(level.max(1), difficulty);
            let board = generated.state.board();
            let optimal = solve(board, CAPACITY, &config.solver);
            debug!("Survey level {i}: {board} -> {optimal}");
            SurveySummary {
                levels: 1,
                presolved: board.bottles().iter().any(|b| b.is_complete(None)) as u64,
                repair_exhausted: generated.repair.is_exhausted() as u64,
                known: matches!(optimal, OptimalMoves::Known(_)) as u64,
                unknown: matches!(optimal, OptimalMoves::Unknown) as u64,
                optimal_total: optimal.known().unwrap_or(0) as u64,
            }
        })
        .reduce(SurveySummary::default, SurveySummary::merge);

    if json {
        println!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }
    let average = if summary.known > 0 {
        summary.optimal_total as f64 / summary.known as f64
    } else {
        0.0
    };
    println!(
        "
           levels = {}
        presolved = {}
 repair exhausted = {}
    solver known  = {}
  solver unknown  = {}
  average optimal = {:.2}",
        summary.levels, summary.presolved, summary.repair_exhausted, summary.known, summary.unknown, average
    );
    Ok(())
}

fn print_session(session: &GameSession) {
    let state = session.state();
    let (done, colors) = session.progress();
    println!(
        "level {} | {} moves | {done}/{colors} done | {} hints",
        session.descriptor().level,
        session.moves(),
        session.hints_left()
    );
    let masked = state.masked().to_string();
    for (i, bottle) in masked.split(' ').enumerate() {
        println!("  {i:>2}: {bottle}");
    }
    if session.is_deadlocked() {
        println!("No moves left, undo or restart");
    }
}

fn play(config: Config, level: u32, difficulty: Difficulty, seed: Option<u64>) -> io::Result<()> {
    let generator = generator(&config, seed);
    let mut session = GameSession::new(config, generator, difficulty, level);
    print_session(&session);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let action = match words.as_slice() {
            ["q"] => return Ok(()),
            ["u"] => ControlAction::Undo,
            ["h"] => ControlAction::Hint,
            ["r"] => ControlAction::Restart,
            ["n"] => ControlAction::NextLevel,
            [from, to] => match (from.parse::<usize>(), to.parse::<usize>()) {
                (Ok(from), Ok(to)) if from < session.state().board().len() && to < session.state().board().len() => {
                    ControlAction::Pour(from, to)
                }
                _ => {
                    println!("Unknown bottles");
                    continue;
                }
            },
            _ => {
                println!("Commands: FROM TO, u(ndo), h(int), r(estart), n(ext), q(uit)");
                continue;
            }
        };
        match session.handle_game_action(action) {
            ActionOutcome::Rejected { bottle } => println!("Cannot pour into {bottle}"),
            ActionOutcome::Hint(mv) => println!("Try {mv}"),
            ActionOutcome::NoHint => println!("No hint available"),
            ActionOutcome::Won(summary) => {
                println!(
                    "Solved in {} moves (optimal {}), {} streak {}",
                    summary.moves, summary.optimal, summary.stars, summary.streak
                );
                println!("n for the next level, r to replay");
                continue;
            }
            ActionOutcome::Ignored => continue,
            _ => {}
        }
        print_session(&session);
    }
}
