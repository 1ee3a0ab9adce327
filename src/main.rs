mod app;

use anyhow::{Context, Result, bail};
use app::{App, RescheduleStart};
use cardbox_app::ResponseOutcome;
use cardbox_app::scheduler::{RescheduleControl, RescheduleMode};
use cardbox_app::search::SearchSpec;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cardbox", about = "Cardbox review scheduling for word quizzes", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Date to treat as today (YYYY-MM-DD, default: local date)
    #[arg(long, global = true)]
    date: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Quiz {
    /// Lexicon name
    #[arg(short, long)]
    lexicon: String,

    /// Quiz type, e.g. "anagrams" or "hooks"
    #[arg(short, long, default_value = "anagrams")]
    quiz_type: String,
}

#[derive(Subcommand)]
enum Command {
    /// Show how many questions are ready for review
    Backlog {
        #[command(flatten)]
        quiz: Quiz,
    },

    /// Record quiz results as QUESTION=OUTCOME pairs
    Respond {
        #[command(flatten)]
        quiz: Quiz,
        /// Outcome is one of correct, missed, incorrect, incomplete
        #[arg(required = true)]
        responses: Vec<String>,
    },

    /// Shift or recompute due dates for many questions at once
    Reschedule {
        #[command(flatten)]
        quiz: Quiz,
        /// shift-days, shift-backlog or by-cardbox
        #[arg(long)]
        mode: RescheduleMode,
        /// Days to shift by, or the desired backlog size
        #[arg(long, allow_negative_numbers = true)]
        value: Option<i64>,
        /// Reschedule every question of the lexicon and quiz type
        #[arg(long, conflicts_with_all = ["words", "word"])]
        all: bool,
        /// File with one word per line to restrict the reschedule to
        #[arg(long)]
        words: Option<PathBuf>,
        /// Word to restrict the reschedule to (repeatable)
        #[arg(long)]
        word: Vec<String>,
    },

    /// Count questions in each cardbox
    Summary {
        #[command(flatten)]
        quiz: Quiz,
    },

    /// Save all schedules of a lexicon and quiz type to JSON
    Export {
        #[command(flatten)]
        quiz: Quiz,
        file: PathBuf,
    },

    /// Load schedules from a JSON export
    Import { file: PathBuf },
}

fn parse_response(arg: &str) -> Result<(String, ResponseOutcome)> {
    let Some((question, outcome)) = arg.rsplit_once('=') else {
        bail!("Expected QUESTION=OUTCOME, got '{}'", arg);
    };
    let outcome = outcome
        .parse::<ResponseOutcome>()
        .with_context(|| format!("Bad response '{}'", arg))?;
    Ok((question.trim().to_uppercase(), outcome))
}

fn search_spec(all: bool, words: Option<PathBuf>, word: Vec<String>) -> Result<Option<SearchSpec>> {
    if let Some(path) = words {
        let spec = SearchSpec::from_word_file(&path)
            .with_context(|| format!("Failed to read word list '{}'", path.display()))?;
        return Ok(Some(spec));
    }
    if !word.is_empty() {
        return Ok(Some(SearchSpec::Words(word)));
    }
    if !all {
        bail!("Choose the questions to reschedule with --all, --words or --word");
    }
    Ok(None)
}

/// Cancels `control` on the first Ctrl-C. The worker stops at the next batch
/// boundary and the count written so far is still reported.
fn cancel_on_ctrl_c(control: RescheduleControl) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("Failed to start the Ctrl-C listener")?;

    thread::spawn(move || {
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling after the current batch...");
                control.cancel();
            }
        })
    });
    Ok(())
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "question" } else { "questions" }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let today = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let app = App::new(cli.config.as_deref())?;

    match cli.command {
        Command::Backlog { quiz } => {
            let count = app.backlog(&quiz.lexicon, &quiz.quiz_type, today)?;
            println!("Current backlog size: {}", count);
        }
        Command::Respond { quiz, responses } => {
            let responses = responses
                .iter()
                .map(|arg| parse_response(arg))
                .collect::<Result<Vec<_>>>()?;
            let written = app.apply_responses(&quiz.lexicon, &quiz.quiz_type, &responses, today)?;
            println!("{} {} updated.", written, plural(written));
        }
        Command::Reschedule {
            quiz,
            mode,
            value,
            all,
            words,
            word,
        } => {
            let search = search_spec(all, words, word)?;
            let start =
                app.start_reschedule(&quiz.lexicon, &quiz.quiz_type, search, mode, value, today)?;

            let task = match start {
                RescheduleStart::Running(task) => task,
                RescheduleStart::NothingSelected => {
                    println!("No questions matched the search.");
                    return Ok(());
                }
            };

            cancel_on_ctrl_c(task.control())?;
            while !task.is_finished() {
                eprint!("\r{} processed", task.progress());
                std::io::stderr().flush().ok();
                thread::sleep(Duration::from_millis(100));
            }
            eprintln!();

            let outcome = App::wait(task)?;
            if outcome.cancelled {
                println!(
                    "Cancelled: {} {} rescheduled before stopping.",
                    outcome.updated,
                    plural(outcome.updated)
                );
            } else {
                println!("{} {} rescheduled.", outcome.updated, plural(outcome.updated));
            }
        }
        Command::Summary { quiz } => {
            let counts = app.summary(&quiz.lexicon, &quiz.quiz_type)?;
            if counts.is_empty() {
                println!("No questions in the cardbox yet.");
            }
            for (level, count) in counts {
                println!("Cardbox {:>3}: {}", level, count);
            }
        }
        Command::Export { quiz, file } => {
            let count = app.export(&quiz.lexicon, &quiz.quiz_type, &file)?;
            println!("Exported {} {} to '{}'.", count, plural(count), file.display());
        }
        Command::Import { file } => {
            let (partition, count) = app.import(&file)?;
            println!("Imported {} {} into {}.", count, plural(count), partition);
        }
    }

    Ok(())
}
