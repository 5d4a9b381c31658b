//! Line-oriented terminal screens for the quiz and achievements.

use std::fmt::Write as _;
use std::io;

use bunpo_core::{QuizMachine, QuizSession, QuizState, TotalMastery};
use services::{AchievementsService, AchievementsUiState, QuizService};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Answer(usize),
    Hint,
    Next,
    Restart,
    Quit,
    Unknown,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "h" | "hint" => Input::Hint,
        "n" | "next" | "" => Input::Next,
        "r" | "restart" => Input::Restart,
        "q" | "quit" => Input::Quit,
        other => match other.parse::<usize>() {
            Ok(n @ 1..=4) => Input::Answer(n - 1),
            _ => Input::Unknown,
        },
    }
}

fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn print(text: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}

/// Runs the quiz until the user quits or stdin closes.
///
/// # Errors
///
/// Returns an error if reading stdin or writing stdout fails.
pub async fn run_quiz(quiz: QuizService) -> io::Result<()> {
    let mut states = quiz.subscribe();
    let first = states
        .wait_for(|machine| !matches!(machine.state(), QuizState::Uninitialized | QuizState::Loading))
        .await
        .map_err(|_| io::Error::other("quiz state closed"))?
        .clone();
    print(&render_quiz(&first)).await?;

    let mut lines = stdin_lines();
    while let Some(line) = lines.next_line().await? {
        let snapshot = quiz.snapshot();
        let current = snapshot.state().session().map(QuizSession::current);
        let answered = current.is_some_and(|current| current.is_answered());

        match parse_input(&line) {
            Input::Answer(index) if !answered => {
                if let Some(option) = current.and_then(|current| current.options().get(index)) {
                    quiz.process_answer(option);
                }
            }
            Input::Answer(_) => {}
            Input::Hint => quiz.on_hint_toggled(),
            Input::Next if answered => quiz.load_next_question(),
            Input::Next => {}
            Input::Restart => quiz.start_new_quiz(),
            Input::Quit => break,
            Input::Unknown => {
                print("enter 1-4 to answer, h for a hint, n for next, r to restart, q to quit\n")
                    .await?;
                continue;
            }
        }

        print(&render_quiz(&quiz.snapshot())).await?;
    }

    quiz.flush_pending_writes().await;
    Ok(())
}

/// Shows achievements and redraws them on every change until `q` or EOF.
///
/// # Errors
///
/// Returns an error if reading stdin or writing stdout fails.
pub async fn run_achievements(achievements: &AchievementsService) -> io::Result<()> {
    let mut states = achievements.subscribe();
    let mut lines = stdin_lines();
    let first = states.borrow_and_update().clone();
    print(&render_achievements(&first)).await?;

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = states.borrow_and_update().clone();
                print(&render_achievements(&state)).await?;
            }
            line = lines.next_line() => {
                match line? {
                    None => return Ok(()),
                    Some(line) if parse_input(&line) == Input::Quit => return Ok(()),
                    Some(_) => {}
                }
            }
        }
    }
}

fn render_quiz(machine: &QuizMachine) -> String {
    let mut out = String::new();
    match machine.state() {
        QuizState::Uninitialized | QuizState::Loading => out.push_str("Loading...\n"),
        QuizState::Error(err) => {
            let _ = writeln!(out, "Error: {err}");
            out.push_str("(r) try again  (q) quit\n");
        }
        QuizState::InProgress(session) => render_session(&mut out, session),
        QuizState::Finished(session) => {
            let progress = session.progress();
            let _ = writeln!(
                out,
                "\nQuiz finished: {} of {} correct.",
                progress.correct, progress.total
            );
            out.push_str("(r) new quiz  (q) quit\n");
        }
    }
    out
}

fn render_session(out: &mut String, session: &QuizSession) {
    let progress = session.progress();
    let current = session.current();
    let question = current.question();

    let _ = writeln!(
        out,
        "\nQuestion {} of {}  (score {})",
        progress.index + 1,
        progress.total,
        progress.correct
    );
    let _ = writeln!(out, "{}", question.prompt);
    for (n, option) in current.options().iter().enumerate() {
        let marker = if current.selected() == Some(option.as_str()) {
            '>'
        } else {
            ' '
        };
        let _ = writeln!(out, "{marker} {}) {option}", n + 1);
    }

    if current.is_hint_shown() {
        let _ = writeln!(out, "Hint: {}", current.tip().title);
        let _ = writeln!(out, "      {}", current.tip().explanation);
    }

    if current.is_answered() {
        if current.is_correct() {
            out.push_str("Correct!\n");
        } else {
            let _ = writeln!(out, "Wrong. The answer is {}.", question.correct_option);
        }
        let _ = writeln!(out, "{}", question.answer);
        let _ = writeln!(out, "{}", question.translation);
        out.push_str("(n) next  (h) hint  (r) restart  (q) quit\n");
    } else {
        out.push_str("(1-4) answer  (h) hint  (r) restart  (q) quit\n");
    }
}

fn render_achievements(state: &AchievementsUiState) -> String {
    let mut out = String::new();
    match state {
        AchievementsUiState::Loading => out.push_str("Loading...\n"),
        AchievementsUiState::Error(message) => {
            let _ = writeln!(out, "Error: {message}");
        }
        AchievementsUiState::Success {
            total,
            grammar_points,
        } => {
            let _ = writeln!(out, "\nOverall  {}", bar(total));
            for point in grammar_points {
                let level = point
                    .grammar_point
                    .level
                    .map_or("--", |level| level.as_str());
                let _ = writeln!(
                    out,
                    "{level} {:<12} {}",
                    point.grammar_point.grammar,
                    bar(&TotalMastery {
                        current: point.current,
                        max: point.max,
                    })
                );
            }
            out.push_str("(q) back\n");
        }
    }
    out
}

fn bar(mastery: &TotalMastery) -> String {
    let ratio = mastery.ratio();
    // ratio is clamped to 0..=1, so the product fits the bar.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = (ratio * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {}/{}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        mastery.current,
        mastery.max
    )
}
