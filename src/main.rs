pub mod config;
pub mod export;
pub mod grid;
pub mod plotter;
pub mod results;
pub mod runtime;
pub mod session;
pub mod summary;
pub mod ui;

use crate::config::{Config, ConfigStore, FileConfigStore};
use crate::export::Exporter;
use crate::grid::GridLayout;
use crate::plotter::SummaryPlotter;
use crate::results::{ResultStore, RoundResult};
use crate::runtime::{CrosstermEventSource, EventSource, ExperimentEvent, FixedTicker, Runner, Ticker};
use crate::session::{ClickResponse, GridRound, RoundSpec, StageState};
use chrono::Local;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::rngs::ThreadRng;
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use std::{
    error::Error,
    fs::create_dir_all,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};

const TICK_RATE_MS: u64 = 50;
const SESSION_NUMBER: usize = 1;

const INFO_DURATION: Duration = Duration::from_secs(1);
const MEMORIZE_DURATION: Duration = Duration::from_secs(2);
const FEEDBACK_DURATION: Duration = Duration::from_secs(2);
const ENDING_DURATION: Duration = Duration::from_secs(5);

/// terminal spatial working-memory experiment
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Runs a spatial working-memory experiment: memorize highlighted squares on a growing grid, click them back, and get your recall times and accuracy exported and plotted."
)]
pub struct Cli {
    /// number of stages in the experiment
    #[clap(short = 's', long)]
    stages: Option<usize>,

    /// number of rounds per stage
    #[clap(short = 'r', long)]
    rounds_per_stage: Option<usize>,

    /// directory where result files are written
    #[clap(long)]
    results_dir: Option<PathBuf>,

    /// run inline instead of on the alternate screen
    #[clap(long)]
    windowed: bool,
}

impl Cli {
    /// Overlays the given flags on the stored configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(stages) = self.stages {
            config.stages = stages;
        }
        if let Some(rounds) = self.rounds_per_stage {
            config.rounds_per_stage = rounds;
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir = dir.clone();
        }
        if self.windowed {
            config.fullscreen = false;
        }
    }
}

/// What a stage-info screen leads into once its hold time expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoThen {
    /// Pre-round info; the round's memorization phase follows.
    BeginRound,
    /// Post-round info; the next round (or the stage end) follows.
    NextRound,
}

/// What follows the round feedback message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AfterFeedback {
    /// Completed round: show the stage info again, then move on.
    PostRoundInfo,
    /// Aborted round with chances left: straight to the next round.
    NextRound,
    /// Third lost chance: the stage is over.
    StageOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Instruction,
    StageStart,
    StageInfo { then: InfoThen },
    Memorizing,
    Clicking,
    Feedback { correct: bool, then: AfterFeedback },
    StageEnd,
    Ending,
}

pub struct App {
    pub config: Config,
    pub screen: Screen,
    pub stage: StageState,
    /// 0-based index of the round currently shown or played.
    pub round_number: usize,
    pub round: Option<GridRound>,
    pub results: ResultStore,
    pub done: bool,
    deadline: Option<Instant>,
    click_epoch: Option<Instant>,
    rng: ThreadRng,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            screen: Screen::Instruction,
            stage: StageState::new(1),
            round_number: 0,
            round: None,
            results: ResultStore::new(),
            done: false,
            deadline: None,
            click_epoch: None,
            rng: rand::thread_rng(),
        }
    }

    /// Advances any timed screen whose hold time has expired.
    pub fn on_tick(&mut self, now: Instant) {
        let Some(deadline) = self.deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        self.deadline = None;

        match self.screen {
            Screen::StageInfo { then } => match then {
                InfoThen::BeginRound => self.begin_memorization(now),
                InfoThen::NextRound => self.next_round(now),
            },
            Screen::Memorizing => {
                if let Some(round) = self.round.as_mut() {
                    round.reveal_done();
                }
                self.click_epoch = Some(now);
                self.screen = Screen::Clicking;
            }
            Screen::Feedback { then, .. } => match then {
                AfterFeedback::PostRoundInfo => {
                    self.screen = Screen::StageInfo {
                        then: InfoThen::NextRound,
                    };
                    self.deadline = Some(now + INFO_DURATION);
                }
                AfterFeedback::NextRound => self.next_round(now),
                AfterFeedback::StageOver => {
                    self.round_number += 1;
                    self.finish_stage();
                }
            },
            Screen::Ending => self.done = true,
            _ => {}
        }
    }

    /// Space advances the screens that wait for the participant.
    pub fn on_space(&mut self, now: Instant) {
        match self.screen {
            Screen::Instruction => {
                self.screen = Screen::StageStart;
            }
            Screen::StageStart => {
                self.screen = Screen::StageInfo {
                    then: InfoThen::BeginRound,
                };
                self.deadline = Some(now + INFO_DURATION);
            }
            Screen::StageEnd => {
                if self.stage.stage_number >= self.config.stages {
                    self.screen = Screen::Ending;
                    self.deadline = Some(now + ENDING_DURATION);
                } else {
                    self.stage = StageState::new(self.stage.stage_number + 1);
                    self.round_number = 0;
                    self.screen = Screen::StageStart;
                }
            }
            _ => {}
        }
    }

    /// Routes a mouse press on the board through the round state machine.
    pub fn on_click(&mut self, x: u16, y: u16, area_width: u16, area_height: u16, now: Instant) {
        if self.screen != Screen::Clicking {
            return;
        }
        let Some(round) = self.round.as_mut() else {
            return;
        };
        let layout = GridLayout::centered(round.spec.grid_size, area_width, area_height);
        let Some(pos) = layout.hit_test(x, y) else {
            return;
        };
        let elapsed = self
            .click_epoch
            .map(|epoch| now.duration_since(epoch).as_secs_f64())
            .unwrap_or_default();

        match round.click(&mut self.stage, pos, elapsed) {
            ClickResponse::Solved => {
                let correct = round.scored_correct();
                self.stage.advance_after(correct);
                self.results.push(RoundResult::from_round(
                    SESSION_NUMBER,
                    &self.stage,
                    self.round_number + 1,
                    round,
                ));
                self.screen = Screen::Feedback {
                    correct,
                    then: AfterFeedback::PostRoundInfo,
                };
                self.deadline = Some(now + FEEDBACK_DURATION);
            }
            ClickResponse::RoundLost => {
                self.results.push(RoundResult::from_round(
                    SESSION_NUMBER,
                    &self.stage,
                    self.round_number + 1,
                    round,
                ));
                let then = if self.stage.is_failed() {
                    AfterFeedback::StageOver
                } else {
                    AfterFeedback::NextRound
                };
                self.screen = Screen::Feedback {
                    correct: false,
                    then,
                };
                self.deadline = Some(now + FEEDBACK_DURATION);
            }
            _ => {}
        }
    }

    fn begin_memorization(&mut self, now: Instant) {
        let spec = RoundSpec::sample(&mut self.stage, &mut self.rng);
        self.round = Some(GridRound::new(spec));
        self.screen = Screen::Memorizing;
        self.deadline = Some(now + MEMORIZE_DURATION);
    }

    fn next_round(&mut self, now: Instant) {
        self.round_number += 1;
        if self.round_number >= self.config.rounds_per_stage {
            self.finish_stage();
        } else {
            self.screen = Screen::StageInfo {
                then: InfoThen::BeginRound,
            };
            self.deadline = Some(now + INFO_DURATION);
        }
    }

    /// Records placeholders for the rounds that were never played, then
    /// shows the stage-end screen.
    fn finish_stage(&mut self) {
        for idx in self.round_number..self.config.rounds_per_stage {
            self.results
                .push(RoundResult::placeholder(SESSION_NUMBER, &self.stage, idx + 1));
        }
        self.screen = Screen::StageEnd;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        use clap::{error::ErrorKind, CommandFactory};
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut config = FileConfigStore::new().load();
    cli.apply(&mut config);

    let mut app = App::new(config);
    let completed = run_tui(&mut app)?;

    if !completed {
        // aborted with Esc: nothing to export
        return Ok(());
    }

    create_dir_all(&app.config.results_dir)?;
    let timestamp = Local::now().format("%Y%m%d%H%M").to_string();
    let exporter = Exporter::new(
        app.results.records(),
        app.config.results_dir.join(&timestamp),
    );
    let csv_path = exporter.save_all()?;

    let plotter = SummaryPlotter::from_csv(&csv_path)?;
    let time_plot = plotter.plot_average_time_per_square()?;
    let accuracy_plot = plotter.plot_overall_average_accuracy()?;

    println!(
        "Saved results to {}.{{csv,txt,json}}",
        csv_path.with_extension("").display()
    );
    println!("Saved plots to {} and {}", time_plot.display(), accuracy_plot.display());

    Ok(())
}

/// Brackets the experiment loop in raw mode (and the alternate screen when
/// fullscreen) with mouse capture on. Returns whether the run completed.
fn run_tui(app: &mut App) -> Result<bool, Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    if app.config.fullscreen {
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    } else {
        execute!(stdout, EnableMouseCapture)?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let completed = run_experiment(&mut terminal, &runner, app);

    disable_raw_mode()?;
    if app.config.fullscreen {
        execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    } else {
        execute!(terminal.backend_mut(), DisableMouseCapture)?;
    }
    terminal.show_cursor()?;

    completed
}

fn run_experiment<E, T>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    runner: &Runner<E, T>,
    app: &mut App,
) -> Result<bool, Box<dyn Error>>
where
    E: EventSource,
    T: Ticker,
{
    terminal.draw(|f| ui(app, f))?;

    loop {
        match runner.step() {
            ExperimentEvent::Tick => {
                app.on_tick(Instant::now());
                if app.done {
                    return Ok(true);
                }
            }
            ExperimentEvent::Resize => {}
            ExperimentEvent::Key(key) => match key.code {
                KeyCode::Esc => return Ok(false),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(false);
                }
                KeyCode::Char(' ') => app.on_space(Instant::now()),
                _ => {}
            },
            ExperimentEvent::Click { x, y } => {
                let size = terminal.size()?;
                app.on_click(x, y, size.width, size.height, Instant::now());
            }
        }

        terminal.draw(|f| ui(app, f))?;
    }
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn ticked(app: &mut App, after: Duration) {
        // Advance virtual time relative to the app's pending deadline so that
        // chained ticks (whose deadlines are set from already-advanced times)
        // actually fire instead of anchoring to the wall clock each call.
        let now = app.deadline.unwrap_or_else(Instant::now) + after;
        app.on_tick(now);
    }

    #[test]
    fn cli_defaults_leave_the_fixed_protocol_untouched() {
        let cli = Cli::parse_from(["memgrid"]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.stages, 1);
        assert_eq!(config.rounds_per_stage, 5);
        assert_eq!(config.results_dir, PathBuf::from("results"));
        assert!(config.fullscreen);
    }

    #[test]
    fn cli_flags_override_the_config() {
        let cli = Cli::parse_from([
            "memgrid",
            "--stages",
            "4",
            "--rounds-per-stage",
            "20",
            "--results-dir",
            "out",
            "--windowed",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.stages, 4);
        assert_eq!(config.rounds_per_stage, 20);
        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert!(!config.fullscreen);
    }

    #[test]
    fn space_walks_from_instruction_into_the_first_round() {
        let mut app = App::new(Config::default());
        assert_eq!(app.screen, Screen::Instruction);

        app.on_space(Instant::now());
        assert_eq!(app.screen, Screen::StageStart);

        app.on_space(Instant::now());
        assert_eq!(
            app.screen,
            Screen::StageInfo {
                then: InfoThen::BeginRound
            }
        );

        ticked(&mut app, INFO_DURATION);
        assert_eq!(app.screen, Screen::Memorizing);
        assert!(app.round.is_some());

        ticked(&mut app, MEMORIZE_DURATION);
        assert_eq!(app.screen, Screen::Clicking);
    }

    #[test]
    fn ticks_before_the_deadline_do_not_advance() {
        let mut app = App::new(Config::default());
        app.on_space(Instant::now());
        app.on_space(Instant::now());

        app.on_tick(Instant::now());
        assert_eq!(
            app.screen,
            Screen::StageInfo {
                then: InfoThen::BeginRound
            }
        );
    }

    #[test]
    fn a_failed_stage_fills_the_remaining_rounds_with_placeholders() {
        let mut app = App::new(Config::default());
        app.stage.mistakes_in_stage = 3;
        app.round_number = 2; // rounds 1 and 2 recorded, round 3 in flight
        app.screen = Screen::Feedback {
            correct: false,
            then: AfterFeedback::StageOver,
        };
        app.deadline = Some(Instant::now());

        ticked(&mut app, FEEDBACK_DURATION);
        assert_eq!(app.screen, Screen::StageEnd);
        assert_eq!(app.results.len(), 2);
        for (record, round) in app.results.records().iter().zip(4..) {
            assert_eq!(record.round, round);
            assert!(record.selected_squares.is_empty());
            assert_eq!(record.mistakes_in_stage, 3);
        }
    }

    #[test]
    fn the_last_stage_end_leads_to_the_ending_screen() {
        let mut app = App::new(Config::default());
        app.screen = Screen::StageEnd;

        app.on_space(Instant::now());
        assert_eq!(app.screen, Screen::Ending);

        ticked(&mut app, ENDING_DURATION);
        assert!(app.done);
    }

    #[test]
    fn clicks_only_land_while_the_board_accepts_them() {
        let mut app = App::new(Config::default());
        app.screen = Screen::Clicking;
        app.round = Some(GridRound::new(RoundSpec {
            grid_size: 3,
            selected: vec![(0, 0)],
        }));
        app.round.as_mut().unwrap().reveal_done();
        app.click_epoch = Some(Instant::now());

        // a click in the top-left corner: outside the centered board
        app.on_click(0, 0, 80, 24, Instant::now());
        assert_eq!(app.results.len(), 0);

        // a click on the single target solves the round
        let layout = GridLayout::centered(3, 80, 24);
        let (x, y) = layout.cell_origin((0, 0));
        app.on_click(x, y, 80, 24, Instant::now());

        assert_eq!(app.results.len(), 1);
        assert!(matches!(app.screen, Screen::Feedback { correct: true, .. }));
        assert_eq!(app.stage.selected_count, 4);
    }
}
