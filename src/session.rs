use crate::grid::{all_positions, CellState, Position};
use rand::seq::SliceRandom;
use rand::Rng;

pub const STARTING_GRID_SIZE: usize = 3;
pub const STARTING_SELECTED_COUNT: usize = 3;
pub const MAX_STAGE_MISTAKES: u8 = 3;

/// Stage counters threaded by value between rounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageState {
    pub stage_number: usize,
    pub mistakes_in_stage: u8,
    pub selected_count: usize,
    pub grid_size: usize,
}

impl StageState {
    pub fn new(stage_number: usize) -> Self {
        Self {
            stage_number,
            mistakes_in_stage: 0,
            selected_count: STARTING_SELECTED_COUNT,
            grid_size: STARTING_GRID_SIZE,
        }
    }

    pub fn chances_left(&self) -> u8 {
        MAX_STAGE_MISTAKES - self.mistakes_in_stage
    }

    pub fn is_failed(&self) -> bool {
        self.mistakes_in_stage >= MAX_STAGE_MISTAKES
    }

    /// The board grows once the targets would cover half of it. It never
    /// shrinks.
    fn grow_grid_if_crowded(&mut self) {
        let cells = (self.grid_size * self.grid_size) as f64;
        if self.selected_count as f64 >= cells / 2.0 {
            self.grid_size += 1;
        }
    }

    /// Applied after a scored round; a fully correct recall raises the target
    /// count for the next round.
    pub fn advance_after(&mut self, scored_correct: bool) {
        if scored_correct {
            self.selected_count += 1;
        }
    }
}

/// What the participant has to memorize in one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundSpec {
    pub grid_size: usize,
    pub selected: Vec<Position>,
}

impl RoundSpec {
    /// Grows the stage's board if due, then samples the target cells
    /// uniformly without replacement.
    pub fn sample(stage: &mut StageState, rng: &mut impl Rng) -> Self {
        stage.grow_grid_if_crowded();
        let selected = all_positions(stage.grid_size)
            .choose_multiple(rng, stage.selected_count)
            .copied()
            .collect();
        Self {
            grid_size: stage.grid_size,
            selected,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// One recorded click: which cell, how long after the recall phase started,
/// and whether it hit a target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Click {
    pub pos: Position,
    pub elapsed_secs: f64,
    pub outcome: Outcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Memorizing,
    AwaitingClicks,
    Complete(RoundEnd),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundEnd {
    /// Every target was recalled.
    Solved,
    /// Second miss of the round; costs a stage chance.
    Aborted,
}

/// How a single click was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickResponse {
    /// Hit a target cell.
    Found,
    /// Hit the last remaining target; the round is solved.
    Solved,
    /// Missed; the cell is hidden but the round continues.
    Excluded,
    /// Second miss; the round is aborted and the stage loses a chance.
    RoundLost,
    /// Repeat click, gap, off-board, or wrong phase.
    Ignored,
}

/// One round being played: phase, the participant's click log, and the
/// per-round mistake bookkeeping.
#[derive(Clone, Debug)]
pub struct GridRound {
    pub spec: RoundSpec,
    pub phase: Phase,
    clicks: Vec<Click>,
    correct_clicks: usize,
    mistakes_in_round: usize,
    misclicked: Option<Position>,
}

impl GridRound {
    pub fn new(spec: RoundSpec) -> Self {
        Self {
            spec,
            phase: Phase::Memorizing,
            clicks: Vec::new(),
            correct_clicks: 0,
            mistakes_in_round: 0,
            misclicked: None,
        }
    }

    /// Ends the memorization phase; the board resets to neutral and clicks
    /// are accepted from here on.
    pub fn reveal_done(&mut self) {
        if self.phase == Phase::Memorizing {
            self.phase = Phase::AwaitingClicks;
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Complete(_))
    }

    pub fn clicks(&self) -> &[Click] {
        &self.clicks
    }

    pub fn clicked_positions(&self) -> Vec<Position> {
        self.clicks.iter().map(|c| c.pos).collect()
    }

    pub fn click_times(&self) -> Vec<f64> {
        self.clicks.iter().map(|c| c.elapsed_secs).collect()
    }

    pub fn mistakes_in_round(&self) -> usize {
        self.mistakes_in_round
    }

    /// Fill state of a cell as it should currently be drawn.
    pub fn cell_state(&self, pos: Position) -> CellState {
        match self.phase {
            Phase::Memorizing => {
                if self.spec.selected.contains(&pos) {
                    CellState::Highlighted
                } else {
                    CellState::Normal
                }
            }
            _ => {
                let hit = self
                    .clicks
                    .iter()
                    .find(|c| c.pos == pos)
                    .map(|c| c.outcome);
                match hit {
                    Some(Outcome::Correct) => CellState::Highlighted,
                    Some(Outcome::Incorrect) => CellState::Hidden,
                    None => CellState::Normal,
                }
            }
        }
    }

    /// Applies one click. A cell is clickable only while the round is in the
    /// recall phase and only if it is still neutral: repeat clicks, cells
    /// already found, and cells hidden by an earlier miss are all ignored.
    pub fn click(
        &mut self,
        stage: &mut StageState,
        pos: Position,
        elapsed_secs: f64,
    ) -> ClickResponse {
        if self.phase != Phase::AwaitingClicks {
            return ClickResponse::Ignored;
        }
        let (row, col) = pos;
        if row >= self.spec.grid_size || col >= self.spec.grid_size {
            return ClickResponse::Ignored;
        }
        if self.clicks.iter().any(|c| c.pos == pos) {
            return ClickResponse::Ignored;
        }

        if self.spec.selected.contains(&pos) {
            self.clicks.push(Click {
                pos,
                elapsed_secs,
                outcome: Outcome::Correct,
            });
            self.correct_clicks += 1;
            if self.correct_clicks == self.spec.selected.len() {
                self.phase = Phase::Complete(RoundEnd::Solved);
                ClickResponse::Solved
            } else {
                ClickResponse::Found
            }
        } else {
            self.clicks.push(Click {
                pos,
                elapsed_secs,
                outcome: Outcome::Incorrect,
            });
            self.mistakes_in_round += 1;
            self.misclicked = Some(pos);
            if self.mistakes_in_round > 1 {
                // the first miss is forgiven, the second ends the round
                stage.mistakes_in_stage += 1;
                self.phase = Phase::Complete(RoundEnd::Aborted);
                ClickResponse::RoundLost
            } else {
                ClickResponse::Excluded
            }
        }
    }

    /// Whether a finished round counts as a correct recall. With exactly one
    /// miss, the misclicked cell is excluded before checking that every
    /// target was clicked; with none, the clicks must cover the targets
    /// as-is.
    pub fn scored_correct(&self) -> bool {
        let clicked = self.clicked_positions();
        if self.mistakes_in_round == 1 {
            let excluded = self.misclicked;
            self.spec
                .selected
                .iter()
                .all(|p| clicked.iter().any(|c| c == p && Some(*c) != excluded))
        } else {
            self.spec.selected.iter().all(|p| clicked.contains(p))
        }
    }
}
