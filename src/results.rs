use crate::grid::Position;
use crate::session::{GridRound, StageState};
use serde::{Deserialize, Serialize};

/// Outcome of one round, frozen at the moment it is recorded. Field names
/// follow the historical export labels so all three file formats and the
/// plotting pipeline agree on them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    #[serde(rename = "Session")]
    pub session: usize,
    #[serde(rename = "Stage")]
    pub stage: usize,
    #[serde(rename = "Round")]
    pub round: usize,
    #[serde(rename = "Selected_squares")]
    pub selected_squares: Vec<Position>,
    #[serde(rename = "Clicked_positions")]
    pub clicked_positions: Vec<Position>,
    #[serde(rename = "Mistakes_in_stage")]
    pub mistakes_in_stage: u8,
    #[serde(rename = "Click_times")]
    pub click_times: Vec<f64>,
}

impl RoundResult {
    /// Snapshot of a played round. `round_number` is 1-based, as exported.
    pub fn from_round(
        session: usize,
        stage: &StageState,
        round_number: usize,
        round: &GridRound,
    ) -> Self {
        Self {
            session,
            stage: stage.stage_number,
            round: round_number,
            selected_squares: round.spec.selected.clone(),
            clicked_positions: round.clicked_positions(),
            mistakes_in_stage: stage.mistakes_in_stage,
            click_times: round.click_times(),
        }
    }

    /// Record for a round that was never played because the stage ended
    /// early. Carries the stage's final mistake count and nothing else.
    pub fn placeholder(session: usize, stage: &StageState, round_number: usize) -> Self {
        Self {
            session,
            stage: stage.stage_number,
            round: round_number,
            selected_squares: Vec::new(),
            clicked_positions: Vec::new(),
            mistakes_in_stage: stage.mistakes_in_stage,
            click_times: Vec::new(),
        }
    }
}

/// Append-only accumulator for the whole experiment (all stages, one
/// session). Records are immutable once pushed.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: Vec<RoundResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: RoundResult) {
        self.results.push(result);
    }

    pub fn records(&self) -> &[RoundResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
