use crate::grid::Position;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;

/// One CSV row with its derived metrics.
#[derive(Clone, Debug)]
pub struct RoundSummary {
    pub stage: usize,
    pub round: usize,
    pub selected_squares: Vec<Position>,
    pub clicked_positions: Vec<Position>,
    pub mistakes_in_stage: u8,
    pub click_times: Vec<f64>,
    pub average_time_per_square: f64,
    pub accuracy: f64,
}

/// Absolute value of the mean click time. Rounds with no targets
/// (placeholders) or no clicks have no defined latency and yield NaN.
pub fn average_time_per_square(click_times: &[f64], selected_count: usize) -> f64 {
    if selected_count == 0 || click_times.is_empty() {
        return f64::NAN;
    }
    (click_times.iter().sum::<f64>() / click_times.len() as f64).abs()
}

/// Correct clicks over total clicks; 0.0 when nothing was clicked.
pub fn accuracy(selected: &[Position], clicked: &[Position]) -> f64 {
    if clicked.is_empty() {
        return 0.0;
    }
    let correct = clicked.iter().filter(|pos| selected.contains(pos)).count();
    correct as f64 / clicked.len() as f64
}

// Raw CSV row; list columns arrive as JSON array text.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Stage")]
    stage: usize,
    #[serde(rename = "Round")]
    round: usize,
    #[serde(rename = "Selected_squares")]
    selected_squares: String,
    #[serde(rename = "Clicked_positions")]
    clicked_positions: String,
    #[serde(rename = "Mistakes_in_stage")]
    mistakes_in_stage: u8,
    #[serde(rename = "Click_times")]
    click_times: String,
}

/// Reads the tabular export back and attaches the derived metrics. List
/// columns are parsed as JSON arrays; malformed data is a fatal error.
pub fn load_rounds<P: AsRef<Path>>(csv_path: P) -> Result<Vec<RoundSummary>, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut rounds = Vec::new();
    for row in reader.deserialize::<RawRow>() {
        let row = row?;
        let selected_squares: Vec<Position> = serde_json::from_str(&row.selected_squares)?;
        let clicked_positions: Vec<Position> = serde_json::from_str(&row.clicked_positions)?;
        let click_times: Vec<f64> = serde_json::from_str(&row.click_times)?;
        rounds.push(RoundSummary {
            stage: row.stage,
            round: row.round,
            average_time_per_square: average_time_per_square(
                &click_times,
                selected_squares.len(),
            ),
            accuracy: accuracy(&selected_squares, &clicked_positions),
            selected_squares,
            clicked_positions,
            mistakes_in_stage: row.mistakes_in_stage,
            click_times,
        });
    }
    Ok(rounds)
}
