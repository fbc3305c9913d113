use crate::summary::{load_rounds, RoundSummary};
use itertools::Itertools;
use plotters::prelude::*;
use std::error::Error;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

const PLOTS_DIR: &str = "plots";
const SUBPLOT_ROWS: usize = 2;
const SUBPLOT_COLS: usize = 2;

/// Renders the two aggregate charts from the tabular export. Output files are
/// named after the export's timestamp stem.
pub struct SummaryPlotter {
    rounds: Vec<RoundSummary>,
    stem: String,
    out_dir: PathBuf,
}

impl SummaryPlotter {
    pub fn from_csv<P: AsRef<Path>>(csv_path: P) -> Result<Self, Box<dyn Error>> {
        let csv_path = csv_path.as_ref();
        let rounds = load_rounds(csv_path)?;
        let stem = csv_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            rounds,
            stem,
            out_dir: PathBuf::from(PLOTS_DIR),
        })
    }

    pub fn with_out_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.out_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn average_time_plot_path(&self) -> PathBuf {
        self.out_dir
            .join(format!("{}_average_time_per_square.png", self.stem))
    }

    pub fn accuracy_plot_path(&self) -> PathBuf {
        self.out_dir
            .join(format!("{}_overall_average_accuracy.png", self.stem))
    }

    /// One latency-vs-round line chart per stage, laid out on a 2x2 panel
    /// grid. Panels beyond the number of stages stay blank; rounds without a
    /// defined latency (NaN) are skipped.
    pub fn plot_average_time_per_square(&self) -> Result<PathBuf, Box<dyn Error>> {
        create_dir_all(&self.out_dir)?;
        let path = self.average_time_plot_path();
        self.render_average_time(&path)?;
        Ok(path)
    }

    /// Mean accuracy per round number, averaged across all stages, as a
    /// percentage.
    pub fn plot_overall_average_accuracy(&self) -> Result<PathBuf, Box<dyn Error>> {
        create_dir_all(&self.out_dir)?;
        let path = self.accuracy_plot_path();
        self.render_accuracy(&path)?;
        Ok(path)
    }

    fn render_average_time(&self, out_path: &Path) -> Result<(), Box<dyn Error>> {
        let stages: Vec<usize> = self.rounds.iter().map(|r| r.stage).unique().collect();
        let max_round = self.rounds.iter().map(|r| r.round).max().unwrap_or(1);

        let root = BitMapBackend::new(out_path, (1500, 1000)).into_drawing_area();
        root.fill(&WHITE)?;
        let panels = root.split_evenly((SUBPLOT_ROWS, SUBPLOT_COLS));

        for (panel, &stage) in panels.iter().zip(stages.iter()) {
            let points: Vec<(f64, f64)> = self
                .rounds
                .iter()
                .filter(|r| r.stage == stage)
                .map(|r| (r.round as f64, r.average_time_per_square))
                .filter(|(_, y)| y.is_finite())
                .collect();

            let y_max = points
                .iter()
                .map(|&(_, y)| y)
                .fold(0.0f64, f64::max)
                .max(1e-6)
                * 1.1;

            let mut chart = ChartBuilder::on(panel)
                .caption(
                    format!("Stage {stage} - Average time per square"),
                    ("sans-serif", 24),
                )
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(60)
                .build_cartesian_2d(0.5f64..max_round as f64 + 0.5, 0.0f64..y_max)?;

            chart
                .configure_mesh()
                .x_desc("Round [#]")
                .y_desc("Average time per square [s]")
                .x_labels(max_round)
                .x_label_formatter(&|x| format!("{x:.0}"))
                .draw()?;

            chart.draw_series(LineSeries::new(points.clone(), &BLUE))?;
            chart.draw_series(points.iter().map(|p| Circle::new(*p, 4, BLUE.filled())))?;
        }

        root.present()?;
        Ok(())
    }

    fn render_accuracy(&self, out_path: &Path) -> Result<(), Box<dyn Error>> {
        let points = mean_accuracy_per_round(&self.rounds);
        let max_round = self.rounds.iter().map(|r| r.round).max().unwrap_or(1);

        let root = BitMapBackend::new(out_path, (1000, 500)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Overall average accuracy per round", ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.5f64..max_round as f64 + 0.5, 0.0f64..110.0f64)?;

        chart
            .configure_mesh()
            .x_desc("Round [#]")
            .y_desc("Average accuracy [%]")
            .x_labels(max_round)
            .x_label_formatter(&|x| format!("{x:.0}"))
            .y_labels(11)
            .draw()?;

        chart.draw_series(LineSeries::new(points.clone(), &BLUE))?;
        chart.draw_series(points.iter().map(|p| Circle::new(*p, 4, BLUE.filled())))?;

        root.present()?;
        Ok(())
    }
}

/// Per round number, the mean accuracy across stages (in percent), ordered by
/// round.
pub fn mean_accuracy_per_round(rounds: &[RoundSummary]) -> Vec<(f64, f64)> {
    rounds
        .iter()
        .map(|r| (r.round, r.accuracy))
        .into_group_map()
        .into_iter()
        .map(|(round, values)| {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (round as f64, mean * 100.0)
        })
        .sorted_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::Exporter;
    use crate::results::RoundResult;
    use tempfile::tempdir;

    fn summary(stage: usize, round: usize, accuracy: f64) -> RoundSummary {
        RoundSummary {
            stage,
            round,
            selected_squares: Vec::new(),
            clicked_positions: Vec::new(),
            mistakes_in_stage: 0,
            click_times: Vec::new(),
            average_time_per_square: f64::NAN,
            accuracy,
        }
    }

    #[test]
    fn accuracy_is_averaged_across_stages_per_round() {
        let rounds = vec![
            summary(1, 1, 1.0),
            summary(2, 1, 0.5),
            summary(1, 2, 0.0),
            summary(2, 2, 1.0),
        ];
        let points = mean_accuracy_per_round(&rounds);
        assert_eq!(points, vec![(1.0, 75.0), (2.0, 50.0)]);
    }

    #[test]
    fn plot_paths_follow_the_export_stem() {
        let dir = tempdir().unwrap();
        let results = vec![RoundResult {
            session: 1,
            stage: 1,
            round: 1,
            selected_squares: vec![(0, 0)],
            clicked_positions: vec![(0, 0)],
            mistakes_in_stage: 0,
            click_times: vec![0.8],
        }];
        let csv_path = Exporter::new(&results, dir.path().join("202401011200"))
            .save_to_csv()
            .unwrap();

        let plotter = SummaryPlotter::from_csv(&csv_path)
            .unwrap()
            .with_out_dir(dir.path().join("plots"));
        assert_eq!(
            plotter.average_time_plot_path().file_name().unwrap(),
            "202401011200_average_time_per_square.png"
        );
        assert_eq!(
            plotter.accuracy_plot_path().file_name().unwrap(),
            "202401011200_overall_average_accuracy.png"
        );
    }
}
