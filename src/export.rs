use crate::results::RoundResult;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Export field order, shared by all three formats.
pub const FIELDS: [&str; 7] = [
    "Session",
    "Stage",
    "Round",
    "Selected_squares",
    "Clicked_positions",
    "Mistakes_in_stage",
    "Click_times",
];

/// Writes the full result list as `<base>.csv`, `<base>.txt` and
/// `<base>.json`. List-valued fields are encoded as JSON array text in the
/// CSV and TXT forms, so they can be parsed back without evaluating anything.
pub struct Exporter<'a> {
    results: &'a [RoundResult],
    base: PathBuf,
}

impl<'a> Exporter<'a> {
    pub fn new<P: AsRef<Path>>(results: &'a [RoundResult], base: P) -> Self {
        Self {
            results,
            base: base.as_ref().to_path_buf(),
        }
    }

    /// Writes all three formats and returns the CSV path for plotting.
    pub fn save_all(&self) -> io::Result<PathBuf> {
        let csv_path = self.save_to_csv()?;
        self.save_to_txt()?;
        self.save_to_json()?;
        Ok(csv_path)
    }

    pub fn save_to_csv(&self) -> io::Result<PathBuf> {
        let path = self.base.with_extension("csv");
        let mut writer = csv::Writer::from_path(&path).map_err(io::Error::other)?;
        writer.write_record(FIELDS).map_err(io::Error::other)?;
        for result in self.results {
            writer
                .write_record([
                    result.session.to_string(),
                    result.stage.to_string(),
                    result.round.to_string(),
                    json_field(&result.selected_squares)?,
                    json_field(&result.clicked_positions)?,
                    result.mistakes_in_stage.to_string(),
                    json_field(&result.click_times)?,
                ])
                .map_err(io::Error::other)?;
        }
        writer.flush()?;
        Ok(path)
    }

    pub fn save_to_txt(&self) -> io::Result<PathBuf> {
        let path = self.base.with_extension("txt");
        let mut file = BufWriter::new(File::create(&path)?);
        for result in self.results {
            writeln!(file, "Session: {}", result.session)?;
            writeln!(file, "Stage: {}", result.stage)?;
            writeln!(file, "Round: {}", result.round)?;
            writeln!(file, "Selected_squares: {}", json_field(&result.selected_squares)?)?;
            writeln!(file, "Clicked_positions: {}", json_field(&result.clicked_positions)?)?;
            writeln!(file, "Mistakes_in_stage: {}", result.mistakes_in_stage)?;
            writeln!(file, "Click_times: {}", json_field(&result.click_times)?)?;
            writeln!(file)?;
        }
        file.flush()?;
        Ok(path)
    }

    pub fn save_to_json(&self) -> io::Result<PathBuf> {
        let path = self.base.with_extension("json");
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, self.results).map_err(io::Error::from)?;
        Ok(path)
    }
}

fn json_field<T: serde::Serialize>(value: &T) -> io::Result<String> {
    serde_json::to_string(value).map_err(io::Error::from)
}
