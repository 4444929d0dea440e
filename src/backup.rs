use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::submitter::ResultsPayload;

/// Writes unsubmitted result sets to disk so a failed upload loses nothing.
#[derive(Debug, Clone)]
pub struct ResultsBackup {
    dir: PathBuf,
}

impl ResultsBackup {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes one CSV file per call and returns its path.
    pub fn write(&self, payload: &ResultsPayload) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let file_name = format!(
            "{}_{}.csv",
            Local::now().format("%Y%m%dT%H%M%S%.3f"),
            sanitize(&payload.participant)
        );
        let path = self.dir.join(file_name);

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["email", "word", "emotion", "language", "response", "responseTime"])?;
        for record in &payload.records {
            let emotion = record.emotion.to_string();
            let response = record.response.to_string();
            let latency = record.latency_ms.to_string();
            writer.write_record([
                payload.participant.as_str(),
                record.word.as_str(),
                emotion.as_str(),
                record.language.as_str(),
                response.as_str(),
                latency.as_str(),
            ])?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), records = payload.records.len(), "results backed up");
        Ok(path)
    }
}

fn sanitize(participant: &str) -> String {
    participant
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantId;
    use crate::recorder::TrialRecord;
    use crate::stimulus::{Polarity, WordStimulus};
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let backup = ResultsBackup::new(dir.path().join("backups"));
        let id = ParticipantId::parse("a.b@lab.example").unwrap();
        let payload = ResultsPayload::new(
            &id,
            vec![
                TrialRecord::new(
                    &WordStimulus::new("barış, huzur", Polarity::Positive, "tr"),
                    Polarity::Positive,
                    388,
                ),
                TrialRecord::new(
                    &WordStimulus::new("war", Polarity::Negative, "en"),
                    Polarity::Positive,
                    1204,
                ),
            ],
        );

        let path = backup.write(&payload).unwrap();

        assert!(path.starts_with(dir.path().join("backups")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_a.b_lab.example.csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(5), Some("responseTime"));
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(1), Some("barış, huzur"));
        assert_eq!(rows[1].get(2), Some("negative"));
        assert_eq!(rows[1].get(4), Some("positive"));
        assert_eq!(rows[1].get(5), Some("1204"));
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize("x/../y@z"), "x_.._y_z");
    }
}
