use crate::snapshot::PointEntry;
use csv::{Terminator, WriterBuilder};
use serde::Serialize;
use std::error::Error;

const HEADER: [&str; 5] = ["GameID", "Time", "Team", "Score", "Assist"];
const MAX_FILE_NAME_LEN: usize = 120;

/// One exported log row. The same shape is used for the CSV file and for the
/// submission payload's `logs` array.
#[derive(Debug, Serialize)]
pub struct LogRow<'a> {
    #[serde(rename = "GameID")]
    pub game_id: &'a str,
    #[serde(rename = "Time")]
    pub time: &'a str,
    #[serde(rename = "Team")]
    pub team: &'a str,
    #[serde(rename = "Score")]
    pub scorer: &'a str,
    #[serde(rename = "Assist")]
    pub assist: &'a str,
}

impl<'a> From<&'a PointEntry> for LogRow<'a> {
    fn from(entry: &'a PointEntry) -> Self {
        Self {
            game_id: &entry.match_id,
            time: &entry.recorded_at,
            team: &entry.team,
            scorer: &entry.scorer,
            assist: &entry.assist,
        }
    }
}

/// Serializes the point log to CSV: the fixed header row, one row per entry
/// in log order, CRLF terminators, and fields quoted (with internal quotes
/// doubled) only when they contain a comma, quote, or line break.
pub fn game_log_csv(log: &[PointEntry]) -> Result<String, Box<dyn Error>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(HEADER)?;
    for entry in log {
        writer.serialize(LogRow::from(entry))?;
    }

    Ok(String::from_utf8(writer.into_inner()?)?)
}

/// `"<TeamA> vs <TeamB>.csv"` with filesystem-unsafe characters replaced by
/// `_` and the whole name capped at 120 characters.
pub fn export_file_name(team_a: &str, team_b: &str) -> String {
    let stem: String = format!("{team_a} vs {team_b}")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_FILE_NAME_LEN - ".csv".len())
        .collect();
    format!("{stem}.csv")
}

/// Builds the fire-and-forget submission payload.
pub fn submission_payload(game_id: &str, date: &str, log: &[PointEntry]) -> serde_json::Value {
    serde_json::json!({
        "GameID": game_id,
        "Date": date,
        "logs": log.iter().map(LogRow::from).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(scorer: &str, assist: &str) -> PointEntry {
        PointEntry {
            id: "id".to_string(),
            match_id: "Red vs Blue".to_string(),
            recorded_at: "2024-05-04 12:00:00".to_string(),
            team: "Red".to_string(),
            scorer: scorer.to_string(),
            assist: assist.to_string(),
        }
    }

    #[test]
    fn test_header_and_line_termination() {
        let csv = game_log_csv(&[entry("Sam", "Alex")]).unwrap();
        let mut lines = csv.split("\r\n");
        assert_eq!(lines.next(), Some("GameID,Time,Team,Score,Assist"));
        assert_eq!(
            lines.next(),
            Some("Red vs Blue,2024-05-04 12:00:00,Red,Sam,Alex")
        );
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_quoting_round_trip() {
        let original = entry("Smith, \"Ace\"", "Jones\nJr");
        let csv = game_log_csv(std::slice::from_ref(&original)).unwrap();
        assert!(csv.contains("\"Smith, \"\"Ace\"\"\""));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[3], original.scorer);
        assert_eq!(&record[4], original.assist);
    }

    #[test]
    fn test_empty_log_still_has_header() {
        let csv = game_log_csv(&[]).unwrap();
        assert_eq!(csv, "GameID,Time,Team,Score,Assist\r\n");
    }

    #[test]
    fn test_file_name_sanitization() {
        assert_eq!(export_file_name("Red", "Blue"), "Red vs Blue.csv");
        assert_eq!(
            export_file_name("Red/Hot?", "Blue: \"B\""),
            "Red_Hot_ vs Blue_ _B_.csv"
        );
    }

    #[test]
    fn test_file_name_truncation() {
        let long = "x".repeat(200);
        let name = export_file_name(&long, &long);
        assert_eq!(name.chars().count(), MAX_FILE_NAME_LEN);
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_submission_payload_shape() {
        let log = vec![entry("Sam", "Alex")];
        let payload = submission_payload("Red vs Blue", "2024-05-04", &log);
        assert_eq!(payload["GameID"], "Red vs Blue");
        assert_eq!(payload["Date"], "2024-05-04");
        assert_eq!(payload["logs"][0]["Score"], "Sam");
        assert_eq!(payload["logs"][0]["Assist"], "Alex");
        assert_eq!(payload["logs"][0]["Team"], "Red");
    }
}
