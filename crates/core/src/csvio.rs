//! CSV surface: process-graph input, event-timeline export, and the
//! starter template.

use std::collections::HashMap;

use thiserror::Error;

use crate::event::SimEvent;
use crate::process::{DEFAULT_STATION, OpType, ProcessGraph, TaskDef};
use crate::timegrid::TimeMapping;

/// Required columns of the process CSV, in canonical order. A trailing
/// `station` column is optional; unknown columns are ignored.
pub const PROCESS_CSV_HEADERS: [&str; 10] = [
    "step_id",
    "task_name",
    "op_type",
    "predecessors",
    "std_duration",
    "time_variance",
    "work_load_score",
    "rework_prob",
    "required_workers",
    "required_tools",
];

/// Columns of the exported event timeline.
pub const EVENT_CSV_HEADERS: [&str; 13] = [
    "engine_id",
    "step_id",
    "task_name",
    "op_type",
    "start_day",
    "start_hour",
    "end_day",
    "end_hour",
    "duration_minutes",
    "event_type",
    "workers",
    "equipment",
    "rework_count",
];

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("missing required column `{0}`")]
    MissingColumn(String),

    #[error("csv input is malformed: {0}")]
    Malformed(#[from] csv::Error),

    #[error("no process steps found in csv input")]
    Empty,

    #[error("{}", .errors.join("; "))]
    Rows { errors: Vec<String> },

    #[error("csv export failed: {0}")]
    Export(String),
}

/// A parsed process graph plus non-fatal observations about the input.
#[derive(Debug)]
pub struct ParsedProcess {
    pub process: ProcessGraph,
    pub warnings: Vec<String>,
}

/// Parses a process CSV: UTF-8 with optional BOM, `;`-separated list
/// cells, lower-case op types normalised, unknown columns ignored.
pub fn parse_process_csv(content: &str) -> Result<ParsedProcess, CsvError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
        .collect();
    for required in PROCESS_CSV_HEADERS {
        if !columns.contains_key(required) {
            return Err(CsvError::MissingColumn(required.to_string()));
        }
    }
    let station_column = columns.get("station").copied();

    let mut tasks = Vec::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (offset, record) in reader.records().enumerate() {
        let row = offset + 2;
        let record = record?;
        let cell = |name: &str| cell_of(&record, &columns, name);

        let step_id = cell("step_id").to_string();
        if step_id.is_empty() {
            errors.push(format!("row {row}: step_id must not be empty"));
            continue;
        }
        let task_name = cell("task_name").to_string();
        if task_name.is_empty() {
            errors.push(format!("row {row}: task_name must not be empty"));
            continue;
        }

        let raw_op = cell("op_type");
        let op_type = match OpType::parse(raw_op) {
            Some(op) => op,
            None => {
                warnings.push(format!(
                    "row {row}: unknown op_type `{raw_op}`, defaulting to A"
                ));
                OpType::A
            }
        };

        let mean_duration = match parse_f64(cell("std_duration"), row, "std_duration") {
            Ok(v) if v >= 0.0 => v,
            Ok(v) => {
                errors.push(format!("row {row}: std_duration must be >= 0, got {v}"));
                continue;
            }
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        let duration_stddev = match parse_f64(cell("time_variance"), row, "time_variance") {
            Ok(v) if v >= 0.0 => v,
            Ok(v) => {
                errors.push(format!("row {row}: time_variance must be >= 0, got {v}"));
                continue;
            }
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        let work_load_score = match parse_u32(cell("work_load_score"), row, "work_load_score", 5) {
            Ok(v @ 1..=10) => v as u8,
            Ok(v) => {
                warnings.push(format!(
                    "row {row}: work_load_score {v} outside 1..=10, clamping"
                ));
                v.clamp(1, 10) as u8
            }
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        let rework_prob = match parse_f64(cell("rework_prob"), row, "rework_prob") {
            Ok(v) if (0.0..=1.0).contains(&v) => v,
            Ok(v) => {
                errors.push(format!("row {row}: rework_prob must be in 0..=1, got {v}"));
                continue;
            }
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        let required_workers = match parse_u32(cell("required_workers"), row, "required_workers", 1)
        {
            Ok(v) if v >= 1 => v as usize,
            Ok(v) => {
                errors.push(format!("row {row}: required_workers must be >= 1, got {v}"));
                continue;
            }
            Err(err) => {
                errors.push(err);
                continue;
            }
        };

        let station = match station_column {
            Some(idx) => {
                let raw = record.get(idx).unwrap_or("").trim();
                if raw.is_empty() {
                    DEFAULT_STATION.to_string()
                } else {
                    raw.to_string()
                }
            }
            None => DEFAULT_STATION.to_string(),
        };

        tasks.push(TaskDef {
            step_id,
            task_name,
            op_type,
            predecessors: split_list(cell("predecessors")),
            mean_duration,
            duration_stddev,
            work_load_score,
            rework_prob,
            required_workers,
            required_tools: split_list(cell("required_tools")),
            station,
        });
    }

    if !errors.is_empty() {
        return Err(CsvError::Rows { errors });
    }
    if tasks.is_empty() {
        return Err(CsvError::Empty);
    }
    Ok(ParsedProcess {
        process: ProcessGraph {
            name: String::new(),
            tasks,
        },
        warnings,
    })
}

/// Renders the event timeline in the export layout: timestamps become
/// (day, hour) pairs on the working-day grid, list cells join with `;`.
pub fn export_events_csv(events: &[SimEvent], mapping: &TimeMapping) -> Result<String, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EVENT_CSV_HEADERS)?;
    for event in events {
        let (start_day, start_hour) = mapping.day_hour(event.start_time);
        let (end_day, end_hour) = mapping.day_hour(event.end_time);
        writer.write_record([
            event.engine_id.to_string(),
            event.step_id.clone(),
            event.task_name.clone(),
            event.op_type.as_str().to_string(),
            start_day.to_string(),
            format!("{start_hour:.2}"),
            end_day.to_string(),
            format!("{end_hour:.2}"),
            format!("{:.2}", event.duration()),
            event.kind.as_str().to_string(),
            event.worker_ids.join(";"),
            event.equipment_used.join(";"),
            event.rework_count.to_string(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| CsvError::Export(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| CsvError::Export(err.to_string()))
}

/// A ten-step example flow for first-run users.
pub fn template_csv() -> String {
    let mut out = String::new();
    out.push_str(&PROCESS_CSV_HEADERS.join(","));
    out.push_str(",station\n");
    out.push_str(
        "S001,Fetch compressor rotor,H,,5,1,4,0,2,hoist,ST01\n\
         S002,Incoming inspection,M,S001,10,2,3,0.05,1,inspection_bench,ST01\n\
         S003,Fit front bearing,A,S002,15,3,6,0,2,assembly_bench,ST02\n\
         S004,Fit rear bearing,A,S002,15,3,6,0,2,assembly_bench,ST02\n\
         S005,Fit seals,A,S003;S004,8,1.5,5,0,1,,ST02\n\
         S006,Balance rotor,M,S005,30,5,4,0.1,1,balancing_machine,ST03\n\
         S007,Record balance data,D,S006,5,0.5,2,0,1,,ST03\n\
         S008,Final assembly,A,S007,20,4,7,0,2,assembly_bench,ST04\n\
         S009,Prepare test run,T,S008,10,2,5,0,2,test_stand,ST05\n\
         S010,Full test run,M,S009,60,10,6,0.15,2,test_stand,ST05\n",
    );
    out
}

fn cell_of<'r>(
    record: &'r csv::StringRecord,
    columns: &HashMap<String, usize>,
    name: &str,
) -> &'r str {
    columns
        .get(name)
        .and_then(|&idx| record.get(idx))
        .unwrap_or("")
        .trim()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_f64(raw: &str, row: usize, column: &str) -> Result<f64, String> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse()
        .map_err(|_| format!("row {row}: {column} is not a number: `{raw}`"))
}

fn parse_u32(raw: &str, row: usize, column: &str, default: u32) -> Result<u32, String> {
    if raw.is_empty() {
        return Ok(default);
    }
    raw.parse()
        .map_err(|_| format!("row {row}: {column} is not an integer: `{raw}`"))
}
