use std::fmt;

use time::{Duration, OffsetDateTime};

use crate::{
    model::{
        agg::{LiveState, RankKey, ResolvedFile},
        peak::{CloseReason, PeakReport, PeakWindow},
    },
    monitor::MonitorEvent,
};

/// Clear screen, cursor home.
const CLEAR: &str = "\x1b[2J\x1b[H";

pub fn print_event(event: &MonitorEvent, rank: RankKey) {
    print!("{}", render_event_to_string(event, rank));
}

pub fn render_event_to_string(event: &MonitorEvent, rank: RankKey) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = write_event(&mut out, event, rank);
    out
}

fn write_event<W: fmt::Write>(out: &mut W, event: &MonitorEvent, rank: RankKey) -> fmt::Result {
    match event {
        MonitorEvent::Baseline { at } => {
            writeln!(out, "Found initial zero at {}", clock(*at))
        }
        MonitorEvent::PeakStarted(window) => write_peak_start(out, window),
        MonitorEvent::PeakEnded(report) => write_peak_report(out, report, rank),
    }
}

fn write_peak_start<W: fmt::Write>(out: &mut W, window: &PeakWindow) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "Peak started at {}", clock(window.start))?;
    writeln!(
        out,
        "Time from zero to peak: {:.2} seconds",
        seconds(window.time_to_peak())
    )
}

fn write_peak_report<W: fmt::Write>(out: &mut W, report: &PeakReport, rank: RankKey) -> fmt::Result {
    let end = report.window.end.unwrap_or(report.window.start);
    let lasted = seconds(report.window.duration().unwrap_or(Duration::ZERO));

    match report.reason {
        CloseReason::ReturnedToZero => {
            writeln!(out, "Returns to zero at {}", clock(end))?;
            writeln!(out, "Time from peak to zero: {lasted:.2} seconds")?;
        }
        reason => {
            writeln!(out, "Peak cut short ({}) at {}", reason.label(), clock(end))?;
            writeln!(out, "Time in peak so far: {lasted:.2} seconds")?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Most accessed files during peak (by {}):", rank.label())?;
    if report.files.is_empty() {
        writeln!(out, "  no matching file activity recorded")?;
        if !report.sampler_alive {
            writeln!(out, "  (per-file sampler was not running)")?;
        }
    }
    for file in &report.files {
        writeln!(out)?;
        write_file(out, file)?;
    }
    if report.files_seen > report.files.len() {
        writeln!(out)?;
        writeln!(
            out,
            "({} more files not shown)",
            report.files_seen - report.files.len()
        )?;
    }
    writeln!(out, "{:-<50}", "")
}

fn write_file<W: fmt::Write>(out: &mut W, file: &ResolvedFile) -> fmt::Result {
    writeln!(out, "File: {}", file.filename)?;
    if file.paths.is_empty() {
        writeln!(out, "Full path(s): none found")?;
    } else {
        writeln!(out, "Full path(s):")?;
        for path in &file.paths {
            writeln!(out, "  -> {}", path.display())?;
        }
    }
    let s = &file.stats;
    writeln!(out, "Processes: {}", join(&s.processes))?;
    writeln!(out, "Reads: {}, Read KB: {:.2}", s.reads, s.read_kb.as_f64())?;
    writeln!(out, "Writes: {}, Write KB: {:.2}", s.writes, s.write_kb.as_f64())
}

/// Plain-terminal rendition of the live view, one full screen per call.
pub fn render_live_to_string(state: &LiveState) -> String {
    let mut out = String::new();
    let _ = write_live(&mut out, state);
    out
}

fn write_live<W: fmt::Write>(out: &mut W, state: &LiveState) -> fmt::Result {
    let rank = state.rank;
    out.write_str(CLEAR)?;
    writeln!(
        out,
        "Top files by I/O ({}), {} samples, {} files",
        rank.label(),
        state.samples,
        state.files_seen
    )?;
    if state.sampler_closed {
        writeln!(out, "[sampler exited, totals frozen]")?;
    }
    writeln!(out, "{:-<80}", "")?;

    for file in &state.rows {
        writeln!(out)?;
        writeln!(out, "File: {}", file.filename)?;
        for path in &file.paths {
            writeln!(out, "Path: {}", path.display())?;
        }
        let s = &file.stats;
        writeln!(out, "Processes: {}", join(&s.processes))?;
        writeln!(out, "Reads: {}, Read KB: {:.2}", s.reads, s.read_kb.as_f64())?;
        writeln!(out, "Writes: {}, Write KB: {:.2}", s.writes, s.write_kb.as_f64())?;
        writeln!(out, "Total KB: {:.2}", s.total_kb().as_f64())?;
        writeln!(out, "{:-<40}", "")?;
    }
    Ok(())
}

pub fn clock(ts: OffsetDateTime) -> String {
    format!("{:02}:{:02}:{:02}", ts.hour(), ts.minute(), ts.second())
}

pub fn seconds(d: Duration) -> f64 {
    d.as_seconds_f64()
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, path::PathBuf};

    use super::*;
    use crate::model::agg::{FileAggregate, Kb};

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn window(end: Option<i64>) -> PeakWindow {
        PeakWindow {
            baseline: at(3600),
            start: at(3602),
            end: end.map(at),
        }
    }

    fn file(name: &str, paths: &[&str]) -> ResolvedFile {
        ResolvedFile {
            filename: name.to_string(),
            paths: paths.iter().map(PathBuf::from).collect(),
            stats: FileAggregate {
                reads: 3,
                writes: 1,
                read_kb: Kb::from_f64(15.0),
                write_kb: Kb::from_f64(0.5),
                processes: BTreeSet::from(["java".to_string(), "kafka".to_string()]),
            },
        }
    }

    #[test]
    fn baseline_and_start_lines() {
        let s = render_event_to_string(&MonitorEvent::Baseline { at: at(3600) }, RankKey::Combined);
        assert_eq!(s, "Found initial zero at 01:00:00\n");

        let s = render_event_to_string(&MonitorEvent::PeakStarted(window(None)), RankKey::Combined);
        assert!(s.contains("Peak started at 01:00:02"));
        assert!(s.contains("Time from zero to peak: 2.00 seconds"));
    }

    #[test]
    fn report_lists_files_and_paths() {
        let report = PeakReport {
            window: window(Some(3607)),
            reason: CloseReason::ReturnedToZero,
            files: vec![
                file("a.log", &["/mnt/kafka-disks/t-0/a.log", "/mnt/kafka-disks/t-1/a.log"]),
                file("b.log", &[]),
            ],
            files_seen: 2,
            sampler_alive: true,
        };
        let s = render_event_to_string(&MonitorEvent::PeakEnded(report), RankKey::Combined);

        assert!(s.contains("Returns to zero at 01:00:07"));
        assert!(s.contains("Time from peak to zero: 5.00 seconds"));
        assert!(s.contains("Most accessed files during peak (by read+write KB):"));
        assert!(s.contains("  -> /mnt/kafka-disks/t-1/a.log"));
        assert!(s.contains("File: b.log\nFull path(s): none found\n"));
        assert!(s.contains("Processes: java, kafka"));
        assert!(s.contains("Reads: 3, Read KB: 15.00"));
        assert!(s.contains("Writes: 1, Write KB: 0.50"));
        assert!(s.ends_with(&format!("{}\n", "-".repeat(50))));
        assert!(!s.contains("more files"));
    }

    #[test]
    fn cut_short_report_says_why() {
        let report = PeakReport {
            window: window(Some(3604)),
            reason: CloseReason::Interrupted,
            files: Vec::new(),
            files_seen: 0,
            sampler_alive: false,
        };
        let s = render_event_to_string(&MonitorEvent::PeakEnded(report), RankKey::Read);
        assert!(s.contains("Peak cut short (interrupted) at 01:00:04"));
        assert!(s.contains("by read KB"));
        assert!(s.contains("no matching file activity recorded"));
        assert!(s.contains("per-file sampler was not running"));
    }

    #[test]
    fn live_render_clears_screen() {
        let state = LiveState {
            rows: vec![file("a.log", &["/d/a.log"])],
            files_seen: 4,
            samples: 9,
            rank: RankKey::Combined,
            sampler_closed: false,
        };
        let s = render_live_to_string(&state);
        assert!(s.starts_with(CLEAR));
        assert!(s.contains("9 samples, 4 files"));
        assert!(s.contains("Path: /d/a.log"));
        assert!(s.contains("Total KB: 15.50"));
    }
}
