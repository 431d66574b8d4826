//! Text report printed by the report rank.

use crate::bench::aggregate::SweepReport;
use crate::bench::timing::DistanceSummary;
use crate::topology::Topology;
use crate::types::Rank;
use chrono::{DateTime, Local};
use std::fmt::Write;
use std::time::Instant;

/// Significant digits for per-distance lines and the header.
const SHORT_PRECISION: usize = 6;
/// Significant digits for the matrix and the step extremes.
const LONG_PRECISION: usize = 8;
/// `ctime(3)` layout, e.g. `Fri Jan  5 09:03:07 2024`.
const CTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Everything the report needs, borrowed from the finished run.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    /// When the sweep started, after host discovery.
    pub started_at: DateTime<Local>,
    /// How this process was invoked, as given on the command line.
    pub program: &'a str,
    pub rank: Rank,
    pub world_size: u32,
    pub timer_resolution: f64,
    pub topology: &'a Topology,
    pub bufcnt: usize,
    pub bufsize: usize,
    /// This rank's own per-distance averages.
    pub distances: &'a [DistanceSummary],
    pub sweep: &'a SweepReport,
}

/// Bytes moved per repetition (two sends and two receives of `bufsize`)
/// divided by `secs`.
pub fn achieved_bandwidth(bufsize: usize, secs: f64) -> f64 {
    (4 * bufsize) as f64 / secs
}

/// The name this process was started under, or `ringbench` if unknown.
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ringbench".to_owned())
}

/// Smallest nonzero step of the monotonic clock, in seconds.
pub fn timer_resolution() -> f64 {
    let mut best = f64::INFINITY;
    for _ in 0..64 {
        let start = Instant::now();
        let mut now = Instant::now();
        while now == start {
            now = Instant::now();
        }
        best = best.min((now - start).as_secs_f64());
    }
    best
}

/// Format like C's `%g` with `precision` significant digits.
pub fn format_sig(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".into()
        } else if value > 0.0 {
            "inf".into()
        } else {
            "-inf".into()
        };
    }
    if value == 0.0 {
        return "0".into();
    }
    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= precision as i32 {
        let mantissa = strip_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{value:.decimals$}")).to_owned()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Render the full report.
pub fn render(input: &ReportInput<'_>) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_report(&mut out, input);
    out
}

fn write_report(out: &mut String, input: &ReportInput<'_>) -> std::fmt::Result {
    let sweep = input.sweep;
    let short = |v: f64| format_sig(v, SHORT_PRECISION);
    let long = |v: f64| format_sig(v, LONG_PRECISION);

    writeln!(out, "# --> BEGIN execution")?;
    writeln!(out, "# {}", input.started_at.format(CTIME_FORMAT))?;
    writeln!(out, "# {}", input.program)?;
    writeln!(out, "# nranks = {}", input.world_size)?;
    writeln!(out, "# timer resolution = {}", short(input.timer_resolution))?;
    writeln!(out, "{}", join(input.topology.hosts.iter()))?;
    write!(out, "# unique hosts ({}): ", input.topology.unique_hosts.len())?;
    for h in &input.topology.unique_hosts {
        write!(out, "{h} ")?;
    }
    writeln!(out)?;
    writeln!(out, "# bufcnt  = {} (elements)", input.bufcnt)?;
    writeln!(out, "# bufsize = {} (bytes)", input.bufsize)?;
    writeln!(out, "# aggregation = {}", sweep.strategy)?;
    writeln!(out, "# myrank, procup, procdn=")?;

    for d in input.distances {
        writeln!(
            out,
            "# {:>5}, {:>5}, {:>5} / {:>12}\t (sec) / {:>12} (bytes/sec)",
            input.rank,
            d.pair.up,
            d.pair.down,
            short(d.avg_elapsed),
            short(achieved_bandwidth(input.bufsize, d.avg_elapsed)),
        )?;
    }

    writeln!(
        out,
        "# gather ({}) on {} ranks required {} (sec)",
        sweep.strategy,
        input.world_size,
        short(sweep.gather_elapsed)
    )?;

    for sender in 0..input.world_size {
        let host = input
            .topology
            .hosts
            .get(sender as usize)
            .map(|h| h.as_str())
            .unwrap_or("?");
        let row = sweep.matrix.sender_row(sender);
        writeln!(out, "{host}, {}", join(row.into_iter().map(long)))?;
    }

    let t = sweep.extremes;
    writeln!(
        out,
        "# Fastest Step: t_min = {} (sec), {} (bytes/sec)",
        long(t.t_min),
        long(achieved_bandwidth(input.bufsize, t.t_min))
    )?;
    writeln!(
        out,
        "# Slowest Step: t_max = {} (sec), {} (bytes/sec)",
        long(t.t_max),
        long(achieved_bandwidth(input.bufsize, t.t_max))
    )?;
    writeln!(out, "# --> END execution")
}

fn join<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
