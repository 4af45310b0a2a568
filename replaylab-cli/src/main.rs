//! ReplayLab CLI — run replay sessions and inspect event journals.
//!
//! Commands:
//! - `run` — load CSV bars, create a session, drive it with a step count or
//!   an action script, and print the resulting state
//! - `events` — dump a session's journal, optionally as CSV

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use replaylab_core::data::MarketFeed;
use replaylab_core::domain::{Bar, OrderId, OrderSide, SessionId};
use replaylab_core::journal::{Journal, JsonlJournal};
use replaylab_core::session::{ReplaySession, SessionConfig};

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI — deterministic market replay and paper trading"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a replay session over CSV bars.
    Run {
        /// CSV file with header ts,open,high,low,close,volume (RFC 3339 ts).
        #[arg(long)]
        bars: PathBuf,

        /// Symbol the bars belong to.
        #[arg(long)]
        symbol: String,

        /// Path to a TOML session config. Flags below override nothing when
        /// this is given.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Execution clock period in seconds.
        #[arg(long, default_value_t = 60)]
        exec_tf: u32,

        /// Display clock period in seconds.
        #[arg(long, default_value_t = 300)]
        disp_tf: u32,

        /// Master seed for anchor selection.
        #[arg(long)]
        seed: Option<u64>,

        /// Display steps to advance when no script is given.
        #[arg(long, default_value_t = 10)]
        steps: u32,

        /// Use delta stepping instead of full-snapshot stepping.
        #[arg(long, default_value_t = false)]
        delta: bool,

        /// Action script, one action per line: step N, step-delta,
        /// buy-limit PRICE QTY, sell-limit PRICE QTY, buy QTY, sell QTY,
        /// cancel ORDER_ID, modify ORDER_ID PRICE, flatten, pause, play.
        #[arg(long)]
        script: Option<PathBuf>,

        /// Journal file to append events to.
        #[arg(long, default_value = "events.jsonl")]
        journal: PathBuf,

        /// Session id to record events under.
        #[arg(long, default_value = "cli-session")]
        session_id: String,
    },
    /// Dump the journal for a session.
    Events {
        /// Journal file.
        #[arg(long, default_value = "events.jsonl")]
        journal: PathBuf,

        /// Session id to fetch.
        #[arg(long)]
        session_id: String,

        /// Write CSV to this path instead of printing JSON lines.
        #[arg(long)]
        csv_out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            bars,
            symbol,
            config,
            exec_tf,
            disp_tf,
            seed,
            steps,
            delta,
            script,
            journal,
            session_id,
        } => cmd_run(
            &bars, &symbol, config, exec_tf, disp_tf, seed, steps, delta, script, &journal,
            &session_id,
        ),
        Commands::Events {
            journal,
            session_id,
            csv_out,
        } => cmd_events(&journal, &session_id, csv_out),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    bars_path: &Path,
    symbol: &str,
    config_path: Option<PathBuf>,
    exec_tf: u32,
    disp_tf: u32,
    seed: Option<u64>,
    steps: u32,
    delta: bool,
    script: Option<PathBuf>,
    journal_path: &Path,
    session_id: &str,
) -> Result<()> {
    let bars = load_bars_csv(bars_path)
        .with_context(|| format!("loading bars from {}", bars_path.display()))?;
    println!("Loaded {} bars from {}", bars.len(), bars_path.display());

    let feed = MarketFeed::new(symbol, bars)?;

    let config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<SessionConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => {
            let mut config = SessionConfig::new(symbol);
            config.exec_tf_sec = exec_tf;
            config.disp_tf_sec = disp_tf;
            config.seed = seed;
            config
        }
    };

    let journal = Arc::new(JsonlJournal::open(journal_path)?);
    let mut session = ReplaySession::create(
        SessionId::new(session_id),
        config,
        &feed,
        journal.clone(),
    )?;
    println!(
        "Session '{}' anchored at {} (runway until {})",
        session_id,
        session.t_start(),
        session.t_end()
    );

    match script {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading script {}", path.display()))?;
            run_script(&mut session, &text)?;
        }
        None if delta => {
            for _ in 0..steps {
                let tick = session.step_delta()?;
                println!(
                    "delta: +{} bars, {} fills, {} windows",
                    tick.append_bars.len(),
                    tick.fills.len(),
                    tick.windows_advanced
                );
                if tick.ended {
                    break;
                }
            }
        }
        None => {
            session.step(steps)?;
        }
    }

    let state = session.state_payload();
    println!(
        "cursor={} position={:+.2} @ {:.4} realized_pnl={:.2} orders={} last_event_id={}",
        state.cursor_exec_ts,
        state.position.qty,
        state.position.avg_price,
        state.position.realized_pnl,
        state.orders.len(),
        state.last_event_id
    );

    let summary = session.end()?;
    println!(
        "Session ended: {}",
        serde_json::to_string_pretty(&summary.summary_json)?
    );
    Ok(())
}

/// Execute a newline-separated action script against a session.
///
/// Actions: `step N`, `step-delta`, `buy-limit PRICE QTY`,
/// `sell-limit PRICE QTY`, `buy QTY`, `sell QTY`, `cancel ORDER_ID`,
/// `modify ORDER_ID PRICE`, `flatten`, `pause`, `play`.
fn run_script(session: &mut ReplaySession, text: &str) -> Result<()> {
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let action = parts.next().expect("non-empty line");
        let args: Vec<&str> = parts.collect();

        let fail = |msg: &str| anyhow::anyhow!("script line {}: {msg}: '{raw}'", lineno + 1);

        match (action, args.as_slice()) {
            ("step", [n]) => {
                let n: u32 = n.parse().map_err(|_| fail("bad step count"))?;
                session.step(n)?;
            }
            ("step-delta", []) => {
                let tick = session.step_delta()?;
                println!(
                    "delta: +{} bars, {} fills",
                    tick.append_bars.len(),
                    tick.fills.len()
                );
            }
            ("buy-limit", [price, qty]) | ("sell-limit", [price, qty]) => {
                let side = if action == "buy-limit" {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                };
                let price: f64 = price.parse().map_err(|_| fail("bad price"))?;
                let qty: f64 = qty.parse().map_err(|_| fail("bad qty"))?;
                let order = session.place_limit(side, price, qty, None)?;
                println!("placed {} {:?} {} @ {}", order.id, side, qty, price);
            }
            ("buy", [qty]) | ("sell", [qty]) => {
                let side = if action == "buy" {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                };
                let qty: f64 = qty.parse().map_err(|_| fail("bad qty"))?;
                let (order, price) = session.place_market(side, qty, None)?;
                match price {
                    Some(price) => println!("{} filled {} @ {}", order.id, qty, price),
                    None => println!("{} placed, no reference price yet", order.id),
                }
            }
            ("cancel", [id]) => {
                let ok = session.cancel(&OrderId::new(*id))?;
                println!("cancel {id}: {}", if ok { "ok" } else { "already resolved" });
            }
            ("modify", [id, price]) => {
                let price: f64 = price.parse().map_err(|_| fail("bad price"))?;
                let ok = session.modify(&OrderId::new(*id), price)?;
                println!("modify {id}: {}", if ok { "ok" } else { "already resolved" });
            }
            ("flatten", []) => {
                match session.flatten_now(None)? {
                    Some(price) => println!("flattened @ {price}"),
                    None => println!("already flat"),
                }
            }
            ("pause", []) => {
                session.pause()?;
            }
            ("play", []) => {
                session.play()?;
            }
            _ => bail!("script line {}: unknown action: '{raw}'", lineno + 1),
        }
    }
    Ok(())
}

fn cmd_events(journal_path: &Path, session_id: &str, csv_out: Option<PathBuf>) -> Result<()> {
    let journal = JsonlJournal::open(journal_path)?;
    let events = journal.events_for_session(&SessionId::new(session_id))?;
    if events.is_empty() {
        println!("No events for session '{session_id}'");
        return Ok(());
    }

    match csv_out {
        Some(path) => {
            let mut wtr = csv::Writer::from_path(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            wtr.write_record(["id", "ts_exec", "ts_market", "event_type", "payload"])?;
            for event in &events {
                wtr.write_record([
                    event.id.to_string(),
                    event.ts_exec.to_rfc3339(),
                    event
                        .ts_market
                        .map(|ts| ts.to_rfc3339())
                        .unwrap_or_default(),
                    serde_json::to_string(&event.event_type)?.trim_matches('"').to_string(),
                    event.payload.to_string(),
                ])?;
            }
            wtr.flush()?;
            println!("Wrote {} events to {}", events.len(), path.display());
        }
        None => {
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
    }
    Ok(())
}

/// Load bars from a CSV with header `ts,open,high,low,close,volume`.
/// Rejects rows that fail the OHLC sanity check.
fn load_bars_csv(path: &Path) -> Result<Vec<Bar>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 2; // 1-based, after the header
        let parse_f64 = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("row {row}: missing {name}"))?
                .trim()
                .parse::<f64>()
                .with_context(|| format!("row {row}: bad {name}"))
        };

        let ts_raw = record.get(0).with_context(|| format!("row {row}: missing ts"))?;
        let ts = ts_raw
            .parse::<DateTime<Utc>>()
            .with_context(|| format!("row {row}: bad ts '{ts_raw}' (want RFC 3339)"))?;

        let bar = Bar {
            ts,
            open: parse_f64(1, "open")?,
            high: parse_f64(2, "high")?,
            low: parse_f64(3, "low")?,
            close: parse_f64(4, "close")?,
            volume: parse_f64(5, "volume")?,
        };
        if !bar.is_sane() {
            bail!("row {row}: insane OHLCV values");
        }
        bars.push(bar);
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("bars.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "ts,open,high,low,close,volume").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    #[test]
    fn loads_valid_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            &[
                "2024-01-02T14:30:00Z,100.0,101.0,99.0,100.5,1000",
                "2024-01-02T14:31:00Z,100.5,101.5,99.5,101.0,1200",
            ],
        );
        let bars = load_bars_csv(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 101.0);
    }

    #[test]
    fn rejects_insane_rows() {
        let dir = tempfile::tempdir().unwrap();
        // High below low.
        let path = write_csv(dir.path(), &["2024-01-02T14:30:00Z,100.0,98.0,99.0,100.5,1000"]);
        assert!(load_bars_csv(&path).is_err());
    }

    #[test]
    fn rejects_bad_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), &["not-a-ts,100.0,101.0,99.0,100.5,1000"]);
        assert!(load_bars_csv(&path).is_err());
    }

    #[test]
    fn script_drives_a_session() {
        let bars: Vec<Bar> = (0..10i64)
            .map(|i| {
                let open = 100.0 + i as f64;
                Bar {
                    ts: "2024-01-02T14:30:00Z".parse::<DateTime<Utc>>().unwrap()
                        + chrono::Duration::minutes(i),
                    open,
                    high: open + 1.0,
                    low: open - 1.0,
                    close: open + 0.5,
                    volume: 1_000.0,
                }
            })
            .collect();
        let feed = MarketFeed::new("SPY", bars).unwrap();
        let mut config = SessionConfig::new("SPY");
        config.start = Some("2024-01-02T14:30:00Z".parse().unwrap());
        config.exec_tf_sec = 60;
        config.disp_tf_sec = 300;

        let mut session = ReplaySession::create(
            SessionId::new("script-test"),
            config,
            &feed,
            Arc::new(replaylab_core::journal::MemoryJournal::new()),
        )
        .unwrap();

        run_script(
            &mut session,
            "# open, ride, close\nbuy-limit 100.0 10\nstep 1\nflatten\n",
        )
        .unwrap();
        assert!(session.position().is_flat());
        assert!(session.position().realized_pnl != 0.0);

        assert!(run_script(&mut session, "frobnicate 1 2\n").is_err());
    }
}
