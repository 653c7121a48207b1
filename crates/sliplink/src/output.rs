use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct DatagramOutput<'a> {
    source: &'a str,
    index: usize,
    size: usize,
    payload: String,
    hex: String,
    timestamp: String,
}

/// Print one received datagram. `source` names the line it arrived on.
pub fn print_datagram(datagram: &[u8], source: &str, index: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DatagramOutput {
                source,
                index,
                size: datagram.len(),
                payload: payload_preview(datagram),
                hex: hex(datagram),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SOURCE", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    index.to_string(),
                    source.to_string(),
                    datagram.len().to_string(),
                    payload_preview(datagram),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{index} source={source} size={} payload={}",
                datagram.len(),
                payload_preview(datagram)
            );
        }
        OutputFormat::Raw => print_raw(datagram),
    }
}

/// Description of a frame produced by `encode` or `send`.
#[derive(Serialize)]
pub struct FrameSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<String>,
    pub datagram_size: usize,
    pub frame_size: usize,
    pub frame_hex: String,
}

impl FrameSummary {
    pub fn new(datagram: &[u8], frame: &[u8]) -> Self {
        Self {
            next_hop: None,
            datagram_size: datagram.len(),
            frame_size: frame.len(),
            frame_hex: hex(frame),
        }
    }
}

pub fn print_frame_summary(summary: &FrameSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NEXT HOP", "DATAGRAM", "FRAME", "WIRE"])
                .add_row(vec![
                    summary.next_hop.clone().unwrap_or_else(|| "-".to_string()),
                    summary.datagram_size.to_string(),
                    summary.frame_size.to_string(),
                    summary.frame_hex.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            if let Some(next_hop) = &summary.next_hop {
                print!("next_hop={next_hop} ");
            }
            println!(
                "datagram={} frame={} wire={}",
                summary.datagram_size, summary.frame_size, summary.frame_hex
            );
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
