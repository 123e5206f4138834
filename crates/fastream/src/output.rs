use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fastream_frame::{Axis, SampleBlock};
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
struct BlockOutput<'a> {
    schema_id: &'a str,
    block: u64,
    samples: usize,
    channels: &'a [usize],
    timestamp: String,
    /// `data[sample][channel] = [x, y]`
    data: Vec<Vec<[i32; 2]>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChannelSummary {
    min: [i32; 2],
    max: [i32; 2],
    mean: [f64; 2],
}

pub fn print_block(block: &SampleBlock, channel_ids: &[usize], index: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = BlockOutput {
                schema_id: "https://schemas.3leaps.dev/fastream/cli/v1/sample-block.schema.json",
                block: index,
                samples: block.samples(),
                channels: channel_ids,
                timestamp: now_unix_seconds(),
                data: block_rows(block),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "BLOCK", "CHANNEL", "SAMPLES", "X MIN", "X MAX", "X MEAN", "Y MIN",
                    "Y MAX", "Y MEAN",
                ]);
            for (column, id) in channel_ids.iter().enumerate() {
                let Some(s) = summarize(block, column) else {
                    continue;
                };
                table.add_row(vec![
                    index.to_string(),
                    id.to_string(),
                    block.samples().to_string(),
                    s.min[0].to_string(),
                    s.max[0].to_string(),
                    format!("{:.1}", s.mean[0]),
                    s.min[1].to_string(),
                    s.max[1].to_string(),
                    format!("{:.1}", s.mean[1]),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "block={} samples={} channels={}",
                index,
                block.samples(),
                channel_ids.len()
            );
            for (column, id) in channel_ids.iter().enumerate() {
                if let Some(s) = summarize(block, column) {
                    println!(
                        "  ch{id:<3} x=[{}, {}] mean {:.1}  y=[{}, {}] mean {:.1}",
                        s.min[0], s.max[0], s.mean[0], s.min[1], s.max[1], s.mean[1]
                    );
                }
            }
        }
        OutputFormat::Raw => {
            print_raw(block.as_bytes());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn block_rows(block: &SampleBlock) -> Vec<Vec<[i32; 2]>> {
    (0..block.samples())
        .map(|s| {
            (0..block.channels())
                .filter_map(|c| block.xy(s, c).map(|(x, y)| [x, y]))
                .collect()
        })
        .collect()
}

fn summarize(block: &SampleBlock, channel: usize) -> Option<ChannelSummary> {
    let x = block.column(channel, Axis::Horizontal)?;
    let y = block.column(channel, Axis::Vertical)?;
    if x.is_empty() {
        return None;
    }
    let stats = |values: &[i32]| {
        let min = values.iter().copied().min().unwrap_or_default();
        let max = values.iter().copied().max().unwrap_or_default();
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64;
        (min, max, mean)
    };
    let (x_min, x_max, x_mean) = stats(&x);
    let (y_min, y_max, y_mean) = stats(&y);
    Some(ChannelSummary {
        min: [x_min, y_min],
        max: [x_max, y_max],
        mean: [x_mean, y_mean],
    })
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
