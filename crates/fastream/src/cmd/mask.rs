use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fastream_frame::ChannelMask;
use serde::Serialize;

use crate::cmd::MaskArgs;
use crate::exit::{mask_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct MaskOutput {
    schema_id: &'static str,
    mask: String,
    count: usize,
    channels: Vec<usize>,
}

pub fn run(args: MaskArgs, format: OutputFormat) -> CliResult<i32> {
    let mask: ChannelMask = args
        .spec
        .parse()
        .map_err(|err| mask_error(&args.spec, err))?;

    let out = MaskOutput {
        schema_id: "https://schemas.3leaps.dev/fastream/cli/v1/channel-mask.schema.json",
        mask: mask.format(),
        count: mask.count(),
        channels: mask.iter().collect(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MASK", "COUNT", "CHANNELS"])
                .add_row(vec![
                    out.mask.clone(),
                    out.count.to_string(),
                    channel_ranges(&out.channels),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Mask:     {}", out.mask);
            println!("Count:    {}", out.count);
            println!("Channels: {}", channel_ranges(&out.channels));
        }
        OutputFormat::Raw => println!("{}", out.mask),
    }
    Ok(SUCCESS)
}

/// Compact `0-3,17` rendering of ascending ids.
fn channel_ranges(ids: &[usize]) -> String {
    let mut parts = Vec::new();
    let mut iter = ids.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(",")
}
