use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fastream_stream::Server;
use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{stream_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    schema_id: &'static str,
    server: String,
    port: u16,
    sample_frequency: f64,
    decimation: u32,
    decimated_frequency: f64,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.server.config()?;
    let server = Server::connect(config).map_err(|err| stream_error("query failed", err))?;
    let info = server.info();

    let out = InfoOutput {
        schema_id: "https://schemas.3leaps.dev/fastream/cli/v1/server-info.schema.json",
        server: server.config().host.clone(),
        port: server.config().port,
        sample_frequency: info.sample_frequency,
        decimation: info.decimation,
        decimated_frequency: info.decimated_frequency(),
    };

    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERVER", "FREQUENCY (Hz)", "DECIMATION", "DECIMATED (Hz)"])
                .add_row(vec![
                    format!("{}:{}", out.server, out.port),
                    out.sample_frequency.to_string(),
                    out.decimation.to_string(),
                    format!("{:.3}", out.decimated_frequency),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Archiver Info:");
            println!("  Server:           {}:{}", out.server, out.port);
            println!("  Sample frequency: {} Hz", out.sample_frequency);
            println!("  Decimation:       {}", out.decimation);
            println!("  Decimated rate:   {:.3} Hz", out.decimated_frequency);
        }
        OutputFormat::Raw => {
            println!("{}", out.sample_frequency);
            println!("{}", out.decimation);
        }
    }
}
