use fastream_stream::server_command;
use serde::Serialize;

use crate::cmd::QueryArgs;
use crate::exit::{stream_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_raw, OutputFormat};

#[derive(Serialize)]
struct QueryOutput<'a> {
    schema_id: &'a str,
    command: &'a str,
    reply: &'a str,
}

pub fn run(args: QueryArgs, format: OutputFormat) -> CliResult<i32> {
    let command = args.command.trim_end_matches(['\r', '\n']);
    if command.is_empty() || command.contains('\n') {
        return Err(CliError::usage("command must be a single non-empty line"));
    }

    let config = args.server.config()?;
    let reply = server_command(&config, command).map_err(|err| stream_error("query failed", err))?;

    match format {
        OutputFormat::Json => print_json(&QueryOutput {
            schema_id: "https://schemas.3leaps.dev/fastream/cli/v1/query-reply.schema.json",
            command,
            reply: &reply,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            for line in reply.lines() {
                println!("{line}");
            }
        }
        OutputFormat::Raw => print_raw(reply.as_bytes()),
    }
    Ok(SUCCESS)
}
