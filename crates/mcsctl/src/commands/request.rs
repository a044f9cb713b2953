//! Raw request passthrough.

use mcs_core::{Controller, Method};
use serde_json::Value;

use crate::cli::{GlobalOpts, OutputFormat, RequestArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    controller: &Controller,
    args: RequestArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
        CliError::Validation {
            field: "method".into(),
            reason: format!("unsupported HTTP method '{}'", args.method),
        }
    })?;
    let body: Option<Value> = args.data.as_deref().map(serde_json::from_str).transpose()?;

    let response = controller
        .request_json(method, &args.path, body.as_ref())
        .await?;

    // Tables make no sense for arbitrary JSON
    let format = match global.output {
        OutputFormat::Table | OutputFormat::Plain => OutputFormat::Json,
        ref other => other.clone(),
    };
    let out = output::render_single(&format, &response, Value::to_string, Value::to_string);
    output::print_output(&out, global.quiet);
    Ok(())
}
