use clap::{CommandFactory, FromArgMatches};
use fqtrim_core::config::{self, Cli};
use fqtrim_core::error::TrimError;
use fqtrim_core::pipeline;
use std::io::Write;
use std::process::ExitCode;

fn main() -> ExitCode {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let config = config::from_cli(cli, &matches);

    match pipeline::run(&config) {
        Ok(report) => {
            if let (Some(report), Some(path)) = (report, &config.output_report) {
                match write_report(&report, path) {
                    Ok(()) => ExitCode::SUCCESS,
                    Err(e) => fail(&e),
                }
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => fail(&e),
    }
}

fn write_report(report: &fqtrim_core::report::Report, path: &std::path::Path) -> Result<(), TrimError> {
    let file = std::fs::File::create(path).map_err(|e| TrimError::IoWrite(zoe_with_file_context(e, path)))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report).map_err(|e| TrimError::IoWrite(zoe_with_context(e.to_string())))?;
    writer.flush().map_err(|e| TrimError::IoWrite(zoe_with_file_context(e, path)))
}

fn zoe_with_file_context(e: std::io::Error, path: &std::path::Path) -> zoe::data::err::ErrorWithContext {
    use zoe::data::err::WithErrorContext;
    e.with_file_context("Failed to write report", path)
}

fn zoe_with_context(msg: String) -> zoe::data::err::ErrorWithContext {
    use zoe::data::err::WithErrorContext;
    std::io::Error::other(msg).with_context("Failed to serialize report")
}

fn fail(e: &TrimError) -> ExitCode {
    eprintln!("fqtrim-core: {e}");
    ExitCode::from(e.exit_code())
}
