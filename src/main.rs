//! Reads every Directus collection once and prints the global site data as JSON.

use std::fs::File;
use std::io::{
    self,
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};
use std::process::ExitCode;

use clap::Parser;
use directus_site_data::config::load_settings_from_env;
use directus_site_data::{
    Client,
    HttpTransport,
    SitePlugin,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Arguments {
    /// Directory holding `.directus.json`
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Write the global data to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Arguments::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Arguments) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings_from_env(&args.root)?;
    let transport = HttpTransport::connect(&settings).await?;
    let plugin = SitePlugin::new(Client::new(settings, transport));

    let data = plugin.global_data().await?;
    tracing::info!(name = plugin.name(), filters = ?plugin.filter_names(), "Global data ready");

    write_data(&data, args.output.as_deref())?;
    Ok(())
}

fn write_data(data: &Value, output: Option<&Path>) -> io::Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    serde_json::to_writer_pretty(&mut writer, data)?;
    writeln!(writer)?;
    writer.flush()
}
