mod cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use bc_client::{ClientSession, Converter, StdoutSink};
use bc_core::config::Config;
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting Beatscoin server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    bc_server::start(config, CancellationToken::new()).await?;

    tracing::info!("Shutting down...");
    Ok(())
}

async fn convert_files(
    files: &[PathBuf],
    server: Option<String>,
    output_dir: PathBuf,
    no_delay: bool,
    top_up: Option<u64>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);
    if let Some(server) = server {
        config.client.server_url = server;
    }

    let session = ClientSession::from_config(&config.client);
    let mut converter =
        Converter::new(&config.client, session, StdoutSink).with_output_dir(output_dir);
    if no_delay {
        converter = converter.with_char_delay(Duration::ZERO);
    }

    println!("{} files converted", converter.session().count());
    if let Some(tokens) = top_up {
        let balance = converter.session().credit(tokens);
        println!("Topped up {tokens} tokens ({balance} available)");
    }
    println!();

    let mut failed = 0usize;
    for file in files {
        match converter.convert(file).await {
            Ok(report) => {
                println!(
                    "\nSaved {} ({} files converted, {} tokens left)\n",
                    report.output_path.display(),
                    report.count,
                    report.balance
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("✗ {}: {}", file.display(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} conversions failed", files.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "beatscoin=trace,bc_server=trace,bc_encode=trace,bc_client=debug,bc_core=debug,tower_http=debug".to_string()
        } else {
            "beatscoin=info,bc_server=info,bc_encode=info,bc_client=warn,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Convert {
            files,
            server,
            output_dir,
            no_delay,
            top_up,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_files(
                &files,
                server,
                output_dir,
                no_delay,
                top_up,
                cli.config.as_deref(),
            ))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("beatscoin {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);

    println!("Checking encoder...\n");

    let info = bc_encode::check_encoder(&config.encoder);
    let status = if info.available { "✓" } else { "✗" };

    print!("{} {}", status, info.program);
    if let Some(ref version) = info.version {
        print!(" ({})", version);
    }
    if let Some(ref path) = info.path {
        print!(" - {}", path.display());
    }
    println!();

    for arg in &info.missing_args {
        println!("✗ {} (argument not found)", arg);
    }

    println!();
    if info.available && info.missing_args.is_empty() {
        println!("Encoder is ready!");
    } else {
        println!("Encoder is not ready. Conversions will fail until it is installed.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Max upload: {} MB", config.server.max_upload_mb);
    println!(
        "  Encoder: {} {}",
        config.encoder.program,
        config.encoder.args.join(" ")
    );
    println!("  Encoder timeout: {}s", config.encoder.timeout_secs);
    println!(
        "  Artifact: {} ({})",
        config.artifact.file_name, config.artifact.content_type
    );
    println!("  Client server URL: {}", config.client.server_url);

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    Ok(())
}
