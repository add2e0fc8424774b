//! `visitlog` - CLI for visitor registration
//!
//! This binary runs the HTTP API and provides the arrival, departure and
//! lookup flows from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use clap::Parser;
use tracing::warn;

use visitlog::cli::{
    Cli, Command, ConfigCommand, DepartCommand, FindCommand, RegisterCommand, ServeCommand,
    SignatureCommand,
};
use visitlog::record::departure_update;
use visitlog::signature::{load_samples, StrokeSurface};
use visitlog::sync::SubmitOutcome;
use visitlog::{init_logging, Config, Error, GraphClient, LocalStore, SyncClient, VisitorForm};

const NOT_FOUND_MESSAGE: &str = "No se encontró visitante para esa cédula.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Serve(cmd) => handle_serve(&config, &cmd).await,
        Command::Register(cmd) => handle_register(&config, cmd).await,
        Command::Depart(cmd) => handle_depart(&config, &cmd).await,
        Command::Find(cmd) => handle_find(&config, &cmd),
        Command::Signature(cmd) => handle_signature(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

/// Open the local store and attach the remote list when it is configured.
fn build_sync(config: &Config) -> Result<SyncClient, Box<dyn std::error::Error>> {
    let store = LocalStore::open(config.database_path())?;
    match GraphClient::from_config(config) {
        Ok(client) => Ok(SyncClient::new(Arc::new(client), store)),
        Err(e) if e.is_configuration() => {
            warn!("Remote list disabled, records stay local: {e}");
            Ok(SyncClient::local_only(store))
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_serve(config: &Config, cmd: &ServeCommand) -> Result<(), Box<dyn std::error::Error>> {
    let addr = match &cmd.bind {
        Some(bind) => bind.parse().map_err(|_| Error::ConfigValidation {
            message: format!("invalid bind address: {bind}"),
        })?,
        None => config.bind_address()?,
    };
    let client = GraphClient::from_config(config)?;

    println!("Serving /api/visitors on http://{addr}");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    };
    visitlog::api::serve(addr, Arc::new(client), shutdown).await?;
    Ok(())
}

async fn handle_register(
    config: &Config,
    cmd: RegisterCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut form = VisitorForm::new(&config.signature);
    form.identifier = cmd.identifier;
    form.name = cmd.name;
    form.company = cmd.company;
    form.email = cmd.email;
    form.area = cmd.area;
    form.service = cmd.service;
    form.badge_requested = cmd.badge;
    if let Some(date) = cmd.date {
        form.visit_date = date;
    }
    if let Some(arrival) = cmd.arrival {
        form.arrival_time = arrival;
    }

    let samples = load_samples(&cmd.signature)?;
    form.surface_mut().replay(&samples)?;

    let record = match form.into_record() {
        Ok(record) => record,
        Err(Error::Validation { errors }) => {
            for (field, message) in &errors {
                eprintln!("  {field}: {message}");
            }
            return Err(Error::Validation { errors }.into());
        }
        Err(e) => return Err(e.into()),
    };

    let sync = build_sync(config)?;
    let outcome = sync.submit(&record).await?;
    println!("{}", outcome.message());

    match outcome {
        SubmitOutcome::Remote { .. } => Ok(()),
        SubmitOutcome::Local { remote_error, .. } => {
            println!("  Remote: {remote_error}");
            Ok(())
        }
        SubmitOutcome::Failed {
            remote_error,
            local_error,
        } => Err(format!("remote: {remote_error}; local: {local_error}").into()),
    }
}

async fn handle_depart(config: &Config, cmd: &DepartCommand) -> Result<(), Box<dyn std::error::Error>> {
    let time = match &cmd.time {
        Some(time) if time.trim().is_empty() => {
            return Err("Ingrese la hora de salida.".into());
        }
        Some(time) => time.clone(),
        None => chrono::Local::now().format("%H:%M").to_string(),
    };

    let sync = build_sync(config)?;
    match sync.amend(&cmd.identifier, &departure_update(time)).await {
        Ok(outcome) => {
            println!("{}", outcome.message());
            Ok(())
        }
        Err(e) if e.is_not_found() => Err(NOT_FOUND_MESSAGE.into()),
        Err(e) => {
            eprintln!("Error al registrar la salida.");
            Err(e.into())
        }
    }
}

fn handle_find(config: &Config, cmd: &FindCommand) -> Result<(), Box<dyn std::error::Error>> {
    let sync = build_sync(config)?;
    let Some(visitor) = sync.find(&cmd.identifier)? else {
        return Err(NOT_FOUND_MESSAGE.into());
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&visitor)?);
        return Ok(());
    }

    let record = &visitor.record;
    println!("Visitor {}", record.identifier);
    println!("---------------------");
    println!("Name:          {}", record.name);
    println!("Company:       {}", record.company);
    println!("Email:         {}", record.email);
    println!("Date:          {}", record.visit_date);
    println!("Arrival:       {}", record.arrival_time);
    println!("Departure:     {}", or_dash(&record.departure_time));
    println!("Area:          {}", record.area);
    println!("Service:       {}", record.service);
    println!("Badge:         {}", if record.badge_requested { "yes" } else { "no" });
    println!(
        "Signature:     {}",
        if record.signature.is_some() { "present" } else { "none" }
    );
    if let Some(saved_at) = visitor.saved_at {
        println!("Saved at:      {}", saved_at.to_rfc3339());
    }
    Ok(())
}

fn handle_signature(config: &Config, cmd: &SignatureCommand) -> Result<(), Box<dyn std::error::Error>> {
    let samples = load_samples(&cmd.strokes)?;
    let mut surface = StrokeSurface::from_config(&config.signature);
    let image = match surface.replay(&samples)? {
        Some(image) => image,
        None => surface.export()?,
    };

    image.write_png(&cmd.output)?;
    let (width, height) = surface.raster_size();
    println!("Wrote {width}x{height} signature to {}", cmd.output.display());
    if image.is_blank() {
        println!("  (signature is blank)");
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            } else {
                let remote = &config.remote;
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Remote]");
                println!("  Tenant id:          {}", or_unset(remote.tenant_id.as_deref()));
                println!("  Client id:          {}", or_unset(remote.client_id.as_deref()));
                println!(
                    "  Client secret:      {}",
                    if remote.client_secret.is_some() { "(set)" } else { "(not set)" }
                );
                println!("  Site id:            {}", or_unset(remote.site_id.as_deref()));
                println!("  List id:            {}", or_unset(remote.list_id.as_deref()));
                println!("  Authority URL:      {}", remote.authority_url);
                println!("  Graph URL:          {}", remote.graph_url);
                println!("  Timeout (secs):     {}", remote.timeout_secs);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind_address);
                println!();
                println!("[Signature]");
                println!(
                    "  Canvas:             {}x{} @ {}x",
                    config.signature.width, config.signature.height, config.signature.pixel_ratio
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(loaded) => {
                    println!("Configuration is valid.");
                    if let Err(e) = loaded.remote_settings() {
                        println!("Remote list not usable: {e}");
                    }
                }
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("(not set)")
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
