//! `ensign` - CLI for the ensign flag service
//!
//! This binary serves the HTTP flag API and manages flags in the configured
//! database from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use ensign::api::FlagView;
use ensign::cli::{Cli, Command, ConfigCommand, CreateCommand, ServeCommand, ShowCommand};
use ensign::{init_logging, Config, Flag, FlagType, NewFlag, SqliteStore};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging is configured by the config file, so load it first
    let config = Config::load_from(cli.config.clone())?;
    init_logging(cli.verbosity(), &config.logging);

    // Execute the command
    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, &serve_cmd),
        Command::Create(create_cmd) => handle_create(&config, create_cmd),
        Command::List(list_cmd) => handle_list(&config, list_cmd.json),
        Command::Show(show_cmd) => handle_show(&config, &show_cmd),
        Command::Set(cmd) => handle_toggle(&config, &cmd.name, true),
        Command::Unset(cmd) => handle_toggle(&config, &cmd.name, false),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = config.database_path();
    SqliteStore::open_with_timeout(&path, config.busy_timeout())
        .with_context(|| format!("failed to open flag database {}", path.display()))
}

fn handle_serve(mut config: Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = &cmd.bind {
        config.server.bind.clone_from(bind);
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    config.validate()?;

    let store = Arc::new(open_store(&config)?);
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(ensign::api::serve(&config, store))?;
    Ok(())
}

fn handle_create(config: &Config, cmd: CreateCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let extra = NewFlag {
        label: cmd.label,
        description: cmd.description,
        tags: cmd.tags,
        ..NewFlag::default()
    };
    let flag = Flag::create_binary(&store, cmd.name, extra)?;
    println!("Created flag '{}'", flag.name());
    Ok(())
}

fn handle_list(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let flags = Flag::all(&store, FlagType::Binary)?;

    if json {
        let records = flags
            .iter()
            .map(|flag| flag.info())
            .collect::<ensign::Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if flags.is_empty() {
        println!("No flags.");
        return Ok(());
    }

    println!("{:<32} {:<10} LABEL", "NAME", "ACTIVITY");
    for flag in &flags {
        let info = flag.info()?;
        println!("{:<32} {:<10} {}", info.name, flag.active()?, info.label);
    }
    Ok(())
}

fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let view = FlagView::from_flag(&Flag::binary(&store, cmd.name.as_str())?)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("Flag:         {}", view.name);
        println!("Value:        {}", view.value);
        println!("Activity:     {}", view.active);
        println!("Label:        {}", view.label);
        println!("Description:  {}", view.description);
        println!("Tags:         {}", view.tags);
    }
    Ok(())
}

fn handle_toggle(config: &Config, name: &str, on: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let flag = Flag::binary(&store, name)?;
    flag.set_value(on)?;
    println!("Flag '{}' is now {}", flag.name(), if on { "on" } else { "off" });
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": store.path(),
            "total_flags": stats.total_flags,
            "last_used": stats.last_used,
            "db_size_bytes": stats.db_size_bytes,
            "bind_address": config.bind_address(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("ensign status");
        println!("-------------");
        println!("Database:      {}", store.path().display());
        println!("Flags:         {}", stats.total_flags);
        match stats.last_used {
            Some(at) => println!("Last read:     {}", at.to_rfc3339()),
            None => println!("Last read:     never"),
        }
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Serves on:     {}", config.bind_address());
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Busy timeout (ms):  {}", config.storage.busy_timeout_ms);
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!("  Port:               {}", config.server.port);
                println!();
                println!("[Logging]");
                println!("  Format:             {:?}", config.logging.format);
                println!("  HTTP requests:      {}", config.logging.http_requests);
                println!("  Storage queries:    {}", config.logging.storage_queries);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
