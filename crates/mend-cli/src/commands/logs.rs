use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};

use mend_core::log::{append_entry, merge_log_files, read_log, MergeEngine};
use mend_core::{SettingKey, SettingsStore};

use crate::app::AppContext;
use crate::cli::{LogArgs, MergeArgs, ReadArgs, UseArgs};
use crate::constants::LOG_EXTENSION;
use crate::errors::CliError;
use crate::helpers::{read_entry_body, validate_log_name};

pub fn handle_log(ctx: &AppContext, args: &LogArgs) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let mend = ctx.mend_context(&config)?;
    let path = ctx.log_path(&config, None)?;
    let body = read_entry_body(args.body.as_deref())?;

    append_entry(&mend, &path, &body)?;
    ctx.say(format!("Appended entry to {}", path.display()));
    Ok(())
}

pub fn handle_read(ctx: &AppContext, args: &ReadArgs) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let mend = ctx.mend_context(&config)?;
    let path = ctx.existing_log_path(&config, args.log.as_deref())?;
    let key = ctx.lifecycle(&config)?.load_private_key()?;

    let entries = read_log(mend.cipher(), &key, &path)?;
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            println!();
        }
        println!("{}", entry);
    }
    if entries.is_empty() {
        ctx.say("(empty log)");
    }
    Ok(())
}

pub fn handle_logs(ctx: &AppContext) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let log_dir = ctx.dir(&config, SettingKey::LogDir)?;
    let current = ctx.current_log_name(&config);

    let mut logs = list_logs(&log_dir)?;
    logs.sort_by(|a, b| a.0.cmp(&b.0));

    if logs.is_empty() {
        ctx.say(format!("No logs in {}", log_dir.display()));
        return Ok(());
    }
    for (name, size, modified) in logs {
        let marker = if name == current { "*" } else { " " };
        if ctx.quiet() {
            println!("{}", name);
        } else {
            println!(
                "{} {:<24} {:>10}  {}",
                marker,
                name,
                size,
                modified.format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}

pub fn handle_use(ctx: &AppContext, args: &UseArgs) -> anyhow::Result<()> {
    let name = args
        .name
        .strip_suffix(&format!(".{}", LOG_EXTENSION))
        .unwrap_or(&args.name);
    validate_log_name(name)?;

    let mut config = ctx.load_config()?;
    config.set_value(SettingKey::CurrentLog, name)?;
    ctx.save_config(&config)?;

    let path = ctx.log_path(&config, None)?;
    if path.exists() {
        ctx.say(format!("Now logging to {}", name));
    } else {
        ctx.say(format!("Now logging to {} (created on first entry)", name));
    }
    Ok(())
}

pub fn handle_merge(ctx: &AppContext, args: &MergeArgs) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let mend = ctx.mend_context(&config)?;
    let first = ctx.existing_log_path(&config, Some(args.first.as_str()))?;
    let second = ctx.existing_log_path(&config, Some(args.second.as_str()))?;
    let destination = match &args.output {
        Some(output) => ctx.log_path(&config, Some(output.as_str()))?,
        None => first.clone(),
    };
    if first == second {
        return Err(CliError::invalid_input("Cannot merge a log with itself").into());
    }

    let key = ctx.lifecycle(&config)?.load_private_key()?;
    let engine = MergeEngine::new(mend.cipher(), &key);
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let summary = merge_log_files(&engine, &first, &second, &destination)?;

    ctx.say(format!(
        "Merged {} entries ({} + {}) into {}",
        summary.total(),
        summary.from_first,
        summary.from_second,
        destination.display()
    ));
    Ok(())
}

fn list_logs(log_dir: &Path) -> anyhow::Result<Vec<(String, u64, DateTime<Local>)>> {
    if !log_dir.exists() {
        return Ok(Vec::new());
    }
    let mut logs = Vec::new();
    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let metadata = entry.metadata()?;
        let modified: DateTime<Local> = metadata.modified()?.into();
        logs.push((name, metadata.len(), modified));
    }
    Ok(logs)
}
