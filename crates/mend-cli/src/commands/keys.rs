use mend_core::settings::load_wrapped_material;
use mend_core::{LockState, MendError, SettingKey, SettingsStore};

use crate::app::AppContext;
use crate::constants::MAX_PASSWORD_ATTEMPTS;
use crate::errors::CliError;
use crate::helpers::{password_is_from_env, prompt_password};

pub fn handle_unlock(ctx: &AppContext) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let material = load_wrapped_material(&config)?;
    let lifecycle = ctx.lifecycle(&config)?;

    let interactive = ctx.interactive() && !password_is_from_env();
    let max_attempts = if interactive { MAX_PASSWORD_ATTEMPTS } else { 1 };
    let mut attempts = 0;

    loop {
        attempts += 1;
        let password = prompt_password(interactive)?;
        match lifecycle.unlock(&material, &password) {
            Ok(()) => break,
            Err(MendError::IncorrectPassword) => {
                let remaining = max_attempts.saturating_sub(attempts);
                if remaining == 0 {
                    if max_attempts == 1 {
                        return Err(MendError::IncorrectPassword.into());
                    }
                    return Err(CliError::auth_failed("Too many failed password attempts.")
                        .with_hint(
                            "Hint: If you forgot your password, the private key cannot be recovered.",
                        )
                        .into());
                }
                eprintln!(
                    "Incorrect password. {} attempt{} remaining.",
                    remaining,
                    if remaining == 1 { "" } else { "s" }
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    ctx.say(format!(
        "Unlocked. Working key material is in {}",
        lifecycle.private_key_path().display()
    ));
    ctx.say("Run `mend lock` when done.");
    Ok(())
}

pub fn handle_lock(ctx: &AppContext) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let lifecycle = ctx.lifecycle(&config)?;
    let was = lifecycle.state();
    lifecycle.lock()?;

    match was {
        LockState::Unlocked => ctx.say("Locked. Working key material removed."),
        LockState::Locked => ctx.say("Already locked."),
    }
    Ok(())
}

pub fn handle_status(ctx: &AppContext) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let lifecycle = ctx.lifecycle(&config)?;
    let value = |key: SettingKey| config.get_value(key).unwrap_or_else(|| "-".to_string());

    let state = match lifecycle.state() {
        LockState::Locked => "locked",
        LockState::Unlocked => "unlocked",
    };
    if ctx.quiet() {
        println!("{}", state);
        return Ok(());
    }

    let has_identity = config.get_value(SettingKey::WrappedPrivateKey).is_some();
    println!("Config:       {}", ctx.config_path()?.display());
    println!("Identity:     {}", if has_identity { "present" } else { "missing" });
    println!("State:        {}", state);
    println!("Modulus:      {} bits", value(SettingKey::ModulusBits));
    println!("Scheme:       {}", value(SettingKey::AsymmetricScheme));
    println!("Session key:  {} bits", value(SettingKey::SymmetricKeyBits));
    println!("Current log:  {}", ctx.current_log_name(&config));
    println!("Log dir:      {}", value(SettingKey::LogDir));
    println!("Encrypt dir:  {}", value(SettingKey::EncDir));
    println!("Decrypt dir:  {}", value(SettingKey::DecDir));
    println!(
        "Shredder:     {}",
        config
            .get_value(SettingKey::ShredCommand)
            .unwrap_or_else(|| "overwrite and remove".to_string())
    );
    Ok(())
}
