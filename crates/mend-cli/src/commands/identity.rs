use mend_core::crypto::{
    check_modulus_bits, AsymmetricScheme, CipherSuite, SymmetricKeySize, RECOMMENDED_MODULUS_BITS,
};
use mend_core::lifecycle::{import_key_pair, setup};
use mend_core::{SettingKey, SettingsStore};

use crate::app::AppContext;
use crate::cli::{ImportArgs, InitArgs};
use crate::config::{xdg_data_dir, MendConfig};
use crate::constants::DEFAULT_LOG_NAME;
use crate::errors::CliError;
use crate::helpers::prompt_init_password;
use crate::security::read_key_file;

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    // An explicit size must be honoured; only the default may fall back.
    if let Some(bits) = args.modulus_bits {
        check_modulus_bits(bits)?;
    }
    let suite = parse_suite(args.scheme.as_deref(), args.key_bits)?;
    let modulus_bits = args.modulus_bits.unwrap_or(RECOMMENDED_MODULUS_BITS);
    let mut config = prepare_config(ctx, args.force)?;
    let password = prompt_init_password()?;

    ctx.say(format!("Generating a {}-bit key pair...", modulus_bits));
    setup(&mut config, &password, suite, modulus_bits)?;
    finish(ctx, &mut config)
}

pub fn handle_import(ctx: &AppContext, args: &ImportArgs) -> anyhow::Result<()> {
    let mut config = prepare_config(ctx, args.force)?;
    let suite = parse_suite(args.scheme.as_deref(), None)?;
    let private_der = read_key_file(&args.private_key)?;
    let public_der = read_key_file(&args.public_key)?;
    let password = prompt_init_password()?;

    import_key_pair(&mut config, &password, suite, &private_der, &public_der)?;
    finish(ctx, &mut config)
}

/// Existing config (refusing to clobber an identity without `force`), or a fresh one.
fn prepare_config(ctx: &AppContext, force: bool) -> anyhow::Result<MendConfig> {
    let path = ctx.config_path()?;
    if !path.exists() {
        return Ok(MendConfig::with_data_dir(&xdg_data_dir()?));
    }

    let config = ctx.load_config()?;
    if config.get_value(SettingKey::WrappedPrivateKey).is_some() {
        if !force {
            return Err(CliError::invalid_input(format!(
                "An identity already exists in {}; pass --force to replace it",
                path.display()
            ))
            .into());
        }
        // Working keys of the old identity must not outlive it.
        ctx.lifecycle(&config)?.lock()?;
    }
    Ok(config)
}

fn finish(ctx: &AppContext, config: &mut MendConfig) -> anyhow::Result<()> {
    if config.get_value(SettingKey::CurrentLog).is_none() {
        config.set_value(SettingKey::CurrentLog, DEFAULT_LOG_NAME)?;
    }
    ctx.save_config(config)?;

    ctx.say(format!(
        "Initialized mend ({}-bit, {}) at {}",
        config.get_value(SettingKey::ModulusBits).unwrap_or_default(),
        config
            .get_value(SettingKey::AsymmetricScheme)
            .unwrap_or_default(),
        ctx.config_path()?.display()
    ));
    ctx.say("Run `mend unlock` to read logs and decrypt files.");
    Ok(())
}

fn parse_suite(scheme: Option<&str>, key_bits: Option<usize>) -> anyhow::Result<CipherSuite> {
    let asymmetric = match scheme {
        Some(value) => value.parse::<AsymmetricScheme>()?,
        None => AsymmetricScheme::default(),
    };
    let symmetric = match key_bits {
        Some(bits) => SymmetricKeySize::from_bits(bits)?,
        None => SymmetricKeySize::default(),
    };
    Ok(CipherSuite::new(asymmetric, symmetric))
}
