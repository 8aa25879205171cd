use mend_core::files::{decrypt_file, encrypt_file};
use mend_core::SettingKey;

use crate::app::AppContext;
use crate::cli::FileArgs;
use crate::errors::CliError;

pub fn handle_encrypt(ctx: &AppContext, args: &FileArgs) -> anyhow::Result<()> {
    ensure_file(args)?;
    let config = ctx.load_config()?;
    let mend = ctx.mend_context(&config)?;
    let out_dir = ctx.dir(&config, SettingKey::EncDir)?;

    let output = encrypt_file(&mend, &args.file, &out_dir)?;
    ctx.say(format!("Encrypted {} -> {}", args.file.display(), output.display()));
    Ok(())
}

pub fn handle_decrypt(ctx: &AppContext, args: &FileArgs) -> anyhow::Result<()> {
    ensure_file(args)?;
    let config = ctx.load_config()?;
    let mend = ctx.mend_context(&config)?;
    let out_dir = ctx.dir(&config, SettingKey::DecDir)?;
    let key = ctx.lifecycle(&config)?.load_private_key()?;

    let output = decrypt_file(mend.cipher(), &key, &args.file, &out_dir)?;
    ctx.say(format!("Decrypted {} -> {}", args.file.display(), output.display()));
    Ok(())
}

fn ensure_file(args: &FileArgs) -> anyhow::Result<()> {
    if !args.file.is_file() {
        return Err(CliError::not_found(
            format!("No such file: {}", args.file.display()),
            "Hint: Check the path and try again.",
        )
        .into());
    }
    Ok(())
}
