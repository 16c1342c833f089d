//! Config command handlers. These never log in.

use simplisafe_config::{self as config, Config, Profile, TokenStore};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match args.command {
        ConfigCommand::Init {
            password_env,
            base_url,
        } => {
            let mut cfg = config::load_config()?;
            let name = cfg.active_profile_name(global.profile.as_deref());
            let email = global
                .email
                .clone()
                .or_else(|| cfg.profiles.get(&name).map(|p| p.email.clone()))
                .ok_or_else(|| CliError::Validation {
                    field: "email".into(),
                    reason: "pass --email to create a profile".into(),
                })?;

            let previous = cfg.profiles.remove(&name);
            let profile = Profile {
                email,
                password: previous.as_ref().and_then(|p| p.password.clone()),
                password_env: password_env
                    .or_else(|| previous.as_ref().and_then(|p| p.password_env.clone())),
                base_url: base_url.or_else(|| previous.as_ref().and_then(|p| p.base_url.clone())),
                timeout: previous.as_ref().and_then(|p| p.timeout),
            };
            // Fail before writing anything that cannot be used.
            config::to_client_config(&cfg.defaults, &profile)?;

            cfg.profiles.insert(name.clone(), profile);
            if cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }
            config::save_config(&cfg)?;
            format!(
                "Profile '{name}' saved to {}",
                config::config_path().display()
            )
        }
        ConfigCommand::Show => {
            let mut cfg = config::load_config()?;
            redact(&mut cfg);
            toml::to_string_pretty(&cfg).map_err(|e| CliError::Config(e.to_string()))?
        }
        ConfigCommand::Path => {
            let tokens = config::load_config_or_default().token_cache();
            let location = match tokens.store() {
                TokenStore::Keyring => format!("system keyring (fallback {})", tokens.dir().display()),
                TokenStore::File => tokens.dir().display().to_string(),
            };
            format!(
                "config: {}\ntokens: {location}",
                config::config_path().display()
            )
        }
        ConfigCommand::Logout => {
            let cfg = config::load_config()?;
            let name = cfg.active_profile_name(global.profile.as_deref());
            cfg.token_cache().clear(&name)?;
            format!("Cached token for profile '{name}' removed")
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}

fn redact(cfg: &mut Config) {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
}
