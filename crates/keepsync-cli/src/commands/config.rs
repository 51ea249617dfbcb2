use std::env;
use std::path::Path;

use keepsync_core::config::{ENV_BACKEND_TOKEN, ENV_BACKEND_URL};
use keepsync_core::util::is_http_url;

use crate::cli::ConfigCommands;
use crate::config_profiles::{
    default_config_path, normalize_text_option, CliProfile, CliProfilesConfig,
};
use crate::error::CliError;

/// Values passed to `config init`.
#[derive(Debug, Default)]
pub struct InitOptions {
    pub profile: Option<String>,
    pub backend_url: Option<String>,
    pub backend_token: Option<String>,
    /// `None` keeps the stored choice
    pub incremental_sync: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub no_activate: bool,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let path = default_config_path().map_err(CliError::Config)?;

    let output = match command {
        ConfigCommands::Init {
            profile,
            backend_url,
            backend_token,
            incremental_sync,
            full_sync,
            timeout_secs,
            no_activate,
        } => {
            let incremental_sync = if incremental_sync {
                Some(true)
            } else if full_sync {
                Some(false)
            } else {
                None
            };
            let options = InitOptions {
                profile: profile.or_else(|| global_profile.map(str::to_string)),
                backend_url,
                backend_token,
                incremental_sync,
                timeout_secs,
                no_activate,
            };
            config_init_at(&path, options)?
        }
        ConfigCommands::Show { profile } => {
            config_show_at(&path, profile.as_deref().or(global_profile))?
        }
    };

    for line in output {
        println!("{line}");
    }
    Ok(())
}

/// Create or update a profile in the config file at `path`.
///
/// Explicit arguments win over environment variables, which win over the
/// values already stored in the profile.
pub fn config_init_at(path: &Path, options: InitOptions) -> Result<Vec<String>, CliError> {
    let mut config = CliProfilesConfig::load_from_path(path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(options.profile.as_deref());
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let backend_url = normalize_text_option(options.backend_url)
        .or_else(|| normalize_text_option(env::var(ENV_BACKEND_URL).ok()))
        .or(existing.backend_url);
    let backend_token = normalize_text_option(options.backend_token)
        .or_else(|| normalize_text_option(env::var(ENV_BACKEND_TOKEN).ok()))
        .or(existing.backend_token);

    if let Some(url) = backend_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "backend_url must include http:// or https://".to_string(),
            ));
        }
    }
    if options.timeout_secs == Some(0) {
        return Err(CliError::Config(
            "timeout_secs must be greater than zero".to_string(),
        ));
    }

    let profile = config.profile_mut_or_default(&profile_name);
    profile.backend_url = backend_url;
    profile.backend_token = backend_token;
    profile.incremental_sync = options.incremental_sync.or(profile.incremental_sync);
    if let Some(timeout_secs) = options.timeout_secs {
        profile.timeout_secs = Some(timeout_secs);
    }
    let ready = profile.sync_settings().is_configured();

    if !options.no_activate {
        config.active_profile = Some(profile_name.clone());
    }
    config.save_to_path(path).map_err(CliError::Config)?;

    let mut output = vec![format!(
        "Profile '{profile_name}' initialized at {}",
        path.display()
    )];
    if ready {
        output.push(format!(
            "Sync profile '{profile_name}' is ready. Run `keepsync sync`."
        ));
    } else {
        output.push(format!(
            "Profile '{profile_name}' is missing a backend URL or token; sync stays disabled."
        ));
    }
    Ok(output)
}

pub fn config_show_at(path: &Path, profile: Option<&str>) -> Result<Vec<String>, CliError> {
    let config = CliProfilesConfig::load_from_path(path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let Some(profile) = config.profile(&profile_name) else {
        return Ok(vec![format!(
            "Profile '{profile_name}' is not configured ({})",
            path.display()
        )]);
    };

    Ok(describe_profile(&profile_name, profile))
}

fn describe_profile(name: &str, profile: &CliProfile) -> Vec<String> {
    let settings = profile.sync_settings();
    vec![
        format!("profile:          {name}"),
        format!(
            "backend_url:      {}",
            settings.backend_url.as_deref().unwrap_or("(not set)")
        ),
        format!(
            "backend_token:    {}",
            if settings.backend_token.is_some() {
                "(set)"
            } else {
                "(not set)"
            }
        ),
        format!("incremental_sync: {}", settings.incremental_sync),
        format!("timeout_secs:     {}", settings.timeout_secs),
    ]
}
