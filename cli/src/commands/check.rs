use anyhow::{Result, bail};
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use healthsync_core::config::{Config as SyncConfig, CredentialSource};

use super::helpers::print_json;
use crate::config::Config;

#[derive(Debug, Serialize, Tabled)]
struct PipelineStatus {
    #[tabled(rename = "Command")]
    command: &'static str,
    #[tabled(rename = "Ready")]
    ready: bool,
    #[tabled(rename = "Details")]
    details: String,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    env_name: &'a str,
    production: bool,
    root: String,
    credentials: String,
    client_email: Option<&'a str>,
    protected_tab: &'a str,
    pipelines: Vec<PipelineStatus>,
}

fn status<T>(
    command: &'static str,
    targets: Result<T, healthsync_core::error::SyncError>,
    describe: impl FnOnce(&T) -> String,
) -> PipelineStatus {
    match targets {
        Ok(t) => PipelineStatus {
            command,
            ready: true,
            details: describe(&t),
        },
        Err(e) => PipelineStatus {
            command,
            ready: false,
            details: e.to_string(),
        },
    }
}

fn pipeline_statuses(sync: &SyncConfig) -> Vec<PipelineStatus> {
    vec![
        status("nutrition", sync.nutrition_targets(), |t| {
            format!("{} + {} -> {}", t.food_data, t.food_log, t.master_table)
        }),
        status("tactical", sync.tactical_targets(), |t| {
            format!("{} + {} -> {}", t.master_table, t.activity_log, t.tactical_db)
        }),
        status("cycle-db", sync.cycle_db_targets(None), |t| {
            format!("{} -> {}", t.source, t.dest)
        }),
    ]
}

pub(crate) fn cmd_check(config: &Config, json: bool) -> Result<()> {
    let sync = &config.sync;
    let pipelines = pipeline_statuses(sync);
    let any_ready = pipelines.iter().any(|p| p.ready);

    let credentials = match &sync.credentials.source {
        CredentialSource::Inline => "inline JSON".to_string(),
        CredentialSource::File(path) => path.display().to_string(),
    };
    let report = CheckReport {
        env_name: &sync.env_name,
        production: sync.is_production(),
        root: config.root.display().to_string(),
        credentials,
        client_email: sync.credentials.client_email.as_deref(),
        protected_tab: &sync.protected_tab,
        pipelines,
    };

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Environment: {}{}",
            report.env_name,
            if report.production { " (production)" } else { "" }
        );
        println!("Workbooks:   {}", report.root);
        println!(
            "Credentials: {}{}",
            report.credentials,
            report
                .client_email
                .map(|e| format!(" ({e})"))
                .unwrap_or_default()
        );
        if !report.production {
            println!("Protected:   {}", report.protected_tab);
        }
        println!("{}", Table::new(&report.pipelines).with(Style::rounded()));
    }

    if !any_ready {
        bail!("No command is fully configured");
    }
    Ok(())
}
