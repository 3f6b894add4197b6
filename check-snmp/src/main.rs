use std::sync::Arc;

use anyhow::Context;

use check_snmp::{InitContext, SnmpCheck, SnmpConnector, SnmpInitConfig, Snmp2Connector};
use integrations_base::{AgentCheck, CheckConfigFile, min_collection_interval, run_check_main};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_check_main(
        "snmp",
        "snmp.yaml",
        |config: &CheckConfigFile<SnmpInitConfig>| {
            let config = config.clone();
            // Instances may fetch missing MIBs while they are built.
            async move {
                tokio::task::spawn_blocking(move || build_checks(&config))
                    .await
                    .context("Failed to build SNMP instances")?
            }
        },
    )
    .await
}

fn build_checks(
    config: &CheckConfigFile<SnmpInitConfig>,
) -> anyhow::Result<Vec<(Box<dyn AgentCheck>, std::time::Duration)>> {
    let init = Arc::new(
        InitContext::from_init_config(&config.init_config_or_default())
            .context("Invalid init_config")?,
    );
    let connector: Arc<dyn SnmpConnector> = Arc::new(Snmp2Connector);

    let mut checks: Vec<(Box<dyn AgentCheck>, std::time::Duration)> = Vec::new();
    for (position, instance) in config.instances.iter().enumerate() {
        match SnmpCheck::from_instance(instance, init.clone(), connector.clone()) {
            Ok(check) => {
                tracing::info!(
                    instance = %check.instance_name(),
                    "Configured SNMP instance"
                );
                checks.push((Box::new(check), min_collection_interval(instance)));
            }
            Err(e) => {
                tracing::error!(instance = position, error = %e, "Skipping invalid instance");
            }
        }
    }

    if checks.is_empty() {
        anyhow::bail!("No valid SNMP instance configured");
    }

    Ok(checks)
}
