//! CLI command implementations

use std::time::Duration;

use colored::Colorize;
use deploy_api::{DeploymentExecution, DeviceFilters, PlanSpec, Strategy};

use crate::cli::output;
use crate::cli::{
    DeployCommands, EnvCommands, HealthCommands, PlanCommands, ReportCommands, UtilCommands,
};
use crate::errors::DeployError;
use crate::http::client::HttpClient;

const WATCH_INTERVAL_SECS: u64 = 5;

pub async fn env(command: EnvCommands, client: &HttpClient) -> Result<(), DeployError> {
    match command {
        EnvCommands::List => {
            let list = client.list_environments().await?;
            output::header(&format!("Environments ({})", list.total));
            for env in list.environments {
                println!(
                    "{:<16} {:<12} approval={} auto_rollback={} max_concurrent={}",
                    env.name.bold(),
                    env.stage.as_str(),
                    env.approval_required,
                    env.auto_rollback,
                    env.max_concurrent_deployments
                );
            }
        }
        EnvCommands::Get { name } => {
            let env = client.get_environment(&name).await?;
            println!("{}", serde_yaml::to_string(&env)?);
            let status = client.environment_status(&name).await?;
            println!("Active deployments: {}", status.active_deployments);
            output::health_report(&status.health_details);
        }
    }
    Ok(())
}

pub async fn plan(command: PlanCommands, client: &HttpClient) -> Result<(), DeployError> {
    match command {
        PlanCommands::List => {
            let list = client.list_plans().await?;
            output::header(&format!("Deployment plans ({})", list.total));
            for plan in list.plans {
                let approval = match &plan.approved_by {
                    Some(approver) => format!("approved by {}", approver).green(),
                    None => "not approved".yellow(),
                };
                println!(
                    "{}  {:<28} {:<10} -> {:<12} {:<10} {}",
                    plan.plan_id,
                    plan.name,
                    plan.firmware_version,
                    plan.target_environment,
                    plan.strategy.as_str(),
                    approval
                );
            }
        }
        PlanCommands::Get { plan_id } => {
            let plan = client.get_plan(&plan_id).await?;
            println!("{}", serde_yaml::to_string(&plan)?);
        }
        PlanCommands::Create { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let spec: PlanSpec = serde_yaml::from_str(&raw)?;
            let created = client.create_plan(&spec).await?;
            output::success(&format!("{} ({})", created.message, created.plan_id));
        }
        PlanCommands::Validate { plan_id } => {
            let result = client.validate_plan(&plan_id).await?;
            if result.valid {
                output::success("Plan is valid");
            } else {
                output::failure("Plan is invalid");
            }
            for error in &result.errors {
                println!("  {} {}", "error:".red(), error);
            }
            for warning in &result.warnings {
                println!("  {} {}", "warning:".yellow(), warning);
            }
        }
        PlanCommands::Approve { plan_id, approver } => {
            let response = client.approve_plan(&plan_id, &approver).await?;
            output::success(&response.message);
        }
    }
    Ok(())
}

pub async fn deploy(command: DeployCommands, client: &HttpClient) -> Result<(), DeployError> {
    match command {
        DeployCommands::Execute { plan_id, watch } => {
            let response = client.execute_plan(&plan_id).await?;
            output::success(&format!(
                "{} ({})",
                response.message, response.execution_id
            ));
            if watch {
                watch_execution(client, &response.execution_id, WATCH_INTERVAL_SECS).await?;
            }
        }
        DeployCommands::List => {
            let list = client.list_executions().await?;
            output::header(&format!("Executions ({})", list.total));
            for exec in list.executions {
                println!(
                    "{}  {:<28} {:<12} {} {}/{} ok",
                    exec.execution_id,
                    exec.plan_name,
                    output::status(exec.status),
                    output::progress_bar(exec.progress, 20),
                    exec.devices_successful,
                    exec.devices_targeted
                );
            }
        }
        DeployCommands::Status { execution_id } => {
            let exec = client.get_execution(&execution_id).await?;
            print_execution(&exec);
        }
        DeployCommands::Cancel { execution_id } => {
            let response = client.cancel_execution(&execution_id).await?;
            output::success(&response.message);
        }
        DeployCommands::Rollback { execution_id } => {
            let response = client.rollback_execution(&execution_id).await?;
            output::success(&format!(
                "{} ({})",
                response.message, response.execution_id
            ));
        }
        DeployCommands::Watch {
            execution_id,
            interval,
        } => watch_execution(client, &execution_id, interval).await?,
    }
    Ok(())
}

pub async fn health(command: HealthCommands, client: &HttpClient) -> Result<(), DeployError> {
    match command {
        HealthCommands::Check => {
            let response = client.health_checks().await?;
            for report in response.environments.values() {
                output::health_report(report);
            }
        }
    }
    Ok(())
}

pub async fn metrics(client: &HttpClient) -> Result<(), DeployError> {
    let metrics = client.metrics().await?;
    output::header("Deployment metrics");
    println!("Total:        {}", metrics.total_deployments);
    println!("Completed:    {}", metrics.completed_deployments);
    println!("Failed:       {}", metrics.failed_deployments);
    println!("Cancelled:    {}", metrics.cancelled_deployments);
    println!("Active:       {}", metrics.active_deployments);
    println!("Success rate: {:.2}%", metrics.success_rate);
    println!("Environments: {}", metrics.environments);
    println!("Plans:        {}", metrics.plans);
    Ok(())
}

pub async fn report(command: ReportCommands, client: &HttpClient) -> Result<(), DeployError> {
    match command {
        ReportCommands::Summary { days } => {
            let report = client.summary_report(days).await?;
            output::header(&format!("Deployment summary, last {} days", report.period_days));
            let d = &report.deployments;
            println!(
                "Deployments: {} total, {} completed, {} failed, {} cancelled ({:.2}% success)",
                d.total, d.completed, d.failed, d.cancelled, d.success_rate
            );
            let v = &report.devices;
            println!(
                "Devices:     {} targeted, {} successful, {} failed ({:.2}% success)",
                v.targeted, v.successful, v.failed, v.success_rate
            );
            for (strategy, count) in &report.by_strategy {
                println!("  strategy {:<12} {}", strategy, count);
            }
            for (environment, count) in &report.by_environment {
                println!("  environment {:<12} {}", environment, count);
            }
        }
        ReportCommands::Execution { execution_id } => {
            let report = client.execution_report(&execution_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

pub fn util(command: UtilCommands) -> Result<(), DeployError> {
    match command {
        UtilCommands::Template => {
            let mut spec = PlanSpec::new(
                "Firmware rollout",
                "1.2.0",
                "development",
                "production",
                Strategy::Canary,
            );
            spec.description = "Roll out firmware 1.2.0".to_string();
            spec.device_filters = DeviceFilters {
                device_type: Some("ESP32".to_string()),
                ..Default::default()
            };
            spec.validation_tests = vec!["connectivity_test".to_string()];
            spec.pre_deployment_checks = vec!["system_health".to_string()];
            spec.post_deployment_checks = vec!["functionality_test".to_string()];
            spec.rollback_criteria.min_success_rate = Some(90.0);
            print!("{}", serde_yaml::to_string(&spec)?);
        }
    }
    Ok(())
}

fn print_execution(exec: &DeploymentExecution) {
    println!("{} {}", "Execution:".bold(), exec.execution_id);
    println!("Plan:      {} ({})", exec.plan.name, exec.plan.plan_id);
    println!("Status:    {}", output::status(exec.status));
    println!("Stage:     {}", exec.current_stage);
    println!("Progress:  {}", output::progress_bar(exec.progress, 30));
    println!(
        "Devices:   {} targeted, {} successful, {} failed",
        exec.devices_targeted, exec.devices_successful, exec.devices_failed
    );
    if let Some(error) = &exec.error_message {
        println!("Error:     {}", error.red());
    }
    if let Some(rollback) = &exec.rollback_execution_id {
        println!("Rollback:  {}", rollback);
    }
    for line in &exec.logs {
        println!("  {}", line.dimmed());
    }
}

async fn watch_execution(
    client: &HttpClient,
    execution_id: &str,
    interval: u64,
) -> Result<(), DeployError> {
    loop {
        let exec = client.get_execution(execution_id).await?;
        println!(
            "{} {:<12} {:<28} {}",
            output::progress_bar(exec.progress, 30),
            output::status(exec.status),
            exec.current_stage,
            exec.logs.last().map(String::as_str).unwrap_or("")
        );
        if exec.status.is_terminal() {
            print_execution(&exec);
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(interval.max(1))).await;
    }
}
