//! Job and schedule subcommand handlers.

use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value, json};

use crontaber_api::{IpcChannel, PREVIEW_COUNT};
use crontaber_core::{Execution, JobView, Schedule, ScheduleZone};

use crate::cli::{JobAction, ScheduleAction};
use crate::client::IpcClient;

/// Handle job subcommands.
pub(crate) async fn handle_job_command(
    client: &IpcClient,
    action: JobAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        JobAction::List { format } => {
            let data = client.call(IpcChannel::JobList, json!({})).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
                return Ok(());
            }
            let mut jobs: Vec<JobView> = serde_json::from_value(data)?;
            jobs.sort_by(|a, b| a.job.name.cmp(&b.job.name));
            print_job_table(&jobs);
        }
        JobAction::Get { job_id } => {
            let data = client
                .call(IpcChannel::JobGet, json!({ "jobId": job_id }))
                .await?;
            match serde_json::from_value::<Option<JobView>>(data)? {
                Some(view) => print_job(&view),
                None => return Err(format!("Job not found: {}", job_id).into()),
            }
        }
        JobAction::Create {
            name,
            command,
            frequency,
            work_dir,
            timezone,
            auto_start,
            max_executions,
        } => {
            let payload = json!({
                "name": name,
                "command": command,
                "frequency": frequency,
                "workDirectory": work_dir,
                "timezone": timezone,
                "autoStart": auto_start,
                "maxExecutions": max_executions,
            });
            let data = client.call(IpcChannel::JobCreate, payload).await?;
            let view: JobView = serde_json::from_value(data)?;
            println!("Created job {} ({})", view.job.id, view.status);
        }
        JobAction::Update {
            job_id,
            name,
            command,
            frequency,
            work_dir,
            timezone,
            auto_start,
            max_executions,
        } => {
            let mut payload = Map::new();
            payload.insert("jobId".to_string(), json!(job_id));
            insert_present(&mut payload, "name", name.map(Value::from));
            insert_present(&mut payload, "command", command.map(Value::from));
            insert_present(&mut payload, "frequency", frequency.map(Value::from));
            insert_present(&mut payload, "workDirectory", work_dir.map(Value::from));
            insert_present(&mut payload, "timezone", timezone.map(Value::from));
            insert_present(&mut payload, "autoStart", auto_start.map(Value::from));
            insert_present(
                &mut payload,
                "maxExecutions",
                max_executions.map(Value::from),
            );

            let data = client
                .call(IpcChannel::JobUpdate, Value::Object(payload))
                .await?;
            let view: JobView = serde_json::from_value(data)?;
            println!("Updated job {} ({})", view.job.id, view.status);
        }
        JobAction::Delete { job_id } => {
            client
                .call(IpcChannel::JobDelete, json!({ "jobId": job_id }))
                .await?;
            println!("Deleted job {}", job_id);
        }
        JobAction::Run { job_id } => {
            client
                .call(IpcChannel::JobRun, json!({ "jobId": job_id }))
                .await?;
            println!("Started job {}", job_id);
        }
        JobAction::Pause { job_id } => {
            client
                .call(IpcChannel::JobPause, json!({ "jobId": job_id }))
                .await?;
            println!("Paused job {}", job_id);
        }
        JobAction::Stop { job_id } => {
            client
                .call(IpcChannel::JobStop, json!({ "jobId": job_id }))
                .await?;
            println!("Stopped job {}", job_id);
        }
    }

    Ok(())
}

/// Handle schedule subcommands.
///
/// Validation runs locally so it works without a running scheduler.
pub(crate) fn handle_schedule_command(
    action: ScheduleAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ScheduleAction::Validate {
            expression,
            timezone,
        } => {
            let schedule = Schedule::parse(&expression, timezone.as_deref())?;

            println!("'{}' is valid ({})", schedule.expression(), schedule.zone());
            println!("Next runs:");
            for fire in schedule.upcoming(Utc::now(), PREVIEW_COUNT) {
                println!("  {}", format_fire(fire, schedule.zone()));
            }
        }
    }

    Ok(())
}

fn insert_present(payload: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        payload.insert(key.to_string(), value);
    }
}

fn print_job_table(jobs: &[JobView]) {
    if jobs.is_empty() {
        println!("No jobs.");
        return;
    }

    println!(
        "{:<36}  {:<20}  {:<8}  {:<14}  {:<8}  NEXT RUN",
        "ID", "NAME", "STATUS", "FREQUENCY", "LAST"
    );
    for view in jobs {
        println!(
            "{:<36}  {:<20}  {:<8}  {:<14}  {:<8}  {}",
            view.job.id,
            truncate(&view.job.name, 20),
            view.status.as_str(),
            truncate(&view.job.frequency, 14),
            view.last_execution_status.as_str(),
            view.next_execution
                .map(format_local)
                .unwrap_or_else(|| "-".to_string()),
        );
    }
}

fn print_job(view: &JobView) {
    let job = &view.job;
    println!("ID:             {}", job.id);
    println!("Name:           {}", job.name);
    println!("Command:        {}", job.command);
    println!(
        "Directory:      {}",
        job.work_directory.as_deref().unwrap_or("-")
    );
    println!("Frequency:      {}", job.frequency);
    println!(
        "Timezone:       {}",
        job.timezone.as_deref().unwrap_or("local")
    );
    println!("Auto start:     {}", job.auto_start);
    if let Some(max) = job.max_executions {
        println!("Max executions: {}", max);
    }
    println!("Status:         {}", view.status);
    println!(
        "Next run:       {}",
        view.next_execution
            .map(format_local)
            .unwrap_or_else(|| "-".to_string())
    );

    println!("Executions:     {}", job.executions.len());
    for execution in job.executions.iter().rev().take(10) {
        print_execution(execution);
    }
}

fn print_execution(execution: &Execution) {
    let outcome = &execution.outcome;
    let duration = execution.finished_at - execution.started_at;
    println!(
        "  {}  {:<7}  exit {:<4}  {} ms",
        format_local(execution.started_at),
        if outcome.failed { "failed" } else { "success" },
        outcome
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string()),
        duration.num_milliseconds()
    );
    if let Some(error) = &outcome.error {
        println!("      {}", error);
    }
}

fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

fn format_fire(at: DateTime<Utc>, zone: ScheduleZone) -> String {
    match zone {
        ScheduleZone::Local => format_local(at),
        ScheduleZone::Named(tz) => at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string(),
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(width.saturating_sub(1)).collect();
    truncated.push('~');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long job name", 8), "a very ~");
    }

    #[test]
    fn test_insert_present_skips_absent() {
        let mut payload = Map::new();
        insert_present(&mut payload, "name", None);
        insert_present(&mut payload, "timezone", Some(Value::from("")));
        assert!(!payload.contains_key("name"));
        assert_eq!(payload["timezone"], "");
    }

    #[test]
    fn test_schedule_validate_rejects_bad_expression() {
        let result = handle_schedule_command(ScheduleAction::Validate {
            expression: "not cron".to_string(),
            timezone: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_schedule_validate_accepts_nickname() {
        let result = handle_schedule_command(ScheduleAction::Validate {
            expression: "@weekly".to_string(),
            timezone: Some("America/New_York".to_string()),
        });
        assert!(result.is_ok());
    }
}
