//! Read-only inspection commands.

use super::OutputFormat;
use barker::{
    Channel, EngagementStats, EngineConfig, PatternReport, audit_channels, channel_status,
    load_snapshot,
};
use chrono::Utc;
use std::collections::BTreeMap;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print per-channel counters.
pub async fn show_status(config: &EngineConfig, format: OutputFormat) -> CliResult {
    let state = load_snapshot(config.state_path()).await?;
    let rows = channel_status(config, &state, Utc::now());

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Human => {
            println!(
                "{:<10} {:<8} {:>7} {:>7} {:>7} {:>8} {:>8}  {}",
                "CHANNEL", "ENABLED", "TODAY", "TOTAL", "QUEUED", "REJECTED", "REPLIES", "NEXT DISPATCH"
            );
            for row in &rows {
                let today = match row.daily_cap {
                    Some(cap) => format!("{}/{}", row.posts_today, cap),
                    None => row.posts_today.to_string(),
                };
                let next = row
                    .next_dispatch_at
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<10} {:<8} {:>7} {:>7} {:>7} {:>8} {:>8}  {}",
                    row.channel,
                    row.enabled,
                    today,
                    row.total_posts,
                    row.queued,
                    row.rejected,
                    row.pending_replies,
                    next
                );
            }
            println!("\nState: {}", config.state_path().display());
        }
    }
    Ok(())
}

/// Print gap audits.
pub async fn show_audit(
    config: &EngineConfig,
    channel: Option<Channel>,
    format: OutputFormat,
) -> CliResult {
    let state = load_snapshot(config.state_path()).await?;
    let reports: Vec<_> = audit_channels(config, &state)
        .into_iter()
        .filter(|(c, _)| channel.is_none_or(|only| *c == only))
        .collect();

    match format {
        OutputFormat::Json => {
            let by_channel: BTreeMap<String, &PatternReport> =
                reports.iter().map(|(c, r)| (c.to_string(), r)).collect();
            print_json(&by_channel)?;
        }
        OutputFormat::Human => {
            for (c, report) in &reports {
                let verdict = if report.suspicious {
                    "SUSPICIOUS"
                } else if report.sample_size < *config.pattern().min_samples() {
                    "not enough data"
                } else {
                    "ok"
                };
                println!(
                    "{:<10} gaps={:<4} mean={:>7.2}h variance={:>8.3}h²  {}",
                    c, report.sample_size, report.mean_gap_hours, report.variance_hours, verdict
                );
            }
        }
    }
    Ok(())
}

/// Print engagement statistics.
pub async fn show_stats(
    config: &EngineConfig,
    channel: Option<Channel>,
    format: OutputFormat,
) -> CliResult {
    let state = load_snapshot(config.state_path()).await?;
    let stats = EngagementStats::from_records(
        state
            .engagement()
            .filter(|r| channel.is_none_or(|only| r.channel == only)),
    );

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Human => {
            let scope = channel.map_or_else(|| "all channels".to_string(), |c| c.to_string());
            println!("Engagement ({})", scope);
            println!("  feedback seen:  {}", stats.total_count);
            println!("  spam filtered:  {}", stats.spam_filtered);
            println!("  replied:        {}", stats.replied_count);
            println!("  reply rate:     {:.1}%", stats.reply_rate * 100.0);
        }
    }
    Ok(())
}

/// Validate the configuration and print the resolved result.
pub fn check_config(config: &EngineConfig, format: OutputFormat) -> CliResult {
    config.validate()?;

    match format {
        OutputFormat::Json => print_json(config)?,
        OutputFormat::Human => {
            println!("Configuration OK");
            println!("  state:    {}", config.state_path().display());
            println!("  history:  {} records", config.history_limit());
            let retry = config.retry();
            println!(
                "  retry:    {} attempts, {}ms x{} up to {}s",
                retry.max_retries(),
                retry.initial_delay_ms(),
                retry.multiplier(),
                retry.max_delay_secs()
            );
            for (channel, settings) in config.channels() {
                println!(
                    "  {}: enabled={} daily_cap={} min_interval={}m",
                    channel,
                    settings.enabled(),
                    settings.daily_cap(),
                    settings.min_interval_minutes()
                );
                for window in settings.windows() {
                    println!(
                        "    {} {}-{} p={}",
                        window.name,
                        window.start.format("%H:%M"),
                        window.end.format("%H:%M"),
                        window.post_probability
                    );
                }
            }
        }
    }
    Ok(())
}
