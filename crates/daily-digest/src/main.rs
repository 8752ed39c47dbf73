use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, Utc};
use clap::Parser;
use shared::{
    build_news_sections, render_digest_html, render_email_html, Config, GdeltClient, GmailClient,
    GoogleCalendarClient, GoogleCredentials, NewsFetcher, ResendMailer, Section, WeatherClient,
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "daily-digest")]
#[command(about = "Build the daily digest page and deliver it by email")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: PathBuf,

    /// Bypass the send-window guard (testing)
    #[arg(long)]
    force_send: bool,

    /// Build the archive only; do not send email (testing)
    #[arg(long)]
    no_email: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    shared::load_dotenv();
    let config = Config::load(&args.config)?;

    let now_local = Local::now();
    if !args.force_send
        && !within_send_window(now_local.naive_local(), &config.send_time_local)?
    {
        println!(
            "Skip: local time is {}, not within send window.",
            now_local.format("%Y-%m-%d %H:%M")
        );
        return Ok(());
    }

    let digest_date = now_local.format("%Y-%m-%d").to_string();
    let mut sections: Vec<Section> = Vec::new();

    // Weather
    println!("🌤  Building weather section...");
    match WeatherClient::new() {
        Ok(client) => sections.push(client.build_section(&config.weather).await),
        Err(e) => sections.push(failed_section("weather", "Weather", &e)),
    }

    // News (one section per topic)
    println!("📰 Building news sections...");
    match GdeltClient::new() {
        Ok(backend) => {
            let mut fetcher = NewsFetcher::new(
                backend,
                Duration::from_secs(config.news.defaults.min_gap_seconds),
            );
            sections.extend(build_news_sections(&config.news, &mut fetcher).await);
        }
        Err(e) => sections.push(failed_section("news", "News", &e)),
    }

    // Calendar
    println!("📅 Building events section...");
    if config.calendar.provider == "google" {
        let section = match google_calendar_section(&config).await {
            Ok(section) => section,
            Err(e) => {
                eprintln!("Warning: events section failed: {}", e);
                failed_section("events", "Events", &e)
            }
        };
        sections.push(section);
    } else {
        sections.push(shared::calendar::outlook_placeholder_section(
            &config.calendar,
        ));
    }

    // Inbox
    println!("📬 Building inbox section...");
    if config.inbox_summary.provider == "gmail" {
        let section = match gmail_section(&config).await {
            Ok(section) => section,
            Err(e) => {
                eprintln!("Warning: inbox section failed: {}", e);
                failed_section("inbox", "Inbox", &e)
            }
        };
        sections.push(section);
    } else {
        sections.push(shared::inbox::outlook_placeholder_section());
    }

    // Render + archive
    let page_html = render_digest_html(&digest_date, &sections);

    let archive_url = if config.archive.enabled {
        let url = shared::publish::write_archive(&config.archive, &digest_date, &page_html)?;
        shared::publish::update_home_index(&config.archive)?;
        if let Some(url) = &url {
            println!("✓ Archive written: {}/{}", config.archive.site_dir, url);
        }
        url
    } else {
        None
    };

    let email_html = render_email_html(&digest_date, &sections, archive_url.as_deref());

    if args.no_email {
        println!("No-email mode: archive built; email not sent.");
        return Ok(());
    }

    let api_key = env::var("RESEND_API_KEY")
        .context("RESEND_API_KEY not found. Set it in the environment or a .env file.")?;
    let email_from = env::var("EMAIL_FROM")
        .context("EMAIL_FROM not found. Set it in the environment or a .env file.")?;

    let subject = format!("{} — {}", config.email.subject_prefix, digest_date);
    let mailer = ResendMailer::new(api_key)?;
    mailer
        .send(&email_from, &config.email.to, &subject, &email_html)
        .await
        .context("Failed to send digest email")?;

    println!("✅ Digest sent.");
    Ok(())
}

async fn google_calendar_section(config: &Config) -> Result<Section> {
    let creds = GoogleCredentials::from_env()?;
    let client = GoogleCalendarClient::new(creds)?;
    client.build_section(&config.calendar, Utc::now()).await
}

async fn gmail_section(config: &Config) -> Result<Section> {
    let creds = GoogleCredentials::from_env()?;
    let client = GmailClient::new(creds)?;
    client.build_section(&config.inbox_summary).await
}

fn failed_section(name: &str, title: &str, error: &anyhow::Error) -> Section {
    Section::error(
        format!("error_{}", name),
        format!("{} (Error)", title),
        error.to_string(),
    )
}

/// True when `now` is within ±15 minutes of the configured HH:MM send time.
/// The digest is expected to run from a scheduler that fires more often than
/// the window, so one run per day lands inside it.
fn within_send_window(now: NaiveDateTime, send_time_local: &str) -> Result<bool> {
    let (hh, mm) = send_time_local
        .split_once(':')
        .context("send_time_local must look like HH:MM")?;
    let hour: u32 = hh
        .trim()
        .parse()
        .context("send_time_local hour is not a number")?;
    let minute: u32 = mm
        .trim()
        .parse()
        .context("send_time_local minute is not a number")?;

    let target = now
        .date()
        .and_hms_opt(hour, minute, 0)
        .context("send_time_local is out of range")?;

    let delta_minutes = (now - target).num_seconds().abs() as f64 / 60.0;
    Ok(delta_minutes <= 15.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 5)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn inside_window_sends() {
        assert!(within_send_window(at(8, 0), "08:00").unwrap());
        assert!(within_send_window(at(8, 14), "08:00").unwrap());
        assert!(within_send_window(at(7, 46), "08:00").unwrap());
    }

    #[test]
    fn outside_window_skips() {
        assert!(!within_send_window(at(8, 16), "08:00").unwrap());
        assert!(!within_send_window(at(12, 0), "08:00").unwrap());
        assert!(!within_send_window(at(0, 5), "23:55").unwrap());
    }

    #[test]
    fn malformed_send_time_is_an_error() {
        assert!(within_send_window(at(8, 0), "eight").is_err());
        assert!(within_send_window(at(8, 0), "25:00").is_err());
        assert!(within_send_window(at(8, 0), "08:61").is_err());
    }
}
