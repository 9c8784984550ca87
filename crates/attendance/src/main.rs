//! Attendance Presenter
//!
//! Owner-side command-line presenter: generates a session for the class
//! named on the command line, follows its countdown, and prints the roster
//! once the code expires or the presenter is interrupted.
//!
//! ```text
//! attendance-presenter CS201 Data Structures
//! ```
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (plain or JSON)
//! 3. Build the HTTP backend and the signed-in identity
//! 4. Generate the session (one backend call)
//! 5. Follow the countdown until expiry or Ctrl-C
//! 6. Print the roster and exit

#![warn(clippy::pedantic)]

use attendance::backend::http::HttpBackend;
use attendance::config::Config;
use attendance::countdown::{format_remaining, CountdownState};
use attendance::generator::SessionGenerator;
use attendance::notice::Notice;
use attendance::{AuthContext, Identity};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log the remaining time every this many seconds.
const COUNTDOWN_LOG_INTERVAL_SECS: u32 = 30;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(&config);

    info!(
        backend_url = %config.backend_url,
        session_duration_seconds = config.session_duration_seconds,
        backend_timeout_ms = u64::try_from(config.backend_timeout.as_millis()).unwrap_or(u64::MAX),
        "Configuration loaded successfully"
    );

    let class_name = std::env::args().skip(1).collect::<Vec<_>>().join(" ");

    let backend = Arc::new(HttpBackend::new(
        config.backend_url.clone(),
        config.anon_key.clone(),
        config.backend_timeout,
    )?);

    let auth = match &config.access_token {
        Some(token) => {
            let identity = Identity::from_access_token(token.clone()).map_err(|e| {
                error!(error = %e, "ATTENDANCE_ACCESS_TOKEN is not a usable access token");
                e
            })?;
            AuthContext::signed_in(identity)
        }
        None => {
            warn!("ATTENDANCE_ACCESS_TOKEN not set; generation will require sign-in");
            AuthContext::anonymous()
        }
    };

    let mut generator = SessionGenerator::new(backend, auth, config.generator_settings());

    let (code, mut countdown) = match generator.generate(&class_name).await {
        Ok(current) => {
            let notice = Notice::session_generated(current);
            info!(
                title = %notice.title,
                description = %notice.description,
                session_code = %current.code(),
                expires_at = %current.session().expires_at,
                "Session ready"
            );
            (current.code().clone(), current.countdown().subscribe())
        }
        Err(e) => {
            let notice = Notice::from(&e);
            error!(title = %notice.title, description = %notice.description, "Could not start session");
            return Err(e.into());
        }
    };

    println!("{code}");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Interrupted, closing session");
                break;
            }
            changed = countdown.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *countdown.borrow_and_update();
                match state {
                    CountdownState::Running { remaining } => {
                        if remaining % COUNTDOWN_LOG_INTERVAL_SECS == 0 {
                            info!(remaining = %format_remaining(remaining), "Code still valid");
                        }
                    }
                    CountdownState::Expired => {
                        info!(session_code = %code, "Code expired");
                        break;
                    }
                    CountdownState::Cancelled => break,
                }
            }
        }
    }

    match generator.roster().await {
        Ok(records) => {
            info!(checked_in = records.len(), "Roster");
            for record in records {
                println!(
                    "{}\t{}\t{}",
                    record.checked_in_at.to_rfc3339(),
                    record.user_id,
                    record.status
                );
            }
        }
        Err(e) => {
            warn!(error_code = e.error_code(), error = %e, "Failed to load roster");
        }
    }

    generator.clear();
    info!("Attendance presenter shut down");
    Ok(())
}
