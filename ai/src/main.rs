//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wyldlands_ai::config::{Arguments, Configuration};
use wyldlands_ai::ecs::context::WorldContext;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration from a file with environment variable substitution
    let config = match Configuration::load(&arguments.config_file) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Unable to load configuration file {}: {}", arguments.config_file, e);
            return Err(e.into());
        }
    };

    tracing::debug!("Configuration loaded: {:?}", config);
    tracing::info!("Starting Wyldlands AI Server...");

    let context = WorldContext::from_configuration(&config)?;
    tracing::info!("World context initialized with {} zones", context.len());

    // Relay events as JSON lines until a network layer subscribes
    context.event_bus().subscribe(|event| match serde_json::to_string(event) {
        Ok(json) => tracing::trace!("Event: {}", json),
        Err(e) => tracing::warn!("Failed to encode event {:?}: {}", event, e),
    });

    let tick_interval = config.server.tick_interval.as_duration();
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::info!("Ticking every {:?}", tick_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let notifications = context.tick().await;
                if !notifications.is_empty() {
                    tracing::trace!("Tick produced {} movement notifications", notifications.len());
                }
                context.event_bus().process_events();
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
