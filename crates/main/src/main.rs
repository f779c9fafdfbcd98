#![forbid(unsafe_code)]
#![allow(unknown_lints)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::perf,
    clippy::nursery,
    clippy::complexity,
    clippy::correctness,
    clippy::clone_on_ref_ptr,
    clippy::create_dir,
    clippy::decimal_literal_representation,
    clippy::default_numeric_fallback,
    clippy::exit,
    clippy::expect_used,
    clippy::filetype_is_file,
    clippy::if_then_some_else_none,
    clippy::indexing_slicing,
    clippy::inline_asm_x86_att_syntax,
    clippy::let_underscore_must_use,
    clippy::lossy_float_literal,
    clippy::map_err_ignore,
    clippy::mem_forget,
    clippy::multiple_inherent_impl,
    clippy::panic_in_result_fn,
    clippy::rc_buffer,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::semicolon_if_nothing_returned,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::unreachable,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::verbose_file_reads,
    clippy::wildcard_enum_match_arm,
    clippy::wrong_self_convention
)]
#![allow(
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::non_ascii_literal,
    clippy::cargo_common_metadata,
    clippy::multiple_crate_versions
)]

use std::{env, path::PathBuf, sync::Arc};

use futures::stream::StreamExt;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument};

use apis::{discord_api::DiscordApi, stream_tracker::StreamTracker};
use utility::{config::Config, logger::Logger, streams::Notification};

fn main() -> anyhow::Result<()> {
    let _logging_guard = Logger::initialize()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { async_main().await })
}

#[instrument]
async fn async_main() -> anyhow::Result<()> {
    let (exit_sender, exit_receiver) = watch::channel(false);

    let signals = Signals::new(&[SIGHUP, SIGTERM, SIGINT, SIGQUIT])?;
    let handle = signals.handle();

    let signals_task = tokio::spawn(async move {
        let mut signals = signals.fuse();

        while let Some(signal) = signals.next().await {
            match signal {
                SIGHUP => {
                    info!(signal_type = "SIGHUP", signal, "Signal received!");
                }
                SIGTERM | SIGINT | SIGQUIT => {
                    info!(
                        signal_type = "Terminate",
                        signal, "Terminate signal received!"
                    );

                    if let Err(e) = exit_sender.send(true) {
                        error!("{:#}", e);
                    }
                }
                _ => debug!(
                    signal_type = "Unknown",
                    signal, "Unhandled signal received!"
                ),
            }
        }
    });

    let config = Config::load(&get_config_path())?;

    info!(
        poll_interval = ?config.poll_interval,
        channels = config.channels.len(),
        "Starting up."
    );

    let (notification_tx, notification_rx): (
        mpsc::Sender<Notification>,
        mpsc::Receiver<Notification>,
    ) = mpsc::channel(10);

    DiscordApi::start(
        Arc::<Config>::clone(&config),
        notification_rx,
        exit_receiver.clone(),
    )
    .await;

    let tracker = StreamTracker::start(
        Arc::<Config>::clone(&config),
        notification_tx,
        exit_receiver,
    )
    .await;

    tracker.await??;
    info!(task = "Main thread", "Shutting down.");

    handle.close();
    signals_task.await?;

    Ok(())
}

fn get_config_path() -> PathBuf {
    env::var("CONFIG_DIR").map_or_else(|_| PathBuf::from("."), PathBuf::from)
}
