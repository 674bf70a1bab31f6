//! Purpose: Hold top-level CLI command dispatch for `coordlink`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Only `watch` installs signal handlers; other commands keep default Ctrl-C.
//! Invariants: `watch` treats BadConfig and PollFailed as non-fatal notices.

use super::*;

pub(super) fn dispatch_command(command: Command, config: LinkConfig) -> Result<RunOutcome, Error> {
    match command {
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Show { timeout_ms } => {
            let mut link = config.connect()?;
            match timeout_ms {
                Some(ms) => link.wait_for_config_timeout(Duration::from_millis(ms))?,
                None => link.wait_for_config()?,
            };
            emit_json(config_json(link.config()));
            Ok(RunOutcome::ok())
        }
        Command::Watch { count } => {
            let stop = install_stop_flag()?;
            let coordinator = config.coordinator()?.to_string();
            let mut link = config.connect()?;
            let mut seen = 0u64;
            while !stop_requested(&stop) && count.is_none_or(|limit| seen < limit) {
                match link.wait_for_config_timeout(WATCH_SLICE) {
                    Ok(_) => {
                        let observed_at = notice_time_now().unwrap_or_default();
                        emit_line(config_summary_json(link.config(), &observed_at));
                        seen += 1;
                    }
                    // An elapsed slice carries no source; loop to re-check the stop flag.
                    Err(err) if err.kind() == ErrorKind::PollFailed && err.source().is_none() => {}
                    Err(err)
                        if matches!(err.kind(), ErrorKind::BadConfig | ErrorKind::PollFailed) =>
                    {
                        if stop_requested(&stop) {
                            break;
                        }
                        let time = notice_time_now().unwrap_or_default();
                        emit_notice(&Notice::from_error(
                            "watch",
                            &coordinator,
                            link.version(),
                            &err,
                            time,
                        ));
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Rpc {
            function,
            data,
            data_hex,
        } => {
            let input = match (data, data_hex) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(hex)) => parse_hex(&hex)?,
                (None, None) => Vec::new(),
            };
            let mut link = config.connect()?;
            let output = link.make_rpc(&function, &input)?;
            let text = std::str::from_utf8(&output).ok();
            emit_json(json!({
                "function": function,
                "output": text,
                "output_hex": to_hex(&output),
            }));
            Ok(RunOutcome::ok())
        }
    }
}
