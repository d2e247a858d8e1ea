use std::process::ExitCode;
use std::time::Duration;

use serde_json::{Map, Value, json};

use vigil_core::ipc::{Envelope, IpcClient, default_socket_path};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USAGE: &str = "\
usage: vigil <command>

commands:
  status                     service status and update count
  check                      run an update check now
  updates                    list available updates
  last-check                 time of the last completed check
  settings                   show current settings
  set <key> <value> ...      change settings (e.g. set morning_check 08:30)
  install                    install all available updates
";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (command, data) = match args.first().map(String::as_str) {
        Some("status") => ("get_status", json!({})),
        Some("check") => ("check_updates", json!({})),
        Some("updates") => ("get_updates", json!({})),
        Some("last-check") => ("get_last_check", json!({})),
        Some("settings") => ("get_settings", json!({})),
        Some("install") => ("install_updates", json!({})),
        Some("set") => match parse_set_args(&args[1..]) {
            Some(settings) => ("save_settings", Value::Object(settings)),
            None => {
                eprint!("{USAGE}");
                return ExitCode::from(2);
            }
        },
        _ => {
            eprint!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    let mut client = IpcClient::new(default_socket_path());
    if let Err(connect_error) = client.connect(CONNECT_TIMEOUT).await {
        eprintln!("vigil: cannot reach the update service: {connect_error}");
        return ExitCode::FAILURE;
    }

    let Some(response) = client.send_command(command, data).await else {
        eprintln!("vigil: the update service did not answer");
        return ExitCode::FAILURE;
    };

    render(command, &response)
}

fn parse_set_args(pairs: &[String]) -> Option<Map<String, Value>> {
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return None;
    }

    let mut settings = Map::new();
    for pair in pairs.chunks(2) {
        let key = pair[0].as_str();
        let value = pair[1].as_str();
        let value = match key {
            "morning_check" | "afternoon_check" => Value::String(value.to_string()),
            "notify_on_updates" | "auto_check" | "include_pinned" | "include_unknown" => {
                match value {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => return None,
                }
            }
            _ => return None,
        };
        settings.insert(key.to_string(), value);
    }
    Some(settings)
}

fn render(command: &str, response: &Envelope) -> ExitCode {
    if response.is_error() {
        let message = response.data["message"].as_str().unwrap_or("unknown error");
        eprintln!("vigil: {message}");
        return ExitCode::FAILURE;
    }

    match command {
        "get_updates" => {
            let count = response.data["count"].as_u64().unwrap_or(0);
            if count == 0 {
                println!("no updates available");
                return ExitCode::SUCCESS;
            }
            if let Some(updates) = response.data["updates"].as_array() {
                for update in updates {
                    println!(
                        "{}  {} -> {}  ({})",
                        update["id"].as_str().unwrap_or("?"),
                        update["current_version"].as_str().unwrap_or("?"),
                        update["available_version"].as_str().unwrap_or("?"),
                        update["name"].as_str().unwrap_or("?"),
                    );
                }
            }
            println!("{count} update(s) available");
            ExitCode::SUCCESS
        }
        "save_settings" | "install_updates" => {
            match serde_json::to_string_pretty(&response.data) {
                Ok(rendered) => println!("{rendered}"),
                Err(_) => println!("{}", response.data),
            }
            if response.data["success"] == json!(true) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        _ => {
            match serde_json::to_string_pretty(&response.data) {
                Ok(rendered) => println!("{rendered}"),
                Err(_) => println!("{}", response.data),
            }
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::parse_set_args;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[test]
    fn parses_time_and_boolean_pairs() {
        let settings = parse_set_args(&strings(&[
            "morning_check",
            "08:30",
            "auto_check",
            "false",
        ]))
        .unwrap();
        assert_eq!(settings["morning_check"], Value::String("08:30".into()));
        assert_eq!(settings["auto_check"], json!(false));
    }

    #[test]
    fn rejects_odd_pair_counts_and_unknown_keys() {
        assert!(parse_set_args(&strings(&["morning_check"])).is_none());
        assert!(parse_set_args(&strings(&["bogus_key", "1"])).is_none());
        assert!(parse_set_args(&strings(&["auto_check", "yes"])).is_none());
        assert!(parse_set_args(&[]).is_none());
    }
}
