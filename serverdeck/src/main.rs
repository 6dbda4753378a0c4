//! Entry point for the serverdeck CLI. Parses args, loads the host table and runs one command.

use std::env;
use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serverdeck::display::{bar, human, relative_time, truncate_middle};
use serverdeck::hosts::{hosts_path, load_hosts, parse_host_assignment, save_hosts, HostOverrides};
use serverdeck::transport::TransportConfig;
use serverdeck::{cancellable, ClientConfig, FleetClient, HostTable};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const PASSWORD_ENV: &str = "SERVERDECK_PASSWORD";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Servers,
    Stats(String),
    Services,
    Alerts,
    Logs(String),
    Restart(String),
    Overview,
    Hosts,
}

#[derive(Debug)]
struct ParsedArgs {
    command: Command,
    overrides: HostOverrides,
    save: bool,
    json: bool,
    verbose: bool,
    tls_ca: Option<String>,
    timeout: Option<Duration>,
    password: Option<String>,
}

#[derive(Debug)]
enum ArgsError {
    Help(String),
    Invalid(String),
}

fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--json] [--verbose|-v] [--base URL] [--host NAME=URL]... [--save] \
[--tls-ca CERT_PEM|-t CERT_PEM] [--timeout SECS] [--password PW|-p PW] <command>\n\
\n\
Commands:\n\
  servers            list servers\n\
  stats <server>     cpu, memory and disk for one server\n\
  services           service status on the default host\n\
  alerts             system alerts, newest first\n\
  logs <server>      recent log entries for one server\n\
  restart <server>   restart a server (password from --password or ${PASSWORD_ENV})\n\
  overview           servers plus stats for each, fetched concurrently\n\
  hosts              show the host table in use"
    )
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, ArgsError> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "serverdeck".into());
    let invalid = |msg: String| ArgsError::Invalid(format!("{msg}\n{}", usage(&prog)));

    let mut positionals: Vec<String> = Vec::new();
    let mut overrides = HostOverrides::default();
    let mut save = false;
    let mut json = false;
    let mut verbose = false;
    let mut tls_ca: Option<String> = None;
    let mut timeout: Option<String> = None;
    let mut password: Option<String> = None;
    let mut hosts: Vec<String> = Vec::new();

    while let Some(arg) = it.next() {
        // --flag=value forms
        if let Some((flag, v)) = arg.split_once('=').filter(|(f, _)| f.starts_with("--")) {
            let v = v.to_string();
            match flag {
                "--base" => overrides.default_base = Some(v),
                "--host" => hosts.push(v),
                "--tls-ca" => tls_ca = Some(v).filter(|s| !s.is_empty()),
                "--timeout" => timeout = Some(v),
                "--password" => password = Some(v),
                _ => return Err(invalid(format!("Unknown flag '{flag}'."))),
            }
            continue;
        }
        match arg.as_str() {
            "-h" | "--help" => return Err(ArgsError::Help(usage(&prog))),
            "--json" => json = true,
            "-v" | "--verbose" => verbose = true,
            "--save" => save = true,
            "--base" | "--host" | "--tls-ca" | "-t" | "--timeout" | "--password" | "-p" => {
                let Some(v) = it.next() else {
                    return Err(invalid(format!("Missing value for {arg}.")));
                };
                match arg.as_str() {
                    "--base" => overrides.default_base = Some(v),
                    "--host" => hosts.push(v),
                    "--tls-ca" | "-t" => tls_ca = Some(v),
                    "--timeout" => timeout = Some(v),
                    _ => password = Some(v),
                }
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(invalid(format!("Unknown flag '{arg}'.")));
            }
            _ => positionals.push(arg),
        }
    }

    for h in hosts {
        let pair = parse_host_assignment(&h).map_err(|e| invalid(e.to_string()))?;
        overrides.hosts.push(pair);
    }

    let timeout = match timeout {
        Some(t) => match t.parse::<f64>() {
            Ok(secs) if secs > 0.0 => match Duration::try_from_secs_f64(secs) {
                Ok(d) => Some(d),
                Err(_) => return Err(invalid(format!("Invalid --timeout '{t}'."))),
            },
            _ => return Err(invalid(format!("Invalid --timeout '{t}'."))),
        },
        None => None,
    };

    let mut pos = positionals.into_iter();
    let Some(name) = pos.next() else {
        return Err(invalid("Missing command.".into()));
    };
    let mut server = || {
        pos.next()
            .ok_or_else(|| invalid(format!("'{name}' needs a server name.")))
    };
    let command = match name.as_str() {
        "servers" => Command::Servers,
        "stats" => Command::Stats(server()?),
        "services" => Command::Services,
        "alerts" => Command::Alerts,
        "logs" => Command::Logs(server()?),
        "restart" => Command::Restart(server()?),
        "overview" => Command::Overview,
        "hosts" => Command::Hosts,
        other => return Err(invalid(format!("Unknown command '{other}'."))),
    };
    if let Some(extra) = pos.next() {
        return Err(invalid(format!("Unexpected argument '{extra}'.")));
    }

    Ok(ParsedArgs {
        command,
        overrides,
        save,
        json,
        verbose,
        tls_ca,
        timeout,
        password,
    })
}

/// RUST_LOG wins; --verbose only raises this crate's level, other crates stay at warn.
fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    match rust_log.filter(|s| !s.trim().is_empty()) {
        Some(directives) => directives,
        None if verbose => "warn,serverdeck=debug".into(),
        None => "warn".into(),
    }
}

fn init_logging(verbose: bool) {
    let directives = log_directives(verbose, env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(ArgsError::Help(text)) => {
            println!("{text}");
            return Ok(());
        }
        Err(ArgsError::Invalid(text)) => {
            eprintln!("{text}");
            std::process::exit(2);
        }
    };
    init_logging(parsed.verbose);

    let mut hosts_file = load_hosts();
    let changed = hosts_file.apply(&parsed.overrides);
    if parsed.save && (changed || !hosts_path().exists()) {
        save_hosts(&hosts_file).context("saving host file")?;
    }
    let hosts = hosts_file.to_table()?;

    if parsed.command == Command::Hosts {
        return print_hosts(&hosts, parsed.json);
    }

    let client = FleetClient::new(ClientConfig {
        hosts,
        transport: TransportConfig {
            timeout: parsed.timeout,
            tls_ca: parsed.tls_ca.clone(),
            user_agent: None,
        },
    })?;

    // Ctrl-C cancels whatever is in flight; that is an exit, not a failure.
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    match run(&client, &parsed, &token).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let silent = e
                .downcast_ref::<serverdeck::Error>()
                .map_or(false, |e| e.is_cancelled());
            if !silent {
                eprintln!("serverdeck: {e:#}");
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn run(client: &FleetClient, args: &ParsedArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let now = Utc::now();
    match &args.command {
        Command::Servers => {
            let servers = cancellable(token, client.get_servers()).await?;
            if args.json {
                return print_json(&servers);
            }
            if servers.is_empty() {
                println!("no servers");
            }
            for s in &servers {
                println!(
                    "{:<20} {:<12} {:<16} {}",
                    s.name,
                    s.status.as_str(),
                    s.ip_address,
                    s.uptime
                );
            }
        }
        Command::Stats(server) => {
            let stats = cancellable(token, client.get_system_stats(server)).await?;
            if args.json {
                return print_json(&stats);
            }
            println!("{server}");
            print_stats(&stats.into_inner());
        }
        Command::Services => {
            let services = cancellable(token, client.get_services()).await?;
            if args.json {
                return print_json(&services);
            }
            if services.is_empty() {
                println!("no services");
            }
            for s in &services {
                println!(
                    "{:<8} {:<32} {}",
                    s.status.as_str(),
                    truncate_middle(&s.name, 32),
                    s.description
                );
            }
        }
        Command::Alerts => {
            let alerts = cancellable(token, client.get_system_alerts()).await?;
            if args.json {
                return print_json(&alerts);
            }
            if alerts.is_empty() {
                println!("no alerts");
            }
            for a in &alerts {
                println!(
                    "[{:<6}] {} ({}): {}",
                    a.severity.as_str(),
                    a.title,
                    relative_time(a.timestamp, now),
                    a.description
                );
            }
        }
        Command::Logs(server) => {
            let logs = cancellable(token, client.get_logs(server)).await?;
            if args.json {
                return print_json(&logs);
            }
            let logs = logs.into_inner();
            if logs.is_empty() {
                println!("no log entries");
            }
            for l in &logs {
                println!(
                    "{:>9} {:<7} {}",
                    relative_time(l.timestamp, now),
                    l.level.as_str(),
                    l.message
                );
            }
        }
        Command::Restart(server) => {
            let Some(password) = args
                .password
                .clone()
                .or_else(|| env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty()))
            else {
                bail!("restart needs --password or {PASSWORD_ENV}");
            };
            let reply = cancellable(token, client.post_restart(server, &password)).await?;
            if args.json {
                return print_json(&reply);
            }
            println!("{server}: {}", reply.into_inner().message);
        }
        Command::Overview => {
            let servers = cancellable(token, client.get_servers()).await?;
            let fetches = servers.iter().map(|s| client.get_system_stats(&s.name));
            let results = cancellable(token, async { Ok(join_all(fetches).await) }).await?;
            for (s, res) in servers.iter().zip(results) {
                println!("{} ({}, {})", s.name, s.status.as_str(), s.ip_address);
                match res {
                    Ok(stats) => print_stats(&stats.into_inner()),
                    Err(e) => {
                        if let Some(msg) = e.user_message() {
                            println!("  unavailable: {msg}");
                        }
                    }
                }
            }
        }
        Command::Hosts => print_hosts(client.hosts(), args.json)?,
    }
    Ok(())
}

fn print_stats(s: &serverdeck::types::ServerStats) {
    let (l1, l5, l15) = s.cpu.loadavg();
    println!("  load    {l1:.2} {l5:.2} {l15:.2}");
    // some hosts send a blank percent; derive it from the byte counts instead
    let mem_pct = if s.memory.usage_percent > 0.0 {
        s.memory.usage_percent
    } else {
        s.memory.used_fraction() * 100.0
    };
    println!(
        "  memory  {} {:>5.1}%  {} / {} (free {})",
        bar(mem_pct, 10),
        mem_pct,
        human(s.memory.used),
        human(s.memory.total),
        human(s.memory.free)
    );
    println!(
        "  disk    {} {:>5.1}%  {} / {} on {} ({})",
        bar(s.disk.use_percent, 10),
        s.disk.use_percent,
        s.disk.used,
        s.disk.size,
        s.disk.mount,
        s.disk.filesystem
    );
}

fn print_hosts(hosts: &HostTable, json: bool) -> anyhow::Result<()> {
    if json {
        #[derive(Serialize)]
        struct View<'a> {
            default_base: &'a str,
            hosts: Vec<(&'a str, &'a str)>,
        }
        return print_json(&View {
            default_base: hosts.default_base().as_str(),
            hosts: hosts.hosts().map(|(n, u)| (n, u.as_str())).collect(),
        });
    }
    println!("{:<20} {}", "(default)", hosts.default_base());
    for (name, base) in hosts.hosts() {
        println!("{name:<20} {base}");
    }
    Ok(())
}

fn print_json<T: Serialize>(v: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        std::iter::once("serverdeck")
            .chain(v.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn commands_with_server_names() {
        let p = parse_args(args(&["stats", "Dex Pi 2"])).unwrap();
        assert_eq!(p.command, Command::Stats("Dex Pi 2".into()));
        let p = parse_args(args(&["--json", "logs", "Dex Pi 4B"])).unwrap();
        assert_eq!(p.command, Command::Logs("Dex Pi 4B".into()));
        assert!(p.json);
    }

    #[test]
    fn flags_long_short_and_assign() {
        let p = parse_args(args(&[
            "-t",
            "/tmp/ca.pem",
            "--timeout=2.5",
            "--host",
            "Dex Pi 2=http://pi2:8000",
            "--base=http://gw/api",
            "-p",
            "abc123",
            "restart",
            "Dex Pi 2",
        ]))
        .unwrap();
        assert_eq!(p.tls_ca.as_deref(), Some("/tmp/ca.pem"));
        assert_eq!(p.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(p.overrides.default_base.as_deref(), Some("http://gw/api"));
        assert_eq!(
            p.overrides.hosts,
            vec![("Dex Pi 2".to_string(), "http://pi2:8000".to_string())]
        );
        assert_eq!(p.password.as_deref(), Some("abc123"));
        assert_eq!(p.command, Command::Restart("Dex Pi 2".into()));
    }

    #[test]
    fn verbose_keeps_other_crates_at_warn() {
        assert_eq!(log_directives(false, None), "warn");
        assert_eq!(log_directives(true, None), "warn,serverdeck=debug");
        assert_eq!(log_directives(true, Some(String::new())), "warn,serverdeck=debug");
        assert_eq!(log_directives(true, Some("reqwest=trace".into())), "reqwest=trace");
    }

    #[test]
    fn help_and_usage_errors() {
        assert!(matches!(parse_args(args(&["--help"])), Err(ArgsError::Help(_))));
        assert!(matches!(parse_args(args(&[])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["stats"])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["servers", "extra"])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["reboot"])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["--timeout", "0", "servers"])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["--timeout", "1e300", "servers"])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["--timeout=inf", "servers"])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["--timeout", "NaN", "servers"])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["--host", "nourl", "servers"])), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(args(&["--frobnicate", "servers"])), Err(ArgsError::Invalid(_))));
    }
}
